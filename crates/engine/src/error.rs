//! Error types for the engine, using snafu.
//!
//! Every surfaced failure carries a message suitable for direct display, and
//! none is fatal to the process; each is scoped to the single user action
//! that triggered it. Deleting an absent review or unliking an absent like
//! is defined as success and never reaches this module.

use snafu::Snafu;

use marquee_types::{CodecError, ValidationError};

/// Unified result type for engine operations.
pub type Result<T, E = EngineError> = std::result::Result<T, E>;

/// Errors surfaced by engine operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum EngineError {
    /// Input rejected before any transaction opened; no state changed.
    #[snafu(display("Invalid input: {source}"))]
    Validation {
        /// The violated constraint, with field context.
        source: ValidationError,
    },

    /// Underlying store operation failed.
    #[snafu(display("Store operation failed: {source}"))]
    Store {
        /// The underlying store error.
        source: marquee_store::Error,
    },

    /// A stored document failed to decode into its strict shape.
    #[snafu(display("Stored document is unreadable: {source}"))]
    Codec {
        /// The underlying codec error.
        source: CodecError,
    },

    /// Conflicting commits kept winning until the retry budget ran out.
    #[snafu(display(
        "Operation failed after {attempts} attempts; please try again ({last_error})"
    ))]
    RetryExhausted {
        /// Total attempts made, including the first.
        attempts: u32,
        /// Display form of the last conflict.
        last_error: String,
    },

    /// A like toggle for this review is already in flight.
    ///
    /// Purely a latency guard: the rejected toggle was never started, and
    /// correctness does not depend on this rejection.
    #[snafu(display("A like for review '{review}' is still being processed"))]
    LikeInFlight {
        /// Display form of the review key.
        review: String,
    },

    /// A live view's underlying watch broke.
    #[snafu(display("Live view lost its subscription: {message}"))]
    Subscription {
        /// Human-readable cause.
        message: String,
    },
}

impl EngineError {
    /// Whether re-running the whole operation against fresh state can
    /// succeed. Drives the coordinator's retry decision.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store { source } => source.is_retryable(),
            Self::Validation { .. }
            | Self::Codec { .. }
            | Self::RetryExhausted { .. }
            | Self::LikeInFlight { .. }
            | Self::Subscription { .. } => false,
        }
    }
}
