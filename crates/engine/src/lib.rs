//! marquee-engine: the aggregate-consistency core.
//!
//! Keeps a denormalized (count, sum, average) summary and per-review like
//! counters in lock-step with an unbounded set of per-author review
//! documents, without ever rescanning the review set:
//!
//! - [`ReviewStore`]: single-review-per-author upsert/delete, each sharing
//!   one transaction with the matching stats delta
//! - [`StatsAggregator`]: constant-time delta application to the summary
//! - [`LikeLedger`]: per-(review, viewer) existence records driving the
//!   review's like counter; favorites as the counterless sibling
//! - [`run_atomically`]: the bounded-retry optimistic-transaction executor
//!   every mutation above goes through
//! - [`LiveRankedView`]: watch-driven ordered snapshots of one screen's
//!   reviews

#![deny(unsafe_code)]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod likes;
pub mod review;
pub mod stats;
pub mod view;

pub use config::RetryPolicy;
pub use coordinator::run_atomically;
pub use error::{EngineError, Result};
pub use likes::{FavoriteOutcome, LikeLedger, ToggleOutcome};
pub use review::ReviewStore;
pub use stats::{StatsAggregator, StatsDelta};
pub use view::{LiveRankedView, RankOrder, ReviewSnapshot, ViewUpdate};
