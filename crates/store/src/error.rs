//! Error types for the marquee store.

use snafu::Snafu;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during store operations.
#[derive(Debug, Snafu)]
pub enum Error {
    /// A concurrent transaction committed a conflicting write first.
    ///
    /// The failing transaction read a document whose version changed before
    /// commit; re-running the whole read-then-write unit against fresh state
    /// is the correct recovery, so this error is retryable.
    #[snafu(display("Transaction conflict on table '{table}': a concurrent write committed first"))]
    Conflict {
        /// Name of the table holding the contended document.
        table: &'static str,
    },
}

impl Error {
    /// Whether retrying the failed operation against fresh state can succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Conflict { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_is_retryable() {
        let err = Error::Conflict { table: "stats" };
        assert!(err.is_retryable());
        assert!(err.to_string().contains("stats"));
    }
}
