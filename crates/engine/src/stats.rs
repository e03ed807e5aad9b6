//! Running (count, sum, average) maintenance for one screen's reviews.
//!
//! This is the crux of the system: every review mutation is converted into a
//! constant-time delta against the aggregate, applied inside the same
//! transaction as the review write. The aggregate is never re-derived by
//! scanning the review set, and must never drift from it.

use chrono::{DateTime, Utc};
use snafu::ResultExt;
use tracing::trace;

use marquee_store::{Transaction, tables};
use marquee_types::{AggregateStats, StatsKey, decode, encode};

use crate::error::{CodecSnafu, Result};

/// The effect of one review mutation on its aggregate, expressed through the
/// review's before/after `overall` values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatsDelta {
    /// A review came into existence.
    Create {
        /// The new review's overall score.
        new_overall: f64,
    },
    /// An existing review's scores changed. Count is unaffected.
    Update {
        /// Overall stored on the review before the edit.
        old_overall: f64,
        /// Overall after the edit.
        new_overall: f64,
    },
    /// A review was removed.
    Delete {
        /// Overall stored on the review being removed.
        old_overall: f64,
    },
}

impl StatsDelta {
    /// Applies this delta to an aggregate in place.
    ///
    /// Count never goes below zero, and an empty aggregate's sum is forced
    /// to exactly 0.0 so repeated float additions and subtractions cannot
    /// leave a residue behind the last delete.
    pub fn apply_to(&self, stats: &mut AggregateStats) {
        match *self {
            StatsDelta::Create { new_overall } => {
                stats.count += 1;
                stats.sum_overall += new_overall;
            }
            StatsDelta::Update { old_overall, new_overall } => {
                stats.sum_overall += new_overall - old_overall;
            }
            StatsDelta::Delete { old_overall } => {
                stats.count = stats.count.saturating_sub(1);
                stats.sum_overall -= old_overall;
                if stats.count == 0 {
                    stats.sum_overall = 0.0;
                }
            }
        }
        stats.recompute_average();
    }
}

/// Transactional application of [`StatsDelta`] values to stored aggregates.
pub struct StatsAggregator;

impl StatsAggregator {
    /// Applies `delta` to the aggregate for `key` inside `txn`.
    ///
    /// Reads the current stats document through the transaction (an absent
    /// document reads as the empty aggregate), applies the delta, recomputes
    /// the average, and stages the write. The surrounding transaction makes
    /// this atomic with the review mutation that produced the delta.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the stored stats document is unreadable.
    pub fn apply(
        txn: &mut Transaction<'_>,
        key: &StatsKey,
        delta: &StatsDelta,
        now: DateTime<Utc>,
    ) -> Result<AggregateStats> {
        let storage_key = key.encode();
        let mut stats = match txn.get::<tables::Stats>(&storage_key) {
            Some(bytes) => decode(&bytes).context(CodecSnafu)?,
            None => AggregateStats::empty(now),
        };

        delta.apply_to(&mut stats);
        stats.updated_at = now;

        txn.insert::<tables::Stats>(&storage_key, encode(&stats).context(CodecSnafu)?);
        trace!(
            key = %key,
            count = stats.count,
            sum = stats.sum_overall,
            "staged aggregate delta"
        );
        Ok(stats)
    }

    /// Point-reads the aggregate for `key` from a fresh snapshot.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the stored stats document is unreadable.
    pub fn read(db: &marquee_store::Database, key: &StatsKey) -> Result<Option<AggregateStats>> {
        db.read()
            .get::<tables::Stats>(&key.encode())
            .map(|bytes| decode(&bytes).context(CodecSnafu))
            .transpose()
    }
}
