//! Document shapes for reviews, aggregates, and existence markers.
//!
//! These are the strict in-memory forms. Anything read from the store is
//! decoded into these exactly once, at the read edge; readers never see a
//! partially-shaped document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AuthorId, CinemaId, ScreenTag, ViewerId};

/// The four sub-scores of a review, each in [0,5] at 0.5 granularity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    /// Screen quality (size, curvature, condition).
    pub screen: f64,
    /// Picture quality (brightness, contrast, projection).
    pub picture: f64,
    /// Sound quality.
    pub sound: f64,
    /// Seat comfort.
    pub seat: f64,
}

impl ScoreCard {
    /// Creates a score card from the four sub-scores.
    pub const fn new(screen: f64, picture: f64, sound: f64, seat: f64) -> Self {
        Self { screen, picture, sound, seat }
    }

    /// Arithmetic mean of the four sub-scores.
    ///
    /// Stored redundantly on the review so historical edits can be diffed
    /// without recomputing from sub-scores read back out of the store.
    pub fn overall(&self) -> f64 {
        (self.screen + self.picture + self.sound + self.seat) / 4.0
    }
}

/// A single author's review of one (cinema, screen-tag) pair.
///
/// Identity is `(cinema, tag, author)`; a second submission by the same
/// author is an update of this row, never a second row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    /// The reviewed venue.
    pub cinema: CinemaId,
    /// The screen category this review is scoped to.
    pub tag: ScreenTag,
    /// The review's author; owner of the row.
    pub author: AuthorId,
    /// Four sub-scores.
    pub scores: ScoreCard,
    /// Mean of the sub-scores at write time.
    pub overall: f64,
    /// Free-text comment; empty when the author left none.
    #[serde(default)]
    pub comment: String,
    /// Denormalized like counter, driven by the like ledger. Never negative.
    #[serde(default)]
    pub like_count: u64,
    /// First submission time.
    pub created_at: DateTime<Utc>,
    /// Last submission time; equals `created_at` until the first edit.
    pub updated_at: DateTime<Utc>,
}

/// Denormalized (count, sum, average) summary for one (cinema, screen-tag).
///
/// Maintained purely by per-mutation deltas inside the same transaction as
/// the review write; never rebuilt by scanning the review set. `count` and
/// `sum_overall` are always exactly the count/sum over live reviews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    /// Number of live reviews contributing.
    #[serde(default)]
    pub count: u64,
    /// Sum of their `overall` values.
    #[serde(default)]
    pub sum_overall: f64,
    /// `sum_overall / count`, or 0 when empty. Stored for cheap reads.
    #[serde(default)]
    pub avg_overall: f64,
    /// Time of the last contributing mutation.
    pub updated_at: DateTime<Utc>,
}

impl AggregateStats {
    /// The empty aggregate, used when no stats document exists yet.
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self { count: 0, sum_overall: 0.0, avg_overall: 0.0, updated_at: now }
    }

    /// Recomputes the derived average from `count` and `sum_overall`.
    pub fn recompute_average(&mut self) {
        self.avg_overall = if self.count == 0 {
            0.0
        } else {
            self.sum_overall / self.count as f64
        };
    }
}

/// Existence record marking that `liker` currently likes `review`.
///
/// Existence *is* the liked state; the record is created on like and deleted
/// on unlike, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LikeRecord {
    /// The liking viewer.
    pub liker: ViewerId,
    /// When the like was placed.
    pub created_at: DateTime<Utc>,
}

/// Existence record marking that `viewer` bookmarked `cinema`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    /// The bookmarking viewer.
    pub viewer: ViewerId,
    /// The bookmarked venue.
    pub cinema: CinemaId,
    /// When the bookmark was placed.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overall_is_mean() {
        let scores = ScoreCard::new(5.0, 4.0, 3.0, 2.0);
        assert!((scores.overall() - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_overall_half_steps_exact() {
        // Means of half-step scores are quarter-steps, exactly representable
        // in binary, so stored overalls compare exactly.
        let scores = ScoreCard::new(4.5, 4.5, 4.5, 5.0);
        assert_eq!(scores.overall(), 4.625);
    }

    #[test]
    fn test_recompute_average_empty() {
        let mut stats = AggregateStats::empty(Utc::now());
        stats.recompute_average();
        assert_eq!(stats.avg_overall, 0.0);
    }

    #[test]
    fn test_recompute_average() {
        let mut stats = AggregateStats::empty(Utc::now());
        stats.count = 2;
        stats.sum_overall = 5.0;
        stats.recompute_average();
        assert!((stats.avg_overall - 2.5).abs() < 1e-9);
    }
}
