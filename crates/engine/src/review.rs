//! Review storage: one review per (cinema, tag, author).
//!
//! Owns the single-review-per-author invariant and the derived overall
//! score. Every mutation shares one transaction with the matching
//! [`StatsDelta`] application, so the review set and its aggregate can never
//! be observed disagreeing.

use chrono::Utc;
use snafu::ResultExt;
use tracing::debug;

use marquee_store::{Database, tables};
use marquee_types::{
    AggregateStats, AuthorId, CinemaId, Review, ReviewKey, ScoreCard, ScreenTag, StatsKey, decode,
    encode, validate_id, validate_scores, validate_tag,
};

use crate::config::RetryPolicy;
use crate::coordinator::run_atomically;
use crate::error::{CodecSnafu, Result, ValidationSnafu};
use crate::stats::{StatsAggregator, StatsDelta};
use crate::view::RankOrder;

/// Review CRUD over a shared database handle.
#[derive(Debug, Clone)]
pub struct ReviewStore {
    db: Database,
    policy: RetryPolicy,
}

impl ReviewStore {
    /// Creates a review store with the default retry policy.
    pub fn new(db: Database) -> Self {
        Self::with_policy(db, RetryPolicy::default())
    }

    /// Creates a review store with an explicit retry policy.
    pub fn with_policy(db: Database, policy: RetryPolicy) -> Self {
        Self { db, policy }
    }

    /// The underlying database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Creates or updates the author's review of one (cinema, tag) pair.
    ///
    /// A first submission creates the row with a zero like counter; a
    /// resubmission updates scores and comment in place, preserving
    /// `like_count` and `created_at` and refreshing `updated_at`. Either
    /// way exactly one stats delta is applied in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns a validation error (before any transaction opens) if a
    /// sub-score is out of range or off the 0.5 step, or if the tag or ids
    /// are malformed; otherwise only propagated transaction failures.
    pub async fn upsert_review(
        &self,
        cinema: CinemaId,
        tag: ScreenTag,
        author: AuthorId,
        scores: ScoreCard,
        comment: impl Into<String>,
    ) -> Result<Review> {
        validate_id("cinema", cinema.as_str()).context(ValidationSnafu)?;
        validate_id("author", author.as_str()).context(ValidationSnafu)?;
        validate_tag(tag.as_str()).context(ValidationSnafu)?;
        validate_scores(&scores).context(ValidationSnafu)?;

        let comment = comment.into();
        let key = ReviewKey::new(cinema, tag, author);
        let storage_key = key.encode();
        let stats_key = key.stats_key();
        let overall = scores.overall();

        let review = run_atomically(&self.db, &self.policy, |txn| {
            let now = Utc::now();
            let prior = read_review(txn, &storage_key)?;

            let (review, delta) = match prior {
                Some(prev) => {
                    let review = Review {
                        cinema: key.cinema.clone(),
                        tag: key.tag.clone(),
                        author: key.author.clone(),
                        scores,
                        overall,
                        comment: comment.clone(),
                        like_count: prev.like_count,
                        created_at: prev.created_at,
                        updated_at: now,
                    };
                    let delta =
                        StatsDelta::Update { old_overall: prev.overall, new_overall: overall };
                    (review, delta)
                }
                None => {
                    let review = Review {
                        cinema: key.cinema.clone(),
                        tag: key.tag.clone(),
                        author: key.author.clone(),
                        scores,
                        overall,
                        comment: comment.clone(),
                        like_count: 0,
                        created_at: now,
                        updated_at: now,
                    };
                    (review, StatsDelta::Create { new_overall: overall })
                }
            };

            txn.insert::<tables::Reviews>(&storage_key, encode(&review).context(CodecSnafu)?);
            StatsAggregator::apply(txn, &stats_key, &delta, now)?;
            Ok(review)
        })
        .await?;

        debug!(key = %key, overall, "review upserted");
        Ok(review)
    }

    /// Deletes the author's review, reversing its stats contribution in the
    /// same transaction. Deleting an absent review is success with zero
    /// effect.
    ///
    /// # Errors
    ///
    /// Only propagated transaction failures.
    pub async fn delete_review(&self, key: &ReviewKey) -> Result<()> {
        let storage_key = key.encode();
        let stats_key = key.stats_key();

        let removed = run_atomically(&self.db, &self.policy, |txn| {
            let Some(prev) = read_review(txn, &storage_key)? else {
                return Ok(false);
            };
            txn.delete::<tables::Reviews>(&storage_key);
            StatsAggregator::apply(
                txn,
                &stats_key,
                &StatsDelta::Delete { old_overall: prev.overall },
                Utc::now(),
            )?;
            Ok(true)
        })
        .await?;

        if removed {
            debug!(key = %key, "review deleted");
        }
        Ok(())
    }

    /// Point-reads one review.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the stored document is unreadable.
    pub fn get_review(&self, key: &ReviewKey) -> Result<Option<Review>> {
        self.db
            .read()
            .get::<tables::Reviews>(&key.encode())
            .map(|bytes| decode(&bytes).context(CodecSnafu))
            .transpose()
    }

    /// Reads all reviews for one screen, ordered.
    ///
    /// # Errors
    ///
    /// Returns a codec error if any stored document is unreadable.
    pub fn list_reviews(&self, key: &StatsKey, order: RankOrder) -> Result<Vec<Review>> {
        let rows = self.db.read().scan_prefix::<tables::Reviews>(&key.encode());
        let mut reviews = rows
            .into_iter()
            .map(|(_, bytes)| decode(&bytes).context(CodecSnafu))
            .collect::<Result<Vec<Review>>>()?;
        order.sort(&mut reviews);
        Ok(reviews)
    }

    /// Reads the aggregate stats for one screen, or None when no review has
    /// ever contributed.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the stored document is unreadable.
    pub fn stats(&self, key: &StatsKey) -> Result<Option<AggregateStats>> {
        StatsAggregator::read(&self.db, key)
    }
}

/// Reads and decodes a review through a transaction.
pub(crate) fn read_review(
    txn: &mut marquee_store::Transaction<'_>,
    storage_key: &[u8],
) -> Result<Option<Review>> {
    txn.get::<tables::Reviews>(storage_key)
        .map(|bytes| decode(&bytes).context(CodecSnafu))
        .transpose()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    fn store() -> ReviewStore {
        ReviewStore::new(Database::open_in_memory())
    }

    fn key(author: &str) -> ReviewKey {
        ReviewKey::new(CinemaId::new("c1"), ScreenTag::new("imax"), AuthorId::new(author))
    }

    #[tokio::test]
    async fn test_create_computes_overall() {
        let store = store();
        let review = store
            .upsert_review(
                CinemaId::new("c1"),
                ScreenTag::new("imax"),
                AuthorId::new("u1"),
                ScoreCard::new(5.0, 4.0, 3.0, 2.0),
                "great screen",
            )
            .await
            .expect("should create");
        assert!((review.overall - 3.5).abs() < 1e-9);
        assert_eq!(review.like_count, 0);
        assert_eq!(review.created_at, review.updated_at);
    }

    #[tokio::test]
    async fn test_update_preserves_likes_and_created_at() {
        let store = store();
        let first = store
            .upsert_review(
                CinemaId::new("c1"),
                ScreenTag::new("imax"),
                AuthorId::new("u1"),
                ScoreCard::new(5.0, 5.0, 5.0, 5.0),
                "",
            )
            .await
            .expect("should create");

        let second = store
            .upsert_review(
                CinemaId::new("c1"),
                ScreenTag::new("imax"),
                AuthorId::new("u1"),
                ScoreCard::new(4.0, 4.0, 4.0, 4.0),
                "edited",
            )
            .await
            .expect("should update");

        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.like_count, first.like_count);
        assert_eq!(second.comment, "edited");

        // Still one row.
        let reviews = store
            .list_reviews(&key("u1").stats_key(), RankOrder::Recency)
            .expect("should list");
        assert_eq!(reviews.len(), 1);
    }

    #[tokio::test]
    async fn test_validation_rejects_before_any_write() {
        let store = store();
        let result = store
            .upsert_review(
                CinemaId::new("c1"),
                ScreenTag::new("imax"),
                AuthorId::new("u1"),
                ScoreCard::new(5.5, 0.0, 0.0, 0.0),
                "",
            )
            .await;
        assert!(matches!(result, Err(EngineError::Validation { .. })));
        assert!(store.stats(&key("u1").stats_key()).expect("should read").is_none());
        assert!(store.get_review(&key("u1")).expect("should read").is_none());
    }

    #[tokio::test]
    async fn test_delete_absent_is_noop() {
        let store = store();
        store.delete_review(&key("ghost")).await.expect("absent delete should succeed");
        assert!(store.stats(&key("ghost").stats_key()).expect("should read").is_none());
    }
}
