//! The like ledger and favorite markers.
//!
//! A review's `like_count` is backed by per-(review, viewer) existence
//! records: the record *is* the liked state, and the counter is only ever
//! moved in the same transaction that creates or deletes the record backing
//! the move. The ledger self-corrects from record existence rather than
//! trusting any toggle state supplied by a caller.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use snafu::ResultExt;
use tracing::debug;

use marquee_store::{Database, tables};
use marquee_types::{
    CinemaId, Favorite, LikeRecord, ReviewKey, ViewerId, encode, favorite_key, like_key,
    validate_id, validate_tag,
};

use crate::config::RetryPolicy;
use crate::coordinator::run_atomically;
use crate::error::{CodecSnafu, EngineError, Result, ValidationSnafu};
use crate::review::read_review;

/// Result of a like toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// A like record was created.
    Liked {
        /// The review's counter after the toggle.
        like_count: u64,
    },
    /// The viewer's existing like record was removed.
    Unliked {
        /// The review's counter after the toggle.
        like_count: u64,
    },
    /// The review no longer exists; nothing to count. Any orphaned record
    /// the viewer still had was cleaned up.
    ReviewMissing,
}

/// Result of a favorite toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteOutcome {
    /// The cinema is now bookmarked.
    Added,
    /// The bookmark was removed.
    Removed,
}

/// Like and favorite toggling over a shared database handle.
#[derive(Debug, Clone)]
pub struct LikeLedger {
    db: Database,
    policy: RetryPolicy,
    /// (review, liker) pairs with a toggle currently in flight through this
    /// handle. A latency guard only: rejected toggles were never started,
    /// and correctness never depends on this set.
    in_flight: Arc<Mutex<HashSet<Vec<u8>>>>,
}

impl LikeLedger {
    /// Creates a ledger with the default retry policy.
    pub fn new(db: Database) -> Self {
        Self::with_policy(db, RetryPolicy::default())
    }

    /// Creates a ledger with an explicit retry policy.
    pub fn with_policy(db: Database, policy: RetryPolicy) -> Self {
        Self { db, policy, in_flight: Arc::new(Mutex::new(HashSet::new())) }
    }

    /// Toggles `liker`'s like on a review.
    ///
    /// Atomically flips the existence record and moves the counter: if the
    /// record exists it is deleted and the counter decrements (floored at
    /// zero); otherwise it is created and the counter increments. Two
    /// concurrent togglers on the same review serialize through transaction
    /// conflict-and-retry rather than lost-update racing on the counter.
    ///
    /// Toggling on a review that no longer exists is success with zero
    /// counter effect.
    ///
    /// # Errors
    ///
    /// Returns a validation error (before any transaction opens) if the
    /// review's ids, its tag, or the liker id are malformed, or
    /// [`EngineError::LikeInFlight`] when this viewer's previous toggle for
    /// the same review through this handle has not completed yet; otherwise
    /// only propagated transaction failures.
    pub async fn toggle_like(&self, review: &ReviewKey, liker: &ViewerId) -> Result<ToggleOutcome> {
        validate_id("cinema", review.cinema.as_str()).context(ValidationSnafu)?;
        validate_id("author", review.author.as_str()).context(ValidationSnafu)?;
        validate_tag(review.tag.as_str()).context(ValidationSnafu)?;
        validate_id("liker", liker.as_str()).context(ValidationSnafu)?;

        let review_key = review.encode();
        let record_key = like_key(review, liker);

        let _guard = self.acquire_in_flight(review, record_key.clone())?;

        let outcome = run_atomically(&self.db, &self.policy, |txn| {
            let now = Utc::now();
            let record_exists = txn.contains::<tables::Likes>(&record_key);
            let prior = read_review(txn, &review_key)?;

            let Some(mut row) = prior else {
                if record_exists {
                    // The review vanished under the record; drop the orphan.
                    txn.delete::<tables::Likes>(&record_key);
                }
                return Ok(ToggleOutcome::ReviewMissing);
            };

            if record_exists {
                txn.delete::<tables::Likes>(&record_key);
                row.like_count = row.like_count.saturating_sub(1);
                txn.insert::<tables::Reviews>(&review_key, encode(&row).context(CodecSnafu)?);
                Ok(ToggleOutcome::Unliked { like_count: row.like_count })
            } else {
                let record = LikeRecord { liker: liker.clone(), created_at: now };
                txn.insert::<tables::Likes>(&record_key, encode(&record).context(CodecSnafu)?);
                row.like_count += 1;
                txn.insert::<tables::Reviews>(&review_key, encode(&row).context(CodecSnafu)?);
                Ok(ToggleOutcome::Liked { like_count: row.like_count })
            }
        })
        .await?;

        debug!(review = %review, liker = %liker, ?outcome, "like toggled");
        Ok(outcome)
    }

    /// Whether `viewer` currently likes the review. A plain point probe,
    /// deliberately outside any transaction (see the live view's relaxed
    /// liked-state contract).
    pub fn has_liked(&self, review: &ReviewKey, viewer: &ViewerId) -> bool {
        self.db.read().contains::<tables::Likes>(&like_key(review, viewer))
    }

    /// Toggles `viewer`'s bookmark on a cinema, the counterless sibling of
    /// a like: pure existence flip, no denormalized counter to move.
    ///
    /// # Errors
    ///
    /// Returns a validation error (before any transaction opens) if the
    /// viewer or cinema id is malformed; otherwise only propagated
    /// transaction failures.
    pub async fn toggle_favorite(
        &self,
        viewer: &ViewerId,
        cinema: &CinemaId,
    ) -> Result<FavoriteOutcome> {
        validate_id("viewer", viewer.as_str()).context(ValidationSnafu)?;
        validate_id("cinema", cinema.as_str()).context(ValidationSnafu)?;

        let marker_key = favorite_key(viewer, cinema);

        let outcome = run_atomically(&self.db, &self.policy, |txn| {
            if txn.contains::<tables::Favorites>(&marker_key) {
                txn.delete::<tables::Favorites>(&marker_key);
                Ok(FavoriteOutcome::Removed)
            } else {
                let marker = Favorite {
                    viewer: viewer.clone(),
                    cinema: cinema.clone(),
                    created_at: Utc::now(),
                };
                txn.insert::<tables::Favorites>(&marker_key, encode(&marker).context(CodecSnafu)?);
                Ok(FavoriteOutcome::Added)
            }
        })
        .await?;

        debug!(viewer = %viewer, cinema = %cinema, ?outcome, "favorite toggled");
        Ok(outcome)
    }

    /// Whether `viewer` currently bookmarks the cinema.
    pub fn is_favorite(&self, viewer: &ViewerId, cinema: &CinemaId) -> bool {
        self.db.read().contains::<tables::Favorites>(&favorite_key(viewer, cinema))
    }

    fn acquire_in_flight(&self, review: &ReviewKey, key: Vec<u8>) -> Result<InFlightGuard> {
        let mut set = self.in_flight.lock();
        if !set.insert(key.clone()) {
            return Err(EngineError::LikeInFlight { review: review.to_string() });
        }
        Ok(InFlightGuard { set: Arc::clone(&self.in_flight), key })
    }
}

/// Releases the in-flight slot when the toggle finishes, however it ends.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<Vec<u8>>>>,
    key: Vec<u8>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.lock().remove(&self.key);
    }
}
