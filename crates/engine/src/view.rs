//! Live ranked views: watch-driven, whole-snapshot review lists.
//!
//! A view subscribes to the store's change feed and, whenever a commit
//! touches its screen, re-queries and delivers the full ordered review list,
//! replacing the previous delivery. Teardown is explicit and guarantees no
//! further delivery.
//!
//! ## Relaxed liked-state contract
//!
//! After taking the list snapshot, the view resolves which visible reviews
//! the viewing user has liked via per-review point probes, outside any
//! transaction. A like the viewer toggles between the snapshot and the
//! probes can therefore show transiently stale; it self-heals on the next
//! delivery. This window is an accepted part of the design: the
//! transactional invariants cover `like_count` and the aggregate stats, not
//! the viewer's personal liked cache.

use std::collections::HashSet;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use snafu::ResultExt;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use marquee_store::{Database, TableId, tables};
use marquee_types::{AuthorId, Review, ReviewKey, StatsKey, ViewerId, decode, like_key};

use crate::error::{CodecSnafu, EngineError, Result};

/// Capacity of one view's delivery queue. The producer awaits when the
/// consumer falls behind; nothing is dropped.
const DELIVERY_QUEUE: usize = 8;

/// Total ordering applied to a screen's reviews.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankOrder {
    /// Most recently updated first.
    Recency,
    /// Most liked first; ties broken by recency.
    Popularity,
}

impl RankOrder {
    /// Sorts reviews in place. Author id is the final tiebreak so the
    /// ranking is a total order and deliveries are deterministic.
    pub fn sort(&self, reviews: &mut [Review]) {
        match self {
            RankOrder::Recency => reviews.sort_by(|a, b| {
                b.updated_at.cmp(&a.updated_at).then_with(|| a.author.cmp(&b.author))
            }),
            RankOrder::Popularity => reviews.sort_by(|a, b| {
                b.like_count
                    .cmp(&a.like_count)
                    .then_with(|| b.updated_at.cmp(&a.updated_at))
                    .then_with(|| a.author.cmp(&b.author))
            }),
        }
    }
}

/// One delivery: the full current ordered review list for the screen, plus
/// the subset the viewing user has liked.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewSnapshot {
    /// All live reviews for the screen, in the subscribed order.
    pub reviews: Vec<Review>,
    /// Authors of the visible reviews the viewer has liked. Empty when the
    /// view was opened without a viewer. Resolved non-atomically; see the
    /// module docs.
    pub liked_by_viewer: HashSet<AuthorId>,
}

/// A value delivered by a live view.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewUpdate {
    /// A fresh snapshot replacing everything delivered before it.
    Snapshot(ReviewSnapshot),
    /// Terminal failure: the underlying watch broke. The previously
    /// delivered list must be treated as cleared, not shown as stale data.
    /// No further updates follow.
    Failed {
        /// Human-readable cause, suitable for direct display.
        message: String,
    },
}

/// A continuously updated, ordered view of one screen's reviews.
///
/// Implements [`Stream`]; dropping the view (or calling [`cancel`]) stops
/// delivery and releases the underlying watch.
///
/// [`cancel`]: LiveRankedView::cancel
#[derive(Debug)]
pub struct LiveRankedView {
    receiver: mpsc::Receiver<ViewUpdate>,
    cancel: CancellationToken,
}

impl LiveRankedView {
    /// Opens a live view of `key`'s reviews in the given order.
    ///
    /// Delivers an initial snapshot immediately, then a replacement snapshot
    /// after every commit touching the screen's reviews, likes, or stats.
    /// When `viewer` is set, each snapshot carries that viewer's liked
    /// subset.
    pub fn subscribe(
        db: Database,
        key: StatsKey,
        order: RankOrder,
        viewer: Option<ViewerId>,
    ) -> Self {
        let (tx, receiver) = mpsc::channel(DELIVERY_QUEUE);
        let cancel = CancellationToken::new();
        let worker_cancel = cancel.clone();

        tokio::spawn(async move {
            deliver_updates(db, key, order, viewer, tx, worker_cancel).await;
        });

        Self { receiver, cancel }
    }

    /// Receives the next update; None after cancellation drained the queue.
    pub async fn recv(&mut self) -> Option<ViewUpdate> {
        self.receiver.recv().await
    }

    /// Tears the view down: no further deliveries, watch released.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for LiveRankedView {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Stream for LiveRankedView {
    type Item = ViewUpdate;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Worker loop: initial snapshot, then re-query on every relevant commit.
async fn deliver_updates(
    db: Database,
    key: StatsKey,
    order: RankOrder,
    viewer: Option<ViewerId>,
    tx: mpsc::Sender<ViewUpdate>,
    cancel: CancellationToken,
) {
    // Subscribe before the initial query so no commit can fall between them.
    let mut watch = db.watch();
    let prefix = key.encode();

    match snapshot(&db, &prefix, order, viewer.as_ref()) {
        Ok(snap) => {
            if tx.send(ViewUpdate::Snapshot(snap)).await.is_err() {
                return;
            }
        }
        Err(e) => {
            let _ = tx.send(failed(&e)).await;
            return;
        }
    }

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(key = %key, "live view cancelled");
                return;
            }
            event = watch.recv() => event,
        };

        match event {
            Ok(event) => {
                let relevant = event.touches_prefix(TableId::Reviews, &prefix)
                    || event.touches_prefix(TableId::Likes, &prefix)
                    || event.touches_prefix(TableId::Stats, &prefix);
                if !relevant {
                    continue;
                }
                match snapshot(&db, &prefix, order, viewer.as_ref()) {
                    Ok(snap) => {
                        if tx.send(ViewUpdate::Snapshot(snap)).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(failed(&e)).await;
                        return;
                    }
                }
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(key = %key, missed, "live view fell behind the change feed");
                let err = EngineError::Subscription {
                    message: format!("change feed lagged by {missed} events"),
                };
                let _ = tx.send(failed(&err)).await;
                return;
            }
            Err(broadcast::error::RecvError::Closed) => {
                let err =
                    EngineError::Subscription { message: "change feed closed".to_owned() };
                let _ = tx.send(failed(&err)).await;
                return;
            }
        }
    }
}

/// Queries the current ordered list, then probes the viewer's likes.
fn snapshot(
    db: &Database,
    prefix: &[u8],
    order: RankOrder,
    viewer: Option<&ViewerId>,
) -> Result<ReviewSnapshot> {
    // One consistent snapshot for the list itself.
    let rows = db.read().scan_prefix::<tables::Reviews>(prefix);
    let mut reviews = rows
        .into_iter()
        .map(|(_, bytes)| decode(&bytes).context(CodecSnafu))
        .collect::<Result<Vec<Review>>>()?;
    order.sort(&mut reviews);

    // Independent per-review probes, after and outside the snapshot.
    let mut liked_by_viewer = HashSet::new();
    if let Some(viewer) = viewer {
        for review in &reviews {
            let review_key = ReviewKey::new(
                review.cinema.clone(),
                review.tag.clone(),
                review.author.clone(),
            );
            if db.read().contains::<tables::Likes>(&like_key(&review_key, viewer)) {
                liked_by_viewer.insert(review.author.clone());
            }
        }
    }

    Ok(ReviewSnapshot { reviews, liked_by_viewer })
}

fn failed(err: &EngineError) -> ViewUpdate {
    ViewUpdate::Failed { message: err.to_string() }
}
