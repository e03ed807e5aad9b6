//! Aggregate-consistency tests: the summary document must always equal the
//! exact count/sum over live reviews, after any operation sequence, without
//! ever being rebuilt from a scan.

// Test code is allowed to use unwrap for simplicity
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;

use marquee_engine::{RankOrder, ReviewStore};
use marquee_store::Database;
use marquee_types::{AuthorId, CinemaId, ReviewKey, ScoreCard, ScreenTag, StatsKey};
use proptest::prelude::*;

const TOLERANCE: f64 = 1e-9;

fn screen() -> StatsKey {
    StatsKey::new(CinemaId::new("tokyo-109"), ScreenTag::new("imax"))
}

fn review_key(author: &str) -> ReviewKey {
    ReviewKey::new(CinemaId::new("tokyo-109"), ScreenTag::new("imax"), AuthorId::new(author))
}

async fn upsert(store: &ReviewStore, author: &str, s: f64) {
    store
        .upsert_review(
            CinemaId::new("tokyo-109"),
            ScreenTag::new("imax"),
            AuthorId::new(author),
            ScoreCard::new(s, s, s, s),
            "",
        )
        .await
        .expect("upsert should succeed");
}

fn assert_stats(store: &ReviewStore, count: u64, sum: f64, avg: f64) {
    let stats = store.stats(&screen()).expect("should read").expect("stats should exist");
    assert_eq!(stats.count, count);
    assert!((stats.sum_overall - sum).abs() < TOLERANCE, "sum {} != {sum}", stats.sum_overall);
    assert!((stats.avg_overall - avg).abs() < TOLERANCE, "avg {} != {avg}", stats.avg_overall);
}

/// The full lifecycle from the design discussion: create, second author,
/// edit, delete, with stats tracking each step exactly.
#[tokio::test]
async fn aggregate_lifecycle() {
    let store = ReviewStore::new(Database::open_in_memory());

    assert!(store.stats(&screen()).expect("should read").is_none());

    upsert(&store, "alice", 5.0).await;
    assert_stats(&store, 1, 5.0, 5.0);

    upsert(&store, "bob", 0.0).await;
    assert_stats(&store, 2, 5.0, 2.5);

    upsert(&store, "alice", 4.0).await;
    assert_stats(&store, 2, 4.0, 2.0);

    store.delete_review(&review_key("bob")).await.expect("delete should succeed");
    assert_stats(&store, 1, 4.0, 4.0);
}

/// Re-upserting an identical review is an update, never a second row.
#[tokio::test]
async fn idempotent_identity() {
    let store = ReviewStore::new(Database::open_in_memory());

    upsert(&store, "alice", 3.5).await;
    upsert(&store, "alice", 3.5).await;

    assert_stats(&store, 1, 3.5, 3.5);
    let reviews = store.list_reviews(&screen(), RankOrder::Recency).expect("should list");
    assert_eq!(reviews.len(), 1);
}

/// Deleting twice, or deleting what never existed, never drives the count
/// negative.
#[tokio::test]
async fn no_negative_count() {
    let store = ReviewStore::new(Database::open_in_memory());

    upsert(&store, "alice", 2.0).await;
    let key = review_key("alice");
    store.delete_review(&key).await.expect("first delete should succeed");
    store.delete_review(&key).await.expect("second delete should be a no-op");
    store.delete_review(&review_key("ghost")).await.expect("absent delete should be a no-op");

    assert_stats(&store, 0, 0.0, 0.0);
}

/// Aggregates for different tags are fully independent.
#[tokio::test]
async fn aggregates_are_per_tag() {
    let store = ReviewStore::new(Database::open_in_memory());
    let cinema = CinemaId::new("tokyo-109");

    store
        .upsert_review(
            cinema.clone(),
            ScreenTag::new("imax"),
            AuthorId::new("alice"),
            ScoreCard::new(5.0, 5.0, 5.0, 5.0),
            "",
        )
        .await
        .expect("should upsert");
    store
        .upsert_review(
            cinema.clone(),
            ScreenTag::new("dolby"),
            AuthorId::new("alice"),
            ScoreCard::new(1.0, 1.0, 1.0, 1.0),
            "",
        )
        .await
        .expect("should upsert");

    let imax = store
        .stats(&StatsKey::new(cinema.clone(), ScreenTag::new("imax")))
        .expect("should read")
        .expect("should exist");
    let dolby = store
        .stats(&StatsKey::new(cinema, ScreenTag::new("dolby")))
        .expect("should read")
        .expect("should exist");
    assert!((imax.avg_overall - 5.0).abs() < TOLERANCE);
    assert!((dolby.avg_overall - 1.0).abs() < TOLERANCE);
}

/// One step of a randomized operation sequence.
#[derive(Debug, Clone)]
enum Op {
    /// Upsert by author index, with four half-step sub-scores.
    Upsert(usize, [u8; 4]),
    /// Delete by author index (may be absent, which is a no-op).
    Delete(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let author = 0..6usize;
    let half_step = 0..=10u8;
    prop_oneof![
        3 => (
            author.clone(),
            (half_step.clone(), half_step.clone(), half_step.clone(), half_step),
        )
            .prop_map(|(a, (s0, s1, s2, s3))| Op::Upsert(a, [s0, s1, s2, s3])),
        1 => author.prop_map(Op::Delete),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// After every operation, the stored aggregate equals a naive model
    /// recomputed from the live review set.
    #[test]
    fn aggregate_matches_naive_model(ops in proptest::collection::vec(op_strategy(), 1..40)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("should build runtime");
        rt.block_on(async move {
            let store = ReviewStore::new(Database::open_in_memory());
            let mut model: HashMap<usize, f64> = HashMap::new();

            for op in ops {
                match op {
                    Op::Upsert(author, steps) => {
                        let scores = ScoreCard::new(
                            f64::from(steps[0]) * 0.5,
                            f64::from(steps[1]) * 0.5,
                            f64::from(steps[2]) * 0.5,
                            f64::from(steps[3]) * 0.5,
                        );
                        let overall = scores.overall();
                        upsert_scores(&store, author, scores).await;
                        model.insert(author, overall);
                    }
                    Op::Delete(author) => {
                        store
                            .delete_review(&review_key(&format!("author-{author}")))
                            .await
                            .expect("delete should succeed");
                        model.remove(&author);
                    }
                }

                let expected_count = model.len() as u64;
                let expected_sum: f64 = model.values().sum();
                match store.stats(&screen()).expect("should read") {
                    Some(stats) => {
                        prop_assert_eq!(stats.count, expected_count);
                        prop_assert!((stats.sum_overall - expected_sum).abs() < TOLERANCE);
                        let expected_avg = if expected_count == 0 {
                            0.0
                        } else {
                            expected_sum / expected_count as f64
                        };
                        prop_assert!((stats.avg_overall - expected_avg).abs() < TOLERANCE);
                    }
                    None => prop_assert_eq!(expected_count, 0),
                }
            }
            Ok(())
        })?;
    }
}

async fn upsert_scores(store: &ReviewStore, author: usize, scores: ScoreCard) {
    store
        .upsert_review(
            CinemaId::new("tokyo-109"),
            ScreenTag::new("imax"),
            AuthorId::new(format!("author-{author}")),
            scores,
            "",
        )
        .await
        .expect("upsert should succeed");
}
