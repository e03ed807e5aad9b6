//! Core type definitions for Marquee.
//!
//! This crate holds the shared data model for the review aggregate engine:
//!
//! - Identifier newtypes (`CinemaId`, `AuthorId`, `ViewerId`, `ScreenTag`)
//! - Review, aggregate-stats, like-record, and favorite document shapes
//! - Composite storage keys with prefix-ordered byte encodings
//! - Input validation (score granularity, tag whitelist)
//! - Centralized postcard codec

#![deny(unsafe_code)]

mod codec;
mod ids;
mod keys;
mod review;
mod validation;

pub use codec::{CodecError, decode, encode};
pub use ids::{AuthorId, CinemaId, ScreenTag, ViewerId};
pub use keys::{ReviewKey, StatsKey, favorite_key, like_key};
pub use review::{AggregateStats, Favorite, LikeRecord, Review, ScoreCard};
pub use validation::{
    MAX_ID_BYTES, MAX_TAG_BYTES, ValidationError, validate_id, validate_score, validate_scores,
    validate_tag,
};
