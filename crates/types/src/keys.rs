//! Composite storage keys and their byte encodings.
//!
//! Keys are built from length-prefixed segments so that:
//! - `(cinema, tag)` forms a contiguous prefix: one screen's reviews, and the
//!   like records nested under them, are all range-scannable by that prefix.
//! - No encoded key is ambiguous: a segment boundary can never be confused
//!   with id content, whatever bytes the external ids contain.
//!
//! Segment format: {len:u16 BE}{utf8 bytes}.

use serde::{Deserialize, Serialize};

use crate::ids::{AuthorId, CinemaId, ScreenTag, ViewerId};

/// Identity of a single review: `(cinema, tag, author)`.
///
/// This triple is the primary key; "does this author already have a review"
/// is a point lookup on it, never a filtered scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReviewKey {
    /// The reviewed venue.
    pub cinema: CinemaId,
    /// The screen category.
    pub tag: ScreenTag,
    /// The review's author.
    pub author: AuthorId,
}

impl ReviewKey {
    /// Creates a review key from its parts.
    pub fn new(cinema: CinemaId, tag: ScreenTag, author: AuthorId) -> Self {
        Self { cinema, tag, author }
    }

    /// The aggregate this review contributes to.
    pub fn stats_key(&self) -> StatsKey {
        StatsKey { cinema: self.cinema.clone(), tag: self.tag.clone() }
    }

    /// Encodes the key as bytes: stats prefix followed by the author segment.
    pub fn encode(&self) -> Vec<u8> {
        let mut key = self.stats_key().encode();
        push_segment(&mut key, self.author.as_bytes());
        key
    }
}

impl std::fmt::Display for ReviewKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.cinema, self.tag, self.author)
    }
}

/// Identity of one screen's aggregate: `(cinema, tag)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatsKey {
    /// The reviewed venue.
    pub cinema: CinemaId,
    /// The screen category.
    pub tag: ScreenTag,
}

impl StatsKey {
    /// Creates a stats key from its parts.
    pub fn new(cinema: CinemaId, tag: ScreenTag) -> Self {
        Self { cinema, tag }
    }

    /// Encodes the key as bytes. Also the scan prefix for the screen's
    /// reviews and their nested like records.
    pub fn encode(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(4 + self.cinema.as_str().len() + self.tag.as_str().len());
        push_segment(&mut key, self.cinema.as_bytes());
        push_segment(&mut key, self.tag.as_bytes());
        key
    }
}

impl std::fmt::Display for StatsKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.cinema, self.tag)
    }
}

/// Encodes a like-record key: the review key extended with the liker segment.
///
/// Like records sort directly after their review under the same stats prefix.
pub fn like_key(review: &ReviewKey, liker: &ViewerId) -> Vec<u8> {
    let mut key = review.encode();
    push_segment(&mut key, liker.as_bytes());
    key
}

/// Encodes a favorite-marker key: `(viewer, cinema)`.
pub fn favorite_key(viewer: &ViewerId, cinema: &CinemaId) -> Vec<u8> {
    let mut key = Vec::with_capacity(4 + viewer.as_str().len() + cinema.as_str().len());
    push_segment(&mut key, viewer.as_bytes());
    push_segment(&mut key, cinema.as_bytes());
    key
}

fn push_segment(key: &mut Vec<u8>, segment: &[u8]) {
    // Every mutation validates its ids well below u16::MAX bytes before a
    // key is built, so no stored key ever carries a truncated length.
    key.extend_from_slice(&(segment.len() as u16).to_be_bytes());
    key.extend_from_slice(segment);
}
