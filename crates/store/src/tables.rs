//! Fixed table definitions for the store.
//!
//! The store has exactly 4 tables, all known at compile time. This enables
//! type-safe access and eliminates dynamic table lookup.

/// Compile-time table identifier. All tables are statically defined; dynamic
/// creation is not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TableId {
    /// Review documents: encoded `ReviewKey` -> serialized `Review`.
    Reviews = 0,

    /// Aggregate summaries: encoded `StatsKey` -> serialized `AggregateStats`.
    /// One singleton row per (cinema, screen-tag).
    Stats = 1,

    /// Like existence records, nested under their review:
    /// encoded `ReviewKey` + liker segment -> serialized `LikeRecord`.
    Likes = 2,

    /// Favorite markers: (viewer, cinema) -> serialized `Favorite`.
    Favorites = 3,
}

impl TableId {
    /// Number of tables in the store.
    pub const COUNT: usize = 4;

    /// Array index for this table.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Human-readable table name for logs and errors.
    pub const fn name(self) -> &'static str {
        match self {
            TableId::Reviews => "reviews",
            TableId::Stats => "stats",
            TableId::Likes => "likes",
            TableId::Favorites => "favorites",
        }
    }
}

/// Marker trait tying a table's compile-time identity to the access API.
///
/// Keys and values are raw bytes at this layer; shaping into strict document
/// types happens once at the read edge, above the store.
pub trait Table {
    /// The table's identifier.
    const ID: TableId;
}

/// Review documents.
pub struct Reviews;
impl Table for Reviews {
    const ID: TableId = TableId::Reviews;
}

/// Aggregate stats singletons.
pub struct Stats;
impl Table for Stats {
    const ID: TableId = TableId::Stats;
}

/// Like existence records.
pub struct Likes;
impl Table for Likes {
    const ID: TableId = TableId::Likes;
}

/// Favorite markers.
pub struct Favorites;
impl Table for Favorites {
    const ID: TableId = TableId::Favorites;
}
