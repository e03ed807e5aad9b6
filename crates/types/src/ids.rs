//! Identifier newtypes for the review data model.
//!
//! External identities (sign-in uid, cinema document id, screen tag) arrive as
//! opaque strings. Each gets a newtype wrapper so a cinema id can never be
//! passed where an author id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around `String` for type-safe identifiers.
///
/// Each generated type provides:
/// - Standard derives: Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord
/// - Serde with `#[serde(transparent)]` for wire format compatibility
/// - `From<&str>` / `From<String>` conversions
/// - `Display` with a semantic prefix (e.g., `cinema:tokyo-109`)
/// - `new()` constructor and `as_str()` accessor
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident, $prefix:expr
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord,
            Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from a raw value.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the raw string value.
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns the identifier's UTF-8 bytes, used in key encodings.
            #[inline]
            pub fn as_bytes(&self) -> &[u8] {
                self.0.as_bytes()
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}:{}", $prefix, self.0)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a cinema (the reviewed venue).
    ///
    /// # Display
    ///
    /// Formats with `cinema:` prefix: `cinema:tokyo-109`.
    CinemaId, "cinema"
);

define_id!(
    /// Stable identity of a review's author. One author holds at most one
    /// review per (cinema, tag) pair.
    AuthorId, "author"
);

define_id!(
    /// Identity of a viewer interacting with reviews (liking, bookmarking).
    /// Any authenticated identity; distinct from authorship.
    ViewerId, "viewer"
);

define_id!(
    /// Screen category a review is scoped to (e.g. `imax`, `dolby`, `fourdx`).
    /// Each tag carries its own independent aggregate.
    ScreenTag, "tag"
);
