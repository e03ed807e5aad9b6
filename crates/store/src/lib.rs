//! marquee-store: a transactional in-memory document store.
//!
//! The production system persists documents in a hosted document database;
//! this crate implements the same contract as an embedded engine so the
//! consistency core can be exercised against a real transactional substrate:
//!
//! - **Fixed schema**: 4 tables known at compile time
//! - **Snapshot reads**: a read transaction sees one consistent state
//! - **Optimistic transactions**: read-set validation at commit, conflicting
//!   commits fail with a retryable error instead of blocking
//! - **Change notification**: every commit broadcasts the touched documents
//!   so live views can re-query
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                Database API                  │
//! │        (open, read, begin, watch)            │
//! └────────────────┬────────────────────────────┘
//!                  │
//! ┌────────────────▼────────────────────────────┐
//! │             Transaction Layer                │
//! │   (read-set versions, staged write-set,      │
//! │    validate-and-apply under commit lock)     │
//! └────────────────┬────────────────────────────┘
//!                  │
//! ┌────────────────▼────────────────────────────┐
//! │            Versioned Tables                  │
//! │  (BTreeMap per table, tombstoned deletes)    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use marquee_store::{Database, tables};
//!
//! let db = Database::open_in_memory();
//!
//! // Optimistic transaction
//! let mut txn = db.begin();
//! txn.insert::<tables::Reviews>(b"key", b"value".to_vec());
//! txn.commit()?;
//!
//! // Snapshot read
//! let read = db.read();
//! let value = read.get::<tables::Reviews>(b"key");
//! assert_eq!(value.as_deref(), Some(&b"value"[..]));
//! # Ok::<(), marquee_store::Error>(())
//! ```

#![deny(unsafe_code)]

pub mod db;
pub mod error;
pub mod tables;

pub use db::{ChangeEvent, Database, ReadTransaction, Transaction};
pub use error::{Error, Result};
pub use tables::{Table, TableId};
