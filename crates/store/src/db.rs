//! Database, transactions, and change notification.
//!
//! The store keeps one ordered map per table. Every live document carries the
//! version (commit sequence) of the commit that last wrote it; deletes leave
//! a tombstone carrying the deleting commit's version, so "absent" states are
//! versioned too and create/delete races cannot slip past validation.
//!
//! ## Commit protocol
//!
//! A [`Transaction`] records the version of every document it reads and
//! stages its writes locally. `commit` takes the write lock, re-checks every
//! recorded version against the current state, and either applies the whole
//! write-set (stamping each document with the new commit sequence) or fails
//! with [`Error::Conflict`] without touching anything. Conflicted callers
//! re-run the whole read-then-write unit against fresh state.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::tables::{Table, TableId};

/// Capacity of the change broadcast channel. A subscriber that falls further
/// behind than this sees a lag error and must re-query.
const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Version 0 is reserved for "never existed".
const VERSION_ABSENT: u64 = 0;

/// One document slot: the last writing commit's sequence plus the bytes,
/// or `None` for a tombstone left by a delete.
#[derive(Debug, Clone)]
struct Slot {
    version: u64,
    value: Option<Vec<u8>>,
}

/// Shared mutable state behind the database handle.
#[derive(Debug, Default)]
struct Shared {
    tables: [BTreeMap<Vec<u8>, Slot>; TableId::COUNT],
    commit_seq: u64,
}

impl Shared {
    fn slot(&self, table: TableId, key: &[u8]) -> Option<&Slot> {
        self.tables[table.index()].get(key)
    }

    fn version_of(&self, table: TableId, key: &[u8]) -> u64 {
        self.slot(table, key).map_or(VERSION_ABSENT, |s| s.version)
    }
}

/// Notification of one committed transaction: which documents it touched.
///
/// Subscribers filter by table and key prefix to decide whether the commit
/// is relevant to them.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// Sequence of the commit that produced this event.
    pub commit_seq: u64,
    /// Every (table, key) the commit wrote or deleted.
    pub touched: Arc<[(TableId, Vec<u8>)]>,
}

impl ChangeEvent {
    /// Whether this commit touched any key under `prefix` in `table`.
    pub fn touches_prefix(&self, table: TableId, prefix: &[u8]) -> bool {
        self.touched.iter().any(|(t, key)| *t == table && key.starts_with(prefix))
    }
}

/// Handle to an in-memory transactional document store.
///
/// Cheap to clone; all clones share the same state and change channel.
#[derive(Debug)]
pub struct Database {
    shared: Arc<RwLock<Shared>>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared), changes: self.changes.clone() }
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::open_in_memory()
    }
}

impl Database {
    /// Creates an empty in-memory database.
    pub fn open_in_memory() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { shared: Arc::new(RwLock::new(Shared::default())), changes }
    }

    /// Begins a snapshot read. The returned transaction sees one consistent
    /// state for its whole lifetime; hold it only for the duration of the
    /// reads.
    pub fn read(&self) -> ReadTransaction<'_> {
        ReadTransaction { guard: self.shared.read() }
    }

    /// Begins an optimistic transaction.
    pub fn begin(&self) -> Transaction<'_> {
        Transaction { db: self, reads: BTreeMap::new(), writes: BTreeMap::new() }
    }

    /// Subscribes to commit notifications.
    ///
    /// Dropping the receiver releases the subscription; there is nothing else
    /// to tear down at this layer.
    pub fn watch(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}

/// Snapshot read transaction.
///
/// Holds a read lock on the store; a consistent state is visible across all
/// reads made through one instance.
pub struct ReadTransaction<'db> {
    guard: parking_lot::RwLockReadGuard<'db, Shared>,
}

impl ReadTransaction<'_> {
    /// Returns a document's bytes, or None if absent.
    pub fn get<T: Table>(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.guard.slot(T::ID, key).and_then(|s| s.value.clone())
    }

    /// Whether a document exists.
    pub fn contains<T: Table>(&self, key: &[u8]) -> bool {
        self.guard.slot(T::ID, key).is_some_and(|s| s.value.is_some())
    }

    /// Returns all live documents whose key starts with `prefix`, in key
    /// order.
    pub fn scan_prefix<T: Table>(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let table = &self.guard.tables[T::ID.index()];
        let start = Bound::Included(prefix.to_vec());
        let end = match prefix_end(prefix) {
            Some(upper) => Bound::Excluded(upper),
            None => Bound::Unbounded,
        };
        table
            .range((start, end))
            .filter_map(|(k, slot)| slot.value.as_ref().map(|v| (k.clone(), v.clone())))
            .collect()
    }
}

/// What a transaction observed when it first read a key.
#[derive(Debug, Clone)]
struct ReadObservation {
    version: u64,
    value: Option<Vec<u8>>,
}

/// An optimistic read-then-write transaction.
///
/// Reads go to the current store state (recording the observed version) or to
/// the transaction's own staged writes; writes stay local until `commit`.
pub struct Transaction<'db> {
    db: &'db Database,
    reads: BTreeMap<(usize, Vec<u8>), ReadObservation>,
    writes: BTreeMap<(usize, Vec<u8>), Option<Vec<u8>>>,
}

impl Transaction<'_> {
    /// Returns a document's bytes, or None if absent.
    ///
    /// Reads the transaction's own staged write if there is one; otherwise
    /// reads the store, recording the observed version for commit-time
    /// validation. Repeated reads of the same key are repeatable.
    pub fn get<T: Table>(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        let map_key = (T::ID.index(), key.to_vec());
        if let Some(staged) = self.writes.get(&map_key) {
            return staged.clone();
        }
        if let Some(observed) = self.reads.get(&map_key) {
            return observed.value.clone();
        }

        let shared = self.db.shared.read();
        let slot = shared.slot(T::ID, key);
        let observation = ReadObservation {
            version: slot.map_or(VERSION_ABSENT, |s| s.version),
            value: slot.and_then(|s| s.value.clone()),
        };
        drop(shared);

        let value = observation.value.clone();
        self.reads.insert(map_key, observation);
        value
    }

    /// Whether a document exists (through the same read-tracking as `get`).
    pub fn contains<T: Table>(&mut self, key: &[u8]) -> bool {
        self.get::<T>(key).is_some()
    }

    /// Stages a write of `value` under `key`.
    pub fn insert<T: Table>(&mut self, key: &[u8], value: Vec<u8>) {
        self.writes.insert((T::ID.index(), key.to_vec()), Some(value));
    }

    /// Stages a delete of `key`.
    pub fn delete<T: Table>(&mut self, key: &[u8]) {
        self.writes.insert((T::ID.index(), key.to_vec()), None);
    }

    /// Validates the read-set and applies the write-set atomically.
    ///
    /// Returns the new commit sequence, or [`Error::Conflict`] if any
    /// document read by this transaction was written by another commit in
    /// the meantime. On conflict nothing is applied.
    ///
    /// # Errors
    ///
    /// Returns `Error::Conflict` on read-set validation failure; the caller
    /// should re-run the whole read-then-write unit.
    pub fn commit(self) -> Result<u64> {
        let mut shared = self.db.shared.write();

        for ((table_index, key), observed) in &self.reads {
            let table = table_from_index(*table_index);
            let current = shared.version_of(table, key);
            if current != observed.version {
                debug!(
                    table = table.name(),
                    observed = observed.version,
                    current,
                    "commit aborted: read-set validation failed"
                );
                return Err(Error::Conflict { table: table.name() });
            }
        }

        if self.writes.is_empty() {
            return Ok(shared.commit_seq);
        }

        shared.commit_seq += 1;
        let seq = shared.commit_seq;

        let mut touched = Vec::with_capacity(self.writes.len());
        for ((table_index, key), staged) in self.writes {
            let table = table_from_index(table_index);
            shared.tables[table_index]
                .insert(key.clone(), Slot { version: seq, value: staged });
            touched.push((table, key));
        }
        drop(shared);

        trace!(commit_seq = seq, documents = touched.len(), "transaction committed");
        // Nobody watching is fine.
        let _ = self.db.changes.send(ChangeEvent { commit_seq: seq, touched: touched.into() });
        Ok(seq)
    }
}

fn table_from_index(index: usize) -> TableId {
    match index {
        0 => TableId::Reviews,
        1 => TableId::Stats,
        2 => TableId::Likes,
        3 => TableId::Favorites,
        _ => unreachable!("table index out of range"),
    }
}

/// Smallest key strictly greater than every key starting with `prefix`,
/// or None when the prefix is all `0xFF` (scan to the end).
fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.last_mut() {
        if *last == u8::MAX {
            end.pop();
        } else {
            *last += 1;
            return Some(end);
        }
    }
    None
}
