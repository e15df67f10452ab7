use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::model::*;

use super::keys::KeyScheme;
use super::query::{Predicate, TableQuery};

/// A row together with the tag it was last written at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub version: VersionTag,
    pub row: T,
}

pub type SharedRow<T> = Arc<Mutex<Versioned<T>>>;

/// A row snapshot plus where it was found.
#[derive(Debug, Clone)]
pub struct Located<T> {
    pub scheme: KeyScheme,
    pub key: RowKey,
    pub version: VersionTag,
    pub row: T,
}

/// Row types that can be persisted through the WAL.
pub trait Row: Clone + Send + Sync + 'static {
    const TABLE: &'static str;

    fn into_event(key: RowKey, version: VersionTag, row: Self) -> Event;

    fn scheme_of(key: &RowKey) -> Option<KeyScheme>;
}

impl Row for Slot {
    const TABLE: &'static str = "slots";

    fn into_event(key: RowKey, version: VersionTag, slot: Self) -> Event {
        Event::SlotWritten { key, version, slot }
    }

    fn scheme_of(key: &RowKey) -> Option<KeyScheme> {
        KeyScheme::of_slot_partition(&key.partition)
    }
}

impl Row for Claim {
    const TABLE: &'static str = "claims";

    fn into_event(key: RowKey, version: VersionTag, claim: Self) -> Event {
        Event::ClaimWritten { key, version, claim }
    }

    fn scheme_of(key: &RowKey) -> Option<KeyScheme> {
        KeyScheme::of_claim_partition(&key.partition)
    }
}

/// In-memory rows of one type. Each row has its own async lock; writers hold
/// it only for the duration of a single compare-and-swap.
pub struct Table<T> {
    pub(super) rows: DashMap<RowKey, SharedRow<T>>,
}

impl<T: Row> Default for Table<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Row> Table<T> {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, key: &RowKey) -> Option<SharedRow<T>> {
        self.rows.get(key).map(|e| e.value().clone())
    }

    /// Snapshot of one row.
    pub async fn read(&self, key: &RowKey) -> Option<Versioned<T>> {
        let shared = self.get(key)?;
        let guard = shared.lock().await;
        if !self.is_live(key, &shared) {
            return None;
        }
        Some(guard.clone())
    }

    /// False once `shared` is no longer the cell stored under `key`, as after
    /// an insert whose WAL append failed.
    pub(super) fn is_live(&self, key: &RowKey, shared: &SharedRow<T>) -> bool {
        self.rows
            .get(key)
            .is_some_and(|e| Arc::ptr_eq(e.value(), shared))
    }

    pub async fn locate(&self, key: &RowKey) -> Option<Located<T>> {
        let scheme = T::scheme_of(key)?;
        let snapshot = self.read(key).await?;
        Some(Located {
            scheme,
            key: key.clone(),
            version: snapshot.version,
            row: snapshot.row,
        })
    }

    /// Snapshot every row matching the query. Handles are collected before any
    /// lock is awaited so no map shard is held across a suspension point.
    pub async fn scan<P: Predicate<T>>(&self, query: &TableQuery<P>) -> Vec<Located<T>> {
        let candidates: Vec<(RowKey, SharedRow<T>)> = self
            .rows
            .iter()
            .filter(|e| query.partition.contains(e.key()))
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        let mut out = Vec::new();
        for (key, shared) in candidates {
            let guard = shared.lock().await;
            if !self.is_live(&key, &shared) {
                continue;
            }
            let snapshot = guard.clone();
            drop(guard);
            if !query.matches(&key, &snapshot.row) {
                continue;
            }
            let Some(scheme) = T::scheme_of(&key) else {
                continue;
            };
            out.push(Located {
                scheme,
                key,
                version: snapshot.version,
                row: snapshot.row,
            });
        }
        out
    }

    /// Replay path: overwrite unconditionally with the logged tag.
    pub(super) fn put_replayed(&self, key: RowKey, version: VersionTag, row: T) {
        self.rows
            .insert(key, Arc::new(Mutex::new(Versioned { version, row })));
    }

    /// All rows, for compaction. Caller must have quiesced writers.
    pub(super) async fn snapshot_all(&self) -> Vec<(RowKey, Versioned<T>)> {
        let handles: Vec<(RowKey, SharedRow<T>)> = self
            .rows
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let mut out = Vec::with_capacity(handles.len());
        for (key, shared) in handles {
            out.push((key, shared.lock().await.clone()));
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}
