//! Version-checked row writes. The only code path that mutates a table.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use tokio::sync::Mutex;

use crate::model::*;

use super::store::{Row, Table, Versioned};
use super::{Engine, EngineError};

impl Engine {
    /// Persist a brand-new row at [`VersionTag::INITIAL`].
    pub(super) async fn insert_row<T: Row>(
        &self,
        table: &Table<T>,
        key: &RowKey,
        row: T,
    ) -> Result<Versioned<T>, EngineError> {
        let _gate = self.write_gate.read().await;

        let created = Versioned {
            version: VersionTag::INITIAL,
            row,
        };
        let cell = Arc::new(Mutex::new(created.clone()));
        // Held until the WAL accepts the record so readers never observe an unlogged row.
        let guard = cell
            .clone()
            .try_lock_owned()
            .map_err(|_| EngineError::WalError("fresh row lock contended".into()))?;
        match table.rows.entry(key.clone()) {
            Entry::Occupied(_) => return Err(EngineError::AlreadyExists(key.clone())),
            Entry::Vacant(v) => {
                v.insert(cell);
            }
        }

        let event = T::into_event(key.clone(), created.version, created.row.clone());
        if let Err(e) = self.wal_append(&event).await {
            table.rows.remove(key);
            return Err(e);
        }
        drop(guard);
        self.notify.send(&event);
        Ok(created)
    }

    /// Replace a row iff its stored tag still equals `expected`.
    ///
    /// A moved tag is reported as [`EngineError::PreconditionFailed`]; callers
    /// translate it into a business conflict, never a retryable fault.
    pub(super) async fn compare_and_swap<T: Row>(
        &self,
        table: &Table<T>,
        key: &RowKey,
        expected: VersionTag,
        next: T,
    ) -> Result<Versioned<T>, EngineError> {
        let _gate = self.write_gate.read().await;

        let shared = table
            .get(key)
            .ok_or_else(|| EngineError::NotFound(format!("{}/{}", key.partition, key.row)))?;
        let mut guard = shared.lock().await;
        if !table.is_live(key, &shared) {
            return Err(EngineError::NotFound(format!("{}/{}", key.partition, key.row)));
        }
        if guard.version != expected {
            metrics::counter!(crate::observability::PRECONDITION_FAILURES_TOTAL, "table" => T::TABLE)
                .increment(1);
            return Err(EngineError::PreconditionFailed {
                key: key.clone(),
                expected,
                actual: guard.version,
            });
        }

        let version = expected.next();
        let event = T::into_event(key.clone(), version, next.clone());
        self.wal_append(&event).await?;
        *guard = Versioned { version, row: next };
        let written = guard.clone();
        drop(guard);
        self.notify.send(&event);
        Ok(written)
    }
}
