//! StateStore — persistence of per-instance scaling state.
//!
//! [`StateStore`] is the interface the decision engine depends on;
//! [`RedbStateStore`] is the redb-backed implementation. Swapping storage
//! backends means writing another implementation of the trait.

use std::sync::Arc;

use redb::{Database, ReadableDatabase};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::{StateError, StateResult};
use crate::pool::DatabasePool;
use crate::schema::{self, CREATED_ON};
use crate::tables::*;
use crate::types::*;

/// Reads and writes scaling state records.
pub trait StateStore: Send + Sync {
    /// Read the state for `key`, creating a default record if none exists.
    ///
    /// A record still stored under the legacy key is moved to `key` first.
    fn get(&self, key: &StateKey) -> StateResult<ScalingState>;

    /// Write the recognized fields of `state`.
    ///
    /// Sets `updated_on` to now and never changes `created_on`.
    fn update_state(&self, key: &StateKey, state: &ScalingState) -> StateResult<()>;

    /// Release the store. Pooled databases stay open for other stores.
    fn close(&self) -> StateResult<()>;
}

/// redb-backed [`StateStore`] sharing databases through a [`DatabasePool`].
#[derive(Clone)]
pub struct RedbStateStore {
    pool: DatabasePool,
    clock: fn() -> u64,
}

impl RedbStateStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            pool,
            clock: epoch_millis,
        }
    }

    /// Use `clock` (milliseconds since epoch) instead of the system time.
    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Seed a record under the legacy key (for migration tooling and tests).
    pub fn put_legacy(&self, key: &StateKey, state: &ScalingState) -> StateResult<()> {
        let db = self.pool.database(&key.state_project_id)?;
        let doc = schema::to_document(state)?;
        write_document(&db, LEGACY_STATE, key.legacy_table_key(), &doc)
    }

    /// Whether a legacy record still exists for `key`.
    pub fn has_legacy(&self, key: &StateKey) -> StateResult<bool> {
        let db = self.pool.database(&key.state_project_id)?;
        Ok(read_document(&db, LEGACY_STATE, key.legacy_table_key())?.is_some())
    }

    /// Raw stored document for `key`, if any.
    pub fn document(&self, key: &StateKey) -> StateResult<Option<Map<String, Value>>> {
        let db = self.pool.database(&key.state_project_id)?;
        read_document(&db, SCALING_STATE, &key.table_key())
    }

    /// Move a legacy record to the canonical key in a single transaction.
    ///
    /// Returns the migrated document, or `None` if there was nothing to move.
    fn migrate_legacy(&self, db: &Database, key: &StateKey) -> StateResult<Option<Map<String, Value>>> {
        let txn = db.begin_write().map_err(map_err!(Transaction))?;
        let old = {
            let mut legacy = txn.open_table(LEGACY_STATE).map_err(map_err!(Table))?;
            let removed = legacy
                .remove(key.legacy_table_key())
                .map_err(map_err!(Write))?;
            removed.map(|guard| guard.value().to_vec())
        };

        let Some(bytes) = old else {
            txn.abort().map_err(map_err!(Transaction))?;
            return Ok(None);
        };

        let doc: Map<String, Value> = match serde_json::from_slice(&bytes) {
            Ok(doc) => doc,
            Err(e) => {
                txn.abort().map_err(map_err!(Transaction))?;
                return Err(StateError::Deserialize(e.to_string()));
            }
        };

        {
            let mut table = txn.open_table(SCALING_STATE).map_err(map_err!(Table))?;
            table
                .insert(key.table_key().as_str(), bytes.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;

        info!(
            from = key.legacy_table_key(),
            to = %key.table_key(),
            account = %key.state_project_id,
            "migrated scaling state from legacy location"
        );
        Ok(Some(doc))
    }

    fn init(&self, db: &Database, key: &StateKey) -> StateResult<ScalingState> {
        let state = ScalingState::new((self.clock)());
        let doc = schema::to_document(&state)?;
        write_document(db, SCALING_STATE, &key.table_key(), &doc)?;
        debug!(%key, "scaling state initialized");
        Ok(state)
    }
}

impl StateStore for RedbStateStore {
    fn get(&self, key: &StateKey) -> StateResult<ScalingState> {
        let db = self.pool.database(&key.state_project_id)?;

        if let Some(doc) = read_document(&db, SCALING_STATE, &key.table_key())? {
            return schema::from_document(&doc);
        }

        match self.migrate_legacy(&db, key) {
            Ok(Some(doc)) => return schema::from_document(&doc),
            Ok(None) => {}
            Err(e) => warn!(%key, error = %e, "failed to migrate legacy scaling state"),
        }

        self.init(&db, key)
    }

    fn update_state(&self, key: &StateKey, state: &ScalingState) -> StateResult<()> {
        let db = self.pool.database(&key.state_project_id)?;
        let table_key = key.table_key();

        let mut stored = read_document(&db, SCALING_STATE, &table_key)?
            .ok_or_else(|| StateError::NotFound(key.to_string()))?;

        let mut state = state.clone();
        state.updated_on = (self.clock)();
        let mut doc = schema::to_document(&state)?;
        doc.remove(CREATED_ON);

        stored.extend(doc);
        write_document(&db, SCALING_STATE, &table_key, &stored)?;
        debug!(%key, updated_on = state.updated_on, "scaling state updated");
        Ok(())
    }

    fn close(&self) -> StateResult<()> {
        debug!(databases = self.pool.len(), "state store closed");
        Ok(())
    }
}

fn read_document(
    db: &Database,
    table: DocumentTable,
    key: &str,
) -> StateResult<Option<Map<String, Value>>> {
    let txn = db.begin_read().map_err(map_err!(Transaction))?;
    let table = txn.open_table(table).map_err(map_err!(Table))?;
    match table.get(key).map_err(map_err!(Read))? {
        Some(guard) => {
            let doc: Map<String, Value> =
                serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
            Ok(Some(doc))
        }
        None => Ok(None),
    }
}

fn write_document(
    db: &Database,
    table: DocumentTable,
    key: &str,
    doc: &Map<String, Value>,
) -> StateResult<()> {
    let value = serde_json::to_vec(doc).map_err(map_err!(Serialize))?;
    let txn = db.begin_write().map_err(map_err!(Transaction))?;
    {
        let mut table = txn.open_table(table).map_err(map_err!(Table))?;
        table
            .insert(key, value.as_slice())
            .map_err(map_err!(Write))?;
    }
    txn.commit().map_err(map_err!(Transaction))?;
    Ok(())
}

/// Shared handle usable wherever a `StateStore` trait object is expected.
pub type SharedStateStore = Arc<dyn StateStore>;
