//! DatabasePool — one redb database per storage account.
//!
//! Databases are opened on first use and kept for the lifetime of the
//! pool, so the number of open databases is bounded by the number of
//! distinct `state_project_id`s rather than by request volume.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use redb::Database;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;

#[derive(Debug, Clone)]
enum Backend {
    /// `<dir>/<account>.redb` per storage account.
    Disk(PathBuf),
    /// Ephemeral databases (for testing).
    InMemory,
}

/// Shared map of storage account → open database.
#[derive(Clone)]
pub struct DatabasePool {
    backend: Backend,
    databases: Arc<Mutex<HashMap<String, Arc<Database>>>>,
}

impl DatabasePool {
    /// Pool whose databases live as files under `dir`.
    pub fn on_disk(dir: impl Into<PathBuf>) -> Self {
        Self::with_backend(Backend::Disk(dir.into()))
    }

    /// Pool of ephemeral in-memory databases (for testing).
    pub fn in_memory() -> Self {
        Self::with_backend(Backend::InMemory)
    }

    fn with_backend(backend: Backend) -> Self {
        Self {
            backend,
            databases: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Get the database for `account`, opening it on first use.
    pub fn database(&self, account: &str) -> StateResult<Arc<Database>> {
        let mut databases = self
            .databases
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(db) = databases.get(account) {
            return Ok(db.clone());
        }

        let db = Arc::new(self.open(account)?);
        databases.insert(account.to_string(), db.clone());
        Ok(db)
    }

    /// Number of databases opened so far.
    pub fn len(&self) -> usize {
        self.databases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn open(&self, account: &str) -> StateResult<Database> {
        validate_account(account)?;
        let db = match &self.backend {
            Backend::Disk(dir) => {
                std::fs::create_dir_all(dir).map_err(map_err!(Open))?;
                let path = dir.join(format!("{account}.redb"));
                let db = Database::create(&path).map_err(map_err!(Open))?;
                debug!(?path, %account, "state database opened");
                db
            }
            Backend::InMemory => {
                let backend = redb::backends::InMemoryBackend::new();
                let db = Database::builder()
                    .create_with_backend(backend)
                    .map_err(map_err!(Open))?;
                debug!(%account, "in-memory state database opened");
                db
            }
        };
        ensure_tables(&db)?;
        Ok(db)
    }
}

/// Create all tables if they don't exist yet.
fn ensure_tables(db: &Database) -> StateResult<()> {
    let txn = db.begin_write().map_err(map_err!(Transaction))?;
    // Opening a table in a write transaction creates it if absent.
    txn.open_table(SCALING_STATE).map_err(map_err!(Table))?;
    txn.open_table(LEGACY_STATE).map_err(map_err!(Table))?;
    txn.commit().map_err(map_err!(Transaction))?;
    Ok(())
}

/// Account ids become file names, so only plain identifiers are accepted.
fn validate_account(account: &str) -> StateResult<()> {
    let valid = !account.is_empty()
        && account
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
        && !account.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(StateError::Open(format!("invalid storage account id: {account:?}")))
    }
}
