//! dbscale-state — persistent per-instance scaling state.
//!
//! Backed by [redb](https://docs.rs/redb). Each storage account
//! (`state_project_id`) gets its own database, opened once and shared
//! through a [`DatabasePool`]. Records are JSON documents whose fields are
//! converted through the column table in [`schema`].
//!
//! # Architecture
//!
//! ```text
//! StateStore (trait)
//!   └── RedbStateStore
//!         └── DatabasePool ── state_project_id → Arc<Database>
//!               ├── scaling_state   projects/{project}/instances/{instance}
//!               └── legacy_state    {instance}   (migrated on first read)
//! ```
//!
//! The pool is `Clone` + `Send` + `Sync` and can be shared across async
//! tasks. There is no locking around read-modify-write of a record; two
//! concurrent writers for the same key race and the last one wins.

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| $crate::error::StateError::$variant(e.to_string())
    };
}

pub mod error;
pub mod pool;
pub mod schema;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use pool::DatabasePool;
pub use store::{RedbStateStore, SharedStateStore, StateStore};
pub use types::*;
