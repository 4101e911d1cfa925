//! redb table definitions for the scaling-state store.
//!
//! Both tables use `&str` keys and `&[u8]` values (JSON documents).

use redb::TableDefinition;

/// A table of JSON documents keyed by string.
pub type DocumentTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Scaling state keyed by `projects/{project_id}/instances/{instance_id}`.
pub const SCALING_STATE: DocumentTable = TableDefinition::new("scaling_state");

/// Pre-migration scaling state keyed by `{instance_id}` alone.
pub const LEGACY_STATE: DocumentTable = TableDefinition::new("legacy_state");
