//! Domain types for the scaling-state store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

// ── Key ───────────────────────────────────────────────────────────

/// Identifies one scaling-state record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateKey {
    /// Storage account holding the record.
    pub state_project_id: String,
    pub project_id: String,
    pub instance_id: String,
}

impl StateKey {
    pub fn new(state_project_id: &str, project_id: &str, instance_id: &str) -> Self {
        Self {
            state_project_id: state_project_id.to_string(),
            project_id: project_id.to_string(),
            instance_id: instance_id.to_string(),
        }
    }

    /// Key in the `scaling_state` table.
    pub fn table_key(&self) -> String {
        format!("projects/{}/instances/{}", self.project_id, self.instance_id)
    }

    /// Key under which the record lived before the path change.
    pub fn legacy_table_key(&self) -> &str {
        &self.instance_id
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.state_project_id, self.table_key())
    }
}

// ── State ─────────────────────────────────────────────────────────

/// Persistent scaling state for one instance.
///
/// `scaling_operation_id` is set exactly while a resize operation is
/// believed to be in flight. The method and size fields describe that
/// operation and are cleared together with it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScalingState {
    /// When the last scaling operation was started (ms since epoch, 0 = never).
    pub last_scaling_timestamp: u64,
    /// When the last scaling operation completed (ms since epoch, 0 = not yet).
    pub last_scaling_complete_timestamp: u64,
    pub scaling_operation_id: Option<String>,
    pub scaling_method: Option<String>,
    pub scaling_previous_size: Option<u32>,
    pub scaling_requested_size: Option<u32>,
    pub created_on: u64,
    pub updated_on: u64,
}

impl ScalingState {
    /// Fresh record for an instance that has never been scaled.
    pub fn new(now: u64) -> Self {
        Self {
            created_on: now,
            updated_on: now,
            ..Default::default()
        }
    }

    /// Whether a scaling operation is recorded as in flight.
    pub fn has_operation(&self) -> bool {
        self.scaling_operation_id.is_some()
    }

    /// Forget the tracked operation and its parameters.
    pub fn clear_operation(&mut self) {
        self.scaling_operation_id = None;
        self.scaling_method = None;
        self.scaling_previous_size = None;
        self.scaling_requested_size = None;
    }

    /// Timestamp cooldowns are measured from: completion if known, else start.
    pub fn cooldown_reference(&self) -> u64 {
        if self.last_scaling_complete_timestamp != 0 {
            self.last_scaling_complete_timestamp
        } else {
            self.last_scaling_timestamp
        }
    }

    /// Whether the recorded operation reduced the instance size.
    pub fn previous_was_scale_in(&self) -> bool {
        matches!(
            (self.scaling_previous_size, self.scaling_requested_size),
            (Some(prev), Some(req)) if prev > req
        )
    }
}

/// Current time in milliseconds since the Unix epoch.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
