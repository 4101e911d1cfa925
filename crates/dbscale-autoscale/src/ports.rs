//! Collaborator seams of the decision engine.
//!
//! The engine never talks to a cloud API directly. Looking up operations,
//! resizing instances and publishing events go through these traits so
//! real, dry-run and test implementations can be swapped freely.

use std::fmt;

use dbscale_core::{BoxFuture, InstanceConfig};
use serde::{Deserialize, Serialize};

use crate::events::DownstreamEvent;

/// Operation type of an instance resize.
pub const UPDATE_OPERATION: &str = "UPDATE";

/// Status of a finished operation.
pub const STATUS_DONE: &str = "DONE";

/// Error attached to a finished operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{code}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Snapshot of a long-running operation as reported by the provider.
///
/// Times are RFC 3339 strings, as returned by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStatus {
    #[serde(default)]
    pub operation_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<OperationError>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

impl OperationStatus {
    /// A resize operation that is still running.
    pub fn running(start_time: &str) -> Self {
        Self {
            operation_type: Some(UPDATE_OPERATION.to_string()),
            status: Some("RUNNING".to_string()),
            start_time: Some(start_time.to_string()),
            ..Default::default()
        }
    }

    /// A resize operation that finished successfully.
    pub fn done(start_time: &str, end_time: &str) -> Self {
        Self {
            operation_type: Some(UPDATE_OPERATION.to_string()),
            status: Some(STATUS_DONE.to_string()),
            start_time: Some(start_time.to_string()),
            end_time: Some(end_time.to_string()),
            ..Default::default()
        }
    }

    pub fn with_error(mut self, error: OperationError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn is_update(&self) -> bool {
        self.operation_type.as_deref() == Some(UPDATE_OPERATION)
    }

    pub fn is_done(&self) -> bool {
        self.status.as_deref() == Some(STATUS_DONE)
    }
}

/// Looks up the status of a previously started operation.
pub trait OperationStatusProvider: Send + Sync {
    /// `Ok(None)` when the provider has no record of the operation.
    fn query<'a>(
        &'a self,
        config: &'a InstanceConfig,
        operation_id: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<Option<OperationStatus>>>;
}

/// Starts an instance resize.
pub trait ScaleExecutor: Send + Sync {
    /// Returns the id of the started operation, if the backend reports one.
    fn execute<'a>(
        &'a self,
        config: &'a InstanceConfig,
        suggested_size: u32,
    ) -> BoxFuture<'a, anyhow::Result<Option<String>>>;
}

/// Delivers scaling events to downstream consumers.
pub trait EventPublisher: Send + Sync {
    fn publish<'a>(&'a self, event: &'a DownstreamEvent) -> BoxFuture<'a, anyhow::Result<()>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_payload() {
        let status: OperationStatus = serde_json::from_str(
            r#"{
                "operationType": "UPDATE",
                "status": "DONE",
                "startTime": "2024-01-01T00:00:00Z",
                "endTime": "2024-01-01T00:01:00Z",
                "error": { "code": "INTERNAL", "message": "boom" }
            }"#,
        )
        .unwrap();

        assert!(status.is_update());
        assert!(status.is_done());
        assert_eq!(status.error.unwrap().to_string(), "INTERNAL: boom");
    }

    #[test]
    fn missing_fields_are_not_update_or_done() {
        let status: OperationStatus = serde_json::from_str("{}").unwrap();
        assert!(!status.is_update());
        assert!(!status.is_done());
    }

    #[test]
    fn running_is_not_done() {
        let status = OperationStatus::running("2024-01-01T00:00:00Z");
        assert!(status.is_update());
        assert!(!status.is_done());
    }
}
