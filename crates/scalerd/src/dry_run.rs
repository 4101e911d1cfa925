//! Dry-run collaborators.
//!
//! Nothing is resized. The executor hands out synthetic operation ids and
//! the status provider reports those operations as finished, so the full
//! decision path (state, cooldowns, counters, events) can be exercised
//! locally.

use chrono::{SecondsFormat, Utc};
use dbscale_autoscale::{OperationStatus, OperationStatusProvider, ScaleExecutor};
use dbscale_core::{BoxFuture, InstanceConfig};
use tracing::info;

const OPERATION_PREFIX: &str = "dry-run-";

pub struct DryRunExecutor;

impl ScaleExecutor for DryRunExecutor {
    fn execute<'a>(
        &'a self,
        config: &'a InstanceConfig,
        suggested_size: u32,
    ) -> BoxFuture<'a, anyhow::Result<Option<String>>> {
        Box::pin(async move {
            let operation_id = format!(
                "{OPERATION_PREFIX}{}-{}",
                config.instance_id,
                Utc::now().timestamp_millis()
            );
            info!(
                project_id = %config.project_id,
                instance_id = %config.instance_id,
                operation_id = %operation_id,
                "dry run: would scale to {suggested_size} {}",
                config.units
            );
            Ok(Some(operation_id))
        })
    }
}

/// Reports dry-run operations as completed now; knows nothing else.
pub struct DryRunStatusProvider;

impl OperationStatusProvider for DryRunStatusProvider {
    fn query<'a>(
        &'a self,
        _config: &'a InstanceConfig,
        operation_id: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<Option<OperationStatus>>> {
        Box::pin(async move {
            if !operation_id.starts_with(OPERATION_PREFIX) {
                return Ok(None);
            }
            let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
            Ok(Some(OperationStatus::done(&now, &now)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn executor_returns_synthetic_id() {
        let config = InstanceConfig::new("proj", "db-1", 4);
        let id = DryRunExecutor.execute(&config, 8).await.unwrap().unwrap();
        assert!(id.starts_with("dry-run-db-1-"));
    }

    #[tokio::test]
    async fn dry_run_operations_are_done() {
        let config = InstanceConfig::new("proj", "db-1", 4);
        let status = DryRunStatusProvider
            .query(&config, "dry-run-db-1-1")
            .await
            .unwrap()
            .unwrap();
        assert!(status.is_update());
        assert!(status.is_done());
        assert!(status.error.is_none());
    }

    #[tokio::test]
    async fn other_operations_are_unknown() {
        let config = InstanceConfig::new("proj", "db-1", 4);
        let status = DryRunStatusProvider.query(&config, "operation-123").await.unwrap();
        assert!(status.is_none());
    }
}
