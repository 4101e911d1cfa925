//! In-flight operation reconciliation.
//!
//! Before a new decision is made, the operation recorded in the scaling
//! state (if any) is looked up and the state brought up to date:
//!
//! ```text
//! no operation id            → unchanged, nothing written
//! lookup fails / no result /
//!   not an UPDATE            → assume it completed when it started
//! not DONE                   → still in flight
//! DONE with error            → forget it, reset timestamps
//! DONE                       → completion = end time (or start time)
//! ```
//!
//! Every branch except the first persists the result.

use std::sync::Arc;

use anyhow::anyhow;
use chrono::DateTime;
use dbscale_core::InstanceConfig;
use dbscale_metrics::{ScalingCounters, ScalingLabels};
use dbscale_state::{ScalingState, SharedStateStore};
use tracing::{error, info, warn};

use crate::error::ScalerResult;
use crate::ports::{OperationStatus, OperationStatusProvider};
use crate::state_key;

pub struct LroReconciler {
    store: SharedStateStore,
    operations: Arc<dyn OperationStatusProvider>,
    counters: Arc<dyn ScalingCounters>,
}

impl LroReconciler {
    pub fn new(
        store: SharedStateStore,
        operations: Arc<dyn OperationStatusProvider>,
        counters: Arc<dyn ScalingCounters>,
    ) -> Self {
        Self {
            store,
            operations,
            counters,
        }
    }

    /// Bring `state` up to date with the operation it records.
    pub async fn reconcile(
        &self,
        config: &InstanceConfig,
        mut state: ScalingState,
    ) -> ScalerResult<ScalingState> {
        let Some(operation_id) = state.scaling_operation_id.clone() else {
            return Ok(state);
        };

        let requested_size = state.scaling_requested_size.unwrap_or(config.current_size);

        match self.lookup(config, &operation_id).await {
            Ok(status) if !status.is_done() => {
                info!(
                    project_id = %config.project_id,
                    instance_id = %config.instance_id,
                    operation_id = %operation_id,
                    requested_size,
                    started = status.start_time.as_deref().unwrap_or("unknown"),
                    "last scaling request IN PROGRESS"
                );
            }
            Ok(status) => match &status.error {
                Some(op_error) => {
                    error!(
                        project_id = %config.project_id,
                        instance_id = %config.instance_id,
                        operation_id = %operation_id,
                        requested_size,
                        error = %op_error,
                        started = status.start_time.as_deref().unwrap_or("unknown"),
                        completed = status.end_time.as_deref().unwrap_or("unknown"),
                        "last scaling request FAILED"
                    );
                    self.counters
                        .inc_scaling_failed(&labels(config, &state, Some(requested_size)));
                    state.last_scaling_complete_timestamp = 0;
                    state.last_scaling_timestamp = 0;
                    state.clear_operation();
                }
                None => {
                    info!(
                        project_id = %config.project_id,
                        instance_id = %config.instance_id,
                        operation_id = %operation_id,
                        requested_size,
                        started = status.start_time.as_deref().unwrap_or("unknown"),
                        completed = status.end_time.as_deref().unwrap_or("unknown"),
                        "last scaling request SUCCEEDED"
                    );
                    state.last_scaling_complete_timestamp = match completion_millis(&status) {
                        Some(end) => end,
                        None => {
                            warn!(
                                project_id = %config.project_id,
                                instance_id = %config.instance_id,
                                end_time = ?status.end_time,
                                "failed to parse operation end time, assuming start time"
                            );
                            state.last_scaling_timestamp
                        }
                    };
                    self.record_success(config, &state, Some(requested_size));
                    state.clear_operation();
                }
            },
            Err(e) => {
                error!(
                    project_id = %config.project_id,
                    instance_id = %config.instance_id,
                    operation_id = %operation_id,
                    error = %e,
                    "failed to retrieve state of operation, assuming completed"
                );
                state.last_scaling_complete_timestamp = state.last_scaling_timestamp;
                self.record_success(config, &state, state.scaling_requested_size);
                state.clear_operation();
            }
        }

        self.store.update_state(&state_key(config), &state)?;
        Ok(state)
    }

    /// Query the provider, treating anything but an UPDATE operation as a failure.
    async fn lookup(
        &self,
        config: &InstanceConfig,
        operation_id: &str,
    ) -> anyhow::Result<OperationStatus> {
        let status = self
            .operations
            .query(config, operation_id)
            .await?
            .ok_or_else(|| anyhow!("operation {operation_id} returned no results"))?;
        if !status.is_update() {
            return Err(anyhow!("operation {operation_id} is not an UPDATE operation"));
        }
        Ok(status)
    }

    fn record_success(&self, config: &InstanceConfig, state: &ScalingState, requested: Option<u32>) {
        let labels = labels(config, state, requested);
        let duration = state
            .last_scaling_complete_timestamp
            .saturating_sub(state.last_scaling_timestamp);
        self.counters.record_scaling_duration(&labels, duration);
        self.counters.inc_scaling_success(&labels);
    }
}

fn labels(config: &InstanceConfig, state: &ScalingState, requested: Option<u32>) -> ScalingLabels {
    ScalingLabels::new(&config.project_id, &config.instance_id)
        .with_method(state.scaling_method.as_deref())
        .with_sizes(state.scaling_previous_size, requested)
}

/// End time in epoch milliseconds; `None` if absent, unparsable or not positive.
fn completion_millis(status: &OperationStatus) -> Option<u64> {
    let end = status.end_time.as_deref()?;
    let millis = DateTime::parse_from_rfc3339(end).ok()?.timestamp_millis();
    u64::try_from(millis).ok().filter(|ms| *ms > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::OperationError;
    use crate::testing::{CountingStore, StaticStatusProvider};
    use dbscale_metrics::{CounterName, CounterRegistry, CounterSnapshot};
    use dbscale_state::StateStore;

    // 2024-01-01T00:00:00Z
    const START: u64 = 1_704_067_200_000;
    const START_RFC: &str = "2024-01-01T00:00:00Z";
    const END_RFC: &str = "2024-01-01T00:01:00Z";

    struct Fixture {
        store: Arc<CountingStore>,
        counters: Arc<CounterRegistry>,
        reconciler: LroReconciler,
        config: InstanceConfig,
    }

    fn fixture(provider: StaticStatusProvider) -> Fixture {
        let store = Arc::new(CountingStore::in_memory());
        let counters = Arc::new(CounterRegistry::new());
        let reconciler = LroReconciler::new(store.clone(), Arc::new(provider), counters.clone());
        let config = InstanceConfig::new("proj", "db-1", 4);
        // Materialize the record so update_state finds it.
        store.get(&state_key(&config)).unwrap();
        Fixture {
            store,
            counters,
            reconciler,
            config,
        }
    }

    fn in_flight() -> ScalingState {
        ScalingState {
            last_scaling_timestamp: START,
            last_scaling_complete_timestamp: 0,
            scaling_operation_id: Some("op-1".into()),
            scaling_method: Some("FIXED".into()),
            scaling_previous_size: Some(4),
            scaling_requested_size: Some(8),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn no_operation_is_a_no_op() {
        let f = fixture(StaticStatusProvider::unknown());
        let state = ScalingState {
            last_scaling_timestamp: START,
            ..Default::default()
        };

        let result = f.reconciler.reconcile(&f.config, state.clone()).await.unwrap();
        assert_eq!(result, state);
        assert_eq!(f.store.updates(), 0);
        assert_eq!(f.counters.snapshot(), CounterSnapshot::default());
    }

    #[tokio::test]
    async fn done_records_completion_and_duration() {
        let f = fixture(StaticStatusProvider::status(OperationStatus::done(START_RFC, END_RFC)));

        let result = f.reconciler.reconcile(&f.config, in_flight()).await.unwrap();
        assert_eq!(result.last_scaling_timestamp, START);
        assert_eq!(result.last_scaling_complete_timestamp, START + 60_000);
        assert_eq!(result.scaling_operation_id, None);
        assert_eq!(result.scaling_method, None);
        assert_eq!(result.scaling_previous_size, None);
        assert_eq!(result.scaling_requested_size, None);

        let snap = f.counters.snapshot();
        assert_eq!(snap.total(CounterName::ScalingSuccess), 1);
        assert_eq!(snap.all_durations(), vec![60_000]);
        assert_eq!(f.store.updates(), 1);

        let stored = f.store.get(&state_key(&f.config)).unwrap();
        assert_eq!(stored.last_scaling_complete_timestamp, START + 60_000);
        assert!(!stored.has_operation());
    }

    #[tokio::test]
    async fn done_without_end_time_assumes_start() {
        let status = OperationStatus::done(START_RFC, "not a date");
        let f = fixture(StaticStatusProvider::status(status));

        let result = f.reconciler.reconcile(&f.config, in_flight()).await.unwrap();
        assert_eq!(result.last_scaling_complete_timestamp, START);
        assert_eq!(f.counters.snapshot().all_durations(), vec![0]);
    }

    #[tokio::test]
    async fn done_with_error_resets_timestamps() {
        let status = OperationStatus::done(START_RFC, END_RFC).with_error(OperationError {
            code: None,
            message: "quota exceeded".into(),
        });
        let f = fixture(StaticStatusProvider::status(status));

        let result = f.reconciler.reconcile(&f.config, in_flight()).await.unwrap();
        assert_eq!(result.last_scaling_timestamp, 0);
        assert_eq!(result.last_scaling_complete_timestamp, 0);
        assert!(!result.has_operation());
        assert_eq!(result.scaling_requested_size, None);

        let snap = f.counters.snapshot();
        assert_eq!(snap.total(CounterName::ScalingFailed), 1);
        assert_eq!(snap.total(CounterName::ScalingSuccess), 0);
        assert_eq!(f.store.updates(), 1);
    }

    #[tokio::test]
    async fn running_operation_stays_in_flight() {
        let f = fixture(StaticStatusProvider::status(OperationStatus::running(START_RFC)));

        let result = f.reconciler.reconcile(&f.config, in_flight()).await.unwrap();
        assert_eq!(result, in_flight());
        assert_eq!(f.counters.snapshot(), CounterSnapshot::default());
        assert_eq!(f.store.updates(), 1);
    }

    #[tokio::test]
    async fn query_error_infers_success() {
        let f = fixture(StaticStatusProvider::failing("permission denied"));

        let result = f.reconciler.reconcile(&f.config, in_flight()).await.unwrap();
        assert_eq!(result.last_scaling_complete_timestamp, START);
        assert!(!result.has_operation());
        assert_eq!(result.scaling_previous_size, None);

        let snap = f.counters.snapshot();
        assert_eq!(snap.total(CounterName::ScalingSuccess), 1);
        assert_eq!(snap.all_durations(), vec![0]);
        assert_eq!(f.store.updates(), 1);
    }

    #[tokio::test]
    async fn unknown_operation_infers_success() {
        let f = fixture(StaticStatusProvider::unknown());

        let result = f.reconciler.reconcile(&f.config, in_flight()).await.unwrap();
        assert_eq!(result.last_scaling_complete_timestamp, START);
        assert!(!result.has_operation());
        assert_eq!(f.counters.snapshot().total(CounterName::ScalingSuccess), 1);
    }

    #[tokio::test]
    async fn non_update_operation_infers_success() {
        let mut status = OperationStatus::done(START_RFC, END_RFC);
        status.operation_type = Some("RESTART".into());
        let f = fixture(StaticStatusProvider::status(status));

        let result = f.reconciler.reconcile(&f.config, in_flight()).await.unwrap();
        // Completion is the start time, not the reported end time.
        assert_eq!(result.last_scaling_complete_timestamp, START);
        assert_eq!(f.counters.snapshot().all_durations(), vec![0]);
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let store = Arc::new(CountingStore::in_memory());
        let reconciler = LroReconciler::new(
            store.clone(),
            Arc::new(StaticStatusProvider::unknown()),
            Arc::new(CounterRegistry::new()),
        );
        // No record was ever created, so the write has nothing to update.
        let config = InstanceConfig::new("proj", "db-1", 4);
        assert!(reconciler.reconcile(&config, in_flight()).await.is_err());
    }

    #[test]
    fn completion_parsing() {
        let ok = OperationStatus::done(START_RFC, "2024-01-01T01:00:00.500+01:00");
        assert_eq!(completion_millis(&ok), Some(START + 500));

        let missing = OperationStatus::running(START_RFC);
        assert_eq!(completion_millis(&missing), None);

        let epoch = OperationStatus::done(START_RFC, "1970-01-01T00:00:00Z");
        assert_eq!(completion_millis(&epoch), None);
    }
}
