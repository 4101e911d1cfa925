//! Processes one scaling request from start to finish.
//!
//! Reconciles the recorded operation, asks the configured method for a
//! size, and either denies the request (with a reason) or starts the
//! resize and records it. Requests for different instances share nothing
//! but the store and collaborators, so they can run concurrently.

use std::sync::Arc;

use dbscale_core::InstanceConfig;
use dbscale_metrics::{DenialReason, ScalingCounters, ScalingLabels};
use dbscale_state::{ScalingState, SharedStateStore, epoch_millis};
use tracing::{error, info, warn};

use crate::cooldown::{self, human_duration};
use crate::error::ScalerResult;
use crate::events::{DownstreamEvent, EventKind};
use crate::methods::select_method;
use crate::ports::{EventPublisher, OperationStatusProvider, ScaleExecutor};
use crate::reconciler::LroReconciler;
use crate::state_key;

/// What happened to a scaling request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalingOutcome {
    /// No resize was attempted.
    Denied(DenialReason),
    /// A resize was started and recorded.
    Scaled {
        suggested_size: u32,
        operation_id: Option<String>,
    },
    /// Starting the resize failed; the state was left untouched.
    Failed { suggested_size: u32 },
}

pub struct ScalingOrchestrator {
    store: SharedStateStore,
    reconciler: LroReconciler,
    executor: Arc<dyn ScaleExecutor>,
    publisher: Arc<dyn EventPublisher>,
    counters: Arc<dyn ScalingCounters>,
    clock: fn() -> u64,
}

impl ScalingOrchestrator {
    pub fn new(
        store: SharedStateStore,
        operations: Arc<dyn OperationStatusProvider>,
        executor: Arc<dyn ScaleExecutor>,
        publisher: Arc<dyn EventPublisher>,
        counters: Arc<dyn ScalingCounters>,
    ) -> Self {
        Self {
            reconciler: LroReconciler::new(store.clone(), operations, counters.clone()),
            store,
            executor,
            publisher,
            counters,
            clock: epoch_millis,
        }
    }

    /// Use a custom clock (epoch milliseconds) for decisions.
    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    /// Process a request, then count it and flush the counters.
    ///
    /// Errors are logged and counted before being returned.
    pub async fn handle_request(&self, mut config: InstanceConfig) -> ScalerResult<ScalingOutcome> {
        let result = self.process(&mut config).await;

        match &result {
            Ok(_) => self.counters.inc_requests_success(),
            Err(e) => {
                error!(
                    project_id = %config.project_id,
                    instance_id = %config.instance_id,
                    error = %e,
                    "failed to process scaling request"
                );
                self.counters.inc_requests_failed();
            }
        }

        if let Err(e) = self.counters.flush().await {
            warn!(error = %e, "failed to flush counters");
        }
        result
    }

    pub async fn process(&self, config: &mut InstanceConfig) -> ScalerResult<ScalingOutcome> {
        let now = (self.clock)();
        self.process_at(config, now).await
    }

    /// Process a request as of `now` (epoch milliseconds).
    pub async fn process_at(
        &self,
        config: &mut InstanceConfig,
        now: u64,
    ) -> ScalerResult<ScalingOutcome> {
        info!(
            project_id = %config.project_id,
            instance_id = %config.instance_id,
            current_size = config.current_size,
            method = %config.scaling_method,
            "scaling request received"
        );

        let key = state_key(config);
        let stored = self.store.get(&key)?;
        let state = self.reconciler.reconcile(config, stored).await?;

        let suggested = select_method(config).calculate_size(config);
        let current = config.current_size;

        if suggested == current && current == config.max_size {
            info!(
                project_id = %config.project_id,
                instance_id = %config.instance_id,
                "has {current} {}, no scaling possible - at max size", config.units
            );
            return Ok(self.deny(config, suggested, DenialReason::MaxSize));
        }

        if suggested == current {
            info!(
                project_id = %config.project_id,
                instance_id = %config.instance_id,
                "has {current} {}, no scaling needed - at current size or min size", config.units
            );
            return Ok(self.deny(config, suggested, DenialReason::CurrentSize));
        }

        if let Some(operation_id) = &state.scaling_operation_id {
            if state.scaling_requested_size != Some(suggested) {
                warn!(
                    project_id = %config.project_id,
                    instance_id = %config.instance_id,
                    operation_id = %operation_id,
                    requested_size = ?state.scaling_requested_size,
                    suggested_size = suggested,
                    "ongoing scaling operation targets a different size"
                );
            }
            info!(
                project_id = %config.project_id,
                instance_id = %config.instance_id,
                operation_id = %operation_id,
                started = %human_duration(now.saturating_sub(state.last_scaling_timestamp)),
                "has {current} {}, no scaling possible - last scaling operation still in progress",
                config.units
            );
            return Ok(self.deny(config, suggested, DenialReason::InProgress));
        }

        if cooldown::is_blocked(config, suggested, &state, now) {
            info!(
                project_id = %config.project_id,
                instance_id = %config.instance_id,
                "has {current} {}, no scaling possible - within cooldown period", config.units
            );
            return Ok(self.deny(config, suggested, DenialReason::WithinCooldown));
        }

        self.scale(config, suggested, state, now).await
    }

    async fn scale(
        &self,
        config: &InstanceConfig,
        suggested: u32,
        state: ScalingState,
        now: u64,
    ) -> ScalerResult<ScalingOutcome> {
        info!(
            project_id = %config.project_id,
            instance_id = %config.instance_id,
            "scaling instance to {suggested} {}", config.units
        );

        match self.executor.execute(config, suggested).await {
            Ok(operation_id) => {
                if operation_id.is_none() {
                    warn!(
                        project_id = %config.project_id,
                        instance_id = %config.instance_id,
                        "scaling started without an operation id, completion will not be tracked"
                    );
                }
                let next = ScalingState {
                    scaling_operation_id: operation_id.clone(),
                    last_scaling_timestamp: now,
                    last_scaling_complete_timestamp: 0,
                    scaling_method: Some(config.scaling_method.clone()),
                    scaling_previous_size: Some(config.current_size),
                    scaling_requested_size: Some(suggested),
                    ..state
                };
                self.store.update_state(&state_key(config), &next)?;
                self.publish(EventKind::Scaling, config, suggested).await;
                Ok(ScalingOutcome::Scaled {
                    suggested_size: suggested,
                    operation_id,
                })
            }
            Err(e) => {
                error!(
                    project_id = %config.project_id,
                    instance_id = %config.instance_id,
                    suggested_size = suggested,
                    error = %e,
                    "unsuccessful scaling attempt"
                );
                self.counters.inc_scaling_failed(&labels(config, suggested));
                self.publish(EventKind::ScalingFailure, config, suggested).await;
                Ok(ScalingOutcome::Failed {
                    suggested_size: suggested,
                })
            }
        }
    }

    fn deny(&self, config: &InstanceConfig, suggested: u32, reason: DenialReason) -> ScalingOutcome {
        self.counters
            .inc_scaling_denied(&labels(config, suggested), reason);
        ScalingOutcome::Denied(reason)
    }

    async fn publish(&self, kind: EventKind, config: &InstanceConfig, suggested: u32) {
        let event = DownstreamEvent::new(kind, config, suggested);
        if let Err(e) = self.publisher.publish(&event).await {
            warn!(
                project_id = %config.project_id,
                instance_id = %config.instance_id,
                kind = %kind,
                error = %e,
                "failed to publish downstream event"
            );
        }
    }
}

fn labels(config: &InstanceConfig, suggested: u32) -> ScalingLabels {
    ScalingLabels::new(&config.project_id, &config.instance_id)
        .with_method(Some(&config.scaling_method))
        .with_sizes(Some(config.current_size), Some(suggested))
}
