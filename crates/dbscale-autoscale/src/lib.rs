//! dbscale-autoscale — the scaling decision engine.
//!
//! Given an [`InstanceConfig`] with fresh metric samples, decides whether,
//! when and to what size a database instance is resized. At most one
//! resize is tracked in flight per instance, and cooldown windows keep the
//! instance from oscillating.
//!
//! # Request flow
//!
//! ```text
//! handle_request(config)
//!   └── process(config)
//!         state     = LroReconciler::reconcile(store.get(key))
//!         suggested = select_method(config).calculate_size(config)
//!
//!         suggested == current == max   → denied MAX_SIZE
//!         suggested == current          → denied CURRENT_SIZE
//!         state has operation in flight → denied IN_PROGRESS
//!         cooldown::is_blocked(..)      → denied WITHIN_COOLDOWN
//!         otherwise                     → ScaleExecutor::execute
//!                                           ok  → persist + SCALING
//!                                           err → SCALING_FAILURE
//!   └── requests-success / requests-failed, then flush counters
//! ```
//!
//! # Size calculation
//!
//! ```text
//! range(sample) = [max(threshold - margin, 0), min(threshold + margin, 100)]
//!
//! FIXED:  per sample, one step up/down the allowed vCPU list when the
//!         value leaves its range; `cpu` above 90 jumps
//!         overload_step_size + 1 steps.
//!         result = min(max(min_size, per-sample sizes...), max_size)
//! DIRECT: result = max_size
//! ```

use dbscale_core::InstanceConfig;
use dbscale_state::StateKey;

pub mod cooldown;
pub mod error;
pub mod events;
pub mod methods;
pub mod orchestrator;
pub mod ports;
pub mod range;
pub mod reconciler;

#[cfg(test)]
mod testing;

pub use error::{ScalerError, ScalerResult};
pub use events::{DownstreamEvent, EventKind, ScalingEventPayload};
pub use methods::{ScalingMethod, select_method};
pub use orchestrator::{ScalingOrchestrator, ScalingOutcome};
pub use ports::{
    EventPublisher, OperationError, OperationStatus, OperationStatusProvider, ScaleExecutor,
};
pub use range::RelativeToRange;
pub use reconciler::LroReconciler;

/// Storage key of the scaling state for `config`'s instance.
pub fn state_key(config: &InstanceConfig) -> StateKey {
    StateKey::new(config.state_project(), &config.project_id, &config.instance_id)
}
