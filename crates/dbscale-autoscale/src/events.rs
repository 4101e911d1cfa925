//! Downstream scaling events.

use std::fmt;

use dbscale_core::{InstanceConfig, MetricSample, Units};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// A resize was started.
    Scaling,
    /// Starting a resize failed.
    ScalingFailure,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Scaling => f.write_str("SCALING"),
            EventKind::ScalingFailure => f.write_str("SCALING_FAILURE"),
        }
    }
}

/// Body of a downstream event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalingEventPayload {
    pub project_id: String,
    pub instance_id: String,
    pub current_size: u32,
    pub suggested_size: u32,
    pub units: Units,
    pub metrics: Vec<MetricSample>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownstreamEvent {
    pub kind: EventKind,
    pub payload: ScalingEventPayload,
    /// Destination requested by the scaling request, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl DownstreamEvent {
    pub fn new(kind: EventKind, config: &InstanceConfig, suggested_size: u32) -> Self {
        Self {
            kind,
            payload: ScalingEventPayload {
                project_id: config.project_id.clone(),
                instance_id: config.instance_id.clone(),
                current_size: config.current_size,
                suggested_size,
                units: config.units,
                metrics: config.metrics.clone(),
            },
            topic: config.downstream_topic.clone(),
        }
    }
}
