//! Scaling request types.
//!
//! These mirror the JSON payload produced by the metric-collection stage
//! (camelCase field names). Missing fields are filled with the same
//! defaults the collection stage would have merged in.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the scaling method used when the request names none.
pub const DEFAULT_SCALING_METHOD: &str = "FIXED";

/// Tolerance applied around a metric threshold when the sample has none.
pub const DEFAULT_THRESHOLD_MARGIN: f64 = 5.0;

// ── Units ─────────────────────────────────────────────────────────

/// Unit in which instance sizes are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Units {
    #[default]
    Vcpu,
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Units::Vcpu => f.write_str("VCPU"),
        }
    }
}

// ── Metrics ───────────────────────────────────────────────────────

/// A single observed metric with the band it is expected to stay in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricSample {
    pub name: String,
    /// Target utilization (0–100).
    pub threshold: f64,
    /// Tolerance around `threshold` within which no change is suggested.
    #[serde(default = "default_margin")]
    pub margin: f64,
    /// Observed utilization (0–100).
    pub value: f64,
}

impl MetricSample {
    pub fn new(name: &str, threshold: f64, margin: f64, value: f64) -> Self {
        Self {
            name: name.to_string(),
            threshold,
            margin,
            value,
        }
    }
}

// ── Instance ──────────────────────────────────────────────────────

/// Everything the decision engine knows about one database instance for a
/// single invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstanceConfig {
    pub project_id: String,
    pub instance_id: String,
    /// Project holding the scaling state, when different from `project_id`.
    #[serde(default)]
    pub state_project_id: Option<String>,

    #[serde(default = "default_min_size")]
    pub min_size: u32,
    #[serde(default = "default_max_size")]
    pub max_size: u32,
    #[serde(default = "default_step_size")]
    pub step_size: u32,
    #[serde(default = "default_step_size")]
    pub overload_step_size: u32,
    #[serde(default)]
    pub units: Units,

    #[serde(default = "default_cooling_minutes")]
    pub scale_out_cooling_minutes: u64,
    #[serde(default = "default_cooling_minutes")]
    pub scale_in_cooling_minutes: u64,
    /// Cooldown applied while overloaded. Falls back to the scale-out window.
    #[serde(default)]
    pub overload_cooling_minutes: Option<u64>,

    #[serde(default = "default_scaling_method")]
    pub scaling_method: String,

    /// Size currently observed on the instance.
    pub current_size: u32,

    /// Derived while evaluating metrics; never taken from the request.
    #[serde(skip_deserializing)]
    pub is_overloaded: bool,

    #[serde(default)]
    pub metrics: Vec<MetricSample>,

    /// Destination for downstream scaling events, passed through to the publisher.
    #[serde(default)]
    pub downstream_topic: Option<String>,
}

impl InstanceConfig {
    /// Minimal config with collection-stage defaults, used by tests and tooling.
    pub fn new(project_id: &str, instance_id: &str, current_size: u32) -> Self {
        Self {
            project_id: project_id.to_string(),
            instance_id: instance_id.to_string(),
            state_project_id: None,
            min_size: default_min_size(),
            max_size: default_max_size(),
            step_size: default_step_size(),
            overload_step_size: default_step_size(),
            units: Units::default(),
            scale_out_cooling_minutes: default_cooling_minutes(),
            scale_in_cooling_minutes: default_cooling_minutes(),
            overload_cooling_minutes: None,
            scaling_method: default_scaling_method(),
            current_size,
            is_overloaded: false,
            metrics: Vec::new(),
            downstream_topic: None,
        }
    }

    /// Project whose storage account holds the scaling state.
    pub fn state_project(&self) -> &str {
        self.state_project_id
            .as_deref()
            .unwrap_or(self.project_id.as_str())
    }

    /// Parse a scaling request from its JSON payload.
    pub fn from_json(payload: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }
}

fn default_margin() -> f64 {
    DEFAULT_THRESHOLD_MARGIN
}

fn default_min_size() -> u32 {
    2
}

fn default_max_size() -> u32 {
    8
}

fn default_step_size() -> u32 {
    2
}

fn default_cooling_minutes() -> u64 {
    5
}

fn default_scaling_method() -> String {
    DEFAULT_SCALING_METHOD.to_string()
}
