//! Scaling counters reported by the decision engine.
//!
//! Increments are synchronous and cheap; delivery happens in
//! [`ScalingCounters::flush`], which the engine calls once per invocation
//! whatever the outcome.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use dbscale_core::BoxFuture;
use tracing::{debug, info};

use crate::prometheus::render_prometheus;

/// Why a scaling request was not executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DenialReason {
    /// Already at the maximum size and no change suggested.
    MaxSize,
    /// Suggested size equals the current size.
    CurrentSize,
    /// A previous scaling operation is still running.
    InProgress,
    /// The cooldown window since the last operation has not elapsed.
    WithinCooldown,
}

impl DenialReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialReason::MaxSize => "MAX_SIZE",
            DenialReason::CurrentSize => "CURRENT_SIZE",
            DenialReason::InProgress => "IN_PROGRESS",
            DenialReason::WithinCooldown => "WITHIN_COOLDOWN",
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters maintained by the scaler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CounterName {
    ScalingSuccess,
    ScalingFailed,
    ScalingDenied,
    RequestsSuccess,
    RequestsFailed,
}

impl CounterName {
    pub const ALL: [CounterName; 5] = [
        CounterName::ScalingSuccess,
        CounterName::ScalingFailed,
        CounterName::ScalingDenied,
        CounterName::RequestsSuccess,
        CounterName::RequestsFailed,
    ];

    /// Name used when exporting (`scaler/<name>`).
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterName::ScalingSuccess => "scaler/scaling-success",
            CounterName::ScalingFailed => "scaler/scaling-failed",
            CounterName::ScalingDenied => "scaler/scaling-denied",
            CounterName::RequestsSuccess => "scaler/requests-success",
            CounterName::RequestsFailed => "scaler/requests-failed",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CounterName::ScalingSuccess => "The number of scaling events that succeeded",
            CounterName::ScalingFailed => "The number of scaling events that failed",
            CounterName::ScalingDenied => "The number of scaling events denied",
            CounterName::RequestsSuccess => "The number of scaling request messages handled successfully",
            CounterName::RequestsFailed => "The number of scaling request messages that failed",
        }
    }
}

/// Attributes attached to a scaling counter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScalingLabels {
    pub project_id: String,
    pub instance_id: String,
    pub scaling_method: Option<String>,
    pub previous_size: Option<u32>,
    pub requested_size: Option<u32>,
}

impl ScalingLabels {
    pub fn new(project_id: &str, instance_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            instance_id: instance_id.to_string(),
            ..Default::default()
        }
    }

    pub fn with_method(mut self, method: Option<&str>) -> Self {
        self.scaling_method = method.map(str::to_string);
        self
    }

    pub fn with_sizes(mut self, previous: Option<u32>, requested: Option<u32>) -> Self {
        self.previous_size = previous;
        self.requested_size = requested;
        self
    }

    /// Flattened `(key, value)` pairs, omitting unset attributes.
    fn to_pairs(&self) -> LabelSet {
        let mut pairs = vec![
            ("project_id", self.project_id.clone()),
            ("instance_id", self.instance_id.clone()),
        ];
        if let Some(method) = &self.scaling_method {
            pairs.push(("scaling_method", method.clone()));
        }
        if let Some(size) = self.previous_size {
            pairs.push(("previous_size", size.to_string()));
        }
        if let Some(size) = self.requested_size {
            pairs.push(("requested_size", size.to_string()));
        }
        pairs
    }
}

/// Telemetry sink for scaling outcomes.
pub trait ScalingCounters: Send + Sync {
    fn inc_scaling_success(&self, labels: &ScalingLabels);
    fn inc_scaling_failed(&self, labels: &ScalingLabels);
    fn inc_scaling_denied(&self, labels: &ScalingLabels, reason: DenialReason);
    fn record_scaling_duration(&self, labels: &ScalingLabels, duration_ms: u64);
    fn inc_requests_success(&self);
    fn inc_requests_failed(&self);
    /// Deliver everything recorded so far. Best effort.
    fn flush(&self) -> BoxFuture<'_, anyhow::Result<()>>;
}

/// Attribute pairs identifying one counter series.
pub type LabelSet = Vec<(&'static str, String)>;

/// A single counter series in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSample {
    pub name: CounterName,
    pub labels: LabelSet,
    pub value: u64,
}

/// Duration samples for one label set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationSample {
    pub labels: LabelSet,
    pub values_ms: Vec<u64>,
}

/// Point-in-time copy of everything in a [`CounterRegistry`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub counters: Vec<CounterSample>,
    pub durations: Vec<DurationSample>,
}

impl CounterSnapshot {
    /// Sum of a counter across all label sets.
    pub fn total(&self, name: CounterName) -> u64 {
        self.counters
            .iter()
            .filter(|c| c.name == name)
            .map(|c| c.value)
            .sum()
    }

    /// Number of denials recorded with `reason`.
    pub fn denied(&self, reason: DenialReason) -> u64 {
        self.counters
            .iter()
            .filter(|c| c.name == CounterName::ScalingDenied)
            .filter(|c| c.labels.iter().any(|(k, v)| *k == "reason" && v == reason.as_str()))
            .map(|c| c.value)
            .sum()
    }

    /// Every recorded duration, across label sets.
    pub fn all_durations(&self) -> Vec<u64> {
        self.durations
            .iter()
            .flat_map(|d| d.values_ms.iter().copied())
            .collect()
    }
}

#[derive(Default)]
struct Series {
    counters: BTreeMap<(CounterName, LabelSet), u64>,
    durations: BTreeMap<LabelSet, Vec<u64>>,
    flushes: u64,
}

/// In-memory [`ScalingCounters`] implementation.
///
/// On flush it logs a summary and, when configured, writes the Prometheus
/// rendering to a file.
#[derive(Default)]
pub struct CounterRegistry {
    series: Mutex<Series>,
    sink: Option<PathBuf>,
}

impl CounterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the rendering to `path` on every flush.
    pub fn with_sink(mut self, path: impl Into<PathBuf>) -> Self {
        self.sink = Some(path.into());
        self
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        let series = self.lock();
        CounterSnapshot {
            counters: series
                .counters
                .iter()
                .map(|((name, labels), value)| CounterSample {
                    name: *name,
                    labels: labels.clone(),
                    value: *value,
                })
                .collect(),
            durations: series
                .durations
                .iter()
                .map(|(labels, values)| DurationSample {
                    labels: labels.clone(),
                    values_ms: values.clone(),
                })
                .collect(),
        }
    }

    /// Number of flushes performed so far.
    pub fn flush_count(&self) -> u64 {
        self.lock().flushes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Series> {
        self.series.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn inc(&self, name: CounterName, labels: LabelSet) {
        *self.lock().counters.entry((name, labels)).or_insert(0) += 1;
        debug!(counter = name.as_str(), "counter incremented");
    }
}

impl ScalingCounters for CounterRegistry {
    fn inc_scaling_success(&self, labels: &ScalingLabels) {
        self.inc(CounterName::ScalingSuccess, labels.to_pairs());
    }

    fn inc_scaling_failed(&self, labels: &ScalingLabels) {
        self.inc(CounterName::ScalingFailed, labels.to_pairs());
    }

    fn inc_scaling_denied(&self, labels: &ScalingLabels, reason: DenialReason) {
        let mut pairs = labels.to_pairs();
        pairs.push(("reason", reason.as_str().to_string()));
        self.inc(CounterName::ScalingDenied, pairs);
    }

    fn record_scaling_duration(&self, labels: &ScalingLabels, duration_ms: u64) {
        self.lock()
            .durations
            .entry(labels.to_pairs())
            .or_default()
            .push(duration_ms);
    }

    fn inc_requests_success(&self) {
        self.inc(CounterName::RequestsSuccess, Vec::new());
    }

    fn inc_requests_failed(&self) {
        self.inc(CounterName::RequestsFailed, Vec::new());
    }

    fn flush(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            self.lock().flushes += 1;
            let snapshot = self.snapshot();

            info!(
                scaling_success = snapshot.total(CounterName::ScalingSuccess),
                scaling_failed = snapshot.total(CounterName::ScalingFailed),
                scaling_denied = snapshot.total(CounterName::ScalingDenied),
                requests_success = snapshot.total(CounterName::RequestsSuccess),
                requests_failed = snapshot.total(CounterName::RequestsFailed),
                "counters flushed"
            );

            if let Some(path) = &self.sink {
                tokio::fs::write(path, render_prometheus(&snapshot)).await?;
                debug!(?path, "counters written");
            }
            Ok(())
        })
    }
}
