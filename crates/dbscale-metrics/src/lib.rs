//! dbscale-metrics — scaling outcome telemetry.
//!
//! The decision engine reports every outcome through the
//! [`ScalingCounters`] trait and flushes once per invocation. The
//! in-process [`CounterRegistry`] keeps labelled counters and duration
//! samples in memory and renders them in Prometheus text format.
//!
//! # Architecture
//!
//! ```text
//! ScalingCounters (trait)
//!   └── CounterRegistry
//!         ├── inc_* / record_scaling_duration ← called by the engine
//!         ├── snapshot() → CounterSnapshot
//!         └── flush() → log summary + optional write to counters file
//!
//! Prometheus exposition
//!   └── render_prometheus(&CounterSnapshot) → text/plain
//! ```

pub mod counters;
pub mod prometheus;

pub use counters::{
    CounterName, CounterRegistry, CounterSample, CounterSnapshot, DenialReason, DurationSample,
    LabelSet, ScalingCounters, ScalingLabels,
};
pub use prometheus::render_prometheus;
