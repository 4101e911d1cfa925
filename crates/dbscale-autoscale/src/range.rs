//! Metric range evaluation.
//!
//! A sample is "within range" when its value lies in
//! `[threshold - margin, threshold + margin]`, clamped to `[0, 100]`.
//! Samples outside their range drive the per-method size suggestions.

use std::fmt;

use dbscale_core::{InstanceConfig, MetricSample};
use tracing::debug;

/// Only this metric can put an instance into overload.
pub const OVERLOAD_METRIC: &str = "cpu";

/// Value of [`OVERLOAD_METRIC`] above which the instance is overloaded.
pub const OVERLOAD_THRESHOLD: f64 = 90.0;

/// Position of a sample relative to its range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeToRange {
    Below,
    Within,
    Above,
}

impl fmt::Display for RelativeToRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelativeToRange::Below => f.write_str("BELOW"),
            RelativeToRange::Within => f.write_str("WITHIN"),
            RelativeToRange::Above => f.write_str("ABOVE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

pub fn range(threshold: f64, margin: f64) -> Range {
    Range {
        min: (threshold - margin).max(0.0),
        max: (threshold + margin).min(100.0),
    }
}

pub fn classify(sample: &MetricSample) -> RelativeToRange {
    let range = range(sample.threshold, sample.margin);
    if sample.value < range.min {
        RelativeToRange::Below
    } else if sample.value > range.max {
        RelativeToRange::Above
    } else {
        RelativeToRange::Within
    }
}

pub fn is_within_range(sample: &MetricSample) -> bool {
    classify(sample) == RelativeToRange::Within
}

/// Whether this sample alone marks the instance as overloaded.
pub fn signals_overload(sample: &MetricSample) -> bool {
    sample.name == OVERLOAD_METRIC && sample.value > OVERLOAD_THRESHOLD
}

/// Human-readable verdict for one sample's suggestion.
pub fn suggestion_message(
    config: &InstanceConfig,
    suggested_size: u32,
    relative: RelativeToRange,
) -> String {
    let units = config.units;
    if relative == RelativeToRange::Within {
        "no change suggested".to_string()
    } else if suggested_size > config.max_size {
        format!(
            "however, cannot scale to {suggested_size} because it is higher than MAX {} {units}",
            config.max_size
        )
    } else if suggested_size < config.min_size {
        format!(
            "however, cannot scale to {suggested_size} because it is lower than MIN {} {units}",
            config.min_size
        )
    } else if suggested_size == config.current_size {
        format!(
            "the suggested size is equal to the current size: {} {units}",
            config.current_size
        )
    } else {
        format!(
            "suggesting to scale from {} to {suggested_size} {units}",
            config.current_size
        )
    }
}

/// Run `suggest` over every sample and combine the results.
///
/// Resets and re-derives `config.is_overloaded` while walking the samples,
/// so `suggest` sees the flag as set by the samples seen so far. The result
/// is the largest suggestion (at least `min_size`), capped at `max_size`.
pub fn max_suggested_size<F>(config: &mut InstanceConfig, method: &str, suggest: F) -> u32
where
    F: Fn(&InstanceConfig, &MetricSample) -> u32,
{
    debug!(
        project_id = %config.project_id,
        instance_id = %config.instance_id,
        min = config.min_size,
        current = config.current_size,
        max = config.max_size,
        units = %config.units,
        "{method} size suggestions"
    );

    let mut max_suggested = config.min_size;
    config.is_overloaded = false;

    for i in 0..config.metrics.len() {
        if signals_overload(&config.metrics[i]) {
            config.is_overloaded = true;
        }

        let sample = &config.metrics[i];
        let suggested = suggest(config, sample);
        log_suggestion(config, sample, suggested);
        max_suggested = max_suggested.max(suggested);
    }

    let suggested = max_suggested.min(config.max_size);
    debug!(
        project_id = %config.project_id,
        instance_id = %config.instance_id,
        suggested,
        "final {method} suggestion: {suggested} {}",
        config.units
    );
    suggested
}

fn log_suggestion(config: &InstanceConfig, sample: &MetricSample, suggested: u32) {
    let relative = classify(sample);
    let detail = if sample.name == OVERLOAD_METRIC && config.is_overloaded {
        format!(
            "ABOVE the {OVERLOAD_THRESHOLD} overload threshold => {}",
            suggestion_message(config, suggested, RelativeToRange::Above)
        )
    } else {
        let range = range(sample.threshold, sample.margin);
        format!(
            "{relative} the range [{}%-{}%] => {}",
            range.min,
            range.max,
            suggestion_message(config, suggested, relative)
        )
    };
    debug!(
        project_id = %config.project_id,
        instance_id = %config.instance_id,
        metric = %sample.name,
        value = sample.value,
        "{}={}%, {detail}",
        sample.name,
        sample.value
    );
}
