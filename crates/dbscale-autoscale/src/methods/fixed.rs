//! FIXED: move through a fixed list of machine sizes.
//!
//! Each sample outside its range moves the instance one position up or
//! down the list. While overloaded, the `cpu` sample jumps
//! `overload_step_size + 1` positions up instead.

use dbscale_core::{InstanceConfig, MetricSample};
use tracing::debug;

use super::ScalingMethod;
use crate::range::{self, OVERLOAD_METRIC, RelativeToRange};

/// vCPU counts of the available machine types, ascending.
pub const AVAILABLE_VCPUS: [u32; 10] = [2, 4, 8, 16, 32, 48, 64, 80, 96, 128];

const LAST: usize = AVAILABLE_VCPUS.len() - 1;

pub struct FixedMethod;

impl ScalingMethod for FixedMethod {
    fn name(&self) -> &'static str {
        "FIXED"
    }

    fn calculate_size(&self, config: &mut InstanceConfig) -> u32 {
        range::max_suggested_size(config, self.name(), suggest)
    }
}

fn suggest(config: &InstanceConfig, sample: &MetricSample) -> u32 {
    let relative = range::classify(sample);
    if relative == RelativeToRange::Within {
        return config.current_size;
    }

    let position = Position::of(config.current_size);

    if sample.name == OVERLOAD_METRIC && config.is_overloaded {
        debug!(
            project_id = %config.project_id,
            instance_id = %config.instance_id,
            overload_step_size = config.overload_step_size,
            "metric {} overloaded", sample.name
        );
        return AVAILABLE_VCPUS[position.overload(config.overload_step_size)];
    }

    match relative {
        RelativeToRange::Above => AVAILABLE_VCPUS[position.next()],
        _ => AVAILABLE_VCPUS[position.previous()],
    }
}

/// Where the current size sits in [`AVAILABLE_VCPUS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    /// Exactly at this index.
    At(usize),
    /// Not listed; the index of the first larger size (may be past the end).
    Before(usize),
}

impl Position {
    fn of(size: u32) -> Self {
        match AVAILABLE_VCPUS.iter().position(|&s| s == size) {
            Some(idx) => Position::At(idx),
            None => Position::Before(AVAILABLE_VCPUS.partition_point(|&s| s < size)),
        }
    }

    fn next(self) -> usize {
        match self {
            Position::At(idx) => (idx + 1).min(LAST),
            Position::Before(idx) => idx.min(LAST),
        }
    }

    fn previous(self) -> usize {
        match self {
            Position::At(idx) | Position::Before(idx) => idx.saturating_sub(1),
        }
    }

    fn overload(self, step_size: u32) -> usize {
        let step = step_size as usize;
        match self {
            Position::At(idx) => idx.saturating_add(step + 1).min(LAST),
            Position::Before(idx) => idx.saturating_add(step).min(LAST),
        }
    }
}
