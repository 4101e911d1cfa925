//! Size-calculation strategies.
//!
//! Methods live in a static registry and are looked up by name,
//! case-insensitively. An unknown name falls back to [`FixedMethod`].

mod direct;
mod fixed;

pub use direct::DirectMethod;
pub use fixed::{AVAILABLE_VCPUS, FixedMethod};

use dbscale_core::{DEFAULT_SCALING_METHOD, InstanceConfig};
use tracing::{info, warn};

/// A strategy that turns metric samples into a suggested instance size.
pub trait ScalingMethod: Send + Sync {
    /// Registry name, upper case.
    fn name(&self) -> &'static str;

    /// Suggested size for `config`. May update `config.is_overloaded`.
    fn calculate_size(&self, config: &mut InstanceConfig) -> u32;
}

static METHODS: &[&dyn ScalingMethod] = &[&FixedMethod, &DirectMethod];

/// Find a method by name, ignoring case and surrounding whitespace.
pub fn lookup(name: &str) -> Option<&'static dyn ScalingMethod> {
    let name = name.trim();
    METHODS
        .iter()
        .copied()
        .find(|m| m.name().eq_ignore_ascii_case(name))
}

/// Names of all registered methods.
pub fn available() -> impl Iterator<Item = &'static str> {
    METHODS.iter().map(|m| m.name())
}

/// Resolve the method named in `config`.
///
/// Unknown names fall back to the default method, and `config.scaling_method`
/// is rewritten to the name actually used.
pub fn select_method(config: &mut InstanceConfig) -> &'static dyn ScalingMethod {
    let method = match lookup(&config.scaling_method) {
        Some(method) => method,
        None => {
            warn!(
                project_id = %config.project_id,
                instance_id = %config.instance_id,
                method = %config.scaling_method,
                "unknown scaling method, using {DEFAULT_SCALING_METHOD}"
            );
            config.scaling_method = DEFAULT_SCALING_METHOD.to_string();
            &FixedMethod
        }
    };
    info!(
        project_id = %config.project_id,
        instance_id = %config.instance_id,
        method = %config.scaling_method,
        "using scaling method"
    );
    method
}
