//! DIRECT: jump straight to `max_size`.
//!
//! Used to pre-scale an instance ahead of a batch job and bring it back
//! afterwards by changing `max_size`.

use dbscale_core::InstanceConfig;
use tracing::debug;

use super::ScalingMethod;

pub struct DirectMethod;

impl ScalingMethod for DirectMethod {
    fn name(&self) -> &'static str {
        "DIRECT"
    }

    fn calculate_size(&self, config: &mut InstanceConfig) -> u32 {
        debug!(
            project_id = %config.project_id,
            instance_id = %config.instance_id,
            suggested = config.max_size,
            "final DIRECT suggestion: {} {}",
            config.max_size,
            config.units
        );
        config.max_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbscale_core::MetricSample;

    #[test]
    fn suggests_max_size_regardless_of_metrics() {
        let mut config = InstanceConfig::new("proj", "db-1", 4);
        config.max_size = 32;
        config.metrics = vec![MetricSample::new("cpu", 70.0, 5.0, 5.0)];
        assert_eq!(DirectMethod.calculate_size(&mut config), 32);

        config.max_size = 2;
        assert_eq!(DirectMethod.calculate_size(&mut config), 2);
    }
}
