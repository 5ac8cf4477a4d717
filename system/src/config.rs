use motion::{AxisSetup, CalibrationPolicy};
use serde::{Deserialize, Serialize};

/// Pins, travel range and angular resolution of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisConfig {
    pub min: i32,
    pub max: i32,
    /// Position assumed at connect time, before the first homing.
    pub start: i32,
    pub step_pin: u8,
    pub dir_pin: u8,
    pub degrees_per_step: f64,
}

impl AxisConfig {
    pub fn setup(&self) -> AxisSetup {
        AxisSetup {
            step_pin: self.step_pin,
            dir_pin: self.dir_pin,
            min: self.min,
            max: self.max,
            start: self.start,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxesConfig {
    pub x: AxisConfig,
    pub y: AxisConfig,
}

impl Default for AxesConfig {
    fn default() -> Self {
        AxesConfig {
            // a full turn of azimuth at 0.1 degree per step
            x: AxisConfig {
                min: 0,
                max: 3600,
                start: 1800,
                step_pin: 1,
                dir_pin: 2,
                degrees_per_step: 0.1,
            },
            // flat (sun overhead) to edge-on (sun on the horizon)
            y: AxisConfig {
                min: 0,
                max: 900,
                start: 450,
                step_pin: 3,
                dir_pin: 4,
                degrees_per_step: 0.1,
            },
        }
    }
}

/// What the orchestrator does when parking or calibration cannot reach its
/// target. Connection faults always abort the tick regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log it and run the next phase.
    #[default]
    Continue,
    /// Skip the remaining phases of this tick.
    SkipRemaining,
    /// Fail the whole tick with an error.
    AbortTick,
}

fn default_backoff_steps() -> u32 {
    10
}

fn default_poll_interval_ms() -> u64 {
    50
}

fn default_pulse_width_us() -> u64 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub axes: AxesConfig,
    #[serde(default)]
    pub calibration: CalibrationPolicy,
    #[serde(default)]
    pub process_failure: FailurePolicy,
    #[serde(default = "default_backoff_steps")]
    pub calibration_backoff_steps: u32,
    #[serde(default = "default_poll_interval_ms")]
    pub sensor_poll_interval_ms: u64,
    #[serde(default = "default_pulse_width_us")]
    pub step_pulse_width_us: u64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        SystemConfig {
            axes: AxesConfig::default(),
            calibration: CalibrationPolicy::default(),
            process_failure: FailurePolicy::default(),
            calibration_backoff_steps: default_backoff_steps(),
            sensor_poll_interval_ms: default_poll_interval_ms(),
            step_pulse_width_us: default_pulse_width_us(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_gives_defaults() {
        let config: SystemConfig = toml::from_str("").unwrap();
        assert_eq!(config, SystemConfig::default());
        assert_eq!(config.process_failure, FailurePolicy::Continue);
        assert_eq!(config.calibration, CalibrationPolicy::OncePerConnection);
    }

    #[test]
    fn parses_policies_and_axes() {
        let config: SystemConfig = toml::from_str(
            r#"
            calibration = "every_tick"
            process_failure = "skip_remaining"
            calibration_backoff_steps = 3

            [axes.x]
            min = 0
            max = 360
            start = 180
            step_pin = 10
            dir_pin = 11
            degrees_per_step = 1.0

            [axes.y]
            min = 0
            max = 90
            start = 45
            step_pin = 12
            dir_pin = 13
            degrees_per_step = 1.0
            "#,
        )
        .unwrap();

        assert_eq!(config.calibration, CalibrationPolicy::EveryTick);
        assert_eq!(config.process_failure, FailurePolicy::SkipRemaining);
        assert_eq!(config.calibration_backoff_steps, 3);
        assert_eq!(config.axes.x.setup().step_pin, 10);
        assert_eq!(config.axes.y.max, 90);
        assert_eq!(config.sensor_poll_interval_ms, 50);
    }

    #[test]
    fn rejects_unknown_policy() {
        let result: Result<SystemConfig, _> = toml::from_str(r#"process_failure = "retry""#);
        assert!(result.is_err());
    }
}
