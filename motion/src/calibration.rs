use serde::{Deserialize, Serialize};

use crate::error::MotionError;
use crate::process::{ensure_initialized, seek_both, AxisPair, ProcessManager, ProcessReport};

/// How often the zero reference is re-established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationPolicy {
    /// Calibrate on the first tick of every board connection only.
    #[default]
    OncePerConnection,
    /// Re-seek the start bound whenever an axis is not parked.
    EveryTick,
}

/// Establishes the zero reference of both axes before tracking starts.
#[derive(Debug)]
pub struct CalibrationProcessManager {
    policy: CalibrationPolicy,
    backoff_steps: u32,
    calibrated: bool,
}

impl CalibrationProcessManager {
    pub fn new(policy: CalibrationPolicy, backoff_steps: u32) -> Self {
        CalibrationProcessManager {
            policy,
            backoff_steps,
            calibrated: false,
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }
}

impl ProcessManager for CalibrationProcessManager {
    fn name(&self) -> &'static str {
        "calibration"
    }

    fn initialize(&mut self, axes: &AxisPair) -> Result<(), MotionError> {
        ensure_initialized(axes)?;
        self.calibrated = false;
        log::info!(
            "Calibration manager ready ({:?}, back-off {} steps)",
            self.policy,
            self.backoff_steps
        );
        Ok(())
    }

    fn perform_management_actions(
        &mut self,
        axes: &mut AxisPair,
    ) -> Result<ProcessReport, MotionError> {
        if self.calibrated && self.policy == CalibrationPolicy::OncePerConnection {
            log::debug!("Already calibrated for this connection");
            return Ok(ProcessReport::Idle);
        }

        if axes.all_parked() {
            self.calibrated = true;
            return Ok(ProcessReport::Idle);
        }

        let report = seek_both(axes, self.backoff_steps, |axis, reason| {
            MotionError::CalibrationFailure { axis, reason }
        })?;
        self.calibrated = true;
        log::info!("Zero reference established: {:?}", report);
        Ok(report)
    }
}
