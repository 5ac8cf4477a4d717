use crate::error::MotionError;
use crate::process::{ensure_initialized, seek_both, AxisPair, ProcessManager, ProcessReport};

/// Returns both axes to their rest position on the start bound.
#[derive(Debug, Default)]
pub struct ParkingProcessManager {
    parks: u64,
}

impl ParkingProcessManager {
    pub fn new() -> Self {
        ParkingProcessManager::default()
    }

    /// Number of invocations that had to move an axis.
    pub fn parks(&self) -> u64 {
        self.parks
    }
}

impl ProcessManager for ParkingProcessManager {
    fn name(&self) -> &'static str {
        "parking"
    }

    fn initialize(&mut self, axes: &AxisPair) -> Result<(), MotionError> {
        ensure_initialized(axes)?;
        log::info!("Parking manager ready");
        Ok(())
    }

    fn perform_management_actions(
        &mut self,
        axes: &mut AxisPair,
    ) -> Result<ProcessReport, MotionError> {
        if axes.all_parked() {
            log::debug!("Both axes already parked");
            return Ok(ProcessReport::Idle);
        }

        let report = seek_both(axes, 0, |axis, reason| MotionError::ParkingFailure {
            axis,
            reason,
        })?;
        if let ProcessReport::Moved { steps } = report {
            self.parks += 1;
            log::info!("Parked after {} steps", steps);
        }
        Ok(report)
    }
}
