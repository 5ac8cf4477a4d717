use crate::axis::{AxisController, SeekResult};
use crate::error::MotionError;
use crate::states::Axis;

/// The two axis controllers of the rig.
pub struct AxisPair {
    pub x: AxisController,
    pub y: AxisController,
}

impl AxisPair {
    pub fn get(&self, axis: Axis) -> &AxisController {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
        }
    }

    pub fn get_mut(&mut self, axis: Axis) -> &mut AxisController {
        match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
        }
    }

    pub fn initialize(&mut self) -> Result<(), MotionError> {
        self.x.initialize()?;
        self.y.initialize()
    }

    pub fn all_parked(&self) -> bool {
        self.x.is_parked() && self.y.is_parked()
    }
}

/// What a process manager did during one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessReport {
    /// Nothing to do, both axes were already where they had to be.
    Idle,
    /// At least one axis was driven; total steps taken.
    Moved { steps: u32 },
}

/// A bounded procedure run against both axes once per tick.
pub trait ProcessManager {
    fn name(&self) -> &'static str;

    fn initialize(&mut self, axes: &AxisPair) -> Result<(), MotionError>;

    fn perform_management_actions(&mut self, axes: &mut AxisPair)
        -> Result<ProcessReport, MotionError>;
}

pub(crate) fn ensure_initialized(axes: &AxisPair) -> Result<(), MotionError> {
    for axis in Axis::ALL {
        if !axes.get(axis).phase().is_initialized() {
            return Err(MotionError::NotInitialized(axis));
        }
    }
    Ok(())
}

/// Seeks the start bound on both axes, X first, turning unreached targets
/// into the error built by `failure`.
pub(crate) fn seek_both<F>(
    axes: &mut AxisPair,
    backoff: u32,
    failure: F,
) -> Result<ProcessReport, MotionError>
where
    F: Fn(Axis, String) -> MotionError,
{
    let mut total = 0;
    for axis in Axis::ALL {
        match axes.get_mut(axis).seek_start(backoff)? {
            SeekResult::AlreadyParked => {}
            SeekResult::Reached { steps } => total += steps,
            SeekResult::Halted { position } => {
                return Err(failure(
                    axis,
                    format!("halted by stop policy at step {}", position),
                ))
            }
            SeekResult::Exhausted { position } => {
                return Err(failure(
                    axis,
                    format!("start position not reached, stopped at step {}", position),
                ))
            }
        }
    }

    if total == 0 {
        Ok(ProcessReport::Idle)
    } else {
        Ok(ProcessReport::Moved { steps: total })
    }
}
