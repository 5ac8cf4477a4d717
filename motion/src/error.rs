use board::BoardError;

use crate::states::Axis;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MotionError {
    /// The board transport went away. Fatal to the whole tick.
    #[error("connection fault: board transport lost")]
    ConnectionFault,

    /// Interrupted while blocked on the board. Propagated like a connection fault.
    #[error("operation interrupted while waiting on the board")]
    OperationInterrupted,

    #[error("{0} is not initialized")]
    NotInitialized(Axis),

    #[error("{axis}: invalid bounds [{min}, {max}] with start {start}")]
    InvalidBounds {
        axis: Axis,
        min: i32,
        max: i32,
        start: i32,
    },

    #[error("{axis}: hardware error: {source}")]
    Hardware { axis: Axis, source: BoardError },

    #[error("{axis} halted by stop policy at step {position}")]
    Halted { axis: Axis, position: i32 },

    #[error("calibration failed on {axis}: {reason}")]
    CalibrationFailure { axis: Axis, reason: String },

    #[error("parking failed on {axis}: {reason}")]
    ParkingFailure { axis: Axis, reason: String },
}

impl MotionError {
    pub(crate) fn from_board(axis: Axis, error: BoardError) -> Self {
        match error {
            BoardError::ConnectionLost => MotionError::ConnectionFault,
            BoardError::Interrupted => MotionError::OperationInterrupted,
            other => MotionError::Hardware {
                axis,
                source: other,
            },
        }
    }

    /// Faults that invalidate the rest of the current tick.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MotionError::ConnectionFault | MotionError::OperationInterrupted
        )
    }

    /// Failures of a process manager to reach its target.
    pub fn is_process_failure(&self) -> bool {
        matches!(
            self,
            MotionError::CalibrationFailure { .. } | MotionError::ParkingFailure { .. }
        )
    }
}
