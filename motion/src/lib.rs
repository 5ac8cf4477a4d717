pub mod axis;
pub mod calibration;
pub mod error;
pub mod parking;
pub mod process;
pub mod states;

pub use axis::{AxisController, AxisDelegate, AxisSetup, SeekResult, StepOutcome, StopPolicy};
pub use calibration::{CalibrationPolicy, CalibrationProcessManager};
pub use error::MotionError;
pub use parking::ParkingProcessManager;
pub use process::{AxisPair, ProcessManager, ProcessReport};
pub use states::{Axis, AxisPhase, AxisState, Direction};
