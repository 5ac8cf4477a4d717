use motion::MotionError;
use semver::{Version, VersionReq};
use sensors::SensorError;

use crate::phase::Phase;

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    #[error("no board connected")]
    NotConnected,

    #[error(transparent)]
    Motion(#[from] MotionError),

    #[error(transparent)]
    Sensor(#[from] SensorError),

    /// The tick stopped in `phase`; later phases did not run.
    #[error("tick aborted during {phase}: {source}")]
    TickAborted { phase: Phase, source: MotionError },

    #[error("board firmware {found} does not satisfy {required}")]
    Incompatible { found: Version, required: VersionReq },
}

impl SystemError {
    /// Whether the board transport is gone and the session has to end.
    pub fn is_connection_fault(&self) -> bool {
        match self {
            SystemError::Motion(e) => e.is_fatal(),
            SystemError::Sensor(e) => e.is_fatal(),
            SystemError::TickAborted { source, .. } => source.is_fatal(),
            SystemError::NotConnected | SystemError::Incompatible { .. } => false,
        }
    }
}
