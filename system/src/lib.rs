pub mod config;
pub mod error;
pub mod listener;
pub mod manager;
pub mod phase;
pub mod runtime;
pub mod targeting;

pub use config::{AxesConfig, AxisConfig, FailurePolicy, SystemConfig};
pub use error::SystemError;
pub use listener::{ListenerRegistry, LoggingListener, SystemListener};
pub use manager::{source_factory, Readings, SourceFactory, SystemManager};
pub use phase::{Phase, PhaseOutcome, SkipReason, SunPosition, TickReport};
pub use runtime::{check_firmware, run_connection, SessionEnd, SessionOptions, SessionSummary};
pub use targeting::{compute_targets, AxisTargets};
