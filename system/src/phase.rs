//! Per-phase results of one tick.

use std::fmt;

use chrono::{DateTime, Utc};
use motion::MotionError;

use crate::targeting::AxisTargets;

/// The four phases of a tick, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Park,
    Calibrate,
    Compute,
    Position,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::Park, Phase::Calibrate, Phase::Compute, Phase::Position];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Park => "park",
            Phase::Calibrate => "calibrate",
            Phase::Compute => "compute",
            Phase::Position => "position",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No locked GPS reading has arrived since startup.
    NoGpsLock,
    /// The compute phase produced nothing this tick.
    NoSunPosition,
    /// Daylight tracking needs the rig's heading.
    NoCompassReading,
    /// An earlier phase failed under `FailurePolicy::SkipRemaining`.
    EarlierFailure,
}

/// Result of one phase. Fatal faults never show up here; they abort the tick.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseOutcome {
    Completed,
    Skipped(SkipReason),
    Failed(MotionError),
}

impl PhaseOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, PhaseOutcome::Completed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PhaseOutcome::Failed(_))
    }
}

/// Sun position computed for one tick and handed to the position phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunPosition {
    pub azimuth: f64,
    pub zenith: f64,
    pub daylight: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub park: PhaseOutcome,
    pub calibrate: PhaseOutcome,
    pub compute: PhaseOutcome,
    pub position: PhaseOutcome,
    pub sun: Option<SunPosition>,
    pub targets: Option<AxisTargets>,
}

impl TickReport {
    pub(crate) fn new(tick: u64) -> Self {
        let skipped = PhaseOutcome::Skipped(SkipReason::EarlierFailure);
        TickReport {
            tick,
            park: skipped.clone(),
            calibrate: skipped.clone(),
            compute: skipped.clone(),
            position: skipped,
            sun: None,
            targets: None,
        }
    }

    pub fn outcome(&self, phase: Phase) -> &PhaseOutcome {
        match phase {
            Phase::Park => &self.park,
            Phase::Calibrate => &self.calibrate,
            Phase::Compute => &self.compute,
            Phase::Position => &self.position,
        }
    }

    pub(crate) fn outcome_mut(&mut self, phase: Phase) -> &mut PhaseOutcome {
        match phase {
            Phase::Park => &mut self.park,
            Phase::Calibrate => &mut self.calibrate,
            Phase::Compute => &mut self.compute,
            Phase::Position => &mut self.position,
        }
    }

    pub fn failures(&self) -> usize {
        Phase::ALL
            .iter()
            .filter(|phase| self.outcome(**phase).is_failed())
            .count()
    }
}
