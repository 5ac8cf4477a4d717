// State-related enums and value types for the axis controllers.

use std::fmt;

/// One of the two rotational degrees of freedom of the rig.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    pub const ALL: [Axis; 2] = [Axis::X, Axis::Y];
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => write!(f, "x-axis"),
            Axis::Y => write!(f, "y-axis"),
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum Direction {
    /// Toward the end bound.
    Positive,
    /// Toward the start bound.
    Negative,
}

impl Direction {
    pub fn is_positive(&self) -> bool {
        matches!(self, Direction::Positive)
    }

    pub fn delta(&self) -> i32 {
        match self {
            Direction::Positive => 1,
            Direction::Negative => -1,
        }
    }

    pub fn toward(from: i32, to: i32) -> Option<Direction> {
        match to.cmp(&from) {
            std::cmp::Ordering::Greater => Some(Direction::Positive),
            std::cmp::Ordering::Less => Some(Direction::Negative),
            std::cmp::Ordering::Equal => None,
        }
    }
}

/// Lifecycle of a single axis controller within one board connection.
///
/// - Uninitialized: output lines not opened yet
/// - Ready: lines open, idle between steps
/// - Stepping: a step pulse is being written
/// - Parked: last step arrived on the start bound; left again by the next step
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum AxisPhase {
    Uninitialized,
    Ready,
    Stepping,
    Parked,
}

impl AxisPhase {
    pub fn is_initialized(&self) -> bool {
        !matches!(self, AxisPhase::Uninitialized)
    }
}

/// Position bookkeeping for one axis.
///
/// `position` never leaves `[min, max]`. `parked` is set only when a step
/// arrives on `min` and cleared by the next step taken.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct AxisState {
    pub position: i32,
    pub direction: Direction,
    pub min: i32,
    pub max: i32,
    pub parked: bool,
}

impl AxisState {
    pub fn at_start(&self) -> bool {
        self.position == self.min
    }

    pub fn at_end(&self) -> bool {
        self.position == self.max
    }

    pub fn span(&self) -> u32 {
        self.max.abs_diff(self.min)
    }

    /// Whether a step in `direction` would leave the bounds.
    pub fn blocked(&self, direction: Direction) -> bool {
        match direction {
            Direction::Positive => self.at_end(),
            Direction::Negative => self.at_start(),
        }
    }

    pub fn clamp(&self, target: i32) -> i32 {
        target.clamp(self.min, self.max)
    }
}
