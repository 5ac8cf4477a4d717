use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use board::{Board, BoardError, OutputLine};
use embedded_hal::digital::PinState;

use crate::error::MotionError;
use crate::states::{Axis, AxisPhase, AxisState, Direction};

/// Receives progress and limit events from one axis controller.
pub trait AxisDelegate: Send + Sync {
    fn step_completed(&self, axis: Axis, current_step: i32);

    fn reached_start_position(&self, axis: Axis);

    fn reached_end_position(&self, axis: Axis);
}

/// Predicate consulted before every step; `true` halts the axis in place.
#[derive(Clone)]
pub struct StopPolicy(Arc<dyn Fn(Axis, Direction, i32) -> bool + Send + Sync>);

impl StopPolicy {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Axis, Direction, i32) -> bool + Send + Sync + 'static,
    {
        StopPolicy(Arc::new(f))
    }

    /// Never stop early.
    pub fn never() -> Self {
        StopPolicy::new(|_, _, _| false)
    }

    pub fn should_stop(&self, axis: Axis, direction: Direction, current_step: i32) -> bool {
        (self.0)(axis, direction, current_step)
    }
}

impl Default for StopPolicy {
    fn default() -> Self {
        StopPolicy::never()
    }
}

impl fmt::Debug for StopPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StopPolicy(..)")
    }
}

/// Board pins and travel range of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisSetup {
    pub step_pin: u8,
    pub dir_pin: u8,
    pub min: i32,
    pub max: i32,
    /// Position assumed at connect time, before any homing.
    pub start: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Moved(i32),
    /// Already on the bound in the requested direction; nothing written.
    AtLimit,
    /// The stop policy refused the step; nothing written.
    Halted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekResult {
    AlreadyParked,
    Reached { steps: u32 },
    Halted { position: i32 },
    Exhausted { position: i32 },
}

/// Step and direction lines of a stepper driver.
struct StepAndDirection {
    step: OutputLine,
    direction: OutputLine,
}

impl StepAndDirection {
    fn pulse(&mut self, direction: Direction, width: Duration) -> Result<(), BoardError> {
        self.direction
            .set_state(PinState::from(direction.is_positive()))?;
        self.step.set_high()?;
        if !width.is_zero() {
            std::thread::sleep(width);
        }
        self.step.set_low()
    }
}

/// Drives one stepper axis one step at a time between its bounds.
pub struct AxisController {
    axis: Axis,
    setup: AxisSetup,
    board: Arc<dyn Board>,
    delegate: Arc<dyn AxisDelegate>,
    stop_policy: StopPolicy,
    pulse_width: Duration,
    lines: Option<StepAndDirection>,
    state: AxisState,
    phase: AxisPhase,
}

impl AxisController {
    pub fn new(
        axis: Axis,
        setup: AxisSetup,
        board: Arc<dyn Board>,
        delegate: Arc<dyn AxisDelegate>,
    ) -> Result<Self, MotionError> {
        if setup.min >= setup.max || setup.start < setup.min || setup.start > setup.max {
            return Err(MotionError::InvalidBounds {
                axis,
                min: setup.min,
                max: setup.max,
                start: setup.start,
            });
        }

        Ok(AxisController {
            axis,
            setup,
            board,
            delegate,
            stop_policy: StopPolicy::never(),
            pulse_width: Duration::from_micros(1),
            lines: None,
            state: AxisState {
                position: setup.start,
                direction: Direction::Negative,
                min: setup.min,
                max: setup.max,
                parked: false,
            },
            phase: AxisPhase::Uninitialized,
        })
    }

    pub fn with_stop_policy(mut self, policy: StopPolicy) -> Self {
        self.stop_policy = policy;
        self
    }

    pub fn with_pulse_width(mut self, width: Duration) -> Self {
        self.pulse_width = width;
        self
    }

    pub fn set_stop_policy(&mut self, policy: StopPolicy) {
        self.stop_policy = policy;
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn state(&self) -> AxisState {
        self.state
    }

    pub fn phase(&self) -> AxisPhase {
        self.phase
    }

    pub fn position(&self) -> i32 {
        self.state.position
    }

    pub fn is_parked(&self) -> bool {
        self.state.parked
    }

    /// Opens the step and direction lines. Calling it again on an
    /// initialized controller does nothing.
    pub fn initialize(&mut self) -> Result<(), MotionError> {
        if self.lines.is_some() {
            log::debug!("{} already initialized", self.axis);
            return Ok(());
        }

        let step = self
            .board
            .open_digital_output(self.setup.step_pin, false)
            .map_err(|e| MotionError::from_board(self.axis, e))?;
        let direction = self
            .board
            .open_digital_output(self.setup.dir_pin, false)
            .map_err(|e| MotionError::from_board(self.axis, e))?;

        self.lines = Some(StepAndDirection { step, direction });
        self.phase = AxisPhase::Ready;
        log::info!(
            "{} initialized: step pin {}, dir pin {}, range [{}, {}], at {}",
            self.axis,
            self.setup.step_pin,
            self.setup.dir_pin,
            self.state.min,
            self.state.max,
            self.state.position
        );
        Ok(())
    }

    /// Moves one step in `direction` unless the axis is on that bound or the
    /// stop policy refuses. Position only changes after the pulse was written.
    pub fn step(&mut self, direction: Direction) -> Result<StepOutcome, MotionError> {
        let lines = self
            .lines
            .as_mut()
            .ok_or(MotionError::NotInitialized(self.axis))?;

        if self.state.blocked(direction) {
            log::debug!(
                "{}: step {:?} refused at bound {}",
                self.axis,
                direction,
                self.state.position
            );
            return Ok(StepOutcome::AtLimit);
        }

        if self
            .stop_policy
            .should_stop(self.axis, direction, self.state.position)
        {
            log::info!(
                "{}: stop policy halted step {:?} at {}",
                self.axis,
                direction,
                self.state.position
            );
            return Ok(StepOutcome::Halted);
        }

        let resting = self.phase;
        self.phase = AxisPhase::Stepping;
        if let Err(e) = lines.pulse(direction, self.pulse_width) {
            self.phase = resting;
            log::error!("{}: step pulse failed: {}", self.axis, e);
            return Err(MotionError::from_board(self.axis, e));
        }

        self.state.position += direction.delta();
        self.state.direction = direction;
        self.state.parked = false;
        self.phase = AxisPhase::Ready;

        let position = self.state.position;
        self.delegate.step_completed(self.axis, position);

        if self.state.at_start() {
            self.state.parked = true;
            self.phase = AxisPhase::Parked;
            log::info!("{} reached start position", self.axis);
            self.delegate.reached_start_position(self.axis);
        }
        if self.state.at_end() {
            log::info!("{} reached end position", self.axis);
            self.delegate.reached_end_position(self.axis);
        }

        Ok(StepOutcome::Moved(position))
    }

    /// Steps toward the start bound until it reports arrival.
    ///
    /// An axis that is not parked first backs off by `backoff` steps (at
    /// least one when it is already sitting on the start bound) so the
    /// arrival is always observed.
    pub fn seek_start(&mut self, backoff: u32) -> Result<SeekResult, MotionError> {
        if self.state.parked {
            return Ok(SeekResult::AlreadyParked);
        }

        let backoff = if self.state.at_start() {
            backoff.max(1)
        } else {
            backoff
        };
        for _ in 0..backoff {
            match self.step(Direction::Positive)? {
                StepOutcome::Moved(_) => {}
                StepOutcome::AtLimit => break,
                StepOutcome::Halted => {
                    return Ok(SeekResult::Halted {
                        position: self.state.position,
                    })
                }
            }
        }

        let mut steps = 0;
        while steps <= self.state.span() {
            match self.step(Direction::Negative)? {
                StepOutcome::Moved(_) => {
                    steps += 1;
                    if self.state.parked {
                        return Ok(SeekResult::Reached { steps });
                    }
                }
                StepOutcome::AtLimit => break,
                StepOutcome::Halted => {
                    return Ok(SeekResult::Halted {
                        position: self.state.position,
                    })
                }
            }
        }

        Ok(SeekResult::Exhausted {
            position: self.state.position,
        })
    }

    /// Steps toward `target` (clamped to the bounds) and returns the number
    /// of steps taken.
    pub fn drive_to(&mut self, target: i32) -> Result<u32, MotionError> {
        let target = self.state.clamp(target);
        let mut steps = 0;

        while let Some(direction) = Direction::toward(self.state.position, target) {
            match self.step(direction)? {
                StepOutcome::Moved(_) => steps += 1,
                StepOutcome::AtLimit => break,
                StepOutcome::Halted => {
                    return Err(MotionError::Halted {
                        axis: self.axis,
                        position: self.state.position,
                    })
                }
            }
        }

        log::debug!("{} at {} after {} steps", self.axis, self.state.position, steps);
        Ok(steps)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use board::sim::SimBoard;
    use semver::Version;
    use std::sync::Mutex;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Event {
        Step(Axis, i32),
        Start(Axis),
        End(Axis),
    }

    #[derive(Default)]
    pub struct Recorder {
        pub events: Mutex<Vec<Event>>,
    }

    impl Recorder {
        pub fn take(&self) -> Vec<Event> {
            std::mem::take(&mut *self.events.lock().unwrap())
        }

        pub fn count(&self, event: Event) -> usize {
            self.events.lock().unwrap().iter().filter(|e| **e == event).count()
        }
    }

    impl AxisDelegate for Recorder {
        fn step_completed(&self, axis: Axis, current_step: i32) {
            self.events.lock().unwrap().push(Event::Step(axis, current_step));
        }

        fn reached_start_position(&self, axis: Axis) {
            self.events.lock().unwrap().push(Event::Start(axis));
        }

        fn reached_end_position(&self, axis: Axis) {
            self.events.lock().unwrap().push(Event::End(axis));
        }
    }

    pub fn sim_board() -> SimBoard {
        SimBoard::new("sim", Version::new(1, 0, 0))
    }

    pub fn setup(step_pin: u8, min: i32, max: i32, start: i32) -> AxisSetup {
        AxisSetup {
            step_pin,
            dir_pin: step_pin + 1,
            min,
            max,
            start,
        }
    }

    fn controller(board: &SimBoard, start: i32) -> (AxisController, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let mut axis = AxisController::new(
            Axis::X,
            setup(1, 0, 10, start),
            Arc::new(board.clone()),
            recorder.clone(),
        )
        .unwrap()
        .with_pulse_width(Duration::ZERO);
        axis.initialize().unwrap();
        (axis, recorder)
    }

    #[test]
    fn rejects_invalid_bounds() {
        let board = sim_board();
        let result = AxisController::new(
            Axis::Y,
            setup(1, 5, 5, 5),
            Arc::new(board.clone()),
            Arc::new(Recorder::default()),
        );
        assert!(matches!(result, Err(MotionError::InvalidBounds { .. })));

        let result = AxisController::new(
            Axis::Y,
            setup(1, 0, 10, 11),
            Arc::new(board),
            Arc::new(Recorder::default()),
        );
        assert!(matches!(result, Err(MotionError::InvalidBounds { .. })));
    }

    #[test]
    fn step_requires_initialize() {
        let board = sim_board();
        let mut axis = AxisController::new(
            Axis::X,
            setup(1, 0, 10, 5),
            Arc::new(board),
            Arc::new(Recorder::default()),
        )
        .unwrap();
        assert_eq!(axis.phase(), AxisPhase::Uninitialized);
        assert_eq!(
            axis.step(Direction::Positive),
            Err(MotionError::NotInitialized(Axis::X))
        );
    }

    #[test]
    fn initialize_twice_is_harmless() {
        let board = sim_board();
        let (mut axis, _) = controller(&board, 5);
        assert!(axis.initialize().is_ok());
        assert_eq!(axis.phase(), AxisPhase::Ready);
    }

    #[test]
    fn initialize_reports_connection_fault() {
        let board = sim_board();
        board.inject_fault(BoardError::ConnectionLost);
        let mut axis = AxisController::new(
            Axis::X,
            setup(1, 0, 10, 5),
            Arc::new(board),
            Arc::new(Recorder::default()),
        )
        .unwrap();
        assert_eq!(axis.initialize(), Err(MotionError::ConnectionFault));
        assert_eq!(axis.phase(), AxisPhase::Uninitialized);
    }

    #[test]
    fn five_negative_steps_from_five_park_the_axis() {
        let board = sim_board();
        let (mut axis, recorder) = controller(&board, 5);

        for expected in (0..5).rev() {
            assert_eq!(
                axis.step(Direction::Negative).unwrap(),
                StepOutcome::Moved(expected)
            );
        }
        assert!(axis.is_parked());
        assert_eq!(axis.phase(), AxisPhase::Parked);
        assert_eq!(recorder.count(Event::Start(Axis::X)), 1);

        recorder.take();
        assert_eq!(axis.step(Direction::Negative).unwrap(), StepOutcome::AtLimit);
        assert_eq!(axis.position(), 0);
        assert!(recorder.take().is_empty());
        assert_eq!(board.rising_edges(1), 5);
    }

    #[test]
    fn stepping_away_from_start_clears_parked() {
        let board = sim_board();
        let (mut axis, _) = controller(&board, 1);
        axis.step(Direction::Negative).unwrap();
        assert!(axis.is_parked());
        axis.step(Direction::Positive).unwrap();
        assert!(!axis.is_parked());
        assert_eq!(axis.phase(), AxisPhase::Ready);
    }

    #[test]
    fn end_position_reported_once_per_arrival() {
        let board = sim_board();
        let (mut axis, recorder) = controller(&board, 8);
        axis.step(Direction::Positive).unwrap();
        axis.step(Direction::Positive).unwrap();
        assert_eq!(axis.step(Direction::Positive).unwrap(), StepOutcome::AtLimit);
        assert_eq!(recorder.count(Event::End(Axis::X)), 1);

        axis.step(Direction::Negative).unwrap();
        axis.step(Direction::Positive).unwrap();
        assert_eq!(recorder.count(Event::End(Axis::X)), 2);
    }

    #[test]
    fn events_follow_step_order() {
        let board = sim_board();
        let (mut axis, recorder) = controller(&board, 1);
        axis.step(Direction::Negative).unwrap();
        assert_eq!(
            recorder.take(),
            vec![Event::Step(Axis::X, 0), Event::Start(Axis::X)]
        );
    }

    #[test]
    fn position_never_leaves_bounds() {
        let board = sim_board();
        let (mut axis, _) = controller(&board, 3);
        let pattern = [
            Direction::Positive,
            Direction::Positive,
            Direction::Negative,
            Direction::Positive,
        ];
        for i in 0..200 {
            axis.step(pattern[i % pattern.len()]).unwrap();
            let state = axis.state();
            assert!(state.position >= state.min && state.position <= state.max);
        }
        for _ in 0..30 {
            axis.step(Direction::Negative).unwrap();
            assert!(axis.position() >= 0);
        }
        assert_eq!(axis.position(), 0);
    }

    #[test]
    fn stop_policy_blocks_without_moving_or_events() {
        let board = sim_board();
        let (axis, recorder) = controller(&board, 5);
        let mut axis = axis.with_stop_policy(StopPolicy::new(|_, direction, step| {
            direction == Direction::Negative && step <= 4
        }));

        assert_eq!(axis.step(Direction::Negative).unwrap(), StepOutcome::Moved(4));
        recorder.take();
        assert_eq!(axis.step(Direction::Negative).unwrap(), StepOutcome::Halted);
        assert_eq!(axis.position(), 4);
        assert!(recorder.take().is_empty());
        assert_eq!(axis.step(Direction::Positive).unwrap(), StepOutcome::Moved(5));
    }

    #[test]
    fn failed_pulse_leaves_position_unchanged() {
        let board = sim_board();
        let (mut axis, recorder) = controller(&board, 5);
        board.inject_fault(BoardError::ConnectionLost);
        assert_eq!(
            axis.step(Direction::Negative),
            Err(MotionError::ConnectionFault)
        );
        assert_eq!(axis.position(), 5);
        assert!(recorder.take().is_empty());

        board.clear_fault();
        board.fail_after_writes(1, BoardError::Interrupted);
        assert_eq!(
            axis.step(Direction::Negative),
            Err(MotionError::OperationInterrupted)
        );
        assert_eq!(axis.position(), 5);
        assert_eq!(axis.phase(), AxisPhase::Ready);
    }

    #[test]
    fn seek_start_from_the_middle() {
        let board = sim_board();
        let (mut axis, recorder) = controller(&board, 6);
        assert_eq!(axis.seek_start(0).unwrap(), SeekResult::Reached { steps: 6 });
        assert!(axis.is_parked());
        assert_eq!(recorder.count(Event::Start(Axis::X)), 1);
        assert_eq!(axis.seek_start(3).unwrap(), SeekResult::AlreadyParked);
    }

    #[test]
    fn seek_start_backs_off_when_sitting_on_start() {
        let board = sim_board();
        let (mut axis, _) = controller(&board, 0);
        assert!(!axis.is_parked());
        assert_eq!(axis.seek_start(0).unwrap(), SeekResult::Reached { steps: 1 });
        assert!(axis.is_parked());
        assert_eq!(board.rising_edges(1), 2);
    }

    #[test]
    fn seek_start_backoff_is_capped_by_end_bound() {
        let board = sim_board();
        let (mut axis, _) = controller(&board, 8);
        assert_eq!(axis.seek_start(5).unwrap(), SeekResult::Reached { steps: 10 });
    }

    #[test]
    fn seek_start_reports_halt() {
        let board = sim_board();
        let (axis, _) = controller(&board, 5);
        let mut axis = axis.with_stop_policy(StopPolicy::new(|_, _, step| step == 2));
        assert_eq!(
            axis.seek_start(0).unwrap(),
            SeekResult::Halted { position: 2 }
        );
        assert!(!axis.is_parked());
    }

    #[test]
    fn drive_to_clamps_target() {
        let board = sim_board();
        let (mut axis, recorder) = controller(&board, 5);
        assert_eq!(axis.drive_to(42).unwrap(), 5);
        assert_eq!(axis.position(), 10);
        assert_eq!(recorder.count(Event::End(Axis::X)), 1);
        assert_eq!(axis.drive_to(7).unwrap(), 3);
        assert_eq!(axis.drive_to(7).unwrap(), 0);
    }

    #[test]
    fn drive_to_surfaces_halt() {
        let board = sim_board();
        let (axis, _) = controller(&board, 5);
        let mut axis = axis.with_stop_policy(StopPolicy::new(|_, _, step| step == 7));
        assert_eq!(
            axis.drive_to(9),
            Err(MotionError::Halted {
                axis: Axis::X,
                position: 7
            })
        );
    }
}
