//! In-memory board used by the host binary and by tests.
//!
//! Tracks pin levels and rising edges, and can be told to start failing every
//! transport call to simulate a dropped connection or an interrupted wait.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use semver::Version;

use crate::board::{Board, BoardError, BoardInfo, InputLine, OutputLine};

#[derive(Debug, Default)]
struct SimState {
    open: HashSet<u8>,
    levels: HashMap<u8, bool>,
    rising_edges: HashMap<u8, u64>,
    writes: u64,
    fault: Option<BoardError>,
    fault_after_writes: Option<(u64, BoardError)>,
}

impl SimState {
    fn check(&self) -> Result<(), BoardError> {
        match &self.fault {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn write(&mut self, pin: u8, high: bool) -> Result<(), BoardError> {
        if let Some((remaining, error)) = self.fault_after_writes.take() {
            if remaining == 0 {
                self.fault = Some(error);
            } else {
                self.fault_after_writes = Some((remaining - 1, error));
            }
        }
        self.check()?;

        let previous = self.levels.insert(pin, high).unwrap_or(false);
        if high && !previous {
            *self.rising_edges.entry(pin).or_insert(0) += 1;
        }
        self.writes += 1;
        Ok(())
    }
}

/// A simulated controller board.
#[derive(Debug, Clone)]
pub struct SimBoard {
    name: String,
    firmware: Version,
    state: Arc<Mutex<SimState>>,
}

impl SimBoard {
    pub fn new(name: &str, firmware: Version) -> Self {
        SimBoard {
            name: name.to_string(),
            firmware,
            state: Arc::new(Mutex::new(SimState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        lock(&self.state)
    }

    /// Every call from now on fails with `error`.
    pub fn inject_fault(&self, error: BoardError) {
        self.lock().fault = Some(error);
    }

    /// Lets `writes` more pin writes through, then fails every call with `error`.
    pub fn fail_after_writes(&self, writes: u64, error: BoardError) {
        self.lock().fault_after_writes = Some((writes, error));
    }

    pub fn clear_fault(&self) {
        let mut state = self.lock();
        state.fault = None;
        state.fault_after_writes = None;
    }

    /// Number of low-to-high transitions seen on `pin`.
    pub fn rising_edges(&self, pin: u8) -> u64 {
        self.lock().rising_edges.get(&pin).copied().unwrap_or(0)
    }

    pub fn level(&self, pin: u8) -> bool {
        self.lock().levels.get(&pin).copied().unwrap_or(false)
    }

    pub fn set_input(&self, pin: u8, high: bool) {
        self.lock().levels.insert(pin, high);
    }

    pub fn writes(&self) -> u64 {
        self.lock().writes
    }

    pub fn is_open(&self, pin: u8) -> bool {
        self.lock().open.contains(&pin)
    }

    fn claim(&self, pin: u8) -> Result<(), BoardError> {
        let mut state = self.lock();
        state.check()?;
        if !state.open.insert(pin) {
            return Err(BoardError::PinUnavailable(pin));
        }
        Ok(())
    }
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Board for SimBoard {
    fn info(&self) -> BoardInfo {
        BoardInfo {
            name: self.name.clone(),
            firmware: self.firmware.clone(),
        }
    }

    fn open_digital_output(&self, pin: u8, initial_high: bool) -> Result<OutputLine, BoardError> {
        self.claim(pin)?;
        let mut line = SimOutput {
            pin,
            state: self.state.clone(),
        };
        if initial_high {
            line.set_high()?;
        } else {
            line.set_low()?;
        }
        log::debug!("{}: opened output pin {}", self.name, pin);
        Ok(Box::new(line))
    }

    fn open_digital_input(&self, pin: u8) -> Result<InputLine, BoardError> {
        self.claim(pin)?;
        log::debug!("{}: opened input pin {}", self.name, pin);
        Ok(Box::new(SimInput {
            pin,
            state: self.state.clone(),
        }))
    }
}

struct SimOutput {
    pin: u8,
    state: Arc<Mutex<SimState>>,
}

impl ErrorType for SimOutput {
    type Error = BoardError;
}

impl OutputPin for SimOutput {
    fn set_low(&mut self) -> Result<(), BoardError> {
        lock(&self.state).write(self.pin, false)
    }

    fn set_high(&mut self) -> Result<(), BoardError> {
        lock(&self.state).write(self.pin, true)
    }
}

impl Drop for SimOutput {
    fn drop(&mut self) {
        lock(&self.state).open.remove(&self.pin);
    }
}

struct SimInput {
    pin: u8,
    state: Arc<Mutex<SimState>>,
}

impl ErrorType for SimInput {
    type Error = BoardError;
}

impl Drop for SimInput {
    fn drop(&mut self) {
        lock(&self.state).open.remove(&self.pin);
    }
}

impl InputPin for SimInput {
    fn is_high(&mut self) -> Result<bool, BoardError> {
        let state = lock(&self.state);
        state.check()?;
        Ok(state.levels.get(&self.pin).copied().unwrap_or(false))
    }

    fn is_low(&mut self) -> Result<bool, BoardError> {
        self.is_high().map(|high| !high)
    }
}
