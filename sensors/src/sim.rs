//! Simulated sensor sources for the host binary and tests.

use std::collections::VecDeque;

use board::{Board, BoardError, InputLine};
use embedded_hal::digital::InputPin;

use crate::compass::{CompassData, MagnetometerAxes};
use crate::gps::GpsData;
use crate::reader::SensorSource;

/// Plays back a fixed sequence of acquisition results, then stays silent.
pub struct ScriptedSource<R> {
    pin: u8,
    script: VecDeque<Result<Option<R>, BoardError>>,
    line: Option<InputLine>,
}

impl<R> ScriptedSource<R> {
    pub fn new(pin: u8, script: Vec<Result<Option<R>, BoardError>>) -> Self {
        ScriptedSource {
            pin,
            script: script.into(),
            line: None,
        }
    }

    /// A source that never produces a reading.
    pub fn idle(pin: u8) -> Self {
        ScriptedSource::new(pin, Vec::new())
    }
}

impl<R: Send> SensorSource<R> for ScriptedSource<R> {
    fn open(&mut self, board: &dyn Board) -> Result<(), BoardError> {
        self.line = Some(board.open_digital_input(self.pin)?);
        Ok(())
    }

    fn acquire(&mut self) -> Result<Option<R>, BoardError> {
        self.script.pop_front().unwrap_or(Ok(None))
    }
}

/// A GPS receiver that searches for a while, then reports a steady fix.
pub struct SimGpsSource {
    pin: u8,
    latitude: f64,
    longitude: f64,
    altitude: f64,
    searching_polls: u32,
    polls_per_fix: u32,
    polls: u32,
    sequence: u64,
    line: Option<InputLine>,
}

impl SimGpsSource {
    pub fn new(pin: u8, latitude: f64, longitude: f64, altitude: f64) -> Self {
        SimGpsSource {
            pin,
            latitude,
            longitude,
            altitude,
            searching_polls: 5,
            polls_per_fix: 50,
            polls: 0,
            sequence: 0,
            line: None,
        }
    }

    pub fn with_timing(mut self, searching_polls: u32, polls_per_fix: u32) -> Self {
        self.searching_polls = searching_polls;
        self.polls_per_fix = polls_per_fix.max(1);
        self
    }
}

impl SensorSource<GpsData> for SimGpsSource {
    fn open(&mut self, board: &dyn Board) -> Result<(), BoardError> {
        self.line = Some(board.open_digital_input(self.pin)?);
        Ok(())
    }

    fn acquire(&mut self) -> Result<Option<GpsData>, BoardError> {
        if let Some(line) = self.line.as_mut() {
            line.is_high()?;
        }
        self.polls += 1;
        self.sequence += 1;

        if self.polls <= self.searching_polls {
            return Ok(Some(GpsData::new(0.0, 0.0, 0.0, 1, self.sequence)));
        }
        if (self.polls - self.searching_polls - 1) % self.polls_per_fix != 0 {
            return Ok(None);
        }
        Ok(Some(GpsData::new(
            self.latitude,
            self.longitude,
            self.altitude,
            9,
            self.sequence,
        )))
    }
}

/// A magnetometer on a rig pointing at a fixed heading.
pub struct SimCompassSource {
    pin: u8,
    heading: f64,
    declination: f64,
    sequence: u64,
    line: Option<InputLine>,
}

impl SimCompassSource {
    pub fn new(pin: u8, heading: f64, declination: f64) -> Self {
        SimCompassSource {
            pin,
            heading,
            declination,
            sequence: 0,
            line: None,
        }
    }
}

impl SensorSource<CompassData> for SimCompassSource {
    fn open(&mut self, board: &dyn Board) -> Result<(), BoardError> {
        self.line = Some(board.open_digital_input(self.pin)?);
        Ok(())
    }

    fn acquire(&mut self) -> Result<Option<CompassData>, BoardError> {
        if let Some(line) = self.line.as_mut() {
            line.is_high()?;
        }
        self.sequence += 1;
        let magnetic = (self.heading - self.declination).to_radians();
        let raw = MagnetometerAxes {
            x: (magnetic.cos() * 400.0) as f32,
            y: (magnetic.sin() * 400.0) as f32,
            z: -150.0,
        };
        Ok(Some(CompassData::from_raw(raw, self.declination, self.sequence)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::Reading;
    use approx::assert_abs_diff_eq;
    use board::sim::SimBoard;
    use semver::Version;

    #[test]
    fn gps_searches_before_locking() {
        let board = SimBoard::new("sim", Version::new(1, 0, 0));
        let mut gps = SimGpsSource::new(7, 32.79, -96.83, 130.0).with_timing(2, 3);
        gps.open(&board).unwrap();

        let first = gps.acquire().unwrap().unwrap();
        assert!(!first.is_valid());
        gps.acquire().unwrap();
        let fix = gps.acquire().unwrap().unwrap();
        assert!(fix.is_valid());
        assert_abs_diff_eq!(fix.latitude(), 32.79);
        assert!(gps.acquire().unwrap().is_none());
        assert!(gps.acquire().unwrap().is_none());
        assert!(gps.acquire().unwrap().unwrap().sequence() > fix.sequence());
    }

    #[test]
    fn gps_fails_once_connection_drops() {
        let board = SimBoard::new("sim", Version::new(1, 0, 0));
        let mut gps = SimGpsSource::new(7, 0.0, 0.0, 0.0);
        gps.open(&board).unwrap();
        board.inject_fault(BoardError::ConnectionLost);
        assert_eq!(gps.acquire(), Err(BoardError::ConnectionLost));
    }

    #[test]
    fn compass_reports_configured_heading() {
        let board = SimBoard::new("sim", Version::new(1, 0, 0));
        let mut compass = SimCompassSource::new(8, 172.0, 4.0);
        compass.open(&board).unwrap();
        let reading = compass.acquire().unwrap().unwrap();
        assert!(reading.is_valid());
        assert_abs_diff_eq!(reading.heading(), 172.0, epsilon = 0.01);
    }
}
