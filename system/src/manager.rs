use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use board::{Board, BoardInfo};
use clock::{DayWindow, SunPositionData, SunPositionEngine, TimeSource};
use motion::{
    Axis, AxisController, AxisDelegate, AxisPair, AxisState, CalibrationProcessManager,
    ParkingProcessManager, ProcessManager, StopPolicy,
};
use sensors::{
    CompassData, CompassReader, GpsData, GpsReader, Reading, SensorDelegate, SensorReader,
    SensorSource,
};

use crate::config::{FailurePolicy, SystemConfig};
use crate::error::SystemError;
use crate::listener::{ListenerRegistry, SystemListener};
use crate::phase::{Phase, PhaseOutcome, SkipReason, SunPosition, TickReport};
use crate::targeting::{compute_targets, AxisTargets};

/// Builds a fresh sensor source for every connection.
pub type SourceFactory<R> = Box<dyn Fn() -> Box<dyn SensorSource<R>> + Send + Sync>;

pub fn source_factory<R, S, F>(make: F) -> SourceFactory<R>
where
    S: SensorSource<R> + 'static,
    F: Fn() -> S + Send + Sync + 'static,
{
    Box::new(move || Box::new(make()) as Box<dyn SensorSource<R>>)
}

/// State touched by both the control thread and the sensor reader threads.
///
/// Each sensor has its own publish lock, held from the cache write to the end
/// of the fan-out, so listeners always receive the reading the cache holds.
/// A listener must not publish a reading of the same sensor from its hook.
#[derive(Default)]
struct Shared {
    listeners: ListenerRegistry,
    gps: RwLock<Option<GpsData>>,
    compass: RwLock<Option<CompassData>>,
    gps_publish: Mutex<()>,
    compass_publish: Mutex<()>,
}

impl Shared {
    fn latest_gps(&self) -> Option<GpsData> {
        *self.gps.read().unwrap_or_else(|p| p.into_inner())
    }

    fn latest_compass(&self) -> Option<CompassData> {
        *self.compass.read().unwrap_or_else(|p| p.into_inner())
    }

    // The write guard is released before fan-out so listeners can read the cache.
    fn publish_gps(&self, data: GpsData) -> bool {
        if !data.is_valid() {
            log::warn!(
                "Ignoring GPS fix without a usable lock ({} satellites at {:.6}, {:.6})",
                data.satellites(),
                data.latitude(),
                data.longitude()
            );
            return false;
        }
        let _publishing = self.gps_publish.lock().unwrap_or_else(|p| p.into_inner());
        *self.gps.write().unwrap_or_else(|p| p.into_inner()) = Some(data);
        log::debug!(
            "GPS position locked at ({:.6}, {:.6})",
            data.latitude(),
            data.longitude()
        );
        self.listeners.notify(|l| l.gps_position_locked(&data));
        true
    }

    fn publish_compass(&self, data: CompassData) -> bool {
        if !data.is_valid() {
            log::warn!("Ignoring invalid compass heading {}", data.heading());
            return false;
        }
        let _publishing = self.compass_publish.lock().unwrap_or_else(|p| p.into_inner());
        *self.compass.write().unwrap_or_else(|p| p.into_inner()) = Some(data);
        log::debug!("Compass heading {:.1}", data.heading());
        self.listeners.notify(|l| l.compass_data_ready(&data));
        true
    }
}

impl SensorDelegate<GpsData> for Shared {
    fn reading_ready(&self, reading: GpsData) {
        let _ = self.publish_gps(reading);
    }
}

impl SensorDelegate<CompassData> for Shared {
    fn reading_ready(&self, reading: CompassData) {
        let _ = self.publish_compass(reading);
    }
}

impl AxisDelegate for Shared {
    fn step_completed(&self, axis: Axis, current_step: i32) {
        match axis {
            Axis::X => self.listeners.notify(|l| l.x_axis_step_completed(current_step)),
            Axis::Y => self.listeners.notify(|l| l.y_axis_step_completed(current_step)),
        }
    }

    fn reached_start_position(&self, axis: Axis) {
        match axis {
            Axis::X => self.listeners.notify(|l| l.x_axis_reached_start_position()),
            Axis::Y => self.listeners.notify(|l| l.y_axis_reached_start_position()),
        }
    }

    fn reached_end_position(&self, axis: Axis) {
        match axis {
            Axis::X => self.listeners.notify(|l| l.x_axis_reached_end_position()),
            Axis::Y => self.listeners.notify(|l| l.y_axis_reached_end_position()),
        }
    }
}

/// Read access to the latest sensor readings, usable from any thread.
#[derive(Clone)]
pub struct Readings {
    shared: Arc<Shared>,
}

impl Readings {
    pub fn latest_gps(&self) -> Option<GpsData> {
        self.shared.latest_gps()
    }

    pub fn latest_compass(&self) -> Option<CompassData> {
        self.shared.latest_compass()
    }
}

/// Everything built for one board connection.
struct Connection {
    board: BoardInfo,
    axes: AxisPair,
    parking: ParkingProcessManager,
    calibration: CalibrationProcessManager,
    sun: SunPositionData,
    gps_reader: GpsReader,
    compass_reader: CompassReader,
}

/// Owns the component graph of the tracker and runs its tick.
pub struct SystemManager {
    config: SystemConfig,
    shared: Arc<Shared>,
    engine: Arc<dyn SunPositionEngine>,
    clock: Arc<dyn TimeSource>,
    gps_source: SourceFactory<GpsData>,
    compass_source: SourceFactory<CompassData>,
    stop_policy: StopPolicy,
    connection: Option<Connection>,
    ticks: u64,
}

impl SystemManager {
    pub fn new(
        config: SystemConfig,
        engine: Arc<dyn SunPositionEngine>,
        clock: Arc<dyn TimeSource>,
        gps_source: SourceFactory<GpsData>,
        compass_source: SourceFactory<CompassData>,
    ) -> Self {
        SystemManager {
            config,
            shared: Arc::new(Shared::default()),
            engine,
            clock,
            gps_source,
            compass_source,
            stop_policy: StopPolicy::never(),
            connection: None,
            ticks: 0,
        }
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn add_listener(&self, listener: Arc<dyn SystemListener>) -> bool {
        self.shared.listeners.register(listener)
    }

    pub fn remove_listener(&self, listener: &Arc<dyn SystemListener>) -> bool {
        self.shared.listeners.unregister(listener)
    }

    pub fn readings(&self) -> Readings {
        Readings {
            shared: self.shared.clone(),
        }
    }

    /// Installs `policy` on both axes, now and after every reconnect.
    pub fn set_stop_policy(&mut self, policy: StopPolicy) {
        if let Some(connection) = self.connection.as_mut() {
            connection.axes.x.set_stop_policy(policy.clone());
            connection.axes.y.set_stop_policy(policy.clone());
        }
        self.stop_policy = policy;
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn board(&self) -> Option<&BoardInfo> {
        self.connection.as_ref().map(|c| &c.board)
    }

    pub fn axis_state(&self, axis: Axis) -> Option<AxisState> {
        self.connection.as_ref().map(|c| c.axes.get(axis).state())
    }

    pub fn sun_position_data(&self) -> Option<SunPositionData> {
        self.connection.as_ref().map(|c| c.sun)
    }

    pub fn is_calibrated(&self) -> Option<bool> {
        self.connection.as_ref().map(|c| c.calibration.is_calibrated())
    }

    pub fn sensors_running(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|c| c.gps_reader.is_running() && c.compass_reader.is_running())
    }

    /// Ticks run since the current connection was set up.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Builds and initializes every sub-component for `board`, in the order
    /// axes, sensors, calibration, parking. Nothing is retried: the first
    /// failure is returned and whatever was built is released.
    pub fn on_connect(&mut self, board: Arc<dyn Board>) -> Result<(), SystemError> {
        if self.connection.take().is_some() {
            log::warn!("Replacing the previous board connection");
        }
        let info = board.info();
        log::info!("Setting up {} (firmware {})", info.name, info.firmware);

        let delegate: Arc<dyn AxisDelegate> = self.shared.clone();
        let pulse_width = Duration::from_micros(self.config.step_pulse_width_us);
        let x = AxisController::new(
            Axis::X,
            self.config.axes.x.setup(),
            board.clone(),
            delegate.clone(),
        )?
        .with_stop_policy(self.stop_policy.clone())
        .with_pulse_width(pulse_width);
        let y = AxisController::new(Axis::Y, self.config.axes.y.setup(), board.clone(), delegate)?
            .with_stop_policy(self.stop_policy.clone())
            .with_pulse_width(pulse_width);
        let mut axes = AxisPair { x, y };

        let poll_interval = Duration::from_millis(self.config.sensor_poll_interval_ms);
        let gps_delegate: Arc<dyn SensorDelegate<GpsData>> = self.shared.clone();
        let compass_delegate: Arc<dyn SensorDelegate<CompassData>> = self.shared.clone();
        let mut gps_reader = SensorReader::new((self.gps_source)(), gps_delegate, poll_interval);
        let mut compass_reader =
            SensorReader::new((self.compass_source)(), compass_delegate, poll_interval);

        let mut calibration = CalibrationProcessManager::new(
            self.config.calibration,
            self.config.calibration_backoff_steps,
        );
        let mut parking = ParkingProcessManager::new();

        axes.initialize()?;
        gps_reader.initialize(board.as_ref())?;
        compass_reader.initialize(board.as_ref())?;
        calibration.initialize(&axes)?;
        parking.initialize(&axes)?;

        self.connection = Some(Connection {
            board: info.clone(),
            axes,
            parking,
            calibration,
            sun: SunPositionData::default(),
            gps_reader,
            compass_reader,
        });
        self.ticks = 0;
        log::info!("Setup complete");

        self.shared.listeners.notify(|l| l.board_connected(&info));
        Ok(())
    }

    /// Runs park, calibrate, compute and position, strictly in that order.
    ///
    /// A connection fault in any phase ends the tick with an error and leaves
    /// every axis at its last completed step. Parking and calibration
    /// failures are handled per the configured [`FailurePolicy`]; anything
    /// else is recorded in the report and the next phase runs.
    pub fn on_loop_tick(&mut self) -> Result<TickReport, SystemError> {
        let connection = self.connection.as_mut().ok_or(SystemError::NotConnected)?;
        self.ticks += 1;
        let tick = self.ticks;
        let policy = self.config.process_failure;
        let mut report = TickReport::new(tick);

        log::info!("Tick {}: parking system...", tick);
        let parking = &mut connection.parking;
        if !run_process(Phase::Park, parking, &mut connection.axes, policy, &mut report)? {
            return Ok(report);
        }

        log::info!("Tick {}: calibrating system...", tick);
        let calibration = &mut connection.calibration;
        if !run_process(Phase::Calibrate, calibration, &mut connection.axes, policy, &mut report)? {
            return Ok(report);
        }

        log::info!("Tick {}: computing sun position...", tick);
        report.compute = match self.shared.latest_gps().filter(GpsData::is_locked) {
            None => {
                log::warn!("No GPS lock yet, sun position not computed");
                PhaseOutcome::Skipped(SkipReason::NoGpsLock)
            }
            Some(fix) => {
                let now = self.clock.now();
                let (latitude, longitude, altitude) =
                    (fix.latitude(), fix.longitude(), fix.altitude());
                connection.sun.set_location(latitude, longitude, altitude);
                let angles = connection.sun.calculate(self.engine.as_ref(), now);
                let daylight = DayWindow::is_daylight(now, latitude, longitude, altitude)
                    .unwrap_or_else(|| angles.above_horizon());
                log::info!(
                    "Azimuth: {:.2}, Zenith: {:.2} ({})",
                    angles.azimuth,
                    angles.zenith,
                    if daylight { "day" } else { "night" }
                );
                report.sun = Some(SunPosition {
                    azimuth: angles.azimuth,
                    zenith: angles.zenith,
                    daylight,
                    timestamp: now,
                });
                PhaseOutcome::Completed
            }
        };

        log::info!("Tick {}: positioning system...", tick);
        report.position = match report.sun {
            None => PhaseOutcome::Skipped(SkipReason::NoSunPosition),
            Some(sun) => {
                let heading = self.shared.latest_compass().map(|c| c.heading());
                match compute_targets(&sun, heading, &self.config.axes) {
                    None => {
                        log::warn!("No compass reading yet, axes left in place");
                        PhaseOutcome::Skipped(SkipReason::NoCompassReading)
                    }
                    Some(targets) => {
                        report.targets = Some(targets);
                        drive_to_targets(&mut connection.axes, targets)?
                    }
                }
            }
        };

        log::info!("Tick {} complete", tick);
        Ok(report)
    }

    /// Caches `data` and hands it to every listener. A fix without a lock or
    /// with coordinates out of range is dropped; returns whether it was taken.
    pub fn on_gps_position_locked(&self, data: GpsData) -> bool {
        self.shared.publish_gps(data)
    }

    pub fn on_compass_data_ready(&self, data: CompassData) -> bool {
        self.shared.publish_compass(data)
    }

    /// Releases every sub-component; the next `on_connect` rebuilds them.
    pub fn on_disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            log::warn!("Disconnected from {}", connection.board.name);
        }
        self.shared.listeners.notify(|l| l.board_disconnected());
    }

    pub fn on_incompatible_board(&mut self, board: &BoardInfo) {
        self.connection = None;
        log::error!(
            "{} runs incompatible firmware {}",
            board.name,
            board.firmware
        );
        self.shared.listeners.notify(|l| l.incompatible_board(board));
    }
}

/// Runs one process manager phase and records its outcome. Returns whether
/// the tick goes on.
fn run_process(
    phase: Phase,
    manager: &mut dyn ProcessManager,
    axes: &mut AxisPair,
    policy: FailurePolicy,
    report: &mut TickReport,
) -> Result<bool, SystemError> {
    let error = match manager.perform_management_actions(axes) {
        Ok(result) => {
            log::info!("{} finished: {:?}", manager.name(), result);
            *report.outcome_mut(phase) = PhaseOutcome::Completed;
            return Ok(true);
        }
        Err(e) => e,
    };

    if error.is_fatal() {
        log::error!("{} phase aborted the tick: {}", phase, error);
        return Err(SystemError::TickAborted {
            phase,
            source: error,
        });
    }

    if !error.is_process_failure() {
        log::warn!("{} phase failed: {}", phase, error);
        *report.outcome_mut(phase) = PhaseOutcome::Failed(error);
        return Ok(true);
    }

    match policy {
        FailurePolicy::Continue => {
            log::warn!("{} phase failed, continuing: {}", phase, error);
            *report.outcome_mut(phase) = PhaseOutcome::Failed(error);
            Ok(true)
        }
        FailurePolicy::SkipRemaining => {
            log::warn!("{} phase failed, skipping the rest of the tick: {}", phase, error);
            *report.outcome_mut(phase) = PhaseOutcome::Failed(error);
            Ok(false)
        }
        FailurePolicy::AbortTick => {
            log::error!("{} phase failed, aborting the tick: {}", phase, error);
            Err(SystemError::TickAborted {
                phase,
                source: error,
            })
        }
    }
}

fn drive_to_targets(axes: &mut AxisPair, targets: AxisTargets) -> Result<PhaseOutcome, SystemError> {
    let mut outcome = PhaseOutcome::Completed;
    for (axis, target) in [(Axis::X, targets.x), (Axis::Y, targets.y)] {
        match axes.get_mut(axis).drive_to(target) {
            Ok(steps) => log::debug!("{} moved {} steps toward {}", axis, steps, target),
            Err(e) if e.is_fatal() => {
                log::error!("position phase aborted the tick: {}", e);
                return Err(SystemError::TickAborted {
                    phase: Phase::Position,
                    source: e,
                });
            }
            Err(e) => {
                log::warn!("{} did not reach {}: {}", axis, target, e);
                if outcome.is_completed() {
                    outcome = PhaseOutcome::Failed(e);
                }
            }
        }
    }
    Ok(outcome)
}
