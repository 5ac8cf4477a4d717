mod config;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;

use board::sim::SimBoard;
use clock::{NoaaSunEngine, SystemClock};
use log::*;
use sensors::sim::{SimCompassSource, SimGpsSource};
use system::{
    run_connection, source_factory, LoggingListener, SessionEnd, SessionOptions, SystemManager,
};

use crate::config::Config;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Load rig configuration values
    let config = Config::load()?;
    info!(
        "Rig id: {}, Lat: {}, Lon: {}, Alt: {}",
        config.device.rig_id,
        config.location.latitude,
        config.location.longitude,
        config.location.altitude
    );

    // ======== Sensors: simulated GPS receiver and magnetometer ========
    let location = config.location.clone();
    let gps_pin = config.sensors.gps_pin;
    let compass_pin = config.sensors.compass_pin;
    let heading = config.sensors.rig_heading;
    let declination = config.location.magnetic_declination;

    let mut manager = SystemManager::new(
        config.control.clone(),
        Arc::new(NoaaSunEngine),
        Arc::new(SystemClock),
        source_factory(move || {
            SimGpsSource::new(gps_pin, location.latitude, location.longitude, location.altitude)
        }),
        source_factory(move || SimCompassSource::new(compass_pin, heading, declination)),
    );
    manager.add_listener(Arc::new(LoggingListener));

    // ======== Board: simulated controller ========
    let board = SimBoard::new(&config.board.name, config.board.firmware_version.clone());
    let options = SessionOptions {
        required_firmware: config.board.required_firmware.clone(),
        tick_interval: config.tick_interval(),
        max_ticks: config.runtime.max_ticks,
    };
    // No stop request: a session ends at the tick limit or when the board drops.
    let no_shutdown = AtomicBool::new(false);

    let mut reconnects = 0;
    loop {
        match run_connection(&mut manager, Arc::new(board.clone()), &options, &no_shutdown) {
            Ok(summary) => match summary.end {
                SessionEnd::TickLimit => {
                    info!(
                        "Tracking finished after {} ticks ({} failed phases)",
                        summary.ticks, summary.failed_phases
                    );
                    return Ok(());
                }
                SessionEnd::Shutdown => return Ok(()),
                SessionEnd::Incompatible => {
                    anyhow::bail!(
                        "board {} runs firmware {}, {} required",
                        config.board.name,
                        config.board.firmware_version,
                        config.board.required_firmware
                    );
                }
                SessionEnd::ConnectionLost(reason) => {
                    warn!("Connection lost after {} ticks: {}", summary.ticks, reason);
                }
            },
            Err(e) if e.is_connection_fault() => warn!("Setup failed: {}", e),
            Err(e) => return Err(e.into()),
        }

        reconnects += 1;
        if reconnects > config.runtime.max_reconnects {
            anyhow::bail!("giving up after {} reconnect attempts", config.runtime.max_reconnects);
        }
        info!("Reconnecting in {:?}...", config.reconnect_delay());
        thread::sleep(config.reconnect_delay());
    }
}
