//! Hosting side of a board connection: compatibility check, setup, and the
//! tick loop until the connection drops or the host stops it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use board::{Board, BoardInfo};
use semver::VersionReq;

use crate::error::SystemError;
use crate::manager::SystemManager;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub required_firmware: VersionReq,
    pub tick_interval: Duration,
    /// `None` runs until the connection drops or shutdown is requested.
    pub max_ticks: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The board failed the firmware check; setup never ran.
    Incompatible,
    /// The transport failed mid-session.
    ConnectionLost(String),
    TickLimit,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub end: SessionEnd,
    pub ticks: u64,
    /// Ticks that returned an error other than a connection fault.
    pub aborted_ticks: u64,
    /// Phases reported as failed across all completed ticks.
    pub failed_phases: u64,
}

impl SessionSummary {
    fn new(end: SessionEnd) -> Self {
        SessionSummary {
            end,
            ticks: 0,
            aborted_ticks: 0,
            failed_phases: 0,
        }
    }
}

pub fn check_firmware(board: &BoardInfo, required: &VersionReq) -> Result<(), SystemError> {
    if required.matches(&board.firmware) {
        Ok(())
    } else {
        Err(SystemError::Incompatible {
            found: board.firmware.clone(),
            required: required.clone(),
        })
    }
}

/// Runs one connection to `board` to completion.
///
/// Errors from setup are returned as-is after the manager has been told the
/// board is gone when they were connection faults. Connection faults during
/// a tick end the session normally with [`SessionEnd::ConnectionLost`].
pub fn run_connection(
    manager: &mut SystemManager,
    board: Arc<dyn Board>,
    options: &SessionOptions,
    shutdown: &AtomicBool,
) -> Result<SessionSummary, SystemError> {
    let info = board.info();
    if let Err(e) = check_firmware(&info, &options.required_firmware) {
        log::error!("{}: {}", info.name, e);
        manager.on_incompatible_board(&info);
        return Ok(SessionSummary::new(SessionEnd::Incompatible));
    }

    if let Err(e) = manager.on_connect(board) {
        log::error!("Setup failed: {}", e);
        if e.is_connection_fault() {
            manager.on_disconnect();
        }
        return Err(e);
    }

    let mut summary = SessionSummary::new(SessionEnd::Shutdown);
    loop {
        if shutdown.load(Ordering::Acquire) {
            log::info!("Shutdown requested");
            summary.end = SessionEnd::Shutdown;
            break;
        }
        if options.max_ticks.is_some_and(|max| summary.ticks >= max) {
            log::info!("Tick limit of {} reached", summary.ticks);
            summary.end = SessionEnd::TickLimit;
            break;
        }

        summary.ticks += 1;
        match manager.on_loop_tick() {
            Ok(report) => summary.failed_phases += report.failures() as u64,
            Err(e) if e.is_connection_fault() => {
                log::error!("Connection lost: {}", e);
                manager.on_disconnect();
                summary.end = SessionEnd::ConnectionLost(e.to_string());
                return Ok(summary);
            }
            Err(e) => {
                log::warn!("Tick {} aborted: {}", summary.ticks, e);
                summary.aborted_ticks += 1;
            }
        }

        if !options.tick_interval.is_zero() {
            thread::sleep(options.tick_interval);
        }
    }

    manager.on_disconnect();
    log::info!(
        "Session ended after {} ticks ({} aborted, {} failed phases)",
        summary.ticks,
        summary.aborted_ticks,
        summary.failed_phases
    );
    Ok(summary)
}
