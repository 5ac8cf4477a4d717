use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use board::{Board, BoardError};

/// A validated, immutable sample produced by a sensor.
pub trait Reading: Clone + fmt::Debug + Send + Sync + 'static {
    const KIND: &'static str;

    /// Monotonic per physical sample; a sample is delivered at most once.
    fn sequence(&self) -> u64;

    /// Partially acquired or low-confidence samples are never delivered.
    fn is_valid(&self) -> bool;
}

/// The acquisition protocol of one physical sensor.
pub trait SensorSource<R>: Send {
    fn open(&mut self, board: &dyn Board) -> Result<(), BoardError>;

    /// Polls the sensor; `Ok(None)` while no new sample is available.
    fn acquire(&mut self) -> Result<Option<R>, BoardError>;
}

/// Receives each new reading. Called from the reader's worker thread.
pub trait SensorDelegate<R>: Send + Sync {
    fn reading_ready(&self, reading: R);
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SensorError {
    #[error("connection fault: board transport lost")]
    ConnectionFault,

    #[error("operation interrupted while waiting on the board")]
    OperationInterrupted,

    #[error("{0} reader already started")]
    AlreadyStarted(&'static str),

    #[error("hardware error: {0}")]
    Hardware(BoardError),

    #[error("failed to start reader thread: {0}")]
    Spawn(String),
}

impl From<BoardError> for SensorError {
    fn from(error: BoardError) -> Self {
        match error {
            BoardError::ConnectionLost => SensorError::ConnectionFault,
            BoardError::Interrupted => SensorError::OperationInterrupted,
            other => SensorError::Hardware(other),
        }
    }
}

impl SensorError {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SensorError::ConnectionFault | SensorError::OperationInterrupted
        )
    }
}

/// Runs a sensor's acquisition on its own thread and hands every new valid
/// reading to a single delegate.
pub struct SensorReader<R: Reading> {
    source: Option<Box<dyn SensorSource<R>>>,
    delegate: Arc<dyn SensorDelegate<R>>,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl<R: Reading> SensorReader<R> {
    pub fn new(
        source: Box<dyn SensorSource<R>>,
        delegate: Arc<dyn SensorDelegate<R>>,
        poll_interval: Duration,
    ) -> Self {
        SensorReader {
            source: Some(source),
            delegate,
            poll_interval,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Opens the sensor on `board` and starts acquisition.
    pub fn initialize(&mut self, board: &dyn Board) -> Result<(), SensorError> {
        let mut source = self
            .source
            .take()
            .ok_or(SensorError::AlreadyStarted(R::KIND))?;
        source.open(board)?;

        self.running.store(true, Ordering::Release);
        let running = self.running.clone();
        let delegate = self.delegate.clone();
        let interval = self.poll_interval;

        let worker = thread::Builder::new()
            .name(format!("{}-reader", R::KIND))
            .spawn(move || acquisition_loop(source, delegate, running, interval))
            .map_err(|e| {
                self.running.store(false, Ordering::Release);
                SensorError::Spawn(e.to_string())
            })?;
        self.worker = Some(worker);
        log::info!("{} reader started", R::KIND);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stops acquisition and waits for the worker to finish.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("{} reader thread panicked", R::KIND);
            }
            log::info!("{} reader stopped", R::KIND);
        }
    }
}

impl<R: Reading> Drop for SensorReader<R> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn acquisition_loop<R: Reading>(
    mut source: Box<dyn SensorSource<R>>,
    delegate: Arc<dyn SensorDelegate<R>>,
    running: Arc<AtomicBool>,
    interval: Duration,
) {
    let mut last_sequence: Option<u64> = None;

    while running.load(Ordering::Acquire) {
        match source.acquire() {
            Ok(Some(reading)) => {
                let sequence = reading.sequence();
                if !reading.is_valid() {
                    log::debug!("Discarding unconfirmed {} sample {}", R::KIND, sequence);
                } else if last_sequence.is_some_and(|last| sequence <= last) {
                    log::debug!("Skipping already delivered {} sample {}", R::KIND, sequence);
                } else {
                    last_sequence = Some(sequence);
                    log::debug!("New {} reading: {:?}", R::KIND, reading);
                    delegate.reading_ready(reading);
                }
            }
            Ok(None) => {}
            Err(e) => {
                log::error!("{} acquisition stopped: {}", R::KIND, e);
                break;
            }
        }
        thread::sleep(interval);
    }

    running.store(false, Ordering::Release);
}
