use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent, KeyEventKind};

use crate::api::ApiResponse;

/// Unified event type consumed by the app runner
#[derive(Debug)]
pub enum StudyEvent {
    Key(KeyEvent),
    Paste(String),
    Resize,
    /// The terminal lost focus; treated as a possible interruption.
    FocusLost,
    Api(ApiResponse),
    Tick,
}

impl From<ApiResponse> for StudyEvent {
    fn from(response: ApiResponse) -> Self {
        StudyEvent::Api(response)
    }
}

/// Source of terminal events and request replies
pub trait StudyEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<StudyEvent, RecvTimeoutError>;
}

/// Production event source using crossterm. The channel is shared with the
/// request worker so replies arrive on the same queue as keys.
pub struct CrosstermEventSource {
    tx: Sender<StudyEvent>,
    rx: Receiver<StudyEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        let input = tx.clone();

        std::thread::spawn(move || loop {
            let ev = match event::read() {
                Ok(CtEvent::Key(key)) if key.kind != KeyEventKind::Release => StudyEvent::Key(key),
                Ok(CtEvent::Paste(text)) => StudyEvent::Paste(text),
                Ok(CtEvent::Resize(_, _)) => StudyEvent::Resize,
                Ok(CtEvent::FocusLost) => StudyEvent::FocusLost,
                Ok(_) => continue,
                Err(_) => break,
            };
            if input.send(ev).is_err() {
                break;
            }
        });

        Self { tx, rx }
    }

    /// Handle for other producers, e.g. the request worker.
    pub fn sender(&self) -> Sender<StudyEvent> {
        self.tx.clone()
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl StudyEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<StudyEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Event source fed by a plain channel, for tests
pub struct TestEventSource {
    rx: Receiver<StudyEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<StudyEvent>) -> Self {
        Self { rx }
    }
}

impl StudyEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<StudyEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Runner that advances the application one event/tick at a time
pub struct Runner<E: StudyEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: StudyEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Blocks up to tick interval and returns the next event, or Tick on timeout
    pub fn step(&self) -> StudyEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => StudyEvent::Tick,
        }
    }
}
