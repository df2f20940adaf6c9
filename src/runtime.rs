use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent};

use crate::session::Phase;

/// Unified event type consumed by the app runner
#[derive(Clone, Debug)]
pub enum Event {
    Key(KeyEvent),
    Resize,
    Tick,
}

/// Source of terminal events (keyboard, resize, etc.)
pub trait EventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<Event, RecvTimeoutError>;
}

/// Production event source using crossterm
pub struct CrosstermEventSource {
    rx: Receiver<Event>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            match event::read() {
                Ok(CtEvent::Key(key)) => {
                    if tx.send(Event::Key(key)).is_err() {
                        break;
                    }
                }
                Ok(CtEvent::Resize(_, _)) => {
                    if tx.send(Event::Resize).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<Event, RecvTimeoutError> {
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

/// Test event source for unit tests
pub struct TestEventSource {
    rx: Receiver<Event>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<Event>) -> Self {
        Self { rx }
    }
}

impl EventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<Event, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Runner that advances the application one event/tick at a time
pub struct Runner<E: EventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: EventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Blocks up to tick interval and returns the next event, or Tick on timeout
    pub fn step(&self) -> Event {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => Event::Tick,
        }
    }
}

/// Period of the memorize countdown.
pub const COUNTDOWN_INTERVAL: Duration = Duration::from_secs(1);
/// Period of the elapsed-time ticks.
pub const ELAPSED_INTERVAL: Duration = Duration::from_millis(crate::elapsed::ELAPSED_QUANTUM_MS);

/// A scheduled callback that came due.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerFire {
    Countdown,
    MemorizeElapsed,
    GuessElapsed,
}

/// Cancellable deadlines driven by the session phase.
///
/// The host calls [`Timers::sync`] after every state change and [`Timers::due`]
/// on every loop iteration. Stale deadlines are dropped whenever the phase or
/// the remaining countdown changes, so a fire never outlives its phase.
#[derive(Debug, Default)]
pub struct Timers {
    phase: Option<Phase>,
    timer_remaining: u32,
    countdown: Option<Instant>,
    memorize: Option<Instant>,
    guess: Option<Instant>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sync(&mut self, phase: Phase, timer_remaining: u32, now: Instant) {
        let phase_changed = self.phase != Some(phase);
        if !phase_changed && self.timer_remaining == timer_remaining {
            return;
        }

        self.countdown =
            (phase == Phase::Showing && timer_remaining > 0).then(|| now + COUNTDOWN_INTERVAL);
        if phase_changed {
            self.memorize = (phase == Phase::Showing).then(|| now + ELAPSED_INTERVAL);
            self.guess = (phase == Phase::Input).then(|| now + ELAPSED_INTERVAL);
        }

        self.phase = Some(phase);
        self.timer_remaining = timer_remaining;
    }

    /// Drain every deadline at or before `now`, earliest first.
    ///
    /// The countdown is one-shot and re-armed by the next `sync`; elapsed ticks
    /// repeat and catch up if the host fell behind.
    pub fn due(&mut self, now: Instant) -> Vec<TimerFire> {
        let mut fired: Vec<(Instant, TimerFire)> = Vec::new();

        for (slot, fire) in [
            (&mut self.memorize, TimerFire::MemorizeElapsed),
            (&mut self.guess, TimerFire::GuessElapsed),
        ] {
            while let Some(at) = slot.filter(|&at| at <= now) {
                fired.push((at, fire));
                *slot = Some(at + ELAPSED_INTERVAL);
            }
        }
        // on a tie the elapsed ticks fire first
        if let Some(at) = self.countdown.filter(|&at| at <= now) {
            fired.push((at, TimerFire::Countdown));
            self.countdown = None;
        }

        fired.sort_by_key(|&(at, _)| at);
        fired.into_iter().map(|(_, fire)| fire).collect()
    }

    pub fn cancel_all(&mut self) {
        *self = Self::default();
    }
}
