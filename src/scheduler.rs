use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::state::{Action, Delta};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(20);
const POLL_GRANULARITY: Duration = Duration::from_millis(250);

pub trait Clock: Send + 'static {
    fn now(&self) -> Instant;
    fn sleep(&self, dur: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, dur: Duration) {
        thread::sleep(dur);
    }
}

/// Clock that only moves when told to. `sleep` advances it instead of blocking.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, dur: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard += dur;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn sleep(&self, dur: Duration) {
        self.advance(dur);
        thread::yield_now();
    }
}

/// Fires at most once per poll; a late poll does not replay missed beats.
#[derive(Debug, Clone)]
pub struct Ticker {
    interval: Duration,
    next_due: Instant,
}

impl Ticker {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next_due: now + interval,
        }
    }

    pub fn poll(&mut self, now: Instant) -> bool {
        if now < self.next_due {
            return false;
        }
        self.next_due = now + self.interval;
        true
    }
}

/// Running simulation feed. Stopping or dropping the handle cancels the timer
/// and joins its thread.
pub struct SchedulerHandle {
    stop: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn toggle_pause(&self) -> bool {
        let paused = !self.paused.load(Ordering::SeqCst);
        self.paused.store(paused, Ordering::SeqCst);
        paused
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("scenario scheduler thread panicked");
            }
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Sends `Action::SimulateTick` every `interval`. The scheduler never touches
/// game state itself; the receiving writer applies each tick to whatever state
/// is current when the message is processed.
pub fn spawn_scheduler<C: Clock>(
    tx: Sender<Delta>,
    interval: Duration,
    clock: C,
) -> SchedulerHandle {
    let stop = Arc::new(AtomicBool::new(false));
    let paused = Arc::new(AtomicBool::new(false));
    let thread_stop = Arc::clone(&stop);
    let thread_paused = Arc::clone(&paused);
    let step = POLL_GRANULARITY.min(interval);

    let thread = thread::spawn(move || {
        let mut ticker = Ticker::new(interval, clock.now());
        tracing::info!(interval_secs = interval.as_secs_f64(), "scenario scheduler started");
        while !thread_stop.load(Ordering::SeqCst) {
            clock.sleep(step);
            if thread_stop.load(Ordering::SeqCst) {
                break;
            }
            if !ticker.poll(clock.now()) || thread_paused.load(Ordering::SeqCst) {
                continue;
            }
            tracing::debug!("scenario tick");
            if tx.send(Delta::Dispatch(Action::SimulateTick)).is_err() {
                break;
            }
        }
        tracing::info!("scenario scheduler stopped");
    });

    SchedulerHandle {
        stop,
        paused,
        thread: Some(thread),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_fires_once_per_elapsed_interval() {
        let clock = ManualClock::new();
        let mut ticker = Ticker::new(Duration::from_secs(20), clock.now());
        let mut fired = 0;
        for _ in 0..(3 * 20 * 4) {
            clock.advance(Duration::from_millis(250));
            if ticker.poll(clock.now()) {
                fired += 1;
            }
        }
        assert_eq!(fired, 3);
    }

    #[test]
    fn late_poll_does_not_burst() {
        let clock = ManualClock::new();
        let mut ticker = Ticker::new(Duration::from_secs(5), clock.now());
        clock.advance(Duration::from_secs(60));
        assert!(ticker.poll(clock.now()));
        assert!(!ticker.poll(clock.now()));
    }

    #[test]
    fn toggle_pause_flips_state() {
        let (tx, _rx) = std::sync::mpsc::channel();
        let handle = spawn_scheduler(tx, Duration::from_secs(3600), ManualClock::new());
        assert!(!handle.is_paused());
        assert!(handle.toggle_pause());
        assert!(handle.is_paused());
        handle.resume();
        assert!(!handle.is_paused());
        handle.stop();
    }
}
