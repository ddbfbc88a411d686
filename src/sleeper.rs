//! Abstraction for waiting between delivery attempts.
//!
//! Retries run on the producer's thread, so sleeping is blocking. Tests inject
//! [`InstantSleeper`] or [`TrackingSleeper`] to avoid real delays.

use std::sync::{Arc, Mutex};
use std::time::Duration;

pub trait Sleeper: Send + Sync + std::fmt::Debug {
    fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Test sleeper that returns immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct InstantSleeper;

impl Sleeper for InstantSleeper {
    fn sleep(&self, _duration: Duration) {}
}

/// Test sleeper that records every requested delay.
#[derive(Debug, Clone, Default)]
pub struct TrackingSleeper {
    calls: Arc<Mutex<Vec<Duration>>>,
}

impl TrackingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Duration> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl Sleeper for TrackingSleeper {
    fn sleep(&self, duration: Duration) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn instant_sleeper_doesnt_sleep() {
        let start = Instant::now();
        InstantSleeper.sleep(Duration::from_secs(10));
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn tracking_sleeper_records_calls() {
        let sleeper = TrackingSleeper::new();
        sleeper.sleep(Duration::from_millis(100));
        sleeper.sleep(Duration::from_millis(200));
        assert_eq!(sleeper.calls(), vec![Duration::from_millis(100), Duration::from_millis(200)]);
        sleeper.clear();
        assert!(sleeper.calls().is_empty());
    }

    #[test]
    fn thread_sleeper_actually_sleeps() {
        let start = Instant::now();
        ThreadSleeper.sleep(Duration::from_millis(30));
        assert!(start.elapsed() >= Duration::from_millis(25));
    }
}
