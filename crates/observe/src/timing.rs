//! Scoped wall-clock timing.
//!
//! A [`Timing`] holder is created first and outlives the measured work. Calling
//! [`Timing::start`] returns a [`TimerGuard`]; when the guard is dropped the
//! elapsed time is written into the holder under [`LATENCY_KEY`]. The write
//! happens on every exit path, including `?` early returns and unwinding
//! panics, and it happens exactly once per guard.
//!
//! ```rust
//! use observe::Timing;
//!
//! fn fetch() -> Result<u8, String> {
//!     Err("boom".to_string())
//! }
//!
//! fn work(timing: &Timing) -> Result<(), String> {
//!     let guard = timing.start();
//!     guard.record("pages", 3);
//!     fetch()?;
//!     Ok(())
//! }
//!
//! let timing = Timing::new();
//! assert!(work(&timing).is_err());
//! assert!(timing.latency_ms().is_some());
//! assert_eq!(timing.get("pages"), Some(3));
//! ```
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

/// Key the guard writes the elapsed milliseconds under.
pub const LATENCY_KEY: &str = "latency_ms";

#[derive(Debug, Default)]
pub struct Timing {
    metrics: Mutex<BTreeMap<String, u64>>,
}

impl Timing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a timed scope.
    pub fn start(&self) -> TimerGuard<'_> {
        TimerGuard {
            timing: self,
            started: Instant::now(),
        }
    }

    /// Elapsed milliseconds of the last completed scope.
    pub fn latency_ms(&self) -> Option<u64> {
        self.get(LATENCY_KEY)
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.lock().get(name).copied()
    }

    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.lock().clone()
    }

    fn insert(&self, name: &str, value: u64) {
        self.lock().insert(name.to_string(), value);
    }

    // A panic inside a scope must not stop the guard from writing.
    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, u64>> {
        self.metrics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Live timing scope. Dropping it records the elapsed time.
#[must_use = "the scope ends as soon as the guard is dropped"]
#[derive(Debug)]
pub struct TimerGuard<'a> {
    timing: &'a Timing,
    started: Instant,
}

impl TimerGuard<'_> {
    /// Store a caller-defined metric alongside the latency.
    pub fn record(&self, name: &str, value: u64) {
        self.timing.insert(name, value);
    }

    /// Milliseconds since the scope started, without ending it.
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        let elapsed = self.elapsed_ms();
        self.timing.insert(LATENCY_KEY, elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn latency_is_absent_during_scope_and_present_after() {
        let timing = Timing::new();
        {
            let _guard = timing.start();
            assert_eq!(timing.latency_ms(), None);
            assert!(timing.snapshot().is_empty());
            sleep(Duration::from_millis(5));
        }
        let snapshot = timing.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot[LATENCY_KEY] >= 5);
    }

    #[test]
    fn error_exit_still_records() {
        fn failing(timing: &Timing) -> Result<(), &'static str> {
            let _guard = timing.start();
            Err("provider down")
        }

        let timing = Timing::new();
        assert_eq!(failing(&timing), Err("provider down"));
        assert!(timing.latency_ms().is_some());
    }

    #[test]
    fn panic_exit_still_records_and_panic_propagates() {
        let timing = Timing::new();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let _guard = timing.start();
            panic!("unexpected");
        }));
        assert!(outcome.is_err());
        assert!(timing.latency_ms().is_some());
    }

    #[test]
    fn nested_outer_is_at_least_inner() {
        let outer = Timing::new();
        let inner = Timing::new();
        {
            let _o = outer.start();
            {
                let _i = inner.start();
                sleep(Duration::from_millis(3));
            }
            sleep(Duration::from_millis(1));
        }
        assert!(outer.latency_ms().unwrap() >= inner.latency_ms().unwrap());
    }

    #[test]
    fn sequential_scopes_do_not_interfere() {
        let first = Timing::new();
        let second = Timing::new();
        {
            let _g = first.start();
            sleep(Duration::from_millis(10));
        }
        let first_latency = first.latency_ms().unwrap();
        {
            let _g = second.start();
        }
        assert_eq!(first.latency_ms(), Some(first_latency));
        assert!(second.latency_ms().unwrap() < first_latency + 1_000);
        assert_eq!(second.snapshot().len(), 1);
    }

    #[test]
    fn custom_keys_survive_next_to_latency() {
        let timing = Timing::new();
        {
            let guard = timing.start();
            guard.record("total_input_bytes", 2048);
            guard.record("pages", 2);
        }
        let snapshot = timing.snapshot();
        assert_eq!(snapshot.get("total_input_bytes"), Some(&2048));
        assert_eq!(snapshot.get("pages"), Some(&2));
        assert!(snapshot.contains_key(LATENCY_KEY));
    }
}
