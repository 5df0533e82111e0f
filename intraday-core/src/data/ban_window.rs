//! Shared ban window for provider rate limiting.
//!
//! When any worker sees a transport failure or a malformed payload, it bans the
//! provider for a fixed interval. Every worker checks the window before
//! dispatching, so one failure pauses all new requests until it elapses.
//!
//! The resume timestamp lives behind a single mutex. Reads (before dispatch) and
//! writes (on failure) both take it, and a new ban only ever moves the resume
//! time forward to `now + duration`, so simultaneous failures never stack.
//!
//! The lock is not held across the transport call. A worker re-reads the window
//! right before dispatch, but a ban set after that read and before the call goes
//! out does not stop the call.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct BanWindow {
    resume_at: Mutex<Option<Instant>>,
    duration: Duration,
}

impl BanWindow {
    /// Create a window that bans for `duration` on every failure.
    pub fn new(duration: Duration) -> Self {
        Self {
            resume_at: Mutex::new(None),
            duration,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    // An Instant cannot be left half-written, so a poisoned lock is still usable.
    fn state(&self) -> MutexGuard<'_, Option<Instant>> {
        self.resume_at.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ban new requests until `now + duration`. Returns the resulting resume time.
    pub fn ban(&self) -> Instant {
        self.ban_for(self.duration)
    }

    /// Ban for an explicit duration. Never shortens an existing ban.
    pub fn ban_for(&self, duration: Duration) -> Instant {
        let candidate = Instant::now() + duration;
        let mut resume_at = self.state();
        let resume = match *resume_at {
            Some(existing) if existing > candidate => existing,
            _ => candidate,
        };
        *resume_at = Some(resume);
        resume
    }

    /// Time left before requests may resume (zero if not banned).
    pub fn remaining(&self) -> Duration {
        match *self.state() {
            Some(resume) => resume.saturating_duration_since(Instant::now()),
            None => Duration::ZERO,
        }
    }

    pub fn is_clear(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Current resume timestamp, if a ban was ever set.
    pub fn resume_at(&self) -> Option<Instant> {
        *self.state()
    }

    /// Block until the window is clear. Returns the total time spent waiting.
    ///
    /// Re-checks after every sleep, since another worker may have extended the
    /// ban in the meantime.
    pub fn wait_until_clear(&self) -> Duration {
        let mut waited = Duration::ZERO;
        loop {
            let remaining = self.remaining();
            if remaining.is_zero() {
                return waited;
            }
            thread::sleep(remaining);
            waited += remaining;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn starts_clear() {
        let window = BanWindow::new(Duration::from_secs(60));
        assert!(window.is_clear());
        assert_eq!(window.remaining(), Duration::ZERO);
        assert!(window.resume_at().is_none());
    }

    #[test]
    fn ban_blocks_until_duration_elapses() {
        let window = BanWindow::new(Duration::from_millis(30));
        window.ban();
        assert!(!window.is_clear());
        let waited = window.wait_until_clear();
        assert!(waited > Duration::ZERO);
        assert!(window.is_clear());
    }

    #[test]
    fn ban_never_shortens_existing_window() {
        let window = BanWindow::new(Duration::from_millis(10));
        let long = window.ban_for(Duration::from_secs(60));
        let short = window.ban();
        assert_eq!(long, short);
        assert!(window.remaining() > Duration::from_secs(50));
    }

    #[test]
    fn concurrent_bans_do_not_stack() {
        let window = Arc::new(BanWindow::new(Duration::from_millis(200)));
        let before = Instant::now();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let w = Arc::clone(&window);
                thread::spawn(move || w.ban())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let resume = window.resume_at().unwrap();
        // Eight bans of 200ms must not push resume out to 1.6s.
        assert!(resume <= Instant::now() + Duration::from_millis(200));
        assert!(resume >= before + Duration::from_millis(200));
    }

    #[test]
    fn expires_after_duration() {
        let window = BanWindow::new(Duration::from_millis(10));
        window.ban();
        thread::sleep(Duration::from_millis(15));
        assert!(window.is_clear());
    }
}
