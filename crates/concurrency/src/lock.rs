//! Resource lock serializing commands against the shared database.
//!
//! The lock is observed as one of three states ([`LockState`]) but is kept as
//! a reader count plus a writer flag, so that one reader finishing never
//! frees the resource while another reader is still active.
//!
//! ## Admission rules
//!
//! ```text
//! read  intent: wait while a writer is active
//! write intent: wait while a writer is active, then until no reader is active
//! ```
//!
//! Admission and entry happen under one mutex, so two waiters that wake at
//! the same time cannot both enter as writers.
//!
//! The lock is only ever held through a [`LockGuard`]. Dropping the guard
//! releases it, which covers every exit path of the code holding it,
//! including unwinding.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use keystone_core::{Error, LockSettings, LockWait, Result};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Observable state of the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LockState {
    /// No command holds the lock.
    Free = 0,
    /// At least one reading command holds the lock.
    Read = 1,
    /// An updating command holds the lock exclusively.
    Write = 2,
}

/// What a command intends to do while holding the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockIntent {
    /// Shared access.
    Read,
    /// Exclusive access.
    Write,
}

impl LockIntent {
    /// Intent for a command that does or does not mutate the resource.
    pub fn for_update(mutates: bool) -> Self {
        if mutates {
            LockIntent::Write
        } else {
            LockIntent::Read
        }
    }

    /// Returns `true` if a guard held with `self` also covers `other`.
    pub fn covers(&self, other: LockIntent) -> bool {
        matches!(
            (self, other),
            (LockIntent::Write, _) | (LockIntent::Read, LockIntent::Read)
        )
    }
}

impl fmt::Display for LockIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockIntent::Read => f.write_str("read"),
            LockIntent::Write => f.write_str("write"),
        }
    }
}

/// How [`ResourceLock::acquire`] waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Blocking (condition variable) or polling.
    pub wait: LockWait,
    /// Sleep between checks when polling.
    pub poll_interval: Duration,
    /// Give up after this long. `None` waits until the lock is available.
    pub timeout: Option<Duration>,
}

impl WaitPolicy {
    /// Block on the condition variable without a timeout.
    pub fn blocking() -> Self {
        Self {
            wait: LockWait::Blocking,
            poll_interval: Duration::from_millis(keystone_core::config::DEFAULT_POLL_INTERVAL_MS),
            timeout: None,
        }
    }

    /// Sleep-and-recheck at `interval` without a timeout.
    pub fn polling(interval: Duration) -> Self {
        Self {
            wait: LockWait::Polling,
            poll_interval: interval,
            timeout: None,
        }
    }

    /// Give up waiting after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::blocking()
    }
}

impl From<&LockSettings> for WaitPolicy {
    fn from(settings: &LockSettings) -> Self {
        Self {
            wait: settings.wait,
            poll_interval: settings.poll_interval(),
            timeout: settings.timeout(),
        }
    }
}

#[derive(Debug, Default)]
struct Gate {
    readers: usize,
    writer: bool,
}

impl Gate {
    fn admits(&self, intent: LockIntent) -> bool {
        match intent {
            LockIntent::Read => !self.writer,
            LockIntent::Write => !self.writer && self.readers == 0,
        }
    }

    fn enter(&mut self, intent: LockIntent) {
        match intent {
            LockIntent::Read => self.readers += 1,
            LockIntent::Write => self.writer = true,
        }
    }

    fn leave(&mut self, intent: LockIntent) {
        match intent {
            LockIntent::Read => {
                debug_assert!(self.readers > 0, "read guard released twice");
                self.readers = self.readers.saturating_sub(1);
            }
            LockIntent::Write => {
                debug_assert!(self.writer, "write guard released twice");
                self.writer = false;
            }
        }
    }

    fn state(&self) -> LockState {
        if self.writer {
            LockState::Write
        } else if self.readers > 0 {
            LockState::Read
        } else {
            LockState::Free
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    gate: Mutex<Gate>,
    released: Condvar,
}

/// Lock attached to a shared database resource.
///
/// Cloning yields another handle to the same lock.
#[derive(Debug, Clone, Default)]
pub struct ResourceLock {
    inner: Arc<Inner>,
}

impl ResourceLock {
    /// Create a free lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> LockState {
        self.inner.gate.lock().state()
    }

    /// Number of active readers.
    pub fn readers(&self) -> usize {
        self.inner.gate.lock().readers
    }

    /// Returns `true` if nobody holds the lock.
    pub fn is_free(&self) -> bool {
        self.state() == LockState::Free
    }

    /// Acquire the lock, waiting according to `policy`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockTimeout`] if `policy` has a timeout and the lock
    /// did not become available in time. The lock is untouched in that case.
    pub fn acquire(&self, intent: LockIntent, policy: &WaitPolicy) -> Result<LockGuard> {
        let started = Instant::now();
        let deadline = policy.timeout.map(|t| started + t);

        match policy.wait {
            LockWait::Blocking => self.acquire_blocking(intent, started, deadline)?,
            LockWait::Polling => {
                self.acquire_polling(intent, policy.poll_interval, started, deadline)?
            }
        }

        trace!(%intent, waited_us = started.elapsed().as_micros() as u64, "lock acquired");
        Ok(LockGuard {
            inner: Arc::clone(&self.inner),
            intent,
            active: true,
        })
    }

    /// Acquire the lock only if it is available right now.
    pub fn try_acquire(&self, intent: LockIntent) -> Option<LockGuard> {
        let mut gate = self.inner.gate.lock();
        if !gate.admits(intent) {
            return None;
        }
        gate.enter(intent);
        drop(gate);
        trace!(%intent, "lock acquired");
        Some(LockGuard {
            inner: Arc::clone(&self.inner),
            intent,
            active: true,
        })
    }

    fn acquire_blocking(
        &self,
        intent: LockIntent,
        started: Instant,
        deadline: Option<Instant>,
    ) -> Result<()> {
        let mut gate = self.inner.gate.lock();
        while !gate.admits(intent) {
            match deadline {
                Some(deadline) => {
                    let timed_out = self.inner.released.wait_until(&mut gate, deadline).timed_out();
                    if timed_out && !gate.admits(intent) {
                        return Err(timeout_error(intent, started));
                    }
                }
                None => self.inner.released.wait(&mut gate),
            }
        }
        gate.enter(intent);
        Ok(())
    }

    fn acquire_polling(
        &self,
        intent: LockIntent,
        interval: Duration,
        started: Instant,
        deadline: Option<Instant>,
    ) -> Result<()> {
        loop {
            {
                let mut gate = self.inner.gate.lock();
                if gate.admits(intent) {
                    gate.enter(intent);
                    return Ok(());
                }
            }
            let sleep = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(timeout_error(intent, started));
                    }
                    interval.min(deadline - now)
                }
                None => interval,
            };
            std::thread::sleep(sleep);
        }
    }
}

fn timeout_error(intent: LockIntent, started: Instant) -> Error {
    Error::LockTimeout {
        intent: intent.to_string(),
        waited_ms: started.elapsed().as_millis() as u64,
    }
}

/// Proof of holding the resource lock. Releases on drop.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard {
    inner: Arc<Inner>,
    intent: LockIntent,
    active: bool,
}

impl LockGuard {
    /// Intent the lock was acquired with.
    pub fn intent(&self) -> LockIntent {
        self.intent
    }

    /// Returns `true` if this guard also covers `intent`.
    pub fn covers(&self, intent: LockIntent) -> bool {
        self.intent.covers(intent)
    }

    /// Release the lock now.
    pub fn release(mut self) {
        self.unlock();
    }

    fn unlock(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.inner.gate.lock().leave(self.intent);
        self.inner.released.notify_all();
        trace!(intent = %self.intent, "lock released");
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.unlock();
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("intent", &self.intent)
            .field("active", &self.active)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_transitions() {
        let lock = ResourceLock::new();
        assert_eq!(lock.state(), LockState::Free);
        let guard = lock.acquire(LockIntent::Read, &WaitPolicy::blocking()).unwrap();
        assert_eq!(lock.state(), LockState::Read);
        drop(guard);
        assert_eq!(lock.state(), LockState::Free);
    }

    #[test]
    fn test_readers_stack() {
        let lock = ResourceLock::new();
        let a = lock.try_acquire(LockIntent::Read).unwrap();
        let b = lock.try_acquire(LockIntent::Read).unwrap();
        assert_eq!(lock.readers(), 2);
        a.release();
        // One reader left: still busy, writers stay out
        assert_eq!(lock.state(), LockState::Read);
        assert!(lock.try_acquire(LockIntent::Write).is_none());
        b.release();
        assert!(lock.is_free());
    }

    #[test]
    fn test_writer_excludes_everyone() {
        let lock = ResourceLock::new();
        let w = lock.try_acquire(LockIntent::Write).unwrap();
        assert_eq!(lock.state(), LockState::Write);
        assert!(lock.try_acquire(LockIntent::Read).is_none());
        assert!(lock.try_acquire(LockIntent::Write).is_none());
        drop(w);
        assert!(lock.try_acquire(LockIntent::Write).is_some());
        assert!(lock.is_free());
    }

    #[test]
    fn test_timeout_leaves_lock_untouched() {
        let lock = ResourceLock::new();
        let _w = lock.try_acquire(LockIntent::Write).unwrap();
        let policy = WaitPolicy::blocking().with_timeout(Duration::from_millis(20));
        let err = lock.acquire(LockIntent::Read, &policy).unwrap_err();
        match err {
            Error::LockTimeout { intent, waited_ms } => {
                assert_eq!(intent, "read");
                assert!(waited_ms >= 20);
            }
            other => panic!("expected LockTimeout, got {:?}", other),
        }
        assert_eq!(lock.state(), LockState::Write);
        assert_eq!(lock.readers(), 0);
    }

    #[test]
    fn test_polling_timeout() {
        let lock = ResourceLock::new();
        let _r = lock.try_acquire(LockIntent::Read).unwrap();
        let policy =
            WaitPolicy::polling(Duration::from_millis(5)).with_timeout(Duration::from_millis(30));
        assert!(matches!(
            lock.acquire(LockIntent::Write, &policy),
            Err(Error::LockTimeout { .. })
        ));
        assert_eq!(lock.state(), LockState::Read);
    }

    #[test]
    fn test_guard_released_on_unwind() {
        let lock = ResourceLock::new();
        let handle = lock.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _g = handle.try_acquire(LockIntent::Write).unwrap();
            panic!("boom");
        }));
        assert!(result.is_err());
        assert!(lock.is_free());
    }

    #[test]
    fn test_covers() {
        assert!(LockIntent::Write.covers(LockIntent::Read));
        assert!(LockIntent::Write.covers(LockIntent::Write));
        assert!(LockIntent::Read.covers(LockIntent::Read));
        assert!(!LockIntent::Read.covers(LockIntent::Write));
    }

    #[test]
    fn test_policy_from_settings() {
        let settings = LockSettings {
            wait: LockWait::Polling,
            poll_interval_ms: 7,
            timeout_ms: Some(100),
        };
        let policy = WaitPolicy::from(&settings);
        assert_eq!(policy.wait, LockWait::Polling);
        assert_eq!(policy.poll_interval, Duration::from_millis(7));
        assert_eq!(policy.timeout, Some(Duration::from_millis(100)));
    }
}
