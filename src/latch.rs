//! One-shot gate between the page load event and the pipeline.
//!
//! The pipeline worker arms a [`PageReadyLatch`] before replacing the
//! document, registers a load listener that calls
//! [`release`](PageReadyLatch::release), and then blocks in
//! [`wait`](PageReadyLatch::wait). The listener fires on the protocol
//! event thread, so the latch is a plain `Mutex` + `Condvar` pair.
//!
//! ```text
//!   Armed ──release()──▶ Released
//!     │
//!     └───cancel()─────▶ Cancelled
//! ```
//!
//! The first transition out of `Armed` wins; later calls are no-ops.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::RenderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LatchState {
    Armed,
    Released,
    Cancelled,
}

/// Why [`PageReadyLatch::wait`] returned without a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LatchError {
    /// The latch was cancelled before the load event arrived.
    #[error("latch cancelled before the page signalled readiness")]
    Cancelled,

    /// The wait timed out.
    #[error("timed out after {0:?} waiting for the page")]
    TimedOut(Duration),
}

impl From<LatchError> for RenderError {
    fn from(err: LatchError) -> Self {
        match err {
            LatchError::Cancelled => RenderError::PageNotReady(err.to_string()),
            LatchError::TimedOut(waited) => RenderError::DeadlineExceeded(waited),
        }
    }
}

/// Single-use readiness gate. Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct PageReadyLatch {
    inner: Arc<(Mutex<LatchState>, Condvar)>,
}

impl PageReadyLatch {
    /// Create an armed latch.
    pub fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(LatchState::Armed), Condvar::new())),
        }
    }

    fn state(&self) -> MutexGuard<'_, LatchState> {
        // A poisoned latch still holds a valid state value.
        self.inner.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn transition(&self, to: LatchState) -> bool {
        let (_, cvar) = &*self.inner;
        let mut state = self.state();
        if *state != LatchState::Armed {
            return false;
        }
        *state = to;
        cvar.notify_all();
        true
    }

    /// Open the gate. Returns `true` only for the call that released it.
    pub fn release(&self) -> bool {
        let released = self.transition(LatchState::Released);
        if released {
            log::trace!("Page-ready latch released");
        }
        released
    }

    /// Cancel the gate, failing any current or future waiter.
    pub fn cancel(&self) -> bool {
        let cancelled = self.transition(LatchState::Cancelled);
        if cancelled {
            log::trace!("Page-ready latch cancelled");
        }
        cancelled
    }

    /// Whether the latch has been released.
    pub fn is_released(&self) -> bool {
        *self.state() == LatchState::Released
    }

    /// Block until the latch leaves the armed state or `timeout` elapses.
    pub fn wait(&self, timeout: Duration) -> Result<(), LatchError> {
        let (_, cvar) = &*self.inner;
        let guard = self.state();
        let (state, result) = cvar
            .wait_timeout_while(guard, timeout, |state| *state == LatchState::Armed)
            .unwrap_or_else(|e| e.into_inner());

        match *state {
            LatchState::Released => Ok(()),
            LatchState::Cancelled => Err(LatchError::Cancelled),
            LatchState::Armed => {
                debug_assert!(result.timed_out());
                Err(LatchError::TimedOut(timeout))
            }
        }
    }
}

impl Default for PageReadyLatch {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_release_before_wait() {
        let latch = PageReadyLatch::new();
        assert!(latch.release());
        assert!(latch.wait(Duration::from_millis(10)).is_ok());
        assert!(latch.is_released());
    }

    #[test]
    fn test_release_is_idempotent() {
        let latch = PageReadyLatch::new();
        assert!(latch.release(), "First release should win");
        assert!(!latch.release(), "Second release should be a no-op");
        assert!(!latch.cancel(), "Cancel after release should be a no-op");
        assert!(latch.wait(Duration::ZERO).is_ok());
    }

    #[test]
    fn test_release_from_other_thread() {
        let latch = PageReadyLatch::new();
        let remote = latch.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            remote.release();
        });

        let started = Instant::now();
        assert!(latch.wait(Duration::from_secs(5)).is_ok());
        assert!(started.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_times_out() {
        let latch = PageReadyLatch::new();
        let err = latch.wait(Duration::from_millis(30)).unwrap_err();
        assert_eq!(err, LatchError::TimedOut(Duration::from_millis(30)));

        let render: RenderError = err.into();
        assert!(matches!(render, RenderError::DeadlineExceeded(_)));
    }

    #[test]
    fn test_cancel_wakes_waiter() {
        let latch = PageReadyLatch::new();
        let remote = latch.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });

        let err = latch.wait(Duration::from_secs(5)).unwrap_err();
        assert_eq!(err, LatchError::Cancelled);
        assert!(!latch.release(), "Release after cancel must not reopen the latch");

        let render: RenderError = err.into();
        assert!(matches!(render, RenderError::PageNotReady(_)));
        handle.join().unwrap();
    }
}
