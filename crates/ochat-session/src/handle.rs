//! A cloneable handle for cancelling the in-flight turn from outside.

use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio_util::sync::CancellationToken;

/// A cloneable handle onto the controller's current session.
///
/// The UI keeps one of these so it can cancel while the controller itself is
/// mutably borrowed by the running turn. All fields are `Arc`-wrapped, so
/// cloning is cheap.
#[derive(Clone, Default)]
pub struct ChatHandle {
    pub(crate) current: Arc<Mutex<Option<CancellationToken>>>,
    pub(crate) is_running: Arc<AtomicBool>,
}

impl ChatHandle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Cancel the current turn, if any. Returns whether a turn was cancelled.
    pub fn abort(&self) -> bool {
        match self.current.lock().as_ref() {
            Some(token) if !token.is_cancelled() => {
                token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Whether a turn is currently requesting or streaming
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    pub(crate) fn begin(&self, token: CancellationToken) -> RunningGuard {
        *self.current.lock() = Some(token);
        self.is_running.store(true, Ordering::Release);
        RunningGuard {
            handle: self.clone(),
        }
    }
}

/// Clears the running flag when the turn ends, including when the turn's
/// future is dropped before completion.
pub(crate) struct RunningGuard {
    handle: ChatHandle,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        if let Some(token) = self.handle.current.lock().take() {
            // A dropped turn must not leave its request running
            token.cancel();
        }
        self.handle.is_running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_without_turn_is_noop() {
        let handle = ChatHandle::new();
        assert!(!handle.abort());
        assert!(!handle.is_running());
    }

    #[test]
    fn test_guard_tracks_running_and_cancels_on_drop() {
        let handle = ChatHandle::new();
        let token = CancellationToken::new();
        let guard = handle.begin(token.clone());
        assert!(handle.is_running());

        let remote = handle.clone();
        assert!(remote.abort());
        assert!(token.is_cancelled());
        assert!(!remote.abort());

        drop(guard);
        assert!(!handle.is_running());
        assert!(handle.current.lock().is_none());
    }
}
