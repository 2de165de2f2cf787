//! Thread-safe stop signal for the control loop.
//!
//! A [`CancelToken`] starts disarmed: stop requests are ignored until the
//! loop arms it on entering the running state, so an early Ctrl-C neither
//! kills the process nor skips initialisation.  Once armed, a request is
//! observed at the next tick boundary.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    armed: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start honouring [`cancel`][Self::cancel].
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// Request a stop.  Returns `false` when the request was ignored because
    /// the token is not armed yet.
    pub fn cancel(&self) -> bool {
        if !self.is_armed() {
            return false;
        }
        self.cancelled.store(true, Ordering::SeqCst);
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_before_arming_are_ignored() {
        let token = CancelToken::new();
        assert!(!token.cancel());
        assert!(!token.is_cancelled());

        token.arm();
        assert!(token.cancel());
        assert!(token.is_cancelled());
    }

    #[test]
    fn clones_share_state() {
        let token = CancelToken::new();
        let handle = token.clone();
        token.arm();
        assert!(handle.cancel());
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_from_another_thread() {
        let token = CancelToken::new();
        token.arm();
        let handle = token.clone();
        std::thread::spawn(move || handle.cancel()).join().unwrap();
        assert!(token.is_cancelled());
    }
}
