//! Cooperative cancellation for running simulations.
//!
//! Each conversation loop holds a `CancelToken` and checks it at turn
//! boundaries; in-flight LLM or sandbox calls are allowed to finish.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

/// A cancellation token checked by the orchestrator loop.
#[derive(Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Tracks active cancellation tokens per eval run.
#[derive(Default)]
pub struct CancelMap {
    tokens: Mutex<HashMap<Uuid, CancelToken>>,
}

impl CancelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a token for a run. Replaces any prior token.
    pub fn register(&self, run_id: Uuid) -> CancelToken {
        let token = CancelToken::new();
        self.tokens.lock().insert(run_id, token.clone());
        token
    }

    /// Cancel a running simulation. Returns true if a token was found.
    pub fn cancel(&self, run_id: &Uuid) -> bool {
        match self.tokens.lock().get(run_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Remove the token for a run (called when the simulation finishes).
    pub fn remove(&self, run_id: &Uuid) {
        self.tokens.lock().remove(run_id);
    }

    pub fn is_running(&self, run_id: &Uuid) -> bool {
        self.tokens.lock().contains_key(run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_lifecycle() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn clone_shares_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn map_register_cancel_remove() {
        let map = CancelMap::new();
        let run_id = Uuid::new_v4();

        let token = map.register(run_id);
        assert!(map.is_running(&run_id));
        assert!(map.cancel(&run_id));
        assert!(token.is_cancelled());

        map.remove(&run_id);
        assert!(!map.is_running(&run_id));
        assert!(!map.cancel(&run_id));
    }

    #[test]
    fn cancel_unknown_run_returns_false() {
        let map = CancelMap::new();
        assert!(!map.cancel(&Uuid::new_v4()));
    }
}
