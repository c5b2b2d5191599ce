//! Registry of currently executing jobs.

use std::collections::HashMap;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::job::JobId;

/// Tracks which job ids are executing and routes cancellation to them.
///
/// One map, id -> cancellation token, with insert-if-absent registration:
/// a second executor for the same id is refused before it touches the job,
/// which guards against duplicate dispatch on top of the scheduler's
/// `Waiting` transition.
#[derive(Debug, Default)]
pub struct ExecutionRegistry {
    running: Mutex<HashMap<JobId, CancellationToken>>,
}

impl ExecutionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job as executing. Returns the fresh cancellation token,
    /// or `None` when the id is already registered.
    pub fn register(&self, id: JobId) -> Option<CancellationToken> {
        if let Ok(mut running) = self.running.lock() {
            if running.contains_key(&id) {
                return None;
            }
            let token = CancellationToken::new();
            running.insert(id, token.clone());
            return Some(token);
        }
        None
    }

    pub fn deregister(&self, id: JobId) {
        if let Ok(mut running) = self.running.lock() {
            running.remove(&id);
        }
    }

    /// Request cooperative cancellation of a registered execution.
    /// Returns whether the id was registered.
    pub fn cancel(&self, id: JobId) -> bool {
        if let Ok(running) = self.running.lock() {
            if let Some(token) = running.get(&id) {
                token.cancel();
                return true;
            }
        }
        false
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.running
            .lock()
            .map(|running| running.contains_key(&id))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.running.lock().map(|running| running.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_exclusive_per_id() {
        let registry = ExecutionRegistry::new();
        let token = registry.register(1);
        assert!(token.is_some());
        assert!(registry.register(1).is_none());
        assert!(registry.register(2).is_some());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_deregister_allows_reregistration() {
        let registry = ExecutionRegistry::new();
        assert!(registry.register(1).is_some());
        registry.deregister(1);
        assert!(!registry.contains(1));
        assert!(registry.register(1).is_some());
    }

    #[test]
    fn test_cancel_fires_the_registered_token() {
        let registry = ExecutionRegistry::new();
        let token = registry.register(5).unwrap();
        assert!(!token.is_cancelled());
        assert!(registry.cancel(5));
        assert!(token.is_cancelled());
        assert!(!registry.cancel(99));
    }
}
