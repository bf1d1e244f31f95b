//! Cancellation registry
//!
//! Maps job ids to the cancellation token of their in-flight execution.
//! A worker registers the token right before invoking the execution service
//! and unregisters it as soon as the service returns, so an entry exists
//! only while its job is running.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Live handles for running jobs
#[derive(Default)]
pub struct CancellationRegistry {
    handles: Mutex<HashMap<Uuid, CancellationToken>>,
}

impl CancellationRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the handle for `id`, replacing any stale entry
    pub fn register(&self, id: Uuid, handle: CancellationToken) {
        self.lock().insert(id, handle);
    }

    /// Signals the handle for `id`
    ///
    /// Returns false when no execution is registered under `id`. This only
    /// requests cancellation; it does not wait for the execution to stop.
    pub fn cancel(&self, id: Uuid) -> bool {
        // Clone out so the signal fires outside the lock
        let handle = self.lock().get(&id).cloned();
        match handle {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Removes the handle for `id`
    pub fn unregister(&self, id: Uuid) {
        self.lock().remove(&id);
    }

    /// Whether a handle is registered for `id`
    #[cfg(test)]
    pub fn contains(&self, id: Uuid) -> bool {
        self.lock().contains_key(&id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, CancellationToken>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_cancel_unknown_id_returns_false() {
        let registry = CancellationRegistry::new();
        assert!(!registry.cancel(Uuid::new_v4()));
    }

    #[test]
    fn test_cancel_signals_registered_handle() {
        let registry = CancellationRegistry::new();
        let id = Uuid::new_v4();
        let token = CancellationToken::new();
        registry.register(id, token.clone());

        assert!(registry.contains(id));
        assert!(registry.cancel(id));
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_unregister_removes_handle() {
        let registry = CancellationRegistry::new();
        let id = Uuid::new_v4();
        let token = CancellationToken::new();
        registry.register(id, token.clone());
        registry.unregister(id);

        assert!(!registry.contains(id));
        assert!(!registry.cancel(id));
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_register_replaces_stale_entry() {
        let registry = CancellationRegistry::new();
        let id = Uuid::new_v4();
        let stale = CancellationToken::new();
        let fresh = CancellationToken::new();
        registry.register(id, stale.clone());
        registry.register(id, fresh.clone());

        assert!(registry.cancel(id));
        assert!(fresh.is_cancelled());
        assert!(!stale.is_cancelled());
    }

    #[test]
    fn test_cancel_only_affects_its_own_id() {
        let registry = CancellationRegistry::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (token_a, token_b) = (CancellationToken::new(), CancellationToken::new());
        registry.register(a, token_a.clone());
        registry.register(b, token_b.clone());

        assert!(registry.cancel(a));
        assert!(token_a.is_cancelled());
        assert!(!token_b.is_cancelled());
    }

    #[test]
    fn test_concurrent_register_cancel_unregister() {
        let registry = Arc::new(CancellationRegistry::new());

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let id = Uuid::new_v4();
                    let token = CancellationToken::new();
                    registry.register(id, token.clone());
                    assert!(registry.cancel(id));
                    registry.unregister(id);
                    assert!(!registry.cancel(id));
                    token.is_cancelled()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }
}
