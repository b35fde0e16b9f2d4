//! Scoped handles for decoded images.
//!
//! Every image the workbench displays is registered here and addressed by a
//! `blob:` URL. The handle is released when its [`BlobLease`] is dropped, which
//! happens when a lane's image is replaced or the workbench is torn down.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

#[derive(Debug)]
struct BlobInfo {
    label: String,
    byte_len: usize,
}

#[derive(Debug, Default)]
struct RegistryState {
    next_id: u64,
    live: BTreeMap<u64, BlobInfo>,
}

#[derive(Debug, Clone, Default)]
pub struct BlobRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, label: impl Into<String>, byte_len: usize) -> BlobLease {
        let mut state = lock(&self.state);
        state.next_id += 1;
        let id = state.next_id;
        let url = format!("blob:sigcheck/{id}");
        state.live.insert(
            id,
            BlobInfo {
                label: label.into(),
                byte_len,
            },
        );
        tracing::trace!(%url, live = state.live.len(), "acquired blob handle");
        BlobLease {
            id,
            url,
            registry: Arc::downgrade(&self.state),
        }
    }

    /// Number of handles not yet released.
    pub fn live(&self) -> usize {
        lock(&self.state).live.len()
    }

    /// Total encoded size of the images still held.
    pub fn held_bytes(&self) -> usize {
        lock(&self.state).live.values().map(|info| info.byte_len).sum()
    }
}

fn lock(state: &Mutex<RegistryState>) -> MutexGuard<'_, RegistryState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
pub struct BlobLease {
    id: u64,
    url: String,
    registry: Weak<Mutex<RegistryState>>,
}

impl BlobLease {
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for BlobLease {
    fn drop(&mut self) {
        if let Some(state) = self.registry.upgrade() {
            let mut state = lock(&state);
            let label = state.live.remove(&self.id).map(|info| info.label);
            tracing::trace!(
                url = %self.url,
                label = label.as_deref().unwrap_or_default(),
                live = state.live.len(),
                "released blob handle"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_lease_releases_handle() {
        let registry = BlobRegistry::new();
        let first = registry.acquire("a.png", 10);
        let second = registry.acquire("b.png", 20);
        assert_eq!(registry.live(), 2);
        assert_ne!(first.url(), second.url());

        drop(first);
        assert_eq!(registry.live(), 1);
        assert_eq!(registry.held_bytes(), 20);
    }

    #[test]
    fn lease_outliving_registry_drops_quietly() {
        let registry = BlobRegistry::new();
        let lease = registry.acquire("late.png", 1);
        drop(registry);
        drop(lease);
    }
}
