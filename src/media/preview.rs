// SPDX-License-Identifier: GPL-3.0-only

//! Revocable preview handles
//!
//! A preview handle is a short-lived URL a display surface can use to render
//! an entry without touching its payload again. Handles are allocated from a
//! [`PreviewRegistry`] and revoked when the handle is dropped, so each
//! allocation is revoked exactly once.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

/// Scheme prefix for locally allocated preview URLs
const URL_PREFIX: &str = "blob:field-capture/";

/// Allocator for preview URLs
pub trait PreviewRegistry: Send + Sync {
    /// Register a payload and return a URL that renders it
    fn allocate(&self, content_type: &str, data: &Bytes) -> String;

    /// Release a URL returned by [`PreviewRegistry::allocate`]
    fn revoke(&self, url: &str);
}

/// Owned preview URL, revoked on drop
///
/// Not `Clone`: ownership of the URL stays with one entry.
pub struct PreviewHandle {
    url: String,
    registry: Arc<dyn PreviewRegistry>,
}

impl PreviewHandle {
    /// Allocate a new handle for a payload
    pub fn allocate(registry: &Arc<dyn PreviewRegistry>, content_type: &str, data: &Bytes) -> Self {
        let url = registry.allocate(content_type, data);
        Self {
            url,
            registry: Arc::clone(registry),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.registry.revoke(&self.url);
    }
}

impl std::fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PreviewHandle").field(&self.url).finish()
    }
}

/// Allocation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreviewStats {
    pub allocated: u64,
    pub revoked: u64,
    /// URLs currently live
    pub live: usize,
    /// Revokes of URLs that were never allocated or already revoked
    pub invalid_revokes: u64,
}

impl PreviewStats {
    /// Every allocation revoked once and nothing else
    pub fn is_balanced(&self) -> bool {
        self.live == 0 && self.allocated == self.revoked && self.invalid_revokes == 0
    }
}

#[derive(Default)]
struct RegistryState {
    /// Live URL to payload size
    live: HashMap<String, usize>,
    allocated: u64,
    revoked: u64,
    invalid_revokes: u64,
}

/// In-memory object URL registry
#[derive(Default)]
pub struct ObjectUrlRegistry {
    state: Mutex<RegistryState>,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared registry as a trait object
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn stats(&self) -> PreviewStats {
        let state = self.state();
        PreviewStats {
            allocated: state.allocated,
            revoked: state.revoked,
            live: state.live.len(),
            invalid_revokes: state.invalid_revokes,
        }
    }

    /// Whether a URL is currently live
    pub fn is_live(&self, url: &str) -> bool {
        self.state().live.contains_key(url)
    }

    /// Bytes held by live previews
    pub fn live_bytes(&self) -> usize {
        self.state().live.values().sum()
    }
}

impl PreviewRegistry for ObjectUrlRegistry {
    fn allocate(&self, content_type: &str, data: &Bytes) -> String {
        let url = format!("{}{}", URL_PREFIX, Uuid::new_v4());
        let mut state = self.state();
        state.live.insert(url.clone(), data.len());
        state.allocated += 1;
        debug!(url = %url, content_type, size = data.len(), "Preview allocated");
        url
    }

    fn revoke(&self, url: &str) {
        let mut state = self.state();
        if state.live.remove(url).is_some() {
            state.revoked += 1;
            debug!(url = %url, "Preview revoked");
        } else {
            state.invalid_revokes += 1;
            warn!(url = %url, "Revoke of unknown preview");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_revokes_once() {
        let registry = ObjectUrlRegistry::shared();
        let dyn_registry: Arc<dyn PreviewRegistry> = registry.clone();

        let handle = PreviewHandle::allocate(&dyn_registry, "image/png", &Bytes::from_static(b"png"));
        assert!(handle.url().starts_with(URL_PREFIX));
        assert!(registry.is_live(handle.url()));
        assert_eq!(registry.live_bytes(), 3);

        drop(handle);
        assert!(registry.stats().is_balanced());
    }

    #[test]
    fn test_unknown_revoke_is_counted() {
        let registry = ObjectUrlRegistry::new();
        registry.revoke("blob:field-capture/unknown");
        let stats = registry.stats();
        assert_eq!(stats.invalid_revokes, 1);
        assert!(!stats.is_balanced());
    }
}
