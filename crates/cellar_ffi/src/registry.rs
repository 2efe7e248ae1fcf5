//! Opaque handle registry.

use crate::error::{FfiError, FfiResult};
use cellar_core::Store;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Opaque store handle handed to callers. `0` is never issued.
pub type Handle = u64;

/// Maps handles to live stores.
///
/// Lookups take the shared lock; insert and retire take the exclusive one
/// only long enough to edit the map. Handles increase monotonically and are
/// never reused.
#[derive(Debug)]
pub struct HandleRegistry {
    stores: RwLock<HashMap<Handle, Arc<Store>>>,
    next: AtomicU64,
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self {
            stores: RwLock::new(HashMap::new()),
            next: AtomicU64::new(1),
        }
    }
}

impl HandleRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `store` under a fresh handle.
    pub fn insert(&self, store: Store) -> Handle {
        let mut stores = self.stores.write();
        let handle = self.next.fetch_add(1, Ordering::Relaxed);
        stores.insert(handle, Arc::new(store));
        handle
    }

    /// Looks up a live store.
    ///
    /// The returned `Arc` keeps the store's memory alive even if the handle
    /// is retired while the caller still uses it.
    pub fn resolve(&self, handle: Handle) -> FfiResult<Arc<Store>> {
        if handle == 0 {
            return Err(FfiError::invalid_handle(handle));
        }
        self.stores
            .read()
            .get(&handle)
            .cloned()
            .ok_or_else(|| FfiError::invalid_handle(handle))
    }

    /// Removes a mapping without closing the store.
    pub fn retire(&self, handle: Handle) -> Option<Arc<Store>> {
        self.stores.write().remove(&handle)
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.stores.read().len()
    }

    /// Whether no handle is live.
    pub fn is_empty(&self) -> bool {
        self.stores.read().is_empty()
    }
}
