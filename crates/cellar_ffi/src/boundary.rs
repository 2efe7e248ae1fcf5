//! Boundary state and operations.
//!
//! [`Boundary`] owns the handle registry and the error channel. Its methods
//! take safe Rust arguments and return [`FfiResult`]; [`Boundary::call`]
//! wraps one of them, contains panics and records the outcome. The
//! `extern "C"` functions reach a single process-wide instance through
//! [`global`].

use crate::codec::{decode_batch, BatchOp, ScanWriter};
use crate::error::{ErrorChannel, FfiError, FfiResult};
use crate::registry::{Handle, HandleRegistry};
use cellar_core::{Config, CoreError, Store};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

/// Registry plus error channel.
#[derive(Debug, Default)]
pub struct Boundary {
    registry: HandleRegistry,
    errors: ErrorChannel,
}

static GLOBAL: OnceLock<Boundary> = OnceLock::new();

/// The process-wide boundary used by the exported functions.
pub fn global() -> &'static Boundary {
    GLOBAL.get_or_init(Boundary::new)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Boundary {
    /// Creates a boundary with no open handles.
    pub fn new() -> Self {
        Self::default()
    }

    /// The handle registry.
    pub fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    /// The error channel.
    pub fn errors(&self) -> &ErrorChannel {
        &self.errors
    }

    /// Runs `f`, records its outcome in the error channel and returns its
    /// value on success.
    ///
    /// A panic inside `f` is caught and recorded as `EngineFailure`.
    pub fn call<T, F>(&self, f: F) -> Option<T>
    where
        F: FnOnce(&Self) -> FfiResult<T>,
    {
        let result = panic::catch_unwind(AssertUnwindSafe(|| f(self))).unwrap_or_else(|payload| {
            Err(FfiError::engine(format!(
                "panic: {}",
                panic_message(payload.as_ref())
            )))
        });
        self.errors.record(result)
    }

    /// Opens a store and registers it.
    ///
    /// With `in_memory` the path is ignored. Otherwise the directory is
    /// created if missing.
    pub fn open(&self, path: Option<&str>, in_memory: bool) -> FfiResult<Handle> {
        self.open_path(path.map(Path::new), in_memory)
    }

    /// Like [`Boundary::open`], for paths that need not be UTF-8.
    pub fn open_path(&self, path: Option<&Path>, in_memory: bool) -> FfiResult<Handle> {
        let store = if in_memory {
            Store::open_in_memory()?
        } else {
            let path = path
                .filter(|p| !p.as_os_str().is_empty())
                .ok_or_else(|| FfiError::invalid_argument("path must not be empty"))?;
            Store::open(path, Config::default())?
        };

        let handle = self.registry.insert(store);
        debug!(handle, in_memory, "opened handle");
        Ok(handle)
    }

    /// Closes the store and retires its handle.
    ///
    /// The store is closed without holding the registry lock, so lookups of
    /// other handles never wait on it. If the store fails to close the
    /// handle stays registered. A close that loses a race with another close
    /// of the same handle reports `InvalidHandle`.
    pub fn close(&self, handle: Handle) -> FfiResult<()> {
        let store = self.registry.resolve(handle)?;
        match store.close() {
            Ok(()) => {}
            Err(CoreError::StoreClosed) => return Err(FfiError::invalid_handle(handle)),
            Err(err) => return Err(err.into()),
        }
        self.registry.retire(handle);
        debug!(handle, "closed handle");
        Ok(())
    }

    /// Forces outstanding writes to durable storage.
    pub fn sync(&self, handle: Handle) -> FfiResult<()> {
        self.registry.resolve(handle)?.sync()?;
        Ok(())
    }

    /// Stores `value` under `key`.
    pub fn set(&self, handle: Handle, key: &[u8], value: &[u8]) -> FfiResult<()> {
        let store = self.registry.resolve(handle)?;
        check_key(key)?;
        store.set(key, value)?;
        Ok(())
    }

    /// Copies the value stored under `key`.
    ///
    /// # Errors
    ///
    /// `NotFound` if the key has no value.
    pub fn get(&self, handle: Handle, key: &[u8]) -> FfiResult<Vec<u8>> {
        let store = self.registry.resolve(handle)?;
        check_key(key)?;
        store.get(key)?.ok_or_else(FfiError::not_found)
    }

    /// Removes `key`. Absent keys are not an error.
    pub fn delete(&self, handle: Handle, key: &[u8]) -> FfiResult<()> {
        let store = self.registry.resolve(handle)?;
        check_key(key)?;
        store.delete(key)?;
        Ok(())
    }

    /// Decodes `log` and applies it as one transaction.
    ///
    /// Nothing is written unless the whole log decodes and every entry
    /// applies.
    pub fn apply(&self, handle: Handle, log: &[u8]) -> FfiResult<()> {
        let store = self.registry.resolve(handle)?;
        let ops = decode_batch(log)?;
        store.update(|txn| {
            for op in &ops {
                match *op {
                    BatchOp::Set { key, value } => txn.set(key, value)?,
                    BatchOp::Delete { key } => txn.delete(key)?,
                }
            }
            Ok(())
        })?;
        Ok(())
    }

    /// Encodes every pair whose key starts with `prefix` from one snapshot.
    ///
    /// An empty prefix matches every key. No match yields an empty writer.
    pub fn scan(&self, handle: Handle, prefix: &[u8]) -> FfiResult<ScanWriter> {
        let store = self.registry.resolve(handle)?;
        let mut writer = ScanWriter::new();
        store
            .view(|txn| {
                Ok(txn.for_each_prefix(prefix, |key, value| writer.push(key, value)))
            })??;
        Ok(writer)
    }
}

fn check_key(key: &[u8]) -> FfiResult<()> {
    if key.is_empty() {
        return Err(FfiError::invalid_argument("key must not be empty"));
    }
    Ok(())
}
