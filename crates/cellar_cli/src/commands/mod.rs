//! CLI command implementations.
//!
//! Data commands (`get`, `set`, `delete`, `scan`, `apply`) go through the
//! boundary layer exactly as a foreign caller would. Maintenance commands
//! use the engine directly.

pub mod apply;
pub mod compact;
pub mod kv;
pub mod scan;
pub mod stats;
pub mod verify;

use crate::error::{CliError, CliResult};
use cellar_core::{Config, Store};
use cellar_ffi::{Boundary, Handle};
use clap::ValueEnum;
use std::path::Path;
use tracing::debug;

/// Output format of listing commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One line per item.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// A store opened through the boundary.
pub struct Session {
    boundary: Boundary,
    handle: Handle,
}

impl Session {
    /// Opens the store at `path`. Without `create`, a missing directory is
    /// an error instead of a new empty store.
    pub fn open(path: &Path, create: bool) -> CliResult<Self> {
        if !create && !path.is_dir() {
            return Err(CliError::NoStore(path.to_path_buf()));
        }
        let boundary = Boundary::new();
        let handle = boundary.open_path(Some(path), false)?;
        debug!(path = %path.display(), handle, "session opened");
        Ok(Self { boundary, handle })
    }

    /// The boundary holding the handle.
    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    /// The open handle.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Syncs and closes the store.
    pub fn close(self) -> CliResult<()> {
        self.boundary.sync(self.handle)?;
        self.boundary.close(self.handle)?;
        Ok(())
    }
}

/// Opens an existing store for maintenance.
pub fn open_store(path: &Path) -> CliResult<Store> {
    if !path.is_dir() {
        return Err(CliError::NoStore(path.to_path_buf()));
    }
    debug!(path = %path.display(), "opening store");
    Ok(Store::open(path, Config::new().create_if_missing(false))?)
}
