//! Single-key commands.

use super::Session;
use crate::error::{CliError, CliResult};
use cellar_ffi::ErrorKind;
use std::io::Write;
use std::path::Path;

/// Prints the value under `key`.
pub fn get(path: &Path, key: &str, out: &mut impl Write) -> CliResult<()> {
    let session = Session::open(path, false)?;
    let value = match session.boundary().get(session.handle(), key.as_bytes()) {
        Ok(value) => value,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(CliError::KeyNotFound(key.to_string()));
        }
        Err(err) => return Err(err.into()),
    };
    writeln!(out, "{}", String::from_utf8_lossy(&value))?;
    session.close()
}

/// Stores `value` under `key`.
pub fn set(path: &Path, key: &str, value: &str, out: &mut impl Write) -> CliResult<()> {
    let session = Session::open(path, true)?;
    session
        .boundary()
        .set(session.handle(), key.as_bytes(), value.as_bytes())?;
    session.close()?;
    writeln!(out, "OK")?;
    Ok(())
}

/// Removes `key`.
pub fn delete(path: &Path, key: &str, out: &mut impl Write) -> CliResult<()> {
    let session = Session::open(path, false)?;
    session.boundary().delete(session.handle(), key.as_bytes())?;
    session.close()?;
    writeln!(out, "OK")?;
    Ok(())
}
