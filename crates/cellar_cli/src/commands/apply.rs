//! Apply command implementation.

use super::Session;
use crate::error::CliResult;
use cellar_ffi::codec::decode_batch;
use std::io::Write;
use std::path::Path;

/// Applies the operation log stored in `file` as one transaction.
pub fn run(path: &Path, file: &Path, out: &mut impl Write) -> CliResult<()> {
    let log = std::fs::read(file)?;
    // Decode up front so a bad file is reported without opening the store.
    let ops = decode_batch(&log)?.len();

    let session = Session::open(path, true)?;
    session.boundary().apply(session.handle(), &log)?;
    session.close()?;

    writeln!(out, "Applied {ops} operations from {}", file.display())?;
    Ok(())
}
