//! Verify command implementation.
//!
//! Reads the WAL file directly, without taking the store lock, so it can
//! inspect a store another process has open.

use crate::error::{CliError, CliResult};
use cellar_core::wal::{WalReader, WalRecord};
use cellar_core::{SequenceNumber, StoreDir};
use std::io::Write;
use std::path::Path;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyReport {
    /// Records that passed every check.
    pub records: usize,
    /// Operations across those records.
    pub operations: usize,
    /// Sequence number of the last good record.
    pub last_sequence: Option<SequenceNumber>,
    /// Bytes covered by good records.
    pub valid_bytes: u64,
    /// Size of the log.
    pub total_bytes: u64,
    /// The log ends in a partial record that recovery would cut off.
    pub torn_tail: bool,
    /// First corruption found.
    pub corruption: Option<String>,
}

impl VerifyReport {
    fn is_ok(&self) -> bool {
        self.corruption.is_none()
    }
}

/// Checks every record of a WAL image.
pub fn verify_log(log: &[u8]) -> VerifyReport {
    let mut report = VerifyReport {
        total_bytes: log.len() as u64,
        ..VerifyReport::default()
    };
    let mut reader = WalReader::new(log);
    let mut out_of_order = None;

    for item in reader.by_ref() {
        match item {
            Ok((offset, WalRecord::Commit { sequence, ops })) => {
                if let Some(prev) = report.last_sequence {
                    if sequence <= prev {
                        report.corruption = Some(format!(
                            "{sequence} at offset {offset} does not follow {prev}"
                        ));
                        out_of_order = Some(offset);
                        break;
                    }
                }
                report.records += 1;
                report.operations += ops.len();
                report.last_sequence = Some(sequence);
            }
            Err(e) => {
                report.corruption = Some(e.to_string());
                break;
            }
        }
    }

    // A failed read leaves the reader at the start of the bad record.
    report.valid_bytes = out_of_order.unwrap_or_else(|| reader.valid_len());
    report.torn_tail = report.is_ok() && reader.is_torn();
    report
}

/// Runs the verify command.
pub fn run(path: &Path, out: &mut impl Write) -> CliResult<()> {
    if !path.is_dir() {
        return Err(CliError::NoStore(path.to_path_buf()));
    }
    let wal_path = StoreDir::wal_path_for(path);
    writeln!(out, "Verifying store at {}", path.display())?;

    if !wal_path.exists() {
        writeln!(out, "WAL file not found (the store has never been written)")?;
        return Ok(());
    }

    let log = std::fs::read(&wal_path)?;
    let report = verify_log(&log);

    writeln!(
        out,
        "  Records: {}, operations: {}, bytes: {}/{}",
        report.records, report.operations, report.valid_bytes, report.total_bytes
    )?;
    if let Some(sequence) = report.last_sequence {
        writeln!(out, "  Last sequence: {}", sequence.as_u64())?;
    }
    if report.torn_tail {
        writeln!(
            out,
            "  WARNING: {} trailing bytes form a partial record and will be dropped on open",
            report.total_bytes - report.valid_bytes
        )?;
    }

    match report.corruption {
        None => {
            writeln!(out, "WAL verification passed")?;
            Ok(())
        }
        Some(reason) => {
            writeln!(out, "  ERROR: {reason}")?;
            Err(CliError::VerifyFailed(reason))
        }
    }
}
