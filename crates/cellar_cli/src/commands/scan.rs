//! Scan command implementation.

use super::{OutputFormat, Session};
use crate::error::CliResult;
use cellar_ffi::codec::ScanRecords;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// One listed pair. Bytes that are not UTF-8 are shown lossily.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Entry {
    /// The key.
    pub key: String,
    /// The value.
    pub value: String,
}

/// Runs the scan command.
pub fn run(path: &Path, prefix: &str, format: OutputFormat, out: &mut impl Write) -> CliResult<()> {
    let session = Session::open(path, false)?;
    let records = session.boundary().scan(session.handle(), prefix.as_bytes())?;
    let entries = decode(records.as_bytes())?;
    session.close()?;

    match format {
        OutputFormat::Text => {
            for entry in &entries {
                writeln!(out, "{}\t{}", entry.key, entry.value)?;
            }
            writeln!(out, "({} entries)", entries.len())?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &entries)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

/// Decodes a scan result buffer into printable entries.
pub fn decode(buf: &[u8]) -> CliResult<Vec<Entry>> {
    ScanRecords::new(buf)
        .map(|record| -> CliResult<Entry> {
            let (key, value) = record?;
            Ok(Entry {
                key: String::from_utf8_lossy(key).into_owned(),
                value: String::from_utf8_lossy(value).into_owned(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::kv;
    use tempfile::tempdir;

    #[test]
    fn lists_prefix_as_json() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("store");
        let mut sink = Vec::new();
        kv::set(&path, "user:2", "grace", &mut sink).unwrap();
        kv::set(&path, "user:1", "ada", &mut sink).unwrap();
        kv::set(&path, "team:1", "core", &mut sink).unwrap();

        let mut out = Vec::new();
        run(&path, "user:", OutputFormat::Json, &mut out).unwrap();
        let listed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(
            listed,
            serde_json::json!([
                { "key": "user:1", "value": "ada" },
                { "key": "user:2", "value": "grace" },
            ])
        );
    }

    #[test]
    fn text_output_counts_entries() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("store");
        kv::set(&path, "a", "1", &mut Vec::new()).unwrap();

        let mut out = Vec::new();
        run(&path, "", OutputFormat::Text, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a\t1\n(1 entries)\n");

        let mut out = Vec::new();
        run(&path, "zz", OutputFormat::Text, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "(0 entries)\n");
    }

    #[test]
    fn truncated_buffer_is_an_error() {
        assert!(decode(&[3, 0, 0, 0]).is_err());
        assert!(decode(&[]).unwrap().is_empty());
    }
}
