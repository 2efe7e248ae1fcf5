//! Stats command implementation.

use super::{open_store, OutputFormat};
use crate::error::CliResult;
use cellar_core::StoreStats;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Serializable view of [`StoreStats`].
#[derive(Debug, Serialize)]
pub struct StatsReport {
    /// Live keys.
    pub keys: usize,
    /// Key plus value bytes of the live keys.
    pub live_bytes: u64,
    /// WAL size on disk.
    pub wal_bytes: u64,
    /// Last committed sequence number.
    pub sequence: u64,
}

impl From<StoreStats> for StatsReport {
    fn from(stats: StoreStats) -> Self {
        Self {
            keys: stats.keys,
            live_bytes: stats.live_bytes,
            wal_bytes: stats.wal_bytes,
            sequence: stats.sequence.as_u64(),
        }
    }
}

/// Runs the stats command.
pub fn run(path: &Path, format: OutputFormat, out: &mut impl Write) -> CliResult<()> {
    let store = open_store(path)?;
    let report = StatsReport::from(store.stats()?);
    store.close()?;

    match format {
        OutputFormat::Text => {
            writeln!(out, "Store: {}", path.display())?;
            writeln!(out, "  Keys:        {}", report.keys)?;
            writeln!(out, "  Live bytes:  {}", report.live_bytes)?;
            writeln!(out, "  WAL bytes:   {}", report.wal_bytes)?;
            writeln!(out, "  Sequence:    {}", report.sequence)?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &report)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::kv;
    use tempfile::tempdir;

    #[test]
    fn reports_json() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("store");
        kv::set(&path, "k", "value", &mut Vec::new()).unwrap();
        kv::set(&path, "k2", "v", &mut Vec::new()).unwrap();

        let mut out = Vec::new();
        run(&path, OutputFormat::Json, &mut out).unwrap();
        let report: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(report["keys"], 2);
        assert_eq!(report["live_bytes"], 9);
        assert_eq!(report["sequence"], 2);
        assert!(report["wal_bytes"].as_u64().unwrap() > 0);
    }
}
