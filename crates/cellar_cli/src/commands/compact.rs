//! Compact command implementation.

use super::open_store;
use crate::error::CliResult;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Runs the compact command.
pub fn run(path: &Path, out: &mut impl Write) -> CliResult<()> {
    let store = open_store(path)?;
    let before = store.stats()?;

    writeln!(out, "Compacting store at {}", path.display())?;
    let reclaimed = store.compact()?;
    let after = store.stats()?;
    store.close()?;
    info!(reclaimed, "compaction finished");

    writeln!(out, "  Keys:        {}", after.keys)?;
    writeln!(out, "  Size before: {} bytes", before.wal_bytes)?;
    writeln!(out, "  Size after:  {} bytes", after.wal_bytes)?;
    #[allow(clippy::cast_precision_loss)]
    let percent = if before.wal_bytes > 0 {
        reclaimed as f64 / before.wal_bytes as f64 * 100.0
    } else {
        0.0
    };
    writeln!(out, "  Space saved: {reclaimed} bytes ({percent:.1}%)")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::kv;
    use tempfile::tempdir;

    #[test]
    fn shrinks_overwritten_log() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("store");
        for i in 0..20 {
            kv::set(&path, "hot", &format!("value-{i}"), &mut Vec::new()).unwrap();
        }

        let mut out = Vec::new();
        run(&path, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Keys:        1"), "{text}");
        assert!(!text.contains("Space saved: 0 bytes"), "{text}");

        let mut value = Vec::new();
        kv::get(&path, "hot", &mut value).unwrap();
        assert_eq!(value, b"value-19\n");
    }
}
