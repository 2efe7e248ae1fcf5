//! Store configuration.

/// Configuration for opening a store.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the store directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether every commit fsyncs the WAL before returning.
    ///
    /// Off by default: commits are written through to the OS and become
    /// power-loss durable at the next [`crate::Store::sync`] or close.
    pub sync_on_commit: bool,

    /// Rewrite the WAL on open when live bytes / log bytes drops below this
    /// ratio (0.0 disables).
    pub compact_on_open_ratio: f64,

    /// Logs smaller than this are never compacted on open.
    pub compact_min_wal_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_commit: false,
            compact_on_open_ratio: 0.25,
            compact_min_wal_size: 4 * 1024 * 1024, // 4 MiB
        }
    }
}

impl Config {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to fsync the WAL on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the live/log ratio that triggers compaction on open.
    #[must_use]
    pub const fn compact_on_open_ratio(mut self, ratio: f64) -> Self {
        self.compact_on_open_ratio = ratio;
        self
    }

    /// Sets the minimum WAL size considered for compaction on open.
    #[must_use]
    pub const fn compact_min_wal_size(mut self, size: u64) -> Self {
        self.compact_min_wal_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.create_if_missing);
        assert!(!config.sync_on_commit);
        assert!(config.compact_on_open_ratio > 0.0);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .create_if_missing(false)
            .sync_on_commit(true)
            .compact_on_open_ratio(0.0)
            .compact_min_wal_size(1);

        assert!(!config.create_if_missing);
        assert!(config.sync_on_commit);
        assert_eq!(config.compact_on_open_ratio, 0.0);
        assert_eq!(config.compact_min_wal_size, 1);
    }
}
