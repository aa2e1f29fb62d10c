//! Database configuration.

/// Configuration for opening a database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Whether to create the database directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to sync segment files on every committed batch.
    pub sync_on_commit: bool,

    /// Whether a stored table whose schema fingerprint differs from the
    /// declared one is dropped and recreated empty. When `false`, opening
    /// fails with `SchemaMismatch` instead.
    pub reset_on_schema_change: bool,

    /// Format version written to new databases.
    pub format_version: (u16, u16),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_commit: true,
            reset_on_schema_change: true,
            format_version: (1, 0),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to sync on commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets whether schema changes reset the affected table.
    #[must_use]
    pub const fn reset_on_schema_change(mut self, value: bool) -> Self {
        self.reset_on_schema_change = value;
        self
    }

    /// Sets the format version for new databases.
    #[must_use]
    pub const fn format_version(mut self, major: u16, minor: u16) -> Self {
        self.format_version = (major, minor);
        self
    }
}
