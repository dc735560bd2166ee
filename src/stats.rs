//! Statistics for background sweeps.

use std::time::Duration;

/// Statistics from one background sweep run.
#[derive(Debug, Clone, Default)]
pub struct SweepStats {
    /// Number of passes over the log directory.
    pub passes: usize,

    /// Number of backups removed.
    pub removed_count: usize,

    /// Number of backups compressed.
    pub compressed_count: usize,

    /// Number of errors handed to the error handler.
    pub error_count: usize,

    /// Whether the run stopped early because the writer was closing.
    pub interrupted: bool,

    /// Time taken for the run.
    pub duration: Duration,
}

impl SweepStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a removed backup.
    pub fn record_removal(&mut self) {
        self.removed_count += 1;
    }

    /// Record a successful compression.
    pub fn record_compression(&mut self) {
        self.compressed_count += 1;
    }

    /// Record an error handed to the error handler.
    pub fn record_error(&mut self) {
        self.error_count += 1;
    }

    /// Check if any errors occurred.
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Get summary string.
    pub fn summary(&self) -> String {
        format!(
            "Passes: {}, Removed: {}, Compressed: {}, Errors: {}, Interrupted: {}, Duration: {:?}",
            self.passes,
            self.removed_count,
            self.compressed_count,
            self.error_count,
            self.interrupted,
            self.duration
        )
    }
}
