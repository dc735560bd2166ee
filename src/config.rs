//! Writer configuration.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use crate::Error;

/// Callback receiving every error raised by background sweeps.
pub type ErrorHandler = Arc<dyn Fn(&Error) + Send + Sync>;

/// Handler that discards background errors.
pub fn discard_errors() -> ErrorHandler {
    Arc::new(|_| {})
}

/// Default log path: `<temp dir>/<executable name>-rolling.log`.
pub fn default_path() -> PathBuf {
    let stem = env::current_exe()
        .ok()
        .and_then(|exe| exe.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .or_else(|| {
            env::args_os().next().and_then(|arg0| {
                PathBuf::from(arg0)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
            })
        })
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "logroll".to_string());
    env::temp_dir().join(format!("{stem}-rolling.log"))
}

/// Configuration for a [`RollingWriter`](crate::RollingWriter).
///
/// Every limit defaults to 0, which means unbounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollingConfig {
    /// Path of the active log file. Backups are written next to it.
    pub path: PathBuf,

    /// Size in bytes the active file may reach before it is rotated.
    pub max_bytes: u64,

    /// Number of backups to keep.
    pub max_backups: usize,

    /// Days to keep backups, judged by the timestamp in their name.
    pub max_age_days: u32,

    /// Gzip backups in the background.
    pub compress: bool,

    /// Use local time instead of UTC for backup timestamps.
    pub local_time: bool,
}

impl Default for RollingConfig {
    fn default() -> Self {
        Self::new(default_path())
    }
}

impl RollingConfig {
    /// Create a config for `path` with every limit off.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_bytes: 0,
            max_backups: 0,
            max_age_days: 0,
            compress: false,
            local_time: false,
        }
    }

    /// Set the size limit of the active file.
    pub fn max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Set the number of backups to keep.
    pub fn max_backups(mut self, max_backups: usize) -> Self {
        self.max_backups = max_backups;
        self
    }

    /// Set the number of days to keep backups.
    pub fn max_age_days(mut self, max_age_days: u32) -> Self {
        self.max_age_days = max_age_days;
        self
    }

    /// Enable gzip compression of backups.
    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Use local time for backup timestamps.
    pub fn local_time(mut self, local_time: bool) -> Self {
        self.local_time = local_time;
        self
    }

    /// Check whether `size` bytes would overflow the size limit.
    pub(crate) fn exceeds_limit(&self, size: u64) -> bool {
        self.max_bytes != 0 && size > self.max_bytes
    }
}
