//! Size-bounded rotating log files.
//!
//! A [`RollingWriter`] appends to a single active file and renames it to a
//! timestamped backup whenever the next write would push it past the size
//! limit. After each rotation a background sweep prunes backups by count and
//! age, and optionally gzips the survivors.
//!
//! ```text
//! logs/app.log                          active file
//! logs/app.20240527030012.557.log       backup
//! logs/app.20240526230407.001.log.gz    compressed backup
//! ```

pub mod backups;
pub mod clock;
pub mod compressor;
pub mod config;
pub mod error;
pub mod naming;
pub mod stats;
pub mod sweep;
pub mod writer;

pub use backups::{list_backups, BackupInfo};
pub use clock::Clock;
pub use compressor::compress;
pub use config::{ErrorHandler, RollingConfig};
pub use error::{Error, Errors, Result};
pub use stats::SweepStats;
pub use sweep::{collect_sweep, run_sweep, RetentionPolicy, SweepPlan};
pub use writer::RollingWriter;
