//! Backup discovery for a rotating log.

use std::fs;
use std::path::{Path, PathBuf};

use time::PrimitiveDateTime;

use crate::naming::{self, COMPRESS_SUFFIX};
use crate::{Error, Result};

/// A rotated backup of a log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupInfo {
    /// File name within the log directory.
    pub name: String,

    /// Rotation timestamp embedded in the name.
    pub timestamp: PrimitiveDateTime,
}

impl BackupInfo {
    /// Check if the backup has already been compressed.
    pub fn is_compressed(&self) -> bool {
        self.name.ends_with(COMPRESS_SUFFIX)
    }
}

/// List the backups of `log_path`, newest first.
///
/// Entries that are directories or whose names don't match the backup pattern
/// (plain or compressed) are skipped. Backups with equal timestamps keep the
/// order they were read in.
pub fn list_backups(log_path: &Path) -> Result<Vec<BackupInfo>> {
    let dir = log_dir(log_path);
    let read_err = |source| Error::DirectoryRead {
        path: dir.clone(),
        source,
    };

    let (prefix, suffix) = naming::split(log_path);
    let compressed_suffix = format!("{suffix}{COMPRESS_SUFFIX}");

    let mut backups = Vec::new();
    for entry in fs::read_dir(&dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        if entry.file_type().map_err(read_err)?.is_dir() {
            continue;
        }
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(_) => continue,
        };
        let timestamp = match naming::decode(&name, &prefix, &suffix)
            .or_else(|_| naming::decode(&name, &prefix, &compressed_suffix))
        {
            Ok(ts) => ts,
            Err(_) => continue,
        };
        backups.push(BackupInfo { name, timestamp });
    }

    // Stable sort keeps discovery order among equal timestamps.
    backups.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(backups)
}

/// Directory holding `log_path` and its backups.
pub(crate) fn log_dir(log_path: &Path) -> PathBuf {
    match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
