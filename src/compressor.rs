//! Backup compression.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::naming::COMPRESS_SUFFIX;
use crate::{Error, Errors, Result};

/// Path of the compressed sibling of `source`.
pub fn compressed_path(source: &Path) -> PathBuf {
    let mut name = source.as_os_str().to_os_string();
    name.push(COMPRESS_SUFFIX);
    PathBuf::from(name)
}

/// Gzip `source` into `source.gz`.
///
/// On success the plain file is removed. If writing, finishing or syncing the
/// compressed stream fails, the partial `.gz` file is removed instead so it is
/// never mistaken for a finished backup. A failed cleanup is reported
/// alongside the primary outcome; any error means the backup should be
/// compressed again on a later sweep.
pub fn compress(source: &Path) -> Result<()> {
    let dest = compressed_path(source);
    let mut errors = Errors::new();

    let mut src = match File::open(source) {
        Ok(file) => file,
        Err(source_err) => {
            return Err(Error::SourceMissing {
                path: source.to_path_buf(),
                source: source_err,
            })
        }
    };

    let dst = match create_file(&dest) {
        Ok(file) => file,
        Err(err) => {
            return Err(Error::DestinationCreate {
                path: dest,
                source: err,
            })
        }
    };

    let mut encoder = GzEncoder::new(dst, Compression::default());
    let finished = match io::copy(&mut src, &mut encoder) {
        Ok(_) => encoder.finish().and_then(|dst| dst.sync_all()),
        Err(err) => Err(err),
    };
    drop(src);

    let remove = match finished {
        Ok(()) => source.to_path_buf(),
        Err(err) => {
            errors.push(Error::CompressionWrite {
                path: dest.clone(),
                source: err,
            });
            dest
        }
    };

    remove_or_record(remove, &mut errors);
    errors.into_result()
}

/// Remove `path`, recording a failure next to any earlier error.
fn remove_or_record(path: PathBuf, errors: &mut Errors) {
    if let Err(err) = fs::remove_file(&path) {
        errors.push(Error::Cleanup { path, source: err });
    }
}

#[cfg(unix)]
fn create_file(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(0o644)
        .open(path)
}

#[cfg(not(unix))]
fn create_file(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
}
