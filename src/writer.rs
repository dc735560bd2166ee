//! The rotating writer.
//!
//! # Design
//!
//! - One active file per writer, opened lazily on the first write
//! - Writes are serialized by a single lock around the open file and its size
//! - A write that would push the file past `max_bytes` first rotates it:
//!   the file is closed, renamed to a timestamped backup and recreated
//! - Every rotation wakes the background sweeper; retention never holds the
//!   write lock

use std::fs::{self, DirBuilder, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::backups::log_dir;
use crate::clock::Clock;
use crate::config::{discard_errors, ErrorHandler, RollingConfig};
use crate::naming;
use crate::sweep::{RetentionPolicy, Sweeper};
use crate::{Error, Result};

const DIR_MODE: u32 = 0o755;
const FILE_MODE: u32 = 0o644;

/// The open active file and its length in bytes.
struct ActiveFile {
    file: File,
    size: u64,
}

impl ActiveFile {
    fn close(self, path: &Path) -> Result<()> {
        self.file.sync_all().map_err(|source| Error::Close {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// A byte sink that writes to a file and rotates it by size.
///
/// Writes from several threads are serialized; each write lands whole in a
/// single file. Backups are named `<stem>.<YYYYMMDDHHMMSS.mmm><ext>` next to
/// the active file and are pruned or compressed in the background according
/// to the configured limits.
///
/// # Example
///
/// ```no_run
/// use logroll::{RollingConfig, RollingWriter};
///
/// let config = RollingConfig::new("./logs/app.log")
///     .max_bytes(10 * 1024 * 1024)
///     .max_backups(5)
///     .compress(true);
/// let writer = RollingWriter::with_error_handler(config, |err| {
///     eprintln!("log retention failed: {err}");
/// });
///
/// writer.write(b"hello\n")?;
/// writer.close()?;
/// # Ok::<(), logroll::Error>(())
/// ```
pub struct RollingWriter {
    config: RollingConfig,
    clock: Clock,
    active: Mutex<Option<ActiveFile>>,
    sweeper: Sweeper,
}

impl RollingWriter {
    /// Create a writer whose background errors are discarded.
    ///
    /// No file is touched until the first write.
    pub fn new(config: RollingConfig) -> Self {
        Self::with_handler(config, discard_errors())
    }

    /// Create a writer that hands every background sweep error to `on_error`.
    pub fn with_error_handler(
        config: RollingConfig,
        on_error: impl Fn(&Error) + Send + Sync + 'static,
    ) -> Self {
        Self::with_handler(config, Arc::new(on_error))
    }

    fn with_handler(config: RollingConfig, on_error: ErrorHandler) -> Self {
        let sweeper = Sweeper::new(RetentionPolicy::from_config(&config), on_error);
        Self {
            clock: Clock::new(config.local_time),
            config,
            active: Mutex::new(None),
            sweeper,
        }
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn config(&self) -> &RollingConfig {
        &self.config
    }

    /// Length of the active file, or 0 if none is open.
    pub fn current_size(&self) -> u64 {
        self.lock().as_ref().map_or(0, |active| active.size)
    }

    /// Write `buf` to the active file, rotating first if it would not fit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OversizedWrite`] without touching any file if `buf` on
    /// its own is larger than the size limit. If rotation fails the write is
    /// not performed; the active file is left as it was and the call can be
    /// retried.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        let len = buf.len() as u64;
        if self.config.exceeds_limit(len) {
            return Err(Error::OversizedWrite {
                len,
                limit: self.config.max_bytes,
            });
        }

        let mut guard = self.lock();
        let active = match guard.take() {
            Some(active) if !self.config.exceeds_limit(active.size + len) => active,
            Some(active) => {
                active.close(&self.config.path)?;
                self.archive()?;
                self.create()?
            }
            None => self.open_or_create(len)?,
        };
        let active = guard.insert(active);

        let mut written = 0;
        let result = loop {
            if written == buf.len() {
                break Ok(());
            }
            match active.file.write(&buf[written..]) {
                Ok(0) => break Err(io::Error::from(io::ErrorKind::WriteZero)),
                Ok(n) => written += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => break Err(err),
            }
        };
        active.size += written as u64;

        result
            .map(|()| written)
            .map_err(|err| Error::io("write", &self.config.path, err))
    }

    /// Sync the active file's data to disk.
    pub fn sync(&self) -> Result<()> {
        match self.lock().as_ref() {
            Some(active) => active
                .file
                .sync_data()
                .map_err(|err| Error::io("sync", &self.config.path, err)),
            None => Ok(()),
        }
    }

    /// Rotate the active file now, even if it is below the size limit.
    ///
    /// Does nothing if the active file doesn't exist. The next write creates
    /// a fresh file.
    pub fn rotate(&self) -> Result<()> {
        let mut guard = self.lock();
        if let Some(active) = guard.take() {
            active.close(&self.config.path)?;
        }
        if !self.config.path.exists() {
            return Ok(());
        }
        self.archive().map(|_| ())
    }

    /// Block until any running background sweep has finished.
    pub fn wait_for_sweep(&self) {
        self.sweeper.wait_idle();
    }

    /// Stop any running sweep, then sync and close the active file.
    ///
    /// A sweep is asked to stop at its next checkpoint and is waited for; it is
    /// not rolled back. Closing an already closed writer is a no-op, and a
    /// later write reopens the file.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.lock();
        self.sweeper.shutdown();
        match guard.take() {
            Some(active) => active.close(&self.config.path),
            None => Ok(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<ActiveFile>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open_or_create(&self, pending: u64) -> Result<ActiveFile> {
        let path = &self.config.path;
        let size = match fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => return self.create(),
            Err(err) => return Err(Error::io("stat", path, err)),
        };

        if self.config.exceeds_limit(size + pending) {
            self.archive()?;
            return self.create();
        }

        let file = open_options()
            .append(true)
            .open(path)
            .map_err(|err| Error::io("open", path, err))?;
        Ok(ActiveFile { file, size })
    }

    fn create(&self) -> Result<ActiveFile> {
        let path = &self.config.path;
        let dir = log_dir(path);
        create_dir_all(&dir).map_err(|err| Error::io("make directories for", &dir, err))?;

        let file = open_options()
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|err| Error::io("create file", path, err))?;
        Ok(ActiveFile { file, size: 0 })
    }

    /// Rename the active file to a timestamped backup and wake the sweeper.
    fn archive(&self) -> Result<PathBuf> {
        let path = &self.config.path;
        let (prefix, suffix) = naming::split(path);
        let backup = log_dir(path).join(naming::encode(&prefix, &suffix, self.clock.now()));

        fs::rename(path, &backup).map_err(|err| Error::io("rotate", path, err))?;
        log::debug!("rotated {} to {}", path.display(), backup.display());

        self.sweeper.trigger();
        Ok(backup)
    }
}

impl Drop for RollingWriter {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl Write for RollingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        RollingWriter::write(self, buf).map_err(Into::into)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sync().map_err(Into::into)
    }
}

impl Write for &RollingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        RollingWriter::write(*self, buf).map_err(Into::into)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sync().map_err(Into::into)
    }
}

#[cfg(unix)]
fn open_options() -> OpenOptions {
    use std::os::unix::fs::OpenOptionsExt;

    let mut options = OpenOptions::new();
    options.write(true).mode(FILE_MODE);
    options
}

#[cfg(not(unix))]
fn open_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    options.write(true);
    options
}

#[cfg(unix)]
fn create_dir_all(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    DirBuilder::new().recursive(true).mode(DIR_MODE).create(dir)
}

#[cfg(not(unix))]
fn create_dir_all(dir: &Path) -> io::Result<()> {
    DirBuilder::new().recursive(true).create(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_new_file() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let log = temp_dir.path().join("foobar.log");
        let writer = RollingWriter::new(RollingConfig::new(&log));

        assert!(!log.exists(), "created lazily");
        assert_eq!(writer.write(b"asdfg")?, 5);
        assert_eq!(fs::read(&log).unwrap(), b"asdfg");
        assert_eq!(writer.current_size(), 5);
        assert_eq!(files_in(temp_dir.path()).len(), 1);

        writer.close()
    }

    #[test]
    fn test_write_too_long() {
        let temp_dir = TempDir::new().unwrap();
        let log = temp_dir.path().join("foobar.log");
        let writer = RollingWriter::new(RollingConfig::new(&log).max_bytes(10));

        let err = writer.write(b"12345678901").unwrap_err();
        assert_eq!(err.to_string(), "write length 11 exceeds file size limit 10");
        assert!(err.is_oversized_write());
        assert!(!log.exists(), "file should not have been created");
    }

    #[test]
    fn test_open_existing_appends() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let log = temp_dir.path().join("foobar.log");
        fs::write(&log, b"foo!").unwrap();

        let writer = RollingWriter::new(RollingConfig::new(&log));
        writer.write(b"12345678901")?;

        assert_eq!(fs::read(&log).unwrap(), b"foo!12345678901");
        assert_eq!(writer.current_size(), 15);
        assert_eq!(files_in(temp_dir.path()).len(), 1);
        Ok(())
    }

    #[test]
    fn test_make_log_dir() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let log = temp_dir.path().join("a").join("b").join("foobar.log");

        let writer = RollingWriter::new(RollingConfig::new(&log));
        writer.write(b"asdfg")?;

        assert_eq!(fs::read(&log).unwrap(), b"asdfg");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&log).unwrap().permissions().mode() & 0o777;
            // Creation mode is masked by the process umask.
            assert_eq!(mode & !FILE_MODE, 0);
        }
        Ok(())
    }

    #[test]
    fn test_auto_rotate() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let log = temp_dir.path().join("foobar.log");
        let writer = RollingWriter::new(
            RollingConfig::new(&log)
                .max_bytes(10)
                .max_backups(5)
                .max_age_days(7),
        );

        writer.write(b"123456789")?;
        assert_eq!(fs::read(&log).unwrap(), b"123456789");
        assert_eq!(files_in(temp_dir.path()).len(), 1);

        writer.write(b"987654321")?;
        assert_eq!(fs::read(&log).unwrap(), b"987654321");
        assert_eq!(writer.current_size(), 9);

        writer.wait_for_sweep();
        let names = files_in(temp_dir.path());
        assert_eq!(names.len(), 2);

        let (prefix, suffix) = naming::split(&log);
        let backup = names.iter().find(|name| *name != "foobar.log").unwrap();
        assert!(naming::decode(backup, &prefix, &suffix).is_ok());
        assert_eq!(
            fs::read(temp_dir.path().join(backup)).unwrap(),
            b"123456789"
        );

        writer.close()
    }

    #[test]
    fn test_first_write_rotates_existing_file() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let log = temp_dir.path().join("foobar.log");
        let config = RollingConfig::new(&log).max_bytes(10).max_backups(5);

        let writer = RollingWriter::new(config.clone());
        writer.write(b"123456789")?;
        writer.close()?;
        assert_eq!(files_in(temp_dir.path()).len(), 1);

        let writer = RollingWriter::new(config);
        writer.write(b"987654321")?;
        writer.wait_for_sweep();

        assert_eq!(fs::read(&log).unwrap(), b"987654321");
        assert_eq!(files_in(temp_dir.path()).len(), 2);
        writer.close()
    }

    #[test]
    fn test_exact_fit_does_not_rotate() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let log = temp_dir.path().join("foobar.log");
        let writer = RollingWriter::new(RollingConfig::new(&log).max_bytes(10));

        writer.write(b"12345")?;
        writer.write(b"67890")?;

        assert_eq!(fs::read(&log).unwrap(), b"1234567890");
        assert_eq!(files_in(temp_dir.path()).len(), 1);
        Ok(())
    }

    #[test]
    fn test_failed_rename_keeps_active_file() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let log = temp_dir.path().join("foobar.log");
        let at = time::macros::datetime!(2024-05-27 03:00:12.557);
        let (prefix, suffix) = naming::split(&log);
        let backup = temp_dir.path().join(naming::encode(&prefix, &suffix, at));
        // A non-empty directory where the backup should go.
        fs::create_dir(&backup).unwrap();
        fs::write(backup.join("blocker"), b"x").unwrap();

        let config = RollingConfig::new(&log).max_bytes(10);
        let mut writer = RollingWriter::new(config.clone());
        writer.clock = Clock::Fixed(at);

        writer.write(b"123456789")?;
        let err = writer.write(b"987654321").unwrap_err();
        assert!(matches!(err, Error::Io { op: "rotate", .. }), "{err}");
        assert_eq!(fs::read(&log).unwrap(), b"123456789");
        assert_eq!(writer.current_size(), 0);

        // A writer reopening the full file fails the same way.
        let mut reopened = RollingWriter::new(config);
        reopened.clock = Clock::Fixed(at);
        let err = reopened.write(b"987654321").unwrap_err();
        assert!(matches!(err, Error::Io { op: "rotate", .. }), "{err}");
        assert_eq!(fs::read(&log).unwrap(), b"123456789");

        // Once the way is clear the next write rotates.
        fs::remove_dir_all(&backup).unwrap();
        writer.write(b"987654321")?;
        assert_eq!(fs::read(&backup).unwrap(), b"123456789");
        assert_eq!(fs::read(&log).unwrap(), b"987654321");
        Ok(())
    }

    #[test]
    fn test_close_is_idempotent_and_reopens() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let log = temp_dir.path().join("foobar.log");
        let writer = RollingWriter::new(RollingConfig::new(&log));

        writer.close()?;
        writer.write(b"one")?;
        writer.close()?;
        writer.close()?;
        assert_eq!(writer.current_size(), 0);

        writer.write(b"two")?;
        assert_eq!(fs::read(&log).unwrap(), b"onetwo");
        assert_eq!(writer.current_size(), 6);
        Ok(())
    }

    #[test]
    fn test_manual_rotate() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let log = temp_dir.path().join("foobar.log");
        let writer = RollingWriter::new(RollingConfig::new(&log));

        // Nothing to rotate yet.
        writer.rotate()?;
        assert!(files_in(temp_dir.path()).is_empty());

        writer.write(b"before")?;
        writer.rotate()?;
        assert!(!log.exists());
        assert_eq!(writer.current_size(), 0);

        writer.write(b"after")?;
        assert_eq!(fs::read(&log).unwrap(), b"after");
        assert_eq!(files_in(temp_dir.path()).len(), 2);
        Ok(())
    }

    #[test]
    fn test_io_write() -> io::Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let log = temp_dir.path().join("foobar.log");
        let mut writer = RollingWriter::new(RollingConfig::new(&log).max_bytes(4));

        writeln!(writer, "abc")?;
        (&writer).write_all(b"de")?;
        writer.flush()?;

        let err = Write::write(&mut writer, b"toolong").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        drop(writer);
        assert_eq!(fs::read(&log).unwrap(), b"de");
        Ok(())
    }
}
