use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("write length {len} exceeds file size limit {limit}")]
    OversizedWrite { len: u64, limit: u64 },

    #[error("can't {op} {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("can't read log file directory {}: {source}", .path.display())]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed backup name: {0}")]
    MalformedBackupName(String),

    #[error("failed to open log for compress {}: {source}", .path.display())]
    SourceMissing {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create compressed log {}: {source}", .path.display())]
    DestinationCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write compressed log {}: {source}", .path.display())]
    CompressionWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to remove {}: {source}", .path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to close {}: {source}", .path.display())]
    Close {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Multiple(Errors),
}

impl Error {
    pub(crate) fn io(op: &'static str, path: &Path, source: io::Error) -> Self {
        Error::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Check if a write was rejected for being larger than the size limit.
    pub fn is_oversized_write(&self) -> bool {
        matches!(self, Error::OversizedWrite { .. })
    }
}

impl From<Error> for io::Error {
    fn from(value: Error) -> Self {
        let kind = match &value {
            Error::OversizedWrite { .. } => io::ErrorKind::InvalidInput,
            Error::Io { source, .. } => source.kind(),
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, value)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Independent failures collected while finishing one operation.
///
/// Later failures never replace earlier ones; every error pushed is kept and
/// reported together.
#[derive(Debug, Default)]
pub struct Errors(Vec<Error>);

impl Errors {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an error, flattening nested lists.
    pub fn push(&mut self, err: Error) {
        match err {
            Error::Multiple(inner) => self.0.extend(inner.0),
            err => self.0.push(err),
        }
    }

    /// Number of errors collected.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if nothing failed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the errors in the order they were pushed.
    pub fn iter(&self) -> impl Iterator<Item = &Error> {
        self.0.iter()
    }

    /// Collapse into a single result: no errors is `Ok`, one error is returned
    /// as is, several become [`Error::Multiple`].
    pub fn into_result(mut self) -> Result<()> {
        match self.0.len() {
            0 => Ok(()),
            1 => Err(self.0.remove(0)),
            _ => Err(Error::Multiple(self)),
        }
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} errors occurred:", self.0.len())?;
        for err in &self.0 {
            write!(f, "\n\t* {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Errors {}

impl IntoIterator for Errors {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
