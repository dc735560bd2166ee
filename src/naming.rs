//! Backup file naming.
//!
//! A backup of `dir/app.log` rotated at 2024-05-27 03:00:12.557 is named
//! `dir/app.20240527030012.557.log`. Compressed backups append `.gz`.

use std::path::Path;

use time::format_description::FormatItem;
use time::macros::format_description;
use time::PrimitiveDateTime;

use crate::{Error, Result};

/// Suffix appended to a backup once it has been compressed.
pub const COMPRESS_SUFFIX: &str = ".gz";

/// Width of an encoded timestamp, `YYYYMMDDHHMMSS.mmm`.
pub const BACKUP_TIME_WIDTH: usize = 18;

const BACKUP_TIME_FORMAT: &[FormatItem<'static>] = format_description!(
    "[year][month][day][hour][minute][second].[subsecond digits:3]"
);

/// Split a log path into the backup name prefix and suffix.
///
/// The suffix is the extension of the file name including its leading dot (or
/// empty). The prefix is the rest of the file name followed by `.`.
pub fn split(path: &Path) -> (String, String) {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.rfind('.') {
        Some(dot) => (format!("{}.", &name[..dot]), name[dot..].to_string()),
        None => (format!("{name}."), String::new()),
    }
}

/// Build a backup file name for a rotation at `timestamp`.
///
/// Sub-millisecond precision is dropped.
pub fn encode(prefix: &str, suffix: &str, timestamp: PrimitiveDateTime) -> String {
    // Only years outside 0..=9999 fail to format.
    let ts = timestamp
        .format(BACKUP_TIME_FORMAT)
        .unwrap_or_else(|_| "0".repeat(BACKUP_TIME_WIDTH));
    format!("{prefix}{ts}{suffix}")
}

/// Recover the rotation timestamp from a backup file name.
pub fn decode(filename: &str, prefix: &str, suffix: &str) -> Result<PrimitiveDateTime> {
    let malformed = || Error::MalformedBackupName(filename.to_string());

    let middle = filename
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_suffix(suffix))
        .ok_or_else(malformed)?;
    if middle.len() != BACKUP_TIME_WIDTH {
        return Err(malformed());
    }
    PrimitiveDateTime::parse(middle, BACKUP_TIME_FORMAT).map_err(|_| malformed())
}

/// Drop everything below millisecond precision, matching what a backup name
/// can represent.
pub fn truncate_to_millis(timestamp: PrimitiveDateTime) -> PrimitiveDateTime {
    let nanos = timestamp.nanosecond() / 1_000_000 * 1_000_000;
    timestamp.replace_nanosecond(nanos).unwrap_or(timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_split() {
        let cases = [
            ("test.log", "test.", ".log"),
            ("test", "test.", ""),
            (".test", ".", ".test"),
            ("/var/log/app.tar.log", "app.tar.", ".log"),
        ];
        for (path, prefix, suffix) in cases {
            let (p, s) = split(Path::new(path));
            assert_eq!(p, prefix, "prefix of {path}");
            assert_eq!(s, suffix, "suffix of {path}");
        }
    }

    #[test]
    fn test_encode() {
        let name = encode("foo.", ".log", datetime!(2014-05-04 14:44:33.555));
        assert_eq!(name, "foo.20140504144433.555.log");

        let ts = datetime!(2014-05-04 14:44:33)
            .replace_nanosecond(999_000)
            .unwrap();
        let name = encode("foo.", "", ts);
        assert_eq!(name, "foo.20140504144433.000");
    }

    #[test]
    fn test_decode() {
        let (prefix, suffix) = split(Path::new("asdasdsad/foo.log"));

        let ts = decode("foo.20140504144433.555.log", &prefix, &suffix).unwrap();
        assert_eq!(ts, datetime!(2014-05-04 14:44:33.555));

        let bad = [
            "foo-20140504144433.555",
            "20140504144433.555.log",
            "foo.20140504T144433.555.log",
            "asdasda.20140504144433.555.log",
            "foo.log",
            "foo.xxx.log",
            "foo.sakdjslkajd",
            "kjfksjldfjks",
            "foo.20141304144433.555.log",
        ];
        for name in bad {
            assert!(
                matches!(
                    decode(name, &prefix, &suffix),
                    Err(Error::MalformedBackupName(_))
                ),
                "{name} should not decode"
            );
        }
    }

    #[test]
    fn test_decode_compressed_suffix() {
        let (prefix, suffix) = split(Path::new("foo.log"));
        let gz = format!("{suffix}{COMPRESS_SUFFIX}");

        let ts = decode("foo.20140504144233.556.log.gz", &prefix, &gz).unwrap();
        assert_eq!(ts, datetime!(2014-05-04 14:42:33.556));
        assert!(decode("foo.20140504144233.556.log.gz", &prefix, &suffix).is_err());
    }

    #[test]
    fn test_encode_decode_truncates_to_millis() {
        let ts = datetime!(2024-02-29 23:59:59)
            .replace_nanosecond(123_456_789)
            .unwrap();
        let name = encode("app.", ".txt", ts);
        let decoded = decode(&name, "app.", ".txt").unwrap();
        assert_eq!(decoded, truncate_to_millis(ts));
        assert_eq!(decoded, datetime!(2024-02-29 23:59:59.123));
    }
}
