//! Persisted "last checked" timestamp
//!
//! `last.txt` in the working directory holds the `checked_at` stamp of the
//! last fully successful run as RFC 3339. Older files may contain a naive
//! stamp, which is read as server-local time.

use chrono::{DateTime, FixedOffset, LocalResult, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use mnx_common::{MnxError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the state file inside the working directory
pub const STATE_FILENAME: &str = "last.txt";

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Path of the state file
pub fn state_path(directory: &Path) -> PathBuf {
    directory.join(STATE_FILENAME)
}

/// Read the last check, `None` when the file is missing or empty
pub fn read_last_checked(directory: &Path, timezone: Tz) -> Result<Option<DateTime<FixedOffset>>> {
    let path = state_path(directory);
    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No state file");
            return Ok(None);
        },
        Err(e) => return Err(e.into()),
    };

    let value = text.trim();
    if value.is_empty() {
        return Ok(None);
    }

    parse_timestamp(value, timezone).map(Some)
}

/// Parse an RFC 3339 stamp, or a naive one in `timezone`
pub fn parse_timestamp(value: &str, timezone: Tz) -> Result<DateTime<FixedOffset>> {
    if let Ok(stamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(stamp);
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .ok_or_else(|| MnxError::timestamp(value, "expected RFC 3339 or YYYY-MM-DDTHH:MM:SS"))?;

    match timezone.from_local_datetime(&naive) {
        LocalResult::Single(stamp) | LocalResult::Ambiguous(stamp, _) => Ok(stamp.fixed_offset()),
        LocalResult::None => Err(MnxError::timestamp(
            value,
            format!("does not exist in {}", timezone),
        )),
    }
}

/// Record the end of a successful run
pub fn write_last_checked<Z: TimeZone>(directory: &Path, checked_at: &DateTime<Z>) -> Result<()>
where
    Z::Offset: std::fmt::Display,
{
    let path = state_path(directory);
    std::fs::write(&path, format!("{}\n", checked_at.to_rfc3339()))?;
    debug!(path = %path.display(), checked_at = %checked_at.to_rfc3339(), "State file updated");
    Ok(())
}
