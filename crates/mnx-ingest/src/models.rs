//! Synchronization data model

use crate::config::{join_remote, FtpConfiguration};
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use chrono_tz::Tz;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Kind of a remote directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

/// Metadata exactly as the server reports it.
///
/// The modification time carries no offset; it only becomes comparable once
/// localized into [`RemoteFileInfo`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPathInfo {
    pub kind: EntryKind,
    pub size: u64,
    pub modify: NaiveDateTime,
}

/// Remote metadata with the modification time in the server's zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFileInfo {
    pub kind: EntryKind,
    pub size: u64,
    pub modify: DateTime<Tz>,
}

/// One synchronization run
#[derive(Debug, Clone)]
pub struct SyncRequest {
    /// FTP host, e.g. `ftp.vital-it.ch`
    pub host: String,

    /// Directory holding one subdirectory per release
    pub remote_base_directory: String,

    /// Release subdirectory, e.g. `4.4`
    pub remote_version_subdirectory: String,

    /// Where local copies live
    pub local_directory: PathBuf,

    /// Remote filenames, relative to the release directory
    pub filenames: Vec<String>,

    /// End of the previous run, `None` if there never was one
    pub last_checked: Option<DateTime<FixedOffset>>,

    /// Gzip local copies
    pub compress: bool,

    /// Zone the server reports modification times in
    pub server_timezone: Tz,
}

impl SyncRequest {
    /// Build a request from the FTP configuration
    ///
    /// `filenames` falls back to the configured default list.
    pub fn from_configuration(
        ftp: &FtpConfiguration,
        local_directory: impl Into<PathBuf>,
        filenames: Option<Vec<String>>,
        last_checked: Option<DateTime<FixedOffset>>,
        compress: bool,
    ) -> mnx_common::Result<Self> {
        let filenames = match filenames {
            Some(files) if !files.is_empty() => files,
            _ => ftp.files.clone(),
        };

        Ok(Self {
            host: ftp.host.clone(),
            remote_base_directory: ftp.base_directory.clone(),
            remote_version_subdirectory: ftp.version.clone(),
            local_directory: local_directory.into(),
            filenames,
            last_checked,
            compress,
            server_timezone: ftp.server_timezone()?,
        })
    }

    /// Full remote directory of the requested release
    pub fn remote_directory(&self) -> String {
        join_remote(&self.remote_base_directory, &self.remote_version_subdirectory)
    }
}

/// Per-file progress through a run
///
/// `Pending → Checking → {UpToDate | Downloading → {Complete | Failed}}`.
/// A failure while checking also ends in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    Pending,
    Checking,
    UpToDate,
    Downloading,
    Complete,
    Failed,
}

impl FileState {
    pub fn is_terminal(self) -> bool {
        matches!(self, FileState::UpToDate | FileState::Complete | FileState::Failed)
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileState::Pending => "pending",
            FileState::Checking => "checking",
            FileState::UpToDate => "up to date",
            FileState::Downloading => "downloading",
            FileState::Complete => "complete",
            FileState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How a single file ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    /// The local copy was left untouched
    UpToDate,
    /// The local copy was replaced; `bytes` counts the remote bytes received
    Complete { bytes: u64 },
    /// Nothing was written
    Failed { reason: String },
}

impl FileOutcome {
    /// Terminal state matching this outcome
    pub fn state(&self) -> FileState {
        match self {
            FileOutcome::UpToDate => FileState::UpToDate,
            FileOutcome::Complete { .. } => FileState::Complete,
            FileOutcome::Failed { .. } => FileState::Failed,
        }
    }
}

/// Result for one requested file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub filename: String,
    pub local_path: PathBuf,
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

impl FileReport {
    pub fn new(filename: impl Into<String>, local_path: impl AsRef<Path>, outcome: FileOutcome) -> Self {
        Self {
            filename: filename.into(),
            local_path: local_path.as_ref().to_path_buf(),
            outcome,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, FileOutcome::Failed { .. })
    }
}

/// Result of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    /// Start of the run in the server's zone; the next run's `last_checked`
    pub checked_at: DateTime<Tz>,

    /// One entry per requested file, in request order
    pub files: Vec<FileReport>,
}

impl SyncReport {
    pub fn downloaded(&self) -> impl Iterator<Item = &FileReport> {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, FileOutcome::Complete { .. }))
    }

    pub fn up_to_date(&self) -> impl Iterator<Item = &FileReport> {
        self.files
            .iter()
            .filter(|f| f.outcome == FileOutcome::UpToDate)
    }

    pub fn failed(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| f.is_failed())
    }

    /// True when no file failed
    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }

    /// Total remote bytes received during the run
    pub fn bytes_transferred(&self) -> u64 {
        self.files
            .iter()
            .map(|f| match f.outcome {
                FileOutcome::Complete { bytes } => bytes,
                _ => 0,
            })
            .sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ftp_configuration() -> FtpConfiguration {
        FtpConfiguration {
            host: "ftp.vital-it.ch".to_string(),
            port: 21,
            username: "anonymous".to_string(),
            password: "anonymous@".to_string(),
            base_directory: "/databases/metanetx/MNXref".to_string(),
            timezone: "Europe/Zurich".to_string(),
            files: vec!["chem_prop.tsv".to_string(), "reac_prop.tsv".to_string()],
            version: "4.4".to_string(),
        }
    }

    #[test]
    fn test_request_defaults_to_configured_files() {
        let request =
            SyncRequest::from_configuration(&ftp_configuration(), "/data", None, None, true).unwrap();
        assert_eq!(request.filenames, vec!["chem_prop.tsv", "reac_prop.tsv"]);
        assert_eq!(request.remote_directory(), "/databases/metanetx/MNXref/4.4");
        assert_eq!(request.server_timezone, chrono_tz::Europe::Zurich);

        let request = SyncRequest::from_configuration(
            &ftp_configuration(),
            "/data",
            Some(vec!["comp_xref.tsv".to_string()]),
            None,
            false,
        )
        .unwrap();
        assert_eq!(request.filenames, vec!["comp_xref.tsv"]);
    }

    #[test]
    fn test_report_partitions() {
        let report = SyncReport {
            checked_at: chrono_tz::Europe::Zurich
                .with_ymd_and_hms(2021, 6, 1, 0, 0, 0)
                .unwrap(),
            files: vec![
                FileReport::new("a.tsv", "/data/a.tsv.gz", FileOutcome::Complete { bytes: 12 }),
                FileReport::new("b.tsv", "/data/b.tsv.gz", FileOutcome::UpToDate),
                FileReport::new(
                    "c.tsv",
                    "/data/c.tsv.gz",
                    FileOutcome::Failed {
                        reason: "connection reset".to_string(),
                    },
                ),
            ],
        };

        assert_eq!(report.downloaded().count(), 1);
        assert_eq!(report.up_to_date().count(), 1);
        assert_eq!(report.failed().count(), 1);
        assert_eq!(report.bytes_transferred(), 12);
        assert!(!report.is_success());
        assert_eq!(report.files[2].outcome.state(), FileState::Failed);
        assert!(FileState::UpToDate.is_terminal());
        assert!(!FileState::Downloading.is_terminal());
    }

    #[test]
    fn test_report_serializes_outcome_inline() {
        let report = FileReport::new("a.tsv", "/data/a.tsv", FileOutcome::Complete { bytes: 3 });
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "complete");
        assert_eq!(json["bytes"], 3);
        assert_eq!(json["filename"], "a.tsv");
    }
}
