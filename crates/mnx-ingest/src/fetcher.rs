//! Concurrent, change-aware fetcher
//!
//! Every requested file gets its own task and its own server session. Tasks
//! run concurrently on the caller's runtime and the batch only returns once
//! all of them have settled; one file failing never cancels another.
//!
//! Content is streamed into a hidden temporary file next to the destination
//! and renamed onto it only after the byte count matched the size the server
//! reported. A failed transfer therefore leaves the previous local copy (if
//! any) untouched and no partial file behind.

use crate::error::{SyncError, SyncResult};
use crate::freshness::{FreshnessTracker, LastChecked};
use crate::ftp::{BlockStream, Connector, RemoteSession};
use crate::models::{
    EntryKind, FileOutcome, FileReport, FileState, RemoteFileInfo, SyncReport, SyncRequest,
};
use crate::progress::create_download_progress;
use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use futures::future::join_all;
use futures::StreamExt;
use indicatif::{MultiProgress, ProgressDrawTarget};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, error, info, instrument, warn};

/// Suffix of compressed local copies
pub const GZIP_SUFFIX: &str = ".gz";

/// Source of the "checked at" timestamp
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a given instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Synchronizes a batch of remote files into a local directory
pub struct Fetcher {
    connector: Arc<dyn Connector>,
    clock: Arc<dyn Clock>,
    progress: MultiProgress,
}

impl Fetcher {
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self {
            connector: Arc::new(connector),
            clock: Arc::new(SystemClock),
            progress: MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Draw one progress bar per active download on stderr
    pub fn with_progress(mut self, visible: bool) -> Self {
        self.progress = if visible {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };
        self
    }

    /// Synchronize every file of the request
    ///
    /// Returns a report with one entry per file, in request order. A missing
    /// local directory fails the run up front. Session setup errors
    /// (unreachable server, missing remote directory) only fail the run when
    /// every file hit one, and only after every task has settled; otherwise
    /// they are recorded against their file like any other failure.
    #[instrument(skip_all, fields(host = %request.host, version = %request.remote_version_subdirectory))]
    pub async fn synchronize(&self, request: &SyncRequest) -> SyncResult<SyncReport> {
        let checked_at = self.clock.now().with_timezone(&request.server_timezone);
        let tracker = FreshnessTracker::new(request.last_checked, request.server_timezone);

        match tracker.last_checked() {
            LastChecked::Never => info!("No previous check recorded, every file will be fetched"),
            LastChecked::At(last) => info!(last_checked = %last, "Fetching files changed since last check"),
        }

        if !request.local_directory.is_dir() {
            return Err(SyncError::LocalDirectory(request.local_directory.clone()));
        }

        let remote_directory = request.remote_directory();
        let tasks = request
            .filenames
            .iter()
            .map(|filename| self.update_file(request, &remote_directory, &tracker, filename));
        let results = join_all(tasks).await;

        let mut files = Vec::with_capacity(results.len());
        let mut setup_error = None;
        let mut every_file_failed_setup = !results.is_empty();

        for (filename, (local_path, result)) in request.filenames.iter().zip(results) {
            let outcome = match result {
                Ok(outcome) => {
                    every_file_failed_setup = false;
                    outcome
                },
                Err(e) => {
                    error!(filename = %filename, error = %e, state = %FileState::Failed, "File synchronization failed");
                    let outcome = FileOutcome::Failed {
                        reason: e.to_string(),
                    };
                    if !e.is_systemic() {
                        every_file_failed_setup = false;
                    } else if setup_error.is_none() {
                        setup_error = Some(e);
                    }
                    outcome
                },
            };
            files.push(FileReport::new(filename.as_str(), local_path, outcome));
        }

        if every_file_failed_setup {
            if let Some(e) = setup_error {
                return Err(e);
            }
        }

        let report = SyncReport { checked_at, files };
        info!(
            downloaded = report.downloaded().count(),
            up_to_date = report.up_to_date().count(),
            failed = report.failed().count(),
            checked_at = %report.checked_at,
            "Synchronization finished"
        );
        Ok(report)
    }

    async fn update_file(
        &self,
        request: &SyncRequest,
        remote_directory: &str,
        tracker: &FreshnessTracker,
        filename: &str,
    ) -> (PathBuf, SyncResult<FileOutcome>) {
        debug!(filename, state = %FileState::Pending, "Queued");

        let target = match LocalTarget::new(&request.local_directory, filename, request.compress) {
            Ok(target) => target,
            Err(e) => return (request.local_directory.join(filename), Err(e)),
        };

        let result = self
            .try_update_file(request, remote_directory, tracker, filename, &target)
            .await;
        (target.path, result)
    }

    async fn try_update_file(
        &self,
        request: &SyncRequest,
        remote_directory: &str,
        tracker: &FreshnessTracker,
        filename: &str,
        target: &LocalTarget,
    ) -> SyncResult<FileOutcome> {
        debug!(filename, state = %FileState::Checking, "Opening session");

        let mut session =
            self.connector
                .connect(&request.host)
                .await
                .map_err(|e| SyncError::Connect {
                    host: request.host.clone(),
                    reason: e.to_string(),
                })?;

        let result = self
            .check_and_download(session.as_mut(), remote_directory, tracker, filename, target)
            .await;
        session.quit().await;
        result
    }

    async fn check_and_download(
        &self,
        session: &mut dyn RemoteSession,
        remote_directory: &str,
        tracker: &FreshnessTracker,
        filename: &str,
        target: &LocalTarget,
    ) -> SyncResult<FileOutcome> {
        session
            .change_directory(remote_directory)
            .await
            .map_err(|e| SyncError::RemoteDirectory {
                path: remote_directory.to_string(),
                reason: e.to_string(),
            })?;

        let raw = session.stat(filename).await.map_err(|e| SyncError::Stat {
            filename: filename.to_string(),
            reason: e.to_string(),
        })?;
        if raw.kind != EntryKind::File {
            return Err(SyncError::NotAFile(filename.to_string()));
        }

        let info = tracker.localize(filename, raw)?;
        let local_exists = local_copy_exists(filename, &target.path).await;
        let freshness = tracker.decide(&info, local_exists);

        if !freshness.needs_refresh() {
            info!(
                filename,
                modified = %info.modify,
                state = %FileState::UpToDate,
                "Local copy is up to date"
            );
            return Ok(FileOutcome::UpToDate);
        }

        info!(
            filename,
            size = info.size,
            modified = %info.modify,
            reason = ?freshness,
            local_path = %target.path.display(),
            state = %FileState::Downloading,
            "Downloading"
        );

        let blocks = session
            .download_stream(filename)
            .await
            .map_err(|e| SyncError::Transfer {
                filename: filename.to_string(),
                source: io::Error::other(e),
            })?;

        let bytes = self.receive(blocks, filename, &info, target).await?;
        info!(filename, bytes, state = %FileState::Complete, "Download complete");
        Ok(FileOutcome::Complete { bytes })
    }

    /// Write a block stream to the destination, replacing it atomically
    async fn receive(
        &self,
        mut blocks: BlockStream,
        filename: &str,
        info: &RemoteFileInfo,
        target: &LocalTarget,
    ) -> SyncResult<u64> {
        let pb = self
            .progress
            .add(create_download_progress(info.size, filename));

        let result: SyncResult<u64> = async {
            let sink_target = target.clone();
            let mut sink = on_blocking_pool(move || LocalSink::create(&sink_target))
                .await
                .map_err(|e| SyncError::local_write(&target.path, e))?;
            let mut received: u64 = 0;

            while let Some(block) = blocks.next().await {
                let block = block.map_err(|source| SyncError::Transfer {
                    filename: filename.to_string(),
                    source,
                })?;
                let len = block.len() as u64;
                sink = on_blocking_pool(move || {
                    sink.write_block(&block)?;
                    Ok(sink)
                })
                .await
                .map_err(|e| SyncError::local_write(&target.path, e))?;
                received += len;
                pb.inc(len);
            }

            if received != info.size {
                return Err(SyncError::Integrity {
                    filename: filename.to_string(),
                    expected: info.size,
                    actual: received,
                });
            }

            let path = target.path.clone();
            on_blocking_pool(move || sink.persist(&path))
                .await
                .map_err(|e| SyncError::local_write(&target.path, e))?;
            Ok(received)
        }
        .await;

        match &result {
            Ok(_) => pb.finish(),
            Err(_) => pb.abandon(),
        }
        result
    }
}

/// Whether a local copy exists; an unreadable path counts as missing
async fn local_copy_exists(filename: &str, path: &Path) -> bool {
    match tokio::fs::try_exists(path).await {
        Ok(exists) => exists,
        Err(e) => {
            warn!(
                filename,
                path = %path.display(),
                error = %e,
                "Cannot inspect local copy, fetching it again"
            );
            false
        },
    }
}

/// Run local file I/O (compression included) off the async workers
async fn on_blocking_pool<T, F>(op: F) -> io::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> io::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(io::Error::other)?
}

/// On-disk encoding of a local copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Plain,
    Gzip,
}

/// Destination of one remote file
#[derive(Debug, Clone)]
struct LocalTarget {
    directory: PathBuf,
    file_name: String,
    path: PathBuf,
    encoding: Encoding,
}

impl LocalTarget {
    /// Derive the local name from the remote basename
    ///
    /// Compressed copies gain a `.gz` suffix unless the remote file already
    /// has one, in which case the bytes are stored unchanged.
    fn new(directory: &Path, filename: &str, compress: bool) -> SyncResult<Self> {
        let basename = Path::new(filename)
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| SyncError::InvalidFilename(filename.to_string()))?;

        let (file_name, encoding) = if compress && !basename.ends_with(GZIP_SUFFIX) {
            (format!("{}{}", basename, GZIP_SUFFIX), Encoding::Gzip)
        } else {
            (basename.to_string(), Encoding::Plain)
        };

        Ok(Self {
            directory: directory.to_path_buf(),
            path: directory.join(&file_name),
            file_name,
            encoding,
        })
    }
}

/// Temporary file receiving a download
enum LocalSink {
    Plain(BufWriter<NamedTempFile>),
    Gzip(GzEncoder<BufWriter<NamedTempFile>>),
}

impl LocalSink {
    fn create(target: &LocalTarget) -> io::Result<Self> {
        let prefix = format!(".{}.", target.file_name);
        let temp = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".part")
            .tempfile_in(&target.directory)?;
        let writer = BufWriter::new(temp);

        Ok(match target.encoding {
            Encoding::Plain => LocalSink::Plain(writer),
            Encoding::Gzip => LocalSink::Gzip(GzEncoder::new(writer, Compression::default())),
        })
    }

    fn write_block(&mut self, block: &[u8]) -> io::Result<()> {
        match self {
            LocalSink::Plain(writer) => writer.write_all(block),
            LocalSink::Gzip(encoder) => encoder.write_all(block),
        }
    }

    /// Flush, sync and rename onto `path`
    fn persist(self, path: &Path) -> io::Result<()> {
        let writer = match self {
            LocalSink::Plain(writer) => writer,
            LocalSink::Gzip(encoder) => encoder.finish()?,
        };
        let temp = writer.into_inner().map_err(|e| e.into_error())?;
        temp.as_file().sync_all()?;

        // Temporary files are created owner-only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            temp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o644))?;
        }

        temp.persist(path).map_err(|e| e.error)?;
        debug!(path = %path.display(), "Local copy replaced");
        Ok(())
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher").finish_non_exhaustive()
    }
}
