//! Shared helpers for integration tests
//!
//! [`MemoryServer`] stands in for the MetaNetX FTP server: directories and
//! files live in memory, and individual files can be made to fail mid-stream
//! or to report a wrong size.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use futures::StreamExt;
use mnx_ingest::config::join_remote;
use mnx_ingest::ftp::{BlockStream, Connector, RemoteError, RemoteResult, RemoteSession};
use mnx_ingest::models::{EntryKind, RawPathInfo};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::sync::{Arc, Mutex};

/// Block size of in-memory transfers
pub const MEMORY_BLOCK_SIZE: usize = 4096;

/// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,mnx_ingest=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Naive server-local timestamp
pub fn naive(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, s)
        .unwrap()
}

/// Deterministic, non-repeating-looking content of the given length
pub fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[derive(Debug, Clone)]
struct RemoteFile {
    content: Vec<u8>,
    modify: NaiveDateTime,
    reported_size: Option<u64>,
    fail_after: Option<usize>,
}

#[derive(Debug, Default)]
struct ServerState {
    directories: BTreeSet<String>,
    files: BTreeMap<String, RemoteFile>,
    refuse_connections: bool,
    refused_attempts: BTreeSet<usize>,
    attempts: usize,
    connections: usize,
    quits: usize,
    downloads: Vec<String>,
}

/// In-memory file server
#[derive(Debug, Clone, Default)]
pub struct MemoryServer {
    state: Arc<Mutex<ServerState>>,
}

impl MemoryServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_directory(&self, path: &str) {
        self.state.lock().unwrap().directories.insert(path.to_string());
    }

    pub fn add_file(&self, directory: &str, name: &str, content: Vec<u8>, modify: NaiveDateTime) {
        let mut state = self.state.lock().unwrap();
        state.directories.insert(directory.to_string());
        state.files.insert(
            join_remote(directory, name),
            RemoteFile {
                content,
                modify,
                reported_size: None,
                fail_after: None,
            },
        );
    }

    /// Drop the connection after `bytes` bytes of the file were sent
    pub fn fail_mid_stream(&self, directory: &str, name: &str, bytes: usize) {
        let mut state = self.state.lock().unwrap();
        if let Some(file) = state.files.get_mut(&join_remote(directory, name)) {
            file.fail_after = Some(bytes);
        }
    }

    /// Report `size` instead of the real content length
    pub fn misreport_size(&self, directory: &str, name: &str, size: u64) {
        let mut state = self.state.lock().unwrap();
        if let Some(file) = state.files.get_mut(&join_remote(directory, name)) {
            file.reported_size = Some(size);
        }
    }

    pub fn refuse_connections(&self) {
        self.state.lock().unwrap().refuse_connections = true;
    }

    /// Refuse only the `attempt`-th connection (1-based), as a busy server does
    pub fn refuse_connection_attempt(&self, attempt: usize) {
        self.state.lock().unwrap().refused_attempts.insert(attempt);
    }

    /// Remote paths whose transfer was started, in order
    pub fn downloads(&self) -> Vec<String> {
        self.state.lock().unwrap().downloads.clone()
    }

    pub fn connections(&self) -> usize {
        self.state.lock().unwrap().connections
    }

    pub fn quits(&self) -> usize {
        self.state.lock().unwrap().quits
    }

    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            server: self.clone(),
        }
    }
}

/// Opens sessions on a [`MemoryServer`]
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    server: MemoryServer,
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, host: &str) -> RemoteResult<Box<dyn RemoteSession>> {
        let mut state = self.server.state.lock().unwrap();
        state.attempts += 1;
        if state.refused_attempts.contains(&state.attempts) {
            return Err(RemoteError::new("421 Too many connections from your IP"));
        }
        if state.refuse_connections {
            return Err(RemoteError::new(format!(
                "failed to lookup address information: {}",
                host
            )));
        }
        state.connections += 1;

        Ok(Box::new(MemorySession {
            server: self.server.clone(),
            cwd: None,
        }))
    }
}

struct MemorySession {
    server: MemoryServer,
    cwd: Option<String>,
}

impl MemorySession {
    fn path(&self, filename: &str) -> String {
        join_remote(self.cwd.as_deref().unwrap_or("/"), filename)
    }
}

#[async_trait]
impl RemoteSession for MemorySession {
    async fn change_directory(&mut self, path: &str) -> RemoteResult<()> {
        let state = self.server.state.lock().unwrap();
        if !state.directories.contains(path) {
            return Err(RemoteError::new("550 Failed to change directory."));
        }
        self.cwd = Some(path.to_string());
        Ok(())
    }

    async fn stat(&mut self, filename: &str) -> RemoteResult<RawPathInfo> {
        let path = self.path(filename);
        let state = self.server.state.lock().unwrap();

        if let Some(file) = state.files.get(&path) {
            return Ok(RawPathInfo {
                kind: EntryKind::File,
                size: file.reported_size.unwrap_or(file.content.len() as u64),
                modify: file.modify,
            });
        }

        if state.directories.contains(&path) {
            return Ok(RawPathInfo {
                kind: EntryKind::Dir,
                size: 0,
                modify: naive(2021, 1, 1, 0, 0, 0),
            });
        }

        Err(RemoteError::new("550 Could not get file size."))
    }

    async fn download_stream(&mut self, filename: &str) -> RemoteResult<BlockStream> {
        let path = self.path(filename);
        let mut state = self.server.state.lock().unwrap();
        let file = state
            .files
            .get(&path)
            .cloned()
            .ok_or_else(|| RemoteError::new("550 Failed to open file."))?;
        state.downloads.push(path);

        let limit = file.fail_after.unwrap_or(file.content.len()).min(file.content.len());
        let mut blocks: Vec<io::Result<Vec<u8>>> = file.content[..limit]
            .chunks(MEMORY_BLOCK_SIZE)
            .map(|chunk| Ok(chunk.to_vec()))
            .collect();
        if file.fail_after.is_some() {
            blocks.push(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )));
        }

        Ok(futures::stream::iter(blocks).boxed())
    }

    async fn quit(&mut self) {
        self.server.state.lock().unwrap().quits += 1;
    }
}
