//! FTP sessions on top of the blocking `suppaftp` client
//!
//! Every protocol step runs on tokio's blocking pool. Downloads are pumped
//! block by block through a bounded channel so a slow disk holds the server
//! back instead of buffering the whole file.

use super::{BlockStream, Connector, RemoteError, RemoteResult, RemoteSession};
use crate::config::FtpConfiguration;
use crate::models::{EntryKind, RawPathInfo};
use async_trait::async_trait;
use futures::StreamExt;
use std::io::{self, Read};
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream, Mode};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

/// Size of a single content block
pub const BLOCK_SIZE: usize = 64 * 1024;

/// Blocks buffered between the transfer thread and the writer
pub const STREAM_BUFFER_BLOCKS: usize = 16;

/// Opens logged-in FTP sessions
#[derive(Debug, Clone)]
pub struct FtpConnector {
    port: u16,
    username: String,
    password: String,
}

impl FtpConnector {
    pub fn new(config: &FtpConfiguration) -> Self {
        Self {
            port: config.port,
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }
}

#[async_trait]
impl Connector for FtpConnector {
    async fn connect(&self, host: &str) -> RemoteResult<Box<dyn RemoteSession>> {
        let address = format!("{}:{}", host, self.port);
        let username = self.username.clone();
        let password = self.password.clone();

        let stream = tokio::task::spawn_blocking(move || -> Result<FtpStream, FtpError> {
            debug!(%address, "Connecting to FTP server");
            let mut ftp = FtpStream::connect(&address)?;

            // Use Extended Passive Mode - better for NAT/Docker environments
            ftp.set_mode(Mode::ExtendedPassive);

            debug!(%username, "Logging in");
            ftp.login(username.as_str(), password.as_str())?;
            ftp.transfer_type(FileType::Binary)?;
            Ok(ftp)
        })
        .await??;

        Ok(Box::new(FtpSession::new(stream)))
    }
}

/// One logged-in FTP control connection
pub struct FtpSession {
    stream: Option<FtpStream>,
}

impl FtpSession {
    pub fn new(stream: FtpStream) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    fn take(&mut self) -> RemoteResult<FtpStream> {
        self.stream
            .take()
            .ok_or_else(|| RemoteError::new("FTP session is closed"))
    }

    /// Run a blocking operation and hand the connection back afterwards
    async fn with_stream<T, F>(&mut self, op: F) -> RemoteResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut FtpStream) -> Result<T, FtpError> + Send + 'static,
    {
        let mut ftp = self.take()?;
        let (ftp, result) = tokio::task::spawn_blocking(move || {
            let result = op(&mut ftp);
            (ftp, result)
        })
        .await?;
        self.stream = Some(ftp);
        Ok(result?)
    }
}

#[async_trait]
impl RemoteSession for FtpSession {
    async fn change_directory(&mut self, path: &str) -> RemoteResult<()> {
        let path = path.to_string();
        self.with_stream(move |ftp| ftp.cwd(path.as_str())).await
    }

    async fn stat(&mut self, filename: &str) -> RemoteResult<RawPathInfo> {
        let filename = filename.to_string();
        self.with_stream(move |ftp| stat_blocking(ftp, &filename))
            .await
    }

    async fn download_stream(&mut self, filename: &str) -> RemoteResult<BlockStream> {
        let mut ftp = self.take()?;
        let name = filename.to_string();

        let (mut ftp, opened) = tokio::task::spawn_blocking(move || {
            let opened = ftp.retr_as_stream(name.as_str());
            (ftp, opened)
        })
        .await?;

        let data = match opened {
            Ok(data) => data,
            Err(e) => {
                self.stream = Some(ftp);
                return Err(e.into());
            },
        };

        let (tx, rx) = mpsc::channel(STREAM_BUFFER_BLOCKS);
        let name = filename.to_string();
        tokio::task::spawn_blocking(move || {
            pump_blocks(data, &name, &tx, |data| ftp.finalize_retr_stream(data));
            drop(tx);
            if let Err(e) = ftp.quit() {
                debug!(error = %e, "FTP session did not close cleanly");
            }
        });

        Ok(ReceiverStream::new(rx).boxed())
    }

    async fn quit(&mut self) {
        let Some(mut ftp) = self.stream.take() else {
            return;
        };

        match tokio::task::spawn_blocking(move || ftp.quit()).await {
            Ok(Ok(())) => {},
            Ok(Err(e)) => warn!(error = %e, "Failed to quit FTP session gracefully"),
            Err(e) => warn!(error = %e, "FTP quit task panicked"),
        }
    }
}

/// SIZE and MDTM for a file, or a directory probe when SIZE is refused
fn stat_blocking(ftp: &mut FtpStream, filename: &str) -> Result<RawPathInfo, FtpError> {
    match ftp.size(filename) {
        Ok(size) => {
            let modify = ftp.mdtm(filename)?;
            Ok(RawPathInfo {
                kind: EntryKind::File,
                size: size as u64,
                modify,
            })
        },
        Err(size_error) => {
            if ftp.cwd(filename).is_err() {
                return Err(size_error);
            }
            ftp.cdup()?;
            Ok(RawPathInfo {
                kind: EntryKind::Dir,
                size: 0,
                modify: ftp.mdtm(filename).unwrap_or_default(),
            })
        },
    }
}

/// Copy the data connection into the channel, then close the transfer
///
/// `finalize` reads the server's closing reply once the data connection is
/// drained; its failure reaches the receiver as the last item. Returns early
/// without finalizing when the receiver is gone or the read fails.
fn pump_blocks<R, F, E>(
    mut data: R,
    filename: &str,
    tx: &mpsc::Sender<io::Result<Vec<u8>>>,
    finalize: F,
) where
    R: Read,
    F: FnOnce(R) -> Result<(), E>,
    E: std::fmt::Display,
{
    let mut buffer = vec![0u8; BLOCK_SIZE];
    let mut received: u64 = 0;

    loop {
        match data.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                received += n as u64;
                if tx.blocking_send(Ok(buffer[..n].to_vec())).is_err() {
                    debug!(filename, received, "Transfer abandoned by receiver");
                    return;
                }
            },
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                let _ = tx.blocking_send(Err(e));
                return;
            },
        }
    }

    debug!(filename, received, "Data connection drained");

    if let Err(e) = finalize(data) {
        let _ = tx.blocking_send(Err(io::Error::other(e.to_string())));
    }
}
