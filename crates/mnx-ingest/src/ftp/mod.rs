//! Remote file server boundary
//!
//! The fetcher only talks to [`Connector`] and [`RemoteSession`]. The
//! production implementation in [`client`] drives a blocking `suppaftp`
//! stream on tokio's blocking pool; tests plug in an in-memory server.

pub mod client;

use crate::models::RawPathInfo;
use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

pub use client::{FtpConnector, FtpSession};

/// Lazy, finite stream of content blocks
pub type BlockStream = BoxStream<'static, std::io::Result<Vec<u8>>>;

/// Failure reported by a remote server or its transport
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct RemoteError(pub String);

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<suppaftp::FtpError> for RemoteError {
    fn from(err: suppaftp::FtpError) -> Self {
        Self(err.to_string())
    }
}

impl From<std::io::Error> for RemoteError {
    fn from(err: std::io::Error) -> Self {
        Self(err.to_string())
    }
}

impl From<tokio::task::JoinError> for RemoteError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self(format!("FTP task panicked: {}", err))
    }
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Logged-in session, owned by exactly one file task
#[async_trait]
pub trait RemoteSession: Send {
    /// Change the working directory
    async fn change_directory(&mut self, path: &str) -> RemoteResult<()>;

    /// Kind, size and naive modification time of an entry
    async fn stat(&mut self, filename: &str) -> RemoteResult<RawPathInfo>;

    /// Start a transfer and stream its content
    ///
    /// The session is consumed by the transfer; later calls on it fail.
    async fn download_stream(&mut self, filename: &str) -> RemoteResult<BlockStream>;

    /// Close the session, ignoring a server that already hung up
    async fn quit(&mut self);
}

/// Opens sessions
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, host: &str) -> RemoteResult<Box<dyn RemoteSession>>;
}
