//! MNX Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Change-aware synchronization of the MetaNetX MNXref tables and remapping
//! of their cross-reference prefixes.
//!
//! - **Synchronization**: [`fetcher::Fetcher`] pulls every requested file
//!   concurrently over its own FTP session, skipping files that did not
//!   change since the last check
//! - **Tables**: [`table`], [`transform`] and [`report`] extract, remap and
//!   summarize the downloaded tables
//! - **Entry points**: [`api::pull`] and [`api::process_table`], and the
//!   `mnx` binary
//!
//! # Example
//!
//! ```no_run
//! use mnx_ingest::api::{pull, PullOptions};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let report = pull("data/metanetx", PullOptions::default()).await?;
//! println!("next check from {}", report.checked_at);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod freshness;
pub mod ftp;
pub mod models;
pub mod progress;
pub mod report;
pub mod state;
pub mod table;
pub mod transform;

// Re-export commonly used types
pub use cli::{Cli, Commands};
pub use config::Configuration;
pub use error::{SyncError, SyncResult, TableError};
pub use fetcher::{Clock, Fetcher, FixedClock, SystemClock};
pub use models::{FileOutcome, FileReport, FileState, SyncReport, SyncRequest};
pub use table::TableKind;
