//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function.

pub mod process;
pub mod pull;
pub mod report;

use crate::config::Configuration;
use anyhow::{Context, Result};
use std::path::Path;

/// Packaged configuration, or the given file, resolved for one release
pub(crate) fn load_configuration(config: Option<&Path>, version: Option<&str>) -> Result<Configuration> {
    match config {
        Some(path) => Configuration::from_file(path, version)
            .with_context(|| format!("Failed to load configuration from '{}'", path.display())),
        None => Configuration::load(version).context("Failed to load packaged configuration"),
    }
}
