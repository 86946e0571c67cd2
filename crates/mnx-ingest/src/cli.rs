//! Command-line arguments of the `mnx` binary

use crate::table::TableKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Work with MetaNetX reference tables
#[derive(Parser, Debug)]
#[command(name = "mnx")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load missing or outdated files from the MetaNetX FTP server
    Pull {
        /// Where existing files are found and new ones are stored
        directory: PathBuf,

        /// Files to pull; all default files when omitted
        files: Vec<String>,

        /// Store plain files instead of gzip-compressed ones
        #[arg(long)]
        no_compress: bool,

        /// MetaNetX release, e.g. "4.4"
        #[arg(long, env = "MNX_VERSION")]
        release: Option<String>,

        /// Configuration file replacing the packaged one
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Extract and remap a raw MetaNetX table
    Process {
        /// Which table the input is
        #[arg(value_enum)]
        table: TableKind,

        /// Raw MetaNetX table, optionally gzip-compressed
        input: PathBuf,

        /// Output table; gzip-compressed when it ends in ".gz"
        output: PathBuf,

        /// MetaNetX release whose layout to use
        #[arg(long, env = "MNX_VERSION")]
        release: Option<String>,

        /// Configuration file replacing the packaged one
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Summarize the columns of a raw MetaNetX table
    Report {
        /// Which table the input is
        #[arg(value_enum)]
        table: TableKind,

        /// Raw MetaNetX table, optionally gzip-compressed
        input: PathBuf,

        /// Also count repeated values in this column
        #[arg(short, long)]
        duplicates: Option<String>,

        /// MetaNetX release whose layout to use
        #[arg(long, env = "MNX_VERSION")]
        release: Option<String>,

        /// Configuration file replacing the packaged one
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}
