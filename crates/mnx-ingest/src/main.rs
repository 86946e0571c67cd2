//! MNX - MetaNetX table tooling

use clap::Parser;
use mnx_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use mnx_ingest::{commands, Cli, Commands};
use std::io::IsTerminal;
use std::process::ExitCode;
use tracing::error;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .output(LogOutput::Console)
        .log_file_prefix("mnx")
        .filter_directives("suppaftp=warn")
        .build();

    // Environment variables take precedence
    let log_config = match log_config.clone().merge_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Ignoring invalid logging environment: {:#}", e);
            log_config
        },
    };

    // The guard flushes file logs on exit
    let _guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Logging disabled: {:#}", e);
            None
        },
    };

    match execute_command(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        },
    }
}

/// Execute the CLI command
async fn execute_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Pull {
            directory,
            files,
            no_compress,
            release,
            config,
        } => {
            let show_progress = !cli.verbose && std::io::stderr().is_terminal();
            commands::pull::run(directory, files, !no_compress, release, config, show_progress).await
        },

        Commands::Process {
            table,
            input,
            output,
            release,
            config,
        } => commands::process::run(table, input, output, release, config),

        Commands::Report {
            table,
            input,
            duplicates,
            release,
            config,
        } => commands::report::run(table, input, duplicates, release, config),
    }
}
