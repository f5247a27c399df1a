// SPDX-License-Identifier: AGPL-3.0
// Hop Transfer CLI - Inspect and mirror transfer sets from the command line

use clap::{Parser, Subcommand};
use hop_transfer_core::receive::write_entry;
use hop_transfer_core::settings::settings_to_json;
use hop_transfer_core::{
    default_settings_path, load_settings, AppSettings, Selection, TransferError,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "hop-transfer", author, version, about, long_about = None)]
struct Cli {
    /// Settings file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the entries that would be sent for a selection
    Plan {
        /// Files and directories to send. Several items must share a parent directory.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Copy a selection into a directory the way a receiving peer would store it
    Mirror {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Destination directory (defaults to the configured download directory)
        #[arg(long)]
        into: Option<PathBuf>,

        /// Replace existing files instead of choosing a free name
        #[arg(long)]
        overwrite: bool,
    },
    /// Print the effective settings as JSON
    Settings,
}

fn settings(config: Option<PathBuf>) -> Result<AppSettings, TransferError> {
    let path = match config {
        Some(path) => path,
        None => default_settings_path()?,
    };
    load_settings(&path)
}

fn plan(paths: Vec<PathBuf>, json: bool) -> Result<(), TransferError> {
    let set = Selection::from_paths(paths)?.enumerate()?;

    if json {
        let out = serde_json::to_string_pretty(&set.summary())
            .map_err(|e| TransferError::Serialization(e.to_string()))?;
        println!("{}", out);
        return Ok(());
    }

    println!("{} ({} files)", set.name(), set.len());
    for entry in set.entries() {
        println!("  {}  {}", entry.mode(), entry.relative_path());
    }
    Ok(())
}

fn mirror(
    settings: AppSettings,
    paths: Vec<PathBuf>,
    into: Option<PathBuf>,
    overwrite: bool,
) -> Result<(), TransferError> {
    let dest = into.unwrap_or(settings.download_dir);
    let overwrite = overwrite || settings.overwrite_existing;
    let set = Selection::from_paths(paths)?.enumerate()?;

    tracing::info!(
        "Mirroring {} ({} files) into {}",
        set.name(),
        set.len(),
        dest.display()
    );
    for entry in set {
        let mut reader = entry.open()?;
        let written = write_entry(
            &dest,
            entry.relative_path(),
            entry.mode(),
            &mut reader,
            overwrite,
        )?;
        println!("{}", written.display());
    }
    Ok(())
}

fn show_settings(settings: &AppSettings) -> Result<(), TransferError> {
    println!("{}", settings_to_json(settings)?);
    Ok(())
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hop_transfer_cli=info,hop_transfer_core=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Plan { paths, json } => plan(paths, json),
        Command::Mirror {
            paths,
            into,
            overwrite,
        } => settings(cli.config).and_then(|s| mirror(s, paths, into, overwrite)),
        Command::Settings => settings(cli.config).and_then(|s| show_settings(&s)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_path_escape() => {
            tracing::error!("Refusing to continue: {}", e);
            ExitCode::from(3)
        }
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
