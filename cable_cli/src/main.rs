//! cablesizer - cable sizing from the terminal
//!
//! Sizes cables, checks voltage drop, lists lookup tables and manages the
//! archive of saved calculations.

use std::path::PathBuf;

use anyhow::{Context, Result};
use cable_core::settings::Settings;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{ArchiveCommands, DropArgs, SectionsArgs, SizeArgs};

/// cablesizer - cable sizing by ampacity and voltage drop
#[derive(Parser, Debug)]
#[command(name = "cablesizer")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to settings file
    #[arg(short, long, default_value = "cablesizer.toml")]
    config: PathBuf,

    /// Lookup database (TOML or JSON) replacing the embedded tables
    #[arg(long)]
    database: Option<PathBuf>,

    /// Archive file, overriding the settings
    #[arg(long)]
    archive: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Find the smallest compliant cable for a load
    Size(SizeArgs),

    /// Voltage drop of a chosen cable
    Drop(DropArgs),

    /// Show the lookup table for a cable type and installation
    Sections(SectionsArgs),

    /// Saved calculations
    #[command(subcommand)]
    Archive(ArchiveCommands),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let mut settings = Settings::load_or_default(&cli.config)
        .with_context(|| format!("failed to load settings from {}", cli.config.display()))?;
    if let Some(database) = cli.database {
        settings.files.database = Some(database);
    }
    if let Some(archive) = cli.archive {
        settings.files.archive = archive;
    }

    match cli.command {
        Commands::Size(args) => commands::size(&settings, &args),
        Commands::Drop(args) => commands::voltage_drop(&settings, &args),
        Commands::Sections(args) => commands::sections(&settings, &args),
        Commands::Archive(cmd) => commands::archive(&settings, &cmd),
    }
}
