//! Main CLI application structure

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use super::output::{Output, OutputFormat};
use super::{analyse, graph_cmd, logging, query};
use crate::storage::{Config, Workspace};

#[derive(Parser)]
#[command(name = "depwalk")]
#[command(author, version, about = "Incremental build-dependency analyzer for source trees")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to ./depwalk.toml when present)
    #[arg(long, short = 'c', global = true, env = "DEPWALK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Workspace directory for products and the store
    #[arg(long, short = 'w', global = true, env = "DEPWALK_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Walk a source tree and record its symbol dependencies
    Analyse {
        /// Source tree (or single file) to walk
        source: PathBuf,
    },

    /// Show every definition of a symbol
    Symbol {
        /// Symbol name
        name: String,
    },

    /// Resolve the prerequisites of one definition
    Depends {
        /// Symbol name
        name: String,

        /// Analysed file defining the symbol (e.g. working/a.prag.i)
        file: PathBuf,
    },

    /// Print every stored record in stable order
    Dump,

    /// Drop every record of a file
    Forget {
        /// Analysed file whose records to remove
        file: PathBuf,
    },

    /// Print analysed files in build order
    Order,

    /// List files to rebuild when a file changes
    Affected {
        /// The changed analysed file
        file: PathBuf,
    },
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let output = Output::new(cli.format);

    let config = Config::load(cli.config.as_deref())?;
    let workspace_dir = cli.workspace.clone().unwrap_or_else(|| config.workspace.clone());
    let workspace = Workspace::open(&workspace_dir, &config)
        .with_context(|| format!("Failed to open workspace: {}", workspace_dir.display()))?;
    debug!(workspace = %workspace.root().display(), "Workspace ready");

    match cli.command {
        Commands::Analyse { source } => analyse::run(&output, &config, &workspace, &source)?,
        Commands::Symbol { name } => query::symbol(&output, &workspace, &name)?,
        Commands::Depends { name, file } => query::depends(&output, &workspace, &name, &file)?,
        Commands::Dump => query::dump(&output, &workspace)?,
        Commands::Forget { file } => query::forget(&output, &workspace, &file)?,
        Commands::Order => graph_cmd::order(&output, &workspace)?,
        Commands::Affected { file } => graph_cmd::affected(&output, &workspace, &file)?,
    }

    Ok(())
}

/// Resolves a file argument to the identity the store uses
pub(crate) fn resolve_file(file: &std::path::Path) -> Result<PathBuf> {
    if let Ok(resolved) = file.canonicalize() {
        return Ok(resolved);
    }
    if file.is_absolute() {
        return Ok(file.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(cwd.join(file))
}
