//! Command-line surface of the `blockrun` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "blockrun", version, about = "Run orchestration and streaming relay for block apps")]
pub struct Cli {
    /// Configuration file (defaults to $BLOCKRUN_CONFIG_PATH or <config dir>/blockrun/config.json).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the HTTP API until interrupted.
    Serve(ServeArgs),
    /// Create the SQLite schema.
    InitDb(DatabaseArgs),
    /// Load users, sessions, apps and providers from a JSON fixture.
    Seed(SeedArgs),
}

#[derive(Debug, Default, Args)]
pub struct DatabaseArgs {
    /// SQLite database file.
    #[arg(long, value_name = "PATH")]
    pub database: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Socket address to listen on.
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// Base URL of the execution backend.
    #[arg(long, value_name = "URL")]
    pub backend_url: Option<String>,

    #[command(flatten)]
    pub database: DatabaseArgs,
}

#[derive(Debug, Args)]
pub struct SeedArgs {
    #[arg(long, short = 'f', value_name = "FIXTURE")]
    pub file: PathBuf,

    #[command(flatten)]
    pub database: DatabaseArgs,
}
