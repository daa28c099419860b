//! patchwire: anchored markup diffing and session daemon CLI.
//!
//! # Usage
//!
//! ```text
//! patchwire serve --config <settings.yaml>
//! patchwire status [--config <settings.yaml> | --socket <path>]
//! patchwire stop   [--config <settings.yaml> | --socket <path>]
//! patchwire diff <old> <new> [--json] [--verify]
//! patchwire anchors <file> [--json]
//! patchwire render <template-dir> <template> [--assigns <json-file>]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    anchors::AnchorsArgs,
    daemon::{ServeArgs, StatusArgs, StopArgs},
    diff::DiffArgs,
    render::RenderArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "patchwire",
    version,
    about = "Diff rendered markup into anchored patch lists",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the session daemon in the foreground.
    Serve(ServeArgs),

    /// Query a running daemon.
    Status(StatusArgs),

    /// Ask a running daemon to shut down.
    Stop(StopArgs),

    /// Diff two markup files and print the patch list.
    Diff(DiffArgs),

    /// Print a markup file's canonical tree with its anchors.
    Anchors(AnchorsArgs),

    /// Render a template once and print the markup.
    Render(RenderArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Stop(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Anchors(args) => args.run(),
        Commands::Render(args) => args.run(),
    }
}
