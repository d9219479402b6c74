//! Command-line interface for the Rill toolchain
//!
//! Provides commands: check, parse

mod check_cmd;
mod parse_cmd;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Rill - a small Rust-inspired systems language
#[derive(Parser, Debug)]
#[command(name = "rill")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output diagnostics as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse and semantically check source files
    Check {
        /// Files to check
        #[arg(value_name = "FILES", required = true)]
        files: Vec<PathBuf>,
    },

    /// Parse a source file and dump its annotated AST as JSON
    Parse {
        /// The file to parse
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Run the semantic passes before dumping
        #[arg(long)]
        analyze: bool,
    },
}

/// Dispatch a parsed command line
pub fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Check { files } => check_cmd::run(&files, cli.json),
        Command::Parse { file, analyze } => parse_cmd::run(&file, analyze, cli.json),
    }
}
