//! Rill CLI - The Rill compiler front end

use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = rill::cli::Cli::parse();
    match rill::cli::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
