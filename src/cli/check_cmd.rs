//! Handler for the `rill check` subcommand.

use crate::semantic;
use std::path::PathBuf;

pub(crate) fn run(files: &[PathBuf], json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut total_errors = 0;
    let mut files_checked = 0;

    for path in files {
        files_checked += 1;
        total_errors += check_file(path, json)?;
    }

    if total_errors > 0 {
        eprintln!(
            "\nChecked {} file(s), found {} error(s)",
            files_checked, total_errors
        );
        std::process::exit(1);
    }
    println!("Checked {} file(s), no errors found", files_checked);
    Ok(())
}

/// Check one file, printing its diagnostics; returns the error count
fn check_file(path: &PathBuf, json: bool) -> Result<usize, Box<dyn std::error::Error>> {
    let source =
        std::fs::read_to_string(path).map_err(|e| format!("failed to read {:?}: {}", path, e))?;

    let mut krate = match crate::parser::parse_source(&source, path) {
        Ok(krate) => krate,
        Err(bag) => {
            if json {
                println!("{}", bag.to_json());
            } else {
                eprintln!("{}", bag.format_text(&source));
            }
            return Ok(bag.error_count());
        }
    };

    match semantic::analyze(&mut krate) {
        Ok(_) => Ok(0),
        Err(e) => {
            let diagnostic = e.into_diagnostic(path);
            if json {
                println!("{}", diagnostic.to_json());
            } else {
                eprintln!("{}", diagnostic.to_human_readable(&source));
            }
            Ok(1)
        }
    }
}
