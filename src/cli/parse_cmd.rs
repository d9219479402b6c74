//! Handler for the `rill parse` subcommand.

use crate::semantic;
use std::path::PathBuf;

pub(crate) fn run(
    file: &PathBuf,
    analyze: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let source =
        std::fs::read_to_string(file).map_err(|e| format!("failed to read {:?}: {}", file, e))?;

    let mut krate = match crate::parser::parse_source(&source, file) {
        Ok(krate) => krate,
        Err(bag) => {
            if json {
                println!("{}", bag.to_json());
            } else {
                eprintln!("{}", bag.format_text(&source));
            }
            std::process::exit(1);
        }
    };

    if analyze {
        if let Err(e) = semantic::analyze(&mut krate) {
            let diagnostic = e.into_diagnostic(file);
            if json {
                println!("{}", diagnostic.to_json());
            } else {
                eprintln!("{}", diagnostic.to_human_readable(&source));
            }
            std::process::exit(1);
        }
    }

    println!("{}", serde_json::to_string_pretty(&krate)?);
    Ok(())
}
