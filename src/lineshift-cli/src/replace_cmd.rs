//! `lineshift replace`: first-occurrence literal replacement in a file.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use lineshift_core::{ReplaceOutcome, SearchReplace};

/// Arguments for the replace command.
#[derive(Debug, Parser)]
pub struct ReplaceArgs {
    /// File to edit
    pub file: PathBuf,

    /// Text to search for (matched literally)
    #[arg(long)]
    pub search: String,

    /// Replacement text
    #[arg(long)]
    pub replace: String,

    /// Report the match without writing
    #[arg(long)]
    pub dry_run: bool,

    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: ReplaceArgs) -> Result<ExitCode> {
    let outcome = SearchReplace::new()
        .dry_run(args.dry_run)
        .replace_in_file(&args.file, &args.search, &args.replace)
        .await
        .with_context(|| format!("Failed to edit {}", args.file.display()))?;

    if args.json {
        println!("{}", serde_json::to_string(&outcome)?);
    } else {
        match outcome {
            ReplaceOutcome::Replaced { line } => {
                println!("Replaced text at line {} of {}", line, args.file.display())
            }
            ReplaceOutcome::NotFound => {
                println!("Search text not found in {}", args.file.display())
            }
        }
    }

    Ok(if outcome.is_replaced() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
