//! `lineshift apply`: run a JSON batch against one file.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use lineshift_core::{
    Batch, BatchApplicator, BatchResult, EditConfig, FilePersistence, MemoryBuffers,
    OperationStatus, SaveMode,
};

/// Arguments for the apply command.
#[derive(Debug, Parser)]
pub struct ApplyArgs {
    /// File to edit
    pub file: PathBuf,

    /// JSON array of operations; `-` reads stdin
    #[arg(long, default_value = "-")]
    pub ops: String,

    /// Save mode for this run (overrides config)
    #[arg(long)]
    pub save_mode: Option<SaveMode>,

    /// Apply in memory and print the result without saving
    #[arg(long)]
    pub dry_run: bool,

    /// Print the batch report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Read the operations source named by `--ops`.
pub fn read_operations(source: &str) -> Result<Batch> {
    let json = if source == "-" {
        let mut json = String::new();
        std::io::stdin()
            .read_to_string(&mut json)
            .context("Failed to read operations from stdin")?;
        json
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read operations from {source}"))?
    };

    Batch::from_json(&json).context("Operations are not a valid JSON batch")
}

pub fn run(args: ApplyArgs, config: &EditConfig) -> Result<ExitCode> {
    let Applied { result, content } = execute(&args, config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_report(&result);
        if args.dry_run {
            print!("{content}");
        }
    }

    Ok(exit_code(&result, &args.file))
}

/// A finished batch and the buffer text it left behind.
struct Applied {
    result: BatchResult,
    content: String,
}

/// Apply the batch and save according to the resolved save mode.
fn execute(args: &ApplyArgs, config: &EditConfig) -> Result<Applied> {
    let batch = read_operations(&args.ops)?;

    let mut buffers = MemoryBuffers::new();
    let mut persistence = FilePersistence::new();
    let id = persistence
        .open_file(&mut buffers, &args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let layout = persistence.layout_for(id).unwrap_or_default();

    let save_mode = if args.dry_run {
        SaveMode::Manual
    } else {
        args.save_mode.unwrap_or(config.save_mode)
    };
    let mut applicator = BatchApplicator::from_config(config)
        .with_save_mode(save_mode)
        .with_persistence(persistence);

    let result = applicator.apply(&mut buffers, id, &batch);

    if result.is_success() && save_mode == SaveMode::Manual && !args.dry_run {
        info!(
            "Save mode is manual; {} was not written",
            args.file.display()
        );
    }

    Ok(Applied {
        content: buffers
            .lines(id)
            .map(|lines| layout.render(lines))
            .unwrap_or_default(),
        result,
    })
}

fn print_report(result: &BatchResult) {
    for op in &result.operations {
        let status = match &op.status {
            OperationStatus::Applied => match op.applied_line {
                Some(line) => format!("applied at line {line}"),
                None => "applied".to_string(),
            },
            OperationStatus::Rejected => "rejected".to_string(),
            OperationStatus::Failed { error } => format!("failed: {error}"),
            OperationStatus::NotReached => "not reached".to_string(),
        };
        println!("{:>3}. {:<7} {}", op.index + 1, op.kind, status);
    }
    println!("{}", result.summary());
}

fn exit_code(result: &BatchResult, file: &Path) -> ExitCode {
    if result.is_success() {
        ExitCode::SUCCESS
    } else {
        info!("{} left as it was on disk", file.display());
        ExitCode::from(1)
    }
}
