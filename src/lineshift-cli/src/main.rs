//! lineshift - apply batched line edits to a file.

mod apply_cmd;
mod replace_cmd;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use lineshift_core::EditConfig;

use crate::apply_cmd::ApplyArgs;
use crate::replace_cmd::ReplaceArgs;

/// Apply batches of line edits given in original line numbers.
#[derive(Debug, Parser)]
#[command(name = "lineshift")]
#[command(about = "Apply batched line edits to a file")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (overrides config and LINESHIFT_LOG_LEVEL)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply a JSON batch of add/delete/update operations
    Apply(ApplyArgs),

    /// Replace the first literal occurrence of a string
    Replace(ReplaceArgs),
}

fn setup_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<EditConfig> {
    match path {
        Some(path) => {
            let mut config = EditConfig::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            config
                .apply_env()
                .context("Invalid environment override")?;
            Ok(config)
        }
        None => EditConfig::from_env().context("Failed to load config from environment"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_ref());
    let (level, json) = match &config {
        Ok(config) => (
            cli.log_level.clone().unwrap_or_else(|| config.logging.level.clone()),
            cli.json_logs || config.logging.json,
        ),
        Err(_) => (
            cli.log_level.clone().unwrap_or_else(|| "info".to_string()),
            cli.json_logs,
        ),
    };
    setup_logging(&level, json);

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Command::Apply(args) => apply_cmd::run(args, &config),
        Command::Replace(args) => replace_cmd::run(args).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_apply() {
        let cli = Cli::try_parse_from(["lineshift", "apply", "notes.txt", "--ops", "ops.json"])
            .expect("should parse");
        match cli.command {
            Command::Apply(args) => {
                assert_eq!(args.file, PathBuf::from("notes.txt"));
                assert_eq!(args.ops, "ops.json");
                assert!(!args.dry_run);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_ops_default_to_stdin() {
        let cli = Cli::try_parse_from(["lineshift", "apply", "notes.txt"]).expect("should parse");
        match cli.command {
            Command::Apply(args) => assert_eq!(args.ops, "-"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "lineshift",
            "replace",
            "a.txt",
            "--search",
            "x",
            "--replace",
            "y",
            "--log-level",
            "debug",
            "--json-logs",
        ])
        .expect("should parse");

        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(cli.json_logs);
    }

    #[test]
    fn test_replace_requires_search() {
        assert!(Cli::try_parse_from(["lineshift", "replace", "a.txt", "--replace", "y"]).is_err());
    }

    #[test]
    fn test_load_missing_config_fails() {
        let path = PathBuf::from("/nonexistent/lineshift.toml");
        assert!(load_config(Some(&path)).is_err());
    }
}
