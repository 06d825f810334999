//! # recreate-cli
//!
//! Argument handling shared by `recreate-schemas` and `recreate-inserts`.
//!
//! ## Resolution Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  value          flag              config key                 fallback   │
//! │  ─────────────  ────────────────  ─────────────────────────  ────────   │
//! │  source         --source-db       database.path              required   │
//! │  output dir     --output-dir      database.migrations_path   required   │
//! │  target         --target-db       database.target_path       none       │
//! │  log filter     RUST_LOG          --verbosity                info       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The config file is only read when a flag leaves a required value
//! unset.

use clap::Args;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use recreate_core::EngineConfig;
use recreate_db::{load_config, EngineResult, RunOptions, RunOutcome, DEFAULT_CONFIG_PATH};

/// Flags accepted by both binaries.
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Path to the JSON configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Source database (overrides database.path)
    #[arg(long)]
    pub source_db: Option<PathBuf>,

    /// Directory for generated scripts (overrides database.migrations_path)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Database that --execute migrates (overrides database.target_path)
    #[arg(long)]
    pub target_db: Option<PathBuf>,

    /// Copy the target database before touching it
    #[arg(long)]
    pub backup: bool,

    /// Apply pending scripts in the output directory to the target
    #[arg(long)]
    pub execute: bool,

    /// Log verbosity: trace, debug, info, warn, error (RUST_LOG wins)
    #[arg(long, default_value = "info")]
    pub verbosity: String,
}

impl CommonArgs {
    /// Merges flags over the config file into run options.
    pub fn resolve(&self) -> EngineResult<RunOptions> {
        let config = match (&self.source_db, &self.output_dir) {
            (Some(source), Some(output)) if !self.config.exists() => {
                EngineConfig::for_paths(source, output)
            }
            _ => load_config(&self.config)?,
        };

        let mut options = RunOptions::from_config(&config);
        if let Some(source) = &self.source_db {
            options.source = source.clone();
        }
        if let Some(output) = &self.output_dir {
            options.output_dir = output.clone();
        }
        if let Some(target) = &self.target_db {
            options.target = Some(target.clone());
        }
        options.backup = self.backup;
        options.execute = self.execute;
        Ok(options)
    }
}

/// Installs the stderr subscriber. `RUST_LOG` takes precedence over
/// `verbosity`.
pub fn init_logging(verbosity: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(verbosity))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Prints the outcome and maps the result to a process exit code.
pub fn finish(result: EngineResult<RunOutcome>) -> ExitCode {
    match result {
        Ok(outcome) => {
            println!("Script written: {}", outcome.script_path.display());
            if let Some(report) = &outcome.report_path {
                println!("Report written: {}", report.display());
            }
            if let Some(backup) = &outcome.backup_path {
                println!("Backup created: {}", backup.display());
            }
            if let Some(summary) = &outcome.migrations {
                println!(
                    "Migrations applied: {}, already applied: {}",
                    summary.applied.len(),
                    summary.skipped.len()
                );
            }
            info!("Done");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        common: CommonArgs,
    }

    fn parse(args: &[&str]) -> CommonArgs {
        Cli::parse_from(std::iter::once("test").chain(args.iter().copied())).common
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        assert_eq!(args.config, PathBuf::from("config/database.json"));
        assert_eq!(args.verbosity, "info");
        assert!(!args.backup && !args.execute);
    }

    #[test]
    fn test_flags_alone_need_no_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("absent.json");
        let args = parse(&[
            "--config",
            config.to_str().unwrap(),
            "--source-db",
            "a.db",
            "--output-dir",
            "out",
            "--target-db",
            "b.db",
            "--execute",
        ]);

        let options = args.resolve().unwrap();
        assert_eq!(options.source, PathBuf::from("a.db"));
        assert_eq!(options.output_dir, PathBuf::from("out"));
        assert_eq!(options.target, Some(PathBuf::from("b.db")));
        assert!(options.execute);
    }

    #[test]
    fn test_flags_override_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("database.json");
        std::fs::write(
            &config,
            r#"{"database": {"type": "sqlite", "path": "cfg.db", "migrations_path": "cfg_out",
                             "target_path": "cfg_target.db"}}"#,
        )
        .unwrap();

        let args = parse(&["--config", config.to_str().unwrap(), "--source-db", "flag.db"]);
        let options = args.resolve().unwrap();

        assert_eq!(options.source, PathBuf::from("flag.db"));
        assert_eq!(options.output_dir, PathBuf::from("cfg_out"));
        assert_eq!(options.target, Some(PathBuf::from("cfg_target.db")));
    }

    #[test]
    fn test_missing_config_without_flags_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("absent.json");
        let args = parse(&["--config", config.to_str().unwrap(), "--source-db", "a.db"]);

        assert!(args.resolve().is_err());
    }
}
