//! # Recreation Pipelines
//!
//! The two end-to-end operations behind the binaries.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  recreate_schemas                     recreate_inserts                  │
//! │  ────────────────                     ────────────────                  │
//! │  open source (read-only)              open source (read-only)           │
//! │  SchemaIntrospector::capture          DataExtractor::dump               │
//! │  close source                         close source                      │
//! │       │                                     │                           │
//! │       ▼                                     ▼                           │
//! │  order tables by priority             order tables by priority          │
//! │  generate_schema_script               generate_data_script              │
//! │  write 001_recreate_schemas_*.sql     write 002_recreate_inserts_*.sql  │
//! │       │                               [write data_report_*.json]        │
//! │       ▼                                     ▼                           │
//! │  ─────────────────── shared tail ───────────────────                    │
//! │  [--backup]   BackupManager::snapshot_at(target, now)                   │
//! │  [--execute]  open target, MigrationExecutor::run(output_dir), close    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any failure before the write step leaves no files behind.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use recreate_core::config::PerformanceConfig;
use recreate_core::observer::{noop, ObserverHandle};
use recreate_core::order::DEFAULT_PRIORITY;
use recreate_core::script::{generate_data_script, generate_schema_script};
use recreate_core::{DataReport, DependencyOrderer, EngineConfig, ScriptHeader};

use crate::backup::BackupManager;
use crate::connection::Database;
use crate::error::{EngineError, EngineResult};
use crate::executor::{MigrationExecutor, MigrationSummary};
use crate::extract::DataExtractor;
use crate::introspect::SchemaIntrospector;
use crate::output::ScriptWriter;

/// Inputs for one pipeline run, after config and flags are merged.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub source: PathBuf,
    pub output_dir: PathBuf,
    pub target: Option<PathBuf>,
    /// Apply pending scripts in `output_dir` to `target`.
    pub execute: bool,
    /// Copy `target` before anything else touches it.
    pub backup: bool,
    /// Replaces the default data exclusions. `None` keeps the defaults.
    pub exclude_tables: Option<Vec<String>>,
    /// Write the JSON data report next to the data script.
    pub with_report: bool,
    pub priority: Vec<String>,
    pub stable_row_order: bool,
    pub performance: PerformanceConfig,
}

impl RunOptions {
    /// Options with only the paths set.
    pub fn new(source: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        RunOptions {
            source: source.into(),
            output_dir: output_dir.into(),
            target: None,
            execute: false,
            backup: false,
            exclude_tables: None,
            with_report: false,
            priority: DEFAULT_PRIORITY.iter().map(|s| s.to_string()).collect(),
            stable_row_order: false,
            performance: PerformanceConfig::default(),
        }
    }

    /// Options taken from a config document.
    pub fn from_config(config: &EngineConfig) -> Self {
        RunOptions {
            target: config.database.target_path.clone(),
            priority: config.ordering.priority.clone(),
            stable_row_order: config.extraction.stable_row_order,
            performance: config.performance.clone(),
            ..RunOptions::new(&config.database.path, &config.database.migrations_path)
        }
    }

    fn required_target(&self) -> EngineResult<Option<&Path>> {
        match (&self.target, self.execute || self.backup) {
            (Some(target), _) => Ok(Some(target.as_path())),
            (None, true) => Err(EngineError::Configuration(
                "a target database is required for --execute and --backup \
                 (use --target-db or database.target_path)"
                    .to_string(),
            )),
            (None, false) => Ok(None),
        }
    }
}

/// What a run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub script_path: PathBuf,
    pub report_path: Option<PathBuf>,
    pub backup_path: Option<PathBuf>,
    /// Present when `execute` was requested.
    pub migrations: Option<MigrationSummary>,
}

/// Runs the recreation pipelines with one observer.
#[derive(Clone)]
pub struct Engine {
    observer: ObserverHandle,
}

impl Engine {
    pub fn new(observer: ObserverHandle) -> Self {
        Engine { observer }
    }

    /// Captures the source schema, writes the schema script, then
    /// optionally backs up and migrates the target.
    pub async fn recreate_schemas(
        &self,
        options: &RunOptions,
        now: DateTime<Utc>,
    ) -> EngineResult<RunOutcome> {
        let target = options.required_target()?;
        info!(source = %options.source.display(), "Recreating schemas");

        let catalog = SchemaIntrospector::new(self.observer.clone())
            .capture_path(&options.source)
            .await?;

        let order = DependencyOrderer::new(options.priority.clone()).order(catalog.tables.keys());
        let header = ScriptHeader::new(options.source.display().to_string(), now);
        let script = generate_schema_script(&catalog, &order, &header);

        let writer = ScriptWriter::new(&options.output_dir, self.observer.clone());
        let script_path = writer.write_schema(&script)?;

        let mut outcome = RunOutcome {
            script_path,
            ..RunOutcome::default()
        };
        self.finish(options, target, now, &mut outcome).await?;
        Ok(outcome)
    }

    /// Dumps the source rows, writes the data script (and report), then
    /// optionally backs up and migrates the target.
    pub async fn recreate_inserts(
        &self,
        options: &RunOptions,
        now: DateTime<Utc>,
    ) -> EngineResult<RunOutcome> {
        let target = options.required_target()?;
        info!(source = %options.source.display(), "Recreating inserts");

        let mut extractor =
            DataExtractor::new(self.observer.clone()).stable_row_order(options.stable_row_order);
        if let Some(exclude) = &options.exclude_tables {
            extractor = extractor.with_excluded(exclude.iter().cloned());
        }
        let data = extractor.dump_path(&options.source).await?;

        let order = DependencyOrderer::new(options.priority.clone()).order(data.keys());
        let header = ScriptHeader::new(options.source.display().to_string(), now);
        let script = generate_data_script(&data, &order, &header);

        let writer = ScriptWriter::new(&options.output_dir, self.observer.clone());
        let script_path = writer.write_data(&script)?;
        let report_path = if options.with_report {
            Some(writer.write_report(&DataReport::from_snapshot(&data), now)?)
        } else {
            None
        };

        let mut outcome = RunOutcome {
            script_path,
            report_path,
            ..RunOutcome::default()
        };
        self.finish(options, target, now, &mut outcome).await?;
        Ok(outcome)
    }

    async fn finish(
        &self,
        options: &RunOptions,
        target: Option<&Path>,
        now: DateTime<Utc>,
        outcome: &mut RunOutcome,
    ) -> EngineResult<()> {
        let Some(target) = target else {
            return Ok(());
        };

        if options.backup {
            outcome.backup_path =
                BackupManager::new(self.observer.clone()).snapshot_at(target, now)?;
        }

        if options.execute {
            let mut db = Database::open_target(target, options.performance.clone()).await?;
            let summary = MigrationExecutor::new(self.observer.clone())
                .restore_foreign_keys(options.performance.foreign_keys)
                .run(&mut db, &options.output_dir)
                .await?;
            db.close().await?;
            outcome.migrations = Some(summary);
        }
        Ok(())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new(noop())
    }
}
