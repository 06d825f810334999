//! # Migration Executor
//!
//! Applies pending script files to a target database, one transaction per
//! file, and records each success in the ledger.
//!
//! ## How Migrations Run
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Migration Process                                  │
//! │                                                                         │
//! │  ensure_ledger()  ─► CREATE TABLE IF NOT EXISTS schema_migrations      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  list_scripts(dir) sorted by filename                                  │
//! │       │                                                                 │
//! │       ├── 001_recreate_schemas_20240101_120000.sql ✓ (in ledger, skip) │
//! │       ├── 002_recreate_inserts_20240101_120500.sql ⬜ (pending)         │
//! │       └── 003_fix_units.sql                        ⬜ (pending)         │
//! │       │                                                                 │
//! │       ▼  for each pending file, in order:                              │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  [PRAGMA foreign_keys = OFF]   only if the script disables it   │   │
//! │  │  BEGIN                                                          │   │
//! │  │    SAVEPOINT ... script body (transaction control stripped)     │   │
//! │  │    RELEASE   fails if the body ended the transaction itself     │   │
//! │  │    INSERT INTO schema_migrations (version) VALUES (?)           │   │
//! │  │  COMMIT   ── any error ──► ROLLBACK, stop the batch             │   │
//! │  │  [PRAGMA foreign_keys = <configured>]                           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rules
//! - Files already in the ledger are never re-run, so a second run is a
//!   no-op.
//! - A file's statements and its ledger row commit together or not at all.
//! - The first failure halts the batch; later files stay pending.
//! - A script containing a plain `ROLLBACK` is refused before it runs.
//! - Two runs racing on one target: the loser's ledger insert violates the
//!   primary key and its transaction rolls back.

use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::{Connection, FromRow};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use recreate_core::observer::{noop, EngineEvent, ObserverHandle};
use recreate_core::script::{prepare_script, PreparedScript};
use recreate_core::{MigrationRecord, MigrationState, LEDGER_TABLE};

use crate::connection::Database;
use crate::error::{describe, is_unique_violation, EngineError, EngineResult};

/// Savepoint wrapped around each script body.
const SCRIPT_SAVEPOINT: &str = "recreate_script";

// =============================================================================
// Migration Files
// =============================================================================

/// One `*.sql` file in the migrations directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationFile {
    /// The filename, used as the ledger version.
    pub version: String,
    pub path: PathBuf,
}

/// Lists `*.sql` files in `dir`, sorted by filename.
///
/// ## Errors
/// - `Configuration` if the directory does not exist or cannot be read
pub fn list_scripts(dir: &Path) -> EngineResult<Vec<MigrationFile>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        EngineError::Configuration(format!(
            "cannot read migrations directory {}: {e}",
            dir.display()
        ))
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            EngineError::Configuration(format!(
                "cannot read migrations directory {}: {e}",
                dir.display()
            ))
        })?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("sql") {
            continue;
        }
        if let Some(version) = path.file_name().and_then(|n| n.to_str()) {
            files.push(MigrationFile {
                version: version.to_string(),
                path: path.clone(),
            });
        } else {
            warn!(path = %path.display(), "Skipping migration with non UTF-8 name");
        }
    }

    files.sort_by(|a, b| a.version.cmp(&b.version));
    Ok(files)
}

// =============================================================================
// Executor
// =============================================================================

/// Outcome of one [`MigrationExecutor::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationSummary {
    /// Versions applied by this run, in order.
    pub applied: Vec<String>,
    /// Versions found in the ledger and left alone.
    pub skipped: Vec<String>,
}

#[derive(Debug, FromRow)]
struct LedgerRow {
    version: String,
    applied_at: NaiveDateTime,
}

/// Applies script files to a target database.
#[derive(Clone)]
pub struct MigrationExecutor {
    observer: ObserverHandle,
    restore_foreign_keys: bool,
}

impl MigrationExecutor {
    pub fn new(observer: ObserverHandle) -> Self {
        MigrationExecutor {
            observer,
            restore_foreign_keys: true,
        }
    }

    /// The `foreign_keys` setting put back after a script that disabled
    /// enforcement. Should match the target's configured setting.
    pub fn restore_foreign_keys(mut self, enabled: bool) -> Self {
        self.restore_foreign_keys = enabled;
        self
    }

    /// Creates the ledger table if it doesn't exist.
    pub async fn ensure_ledger(&self, db: &mut Database) -> EngineResult<()> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {LEDGER_TABLE} (
                version TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )"
        );
        sqlx::query(&ddl)
            .execute(db.conn())
            .await
            .map_err(|e| EngineError::connection(db.path(), describe(&e)))?;
        Ok(())
    }

    /// Ledger records, oldest first.
    pub async fn applied(&self, db: &mut Database) -> EngineResult<Vec<MigrationRecord>> {
        self.ensure_ledger(db).await?;
        let rows: Vec<LedgerRow> = sqlx::query_as(&format!(
            "SELECT version, applied_at FROM {LEDGER_TABLE} ORDER BY applied_at, version"
        ))
        .fetch_all(db.conn())
        .await
        .map_err(|e| EngineError::connection(db.path(), describe(&e)))?;

        Ok(rows
            .into_iter()
            .map(|row| MigrationRecord {
                version: row.version,
                applied_at: row.applied_at,
            })
            .collect())
    }

    /// Files in `dir` without a ledger row, in the order `run` would apply
    /// them.
    pub async fn pending(&self, db: &mut Database, dir: &Path) -> EngineResult<Vec<MigrationFile>> {
        let files = list_scripts(dir)?;
        let applied = self.applied_versions(db).await?;
        Ok(files
            .into_iter()
            .filter(|f| !applied.contains(&f.version))
            .collect())
    }

    /// Applies every pending file in `dir`, stopping at the first failure.
    ///
    /// ## Errors
    /// - `Configuration` if `dir` cannot be listed
    /// - `MigrationApplication` naming the first file that failed; files
    ///   before it stay applied, it and later files stay pending
    pub async fn run(&self, db: &mut Database, dir: &Path) -> EngineResult<MigrationSummary> {
        let files = list_scripts(dir)?;
        let applied = self.applied_versions(db).await?;

        let mut summary = MigrationSummary::default();
        let mut pending = Vec::new();
        for file in files {
            if applied.contains(&file.version) {
                debug!(version = %file.version, "Already applied");
                self.observer.notify(&EngineEvent::MigrationSkipped {
                    version: file.version.clone(),
                });
                summary.skipped.push(file.version);
            } else {
                self.notify_state(&file.version, MigrationState::Pending);
                pending.push(file);
            }
        }

        info!(
            target = %db.path().display(),
            pending = pending.len(),
            skipped = summary.skipped.len(),
            "Applying migrations"
        );

        for file in &pending {
            self.apply_one(db, file).await?;
            summary.applied.push(file.version.clone());
        }

        info!(applied = summary.applied.len(), "Migrations complete");
        Ok(summary)
    }

    /// Applies one file in its own transaction and records it.
    ///
    /// Does not consult the ledger first; a file that is already recorded
    /// fails on the ledger insert and rolls back.
    pub async fn apply_one(&self, db: &mut Database, file: &MigrationFile) -> EngineResult<()> {
        let text = std::fs::read_to_string(&file.path)
            .map_err(|e| EngineError::migration(&file.version, format!("cannot read script: {e}")))?;
        let prepared = prepare_script(&text);

        self.notify_state(&file.version, MigrationState::Applying);
        debug!(
            version = %file.version,
            bytes = prepared.body.len(),
            removed_statements = prepared.removed_statements,
            "Applying migration"
        );

        let result = self.apply_prepared(db, &file.version, &prepared).await;
        match &result {
            Ok(()) => {
                info!(version = %file.version, "Migration applied");
                self.notify_state(&file.version, MigrationState::Applied);
            }
            Err(e) => {
                warn!(version = %file.version, error = %e, "Migration rolled back");
                self.notify_state(&file.version, MigrationState::RolledBack);
            }
        }
        result
    }

    async fn apply_prepared(
        &self,
        db: &mut Database,
        version: &str,
        prepared: &PreparedScript,
    ) -> EngineResult<()> {
        if let Some(statement) = prepared.unsupported.first() {
            return Err(EngineError::migration(
                version,
                format!("`{statement}` would end the migration transaction early"),
            ));
        }

        let disable_foreign_keys = prepared.foreign_keys == Some(false);
        if disable_foreign_keys {
            self.set_foreign_keys(db, version, false).await?;
        }

        let mut result = self.apply_in_transaction(db, version, &prepared.body).await;

        if disable_foreign_keys {
            let restored = self
                .set_foreign_keys(db, version, self.restore_foreign_keys)
                .await;
            if result.is_ok() {
                result = restored;
            }
        }
        result
    }

    /// Runs `body` and the ledger insert in one transaction.
    ///
    /// The body runs under a savepoint that must still exist afterwards; if
    /// the body ended the transaction itself, releasing it fails and the
    /// file is not recorded.
    async fn apply_in_transaction(
        &self,
        db: &mut Database,
        version: &str,
        body: &str,
    ) -> EngineResult<()> {
        let mut tx = db
            .conn()
            .begin()
            .await
            .map_err(|e| EngineError::migration(version, describe(&e)))?;

        if let Err(e) = sqlx::query(&format!("SAVEPOINT {SCRIPT_SAVEPOINT}"))
            .execute(&mut *tx)
            .await
        {
            rollback(tx, version).await;
            return Err(EngineError::migration(version, describe(&e)));
        }

        if !body.trim().is_empty() {
            if let Err(e) = sqlx::raw_sql(body).execute(&mut *tx).await {
                rollback(tx, version).await;
                return Err(EngineError::migration(version, describe(&e)));
            }
        }

        if let Err(e) = sqlx::query(&format!("RELEASE {SCRIPT_SAVEPOINT}"))
            .execute(&mut *tx)
            .await
        {
            warn!(version = %version, error = %describe(&e), "Script left the migration transaction");
            rollback(tx, version).await;
            return Err(EngineError::migration(
                version,
                "script ended the migration transaction early; statements before that point \
                 may be committed",
            ));
        }

        let insert = format!("INSERT INTO {LEDGER_TABLE} (version) VALUES (?1)");
        if let Err(e) = sqlx::query(&insert).bind(version).execute(&mut *tx).await {
            if is_unique_violation(&e) {
                warn!(version = %version, "Migration was recorded by another run");
            }
            rollback(tx, version).await;
            return Err(EngineError::migration(version, describe(&e)));
        }

        tx.commit()
            .await
            .map_err(|e| EngineError::migration(version, describe(&e)))
    }

    async fn set_foreign_keys(
        &self,
        db: &mut Database,
        version: &str,
        enabled: bool,
    ) -> EngineResult<()> {
        let pragma = if enabled {
            "PRAGMA foreign_keys = ON"
        } else {
            "PRAGMA foreign_keys = OFF"
        };
        sqlx::query(pragma)
            .execute(db.conn())
            .await
            .map_err(|e| EngineError::migration(version, describe(&e)))?;
        Ok(())
    }

    async fn applied_versions(&self, db: &mut Database) -> EngineResult<HashSet<String>> {
        Ok(self
            .applied(db)
            .await?
            .into_iter()
            .map(|record| record.version)
            .collect())
    }

    fn notify_state(&self, version: &str, state: MigrationState) {
        self.observer.notify(&EngineEvent::Migration {
            version: version.to_string(),
            state,
        });
    }
}

impl Default for MigrationExecutor {
    fn default() -> Self {
        MigrationExecutor::new(noop())
    }
}

async fn rollback(tx: sqlx::Transaction<'_, sqlx::Sqlite>, version: &str) {
    if let Err(e) = tx.rollback().await {
        warn!(version = %version, error = %describe(&e), "Rollback failed");
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{count, write_script};
    use recreate_core::config::PerformanceConfig;
    use recreate_core::observer::RecordingObserver;

    async fn target(dir: &Path) -> Database {
        Database::open_target(dir.join("target.db"), PerformanceConfig::default())
            .await
            .unwrap()
    }

    #[test]
    fn test_list_scripts_sorts_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "010_b.sql", "SELECT 1;");
        write_script(dir.path(), "002_a.sql", "SELECT 1;");
        write_script(dir.path(), "data_report.json", "{}");
        std::fs::create_dir(dir.path().join("999_dir.sql")).unwrap();

        let versions: Vec<_> = list_scripts(dir.path())
            .unwrap()
            .into_iter()
            .map(|f| f.version)
            .collect();
        assert_eq!(versions, vec!["002_a.sql", "010_b.sql"]);
    }

    #[test]
    fn test_missing_directory_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = list_scripts(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_run_applies_in_order_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = dir.path().join("migrations");
        write_script(&scripts, "001_schema.sql", "CREATE TABLE t (x INTEGER);");
        write_script(&scripts, "002_data.sql", "INSERT INTO t (x) VALUES (1), (2);");

        let mut db = target(dir.path()).await;
        let executor = MigrationExecutor::default();

        let first = executor.run(&mut db, &scripts).await.unwrap();
        assert_eq!(first.applied, vec!["001_schema.sql", "002_data.sql"]);
        assert!(first.skipped.is_empty());

        let second = executor.run(&mut db, &scripts).await.unwrap();
        assert!(second.applied.is_empty());
        assert_eq!(second.skipped, vec!["001_schema.sql", "002_data.sql"]);

        assert_eq!(count(&mut db, "t").await, 2);
        let records = executor.applied(&mut db).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(executor.pending(&mut db, &scripts).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_rolls_back_and_halts() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = dir.path().join("migrations");
        write_script(&scripts, "001_ok.sql", "CREATE TABLE a (x INTEGER);");
        write_script(&scripts, "002_ok.sql", "INSERT INTO a (x) VALUES (1);");
        write_script(
            &scripts,
            "003_broken.sql",
            "INSERT INTO a (x) VALUES (2);\nCREAT TABLE b (y);\n",
        );
        write_script(&scripts, "004_later.sql", "CREATE TABLE c (z INTEGER);");

        let recorder = RecordingObserver::new();
        let executor = MigrationExecutor::new(recorder.clone());
        let mut db = target(dir.path()).await;

        let err = executor.run(&mut db, &scripts).await.unwrap_err();
        match &err {
            EngineError::MigrationApplication { version, message } => {
                assert_eq!(version, "003_broken.sql");
                assert!(message.contains("syntax error"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(count(&mut db, "a").await, 1);
        let versions: Vec<_> = executor
            .applied(&mut db)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.version)
            .collect();
        assert_eq!(versions, vec!["001_ok.sql", "002_ok.sql"]);

        assert_eq!(
            recorder.states_for("003_broken.sql"),
            vec![
                MigrationState::Pending,
                MigrationState::Applying,
                MigrationState::RolledBack
            ]
        );
        assert_eq!(recorder.states_for("004_later.sql"), vec![MigrationState::Pending]);

        let pending: Vec<_> = executor
            .pending(&mut db, &scripts)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.version)
            .collect();
        assert_eq!(pending, vec!["003_broken.sql", "004_later.sql"]);
    }

    #[tokio::test]
    async fn test_script_transaction_control_is_absorbed() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = dir.path().join("migrations");
        write_script(
            &scripts,
            "001_schema.sql",
            "PRAGMA foreign_keys = ON;\n\
             CREATE TABLE projects (id INTEGER PRIMARY KEY);\n\
             CREATE TABLE units (id INTEGER PRIMARY KEY, project_id INTEGER REFERENCES projects(id));\n",
        );
        // Children before parents: only valid with enforcement off.
        write_script(
            &scripts,
            "002_data.sql",
            "PRAGMA foreign_keys = OFF;\nBEGIN TRANSACTION;\n\
             INSERT INTO units (id, project_id) VALUES (10, 1);\n\
             INSERT INTO projects (id) VALUES (1);\n\
             COMMIT;\nPRAGMA foreign_keys = ON;\n",
        );

        let mut db = target(dir.path()).await;
        let summary = MigrationExecutor::default().run(&mut db, &scripts).await.unwrap();

        assert_eq!(summary.applied.len(), 2);
        assert_eq!(count(&mut db, "units").await, 1);
        let fk: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(db.conn())
            .await
            .unwrap();
        assert_eq!(fk, 1);
    }

    async fn ledger_versions(executor: &MigrationExecutor, db: &mut Database) -> Vec<String> {
        executor
            .applied(db)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.version)
            .collect()
    }

    #[tokio::test]
    async fn test_begin_end_pair_cannot_commit_part_of_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = dir.path().join("migrations");
        write_script(&scripts, "001_a.sql", "CREATE TABLE a (x INTEGER);");
        write_script(
            &scripts,
            "002_b.sql",
            "BEGIN;
INSERT INTO a (x) VALUES (1);
END;
INSERT INTO nowhere VALUES (1);
",
        );

        let mut db = target(dir.path()).await;
        let executor = MigrationExecutor::default();

        for _ in 0..2 {
            let err = executor.run(&mut db, &scripts).await.unwrap_err();
            match err {
                EngineError::MigrationApplication { version, message } => {
                    assert_eq!(version, "002_b.sql");
                    assert!(message.contains("no such table: nowhere"), "{message}");
                }
                other => panic!("unexpected error: {other}"),
            }
            assert_eq!(count(&mut db, "a").await, 0);
            assert_eq!(ledger_versions(&executor, &mut db).await, vec!["001_a.sql"]);
        }
    }

    #[tokio::test]
    async fn test_commit_after_statement_on_same_line_is_absorbed() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = dir.path().join("migrations");
        write_script(&scripts, "001_a.sql", "CREATE TABLE a (x INTEGER);");
        write_script(
            &scripts,
            "002_b.sql",
            "INSERT INTO a (x) VALUES (1); COMMIT;
INSERT INTO nowhere VALUES (1);
",
        );

        let mut db = target(dir.path()).await;
        let executor = MigrationExecutor::default();

        executor.run(&mut db, &scripts).await.unwrap_err();
        assert_eq!(count(&mut db, "a").await, 0);
        assert_eq!(ledger_versions(&executor, &mut db).await, vec!["001_a.sql"]);
    }

    #[tokio::test]
    async fn test_rollback_statement_is_refused_before_running() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = dir.path().join("migrations");
        write_script(&scripts, "001_a.sql", "CREATE TABLE a (x INTEGER);");
        write_script(
            &scripts,
            "002_b.sql",
            "INSERT INTO a (x) VALUES (1);
ROLLBACK;
INSERT INTO a (x) VALUES (2);
",
        );

        let recorder = RecordingObserver::new();
        let executor = MigrationExecutor::new(recorder.clone());
        let mut db = target(dir.path()).await;

        let err = executor.run(&mut db, &scripts).await.unwrap_err();
        assert!(err.to_string().contains("`ROLLBACK;` would end the migration transaction"));
        assert_eq!(count(&mut db, "a").await, 0);
        assert_eq!(ledger_versions(&executor, &mut db).await, vec!["001_a.sql"]);
        assert_eq!(
            recorder.states_for("002_b.sql"),
            vec![
                MigrationState::Pending,
                MigrationState::Applying,
                MigrationState::RolledBack
            ]
        );
    }

    #[tokio::test]
    async fn test_body_that_ends_transaction_is_not_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = target(dir.path()).await;
        let executor = MigrationExecutor::default();
        executor.ensure_ledger(&mut db).await.unwrap();
        sqlx::query("CREATE TABLE a (x INTEGER)")
            .execute(db.conn())
            .await
            .unwrap();

        // Unprepared, so the COMMIT reaches SQLite.
        let err = executor
            .apply_in_transaction(
                &mut db,
                "001_raw.sql",
                "INSERT INTO a (x) VALUES (1);
COMMIT;
INSERT INTO a (x) VALUES (2);
",
            )
            .await
            .unwrap_err();

        assert!(err.to_string().contains("ended the migration transaction early"));
        assert!(ledger_versions(&executor, &mut db).await.is_empty());
    }

    #[tokio::test]
    async fn test_block_comment_with_quote_applies() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = dir.path().join("migrations");
        write_script(
            &scripts,
            "001_a.sql",
            "/* owner's table */
BEGIN TRANSACTION;
CREATE TABLE a (x INTEGER);
COMMIT;
",
        );

        let mut db = target(dir.path()).await;
        let summary = MigrationExecutor::default().run(&mut db, &scripts).await.unwrap();
        assert_eq!(summary.applied, vec!["001_a.sql"]);
        assert_eq!(count(&mut db, "a").await, 0);
    }

    #[tokio::test]
    async fn test_reapplying_recorded_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = dir.path().join("migrations");
        write_script(&scripts, "001_a.sql", "CREATE TABLE IF NOT EXISTS a (x);");

        let mut db = target(dir.path()).await;
        let executor = MigrationExecutor::default();
        executor.run(&mut db, &scripts).await.unwrap();

        let file = list_scripts(&scripts).unwrap().remove(0);
        let err = executor.apply_one(&mut db, &file).await.unwrap_err();
        assert!(err.to_string().contains("UNIQUE constraint failed"));
        assert_eq!(executor.applied(&mut db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_trigger_scripts_apply_intact() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = dir.path().join("migrations");
        write_script(
            &scripts,
            "001_trigger.sql",
            "CREATE TABLE a (x INTEGER);\nCREATE TABLE log (x INTEGER);\n\
             CREATE TRIGGER trg AFTER INSERT ON a\nBEGIN\n  INSERT INTO log (x) VALUES (NEW.x);\nEND;\n\
             INSERT INTO a (x) VALUES (7);\n",
        );

        let mut db = target(dir.path()).await;
        MigrationExecutor::default().run(&mut db, &scripts).await.unwrap();
        assert_eq!(count(&mut db, "log").await, 1);
    }
}
