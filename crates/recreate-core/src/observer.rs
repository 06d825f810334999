//! # Run Observer
//!
//! Components report progress through an explicit observer handle passed
//! in at construction, instead of a process-wide logger. Each run can
//! carry its own observer, and tests can record exactly what happened.
//!
//! ```text
//! SchemaIntrospector ─┐
//! DataExtractor ──────┤
//! MigrationExecutor ──┼──► Arc<dyn Observer> ──► TracingObserver (binaries)
//! BackupManager ──────┤                      └─► RecordingObserver (tests)
//! ScriptWriter ───────┘
//! ```

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::types::MigrationState;

/// Something worth reporting during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The source catalog was read.
    CatalogCaptured {
        tables: usize,
        indexes: usize,
        views: usize,
        triggers: usize,
    },
    /// One table's rows were read.
    TableExtracted { table: String, rows: usize },
    /// A table was skipped because it is on the exclusion list.
    TableExcluded { table: String },
    /// A script or report file was written.
    ArtifactWritten { path: PathBuf, bytes: usize },
    /// A migration file moved to a new state.
    Migration {
        version: String,
        state: MigrationState,
    },
    /// A migration file was skipped because the ledger already has it.
    MigrationSkipped { version: String },
    /// A backup was taken, or skipped because the target did not exist.
    Backup { path: Option<PathBuf> },
}

/// Receives engine events.
pub trait Observer: Send + Sync {
    fn notify(&self, event: &EngineEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn notify(&self, _event: &EngineEvent) {}
}

/// Shared handle type passed to components.
pub type ObserverHandle = Arc<dyn Observer>;

/// Returns a handle that discards events.
pub fn noop() -> ObserverHandle {
    Arc::new(NoopObserver)
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(RecordingObserver::default())
    }

    /// Snapshot of the events seen so far.
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// States reported for one migration file, in order.
    pub fn states_for(&self, version: &str) -> Vec<MigrationState> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                EngineEvent::Migration { version: v, state } if v == version => Some(state),
                _ => None,
            })
            .collect()
    }
}

impl Observer for RecordingObserver {
    fn notify(&self, event: &EngineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
