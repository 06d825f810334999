//! Forwards engine events to `tracing`.
//!
//! The binaries install a subscriber and pass a [`TracingObserver`] to the
//! engine; library code never installs one itself.

use std::sync::Arc;
use tracing::{info, warn};

use recreate_core::observer::{EngineEvent, Observer, ObserverHandle};
use recreate_core::MigrationState;

/// Logs every event at `info`, and rollbacks at `warn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TracingObserver {
    pub fn handle() -> ObserverHandle {
        Arc::new(TracingObserver)
    }
}

impl Observer for TracingObserver {
    fn notify(&self, event: &EngineEvent) {
        match event {
            EngineEvent::CatalogCaptured {
                tables,
                indexes,
                views,
                triggers,
            } => info!(tables, indexes, views, triggers, "Schema captured"),
            EngineEvent::TableExtracted { table, rows } => {
                info!(table = %table, rows, "Extracted table")
            }
            EngineEvent::TableExcluded { table } => info!(table = %table, "Excluded table"),
            EngineEvent::ArtifactWritten { path, bytes } => {
                info!(path = %path.display(), bytes, "Wrote file")
            }
            EngineEvent::Migration {
                version,
                state: MigrationState::RolledBack,
            } => warn!(version = %version, "Migration rolled back"),
            EngineEvent::Migration { version, state } => {
                info!(version = %version, state = ?state, "Migration state")
            }
            EngineEvent::MigrationSkipped { version } => {
                info!(version = %version, "Migration already applied")
            }
            EngineEvent::Backup { path: Some(path) } => {
                info!(backup = %path.display(), "Backup created")
            }
            EngineEvent::Backup { path: None } => info!("Nothing to back up"),
        }
    }
}
