//! Loading the JSON config file from disk.

use std::path::Path;
use tracing::debug;

use recreate_core::EngineConfig;

use crate::error::{EngineError, EngineResult};

/// Default location of the config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/database.json";

/// Reads and validates the config file at `path`.
///
/// ## Errors
/// - `Configuration` if the file is missing, unreadable, not JSON, or
///   lacks a mandatory key
pub fn load_config(path: &Path) -> EngineResult<EngineConfig> {
    let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            EngineError::Configuration(format!("config file not found: {}", path.display()))
        }
        _ => EngineError::Configuration(format!("cannot read {}: {e}", path.display())),
    })?;

    let config = EngineConfig::from_json(&text)?;
    debug!(path = %path.display(), source = %config.database.path.display(), "Config loaded");
    Ok(config)
}
