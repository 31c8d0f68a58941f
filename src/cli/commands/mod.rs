//! CLI command implementations.

pub mod completions;
pub mod runs;
pub mod status;
pub mod sync;
pub mod version;

use crate::config::resolve_db_path;
use crate::error::{Error, Result};
use std::path::PathBuf;

/// Resolve the database path or fail with a config error.
fn db_path(explicit: Option<&PathBuf>) -> Result<PathBuf> {
    resolve_db_path(explicit.map(PathBuf::as_path))
        .ok_or_else(|| Error::Config("Could not determine home directory".into()))
}

/// Format epoch milliseconds for display.
fn format_millis(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map_or_else(|| ms.to_string(), |dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}
