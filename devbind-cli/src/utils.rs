//! Common utility functions shared across CLI commands.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use tracing::debug;

/// Key directory below the per-user local data directory.
const DEFAULT_STORE_DIR: &str = "devbind/keys";

/// Resolve the key store directory.
///
/// An explicit `--store-dir` (or `DEVBIND_STORE_DIR`) wins, then
/// `<local data dir>/devbind/keys` (`~/.local/share` on Linux).
pub fn resolve_store_dir(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_STORE_DIR)
    })
}

/// Read a text input, with `-` meaning stdin.
pub fn read_input(path: &Path, what: &str) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .with_context(|| format!("Failed to read {what} from stdin"))?;
        debug!(bytes = buf.len(), "Read {what} from stdin");
        return Ok(buf);
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {what} file: {}", path.display()))?;
    debug!(path = %path.display(), bytes = contents.len(), "Read {what}");
    Ok(contents)
}

/// Resolve a token argument: `@FILE` reads the token from a file.
pub fn load_token(arg: &str) -> Result<String> {
    match arg.strip_prefix('@') {
        Some(path) => Ok(read_input(Path::new(path), "token")?.trim().to_string()),
        None => Ok(arg.trim().to_string()),
    }
}

/// Format a Unix timestamp (seconds) as a human-readable UTC string.
pub fn format_timestamp(timestamp: i64) -> String {
    match Utc.timestamp_opt(timestamp, 0) {
        chrono::LocalResult::Single(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        _ => format!("{}s", timestamp),
    }
}
