//! Session identifiers and session-scoped directories.
//!
//! Every ingestion writes into `<base>/<session id>` so uploads and derived indexes from
//! different requests never share a directory. Sessions carry no other state; cleanup is a
//! plain directory sweep.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use time::{OffsetDateTime, macros::format_description};
use uuid::Uuid;
use walkdir::WalkDir;

/// Errors raised while naming or materializing sessions.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Caller-provided identifier is not a single path component.
    #[error("invalid session id '{0}'")]
    InvalidId(String),
    /// Session directory could not be created or listed.
    #[error("session directory error at {path}: {source}")]
    Io {
        /// Directory being created or listed.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}

/// Identifier naming a session directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Generate `session_<YYYYMMDD_HHMMSS>_<8 hex>` using the current UTC time.
    pub fn generate() -> Self {
        Self::generate_at(OffsetDateTime::now_utc())
    }

    pub(crate) fn generate_at(now: OffsetDateTime) -> Self {
        let format = format_description!("[year][month][day]_[hour][minute][second]");
        let stamp = now
            .format(&format)
            .unwrap_or_else(|_| "00000000_000000".to_string());
        Self(format!("session_{stamp}_{}", short_hex()))
    }

    /// Generate a bare v4 UUID identifier, as used by comparison sessions.
    pub fn generate_uuid() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Validate a caller-supplied identifier.
    pub fn parse(raw: &str) -> Result<Self, SessionError> {
        let trimmed = raw.trim();
        let invalid = trimmed.is_empty()
            || trimmed == "."
            || trimmed == ".."
            || trimmed.contains(['/', '\\'])
            || trimmed.chars().any(char::is_control);
        if invalid {
            return Err(SessionError::InvalidId(raw.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Borrow the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// First eight hex characters of a fresh v4 UUID.
pub(crate) fn short_hex() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Create `base/id` (and parents) and return its path. Idempotent.
pub fn create_session_dir(base: &Path, id: &SessionId) -> Result<PathBuf, SessionError> {
    let path = base.join(id.as_str());
    ensure_dir(&path)?;
    Ok(path)
}

/// Create a directory tree, mapping failures into [`SessionError::Io`].
pub(crate) fn ensure_dir(path: &Path) -> Result<(), SessionError> {
    std::fs::create_dir_all(path).map_err(|source| SessionError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Delete all but the `keep_latest` newest session directories under `base`.
///
/// Directory names sort by their embedded timestamp, so a descending name sort puts the newest
/// first. Individual removal failures are logged and skipped. Returns the removed paths.
pub fn clean_old_sessions(base: &Path, keep_latest: usize) -> Result<Vec<PathBuf>, SessionError> {
    if !base.exists() {
        return Ok(Vec::new());
    }

    let mut sessions = Vec::new();
    for entry in WalkDir::new(base).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|error| SessionError::Io {
            path: base.to_path_buf(),
            source: error.into(),
        })?;
        if entry.file_type().is_dir() {
            sessions.push(entry.into_path());
        }
    }
    sessions.sort_by(|a, b| b.file_name().cmp(&a.file_name()));

    let mut removed = Vec::new();
    for folder in sessions.into_iter().skip(keep_latest) {
        match std::fs::remove_dir_all(&folder) {
            Ok(()) => {
                tracing::info!(path = %folder.display(), "Old session folder deleted");
                removed.push(folder);
            }
            Err(error) => {
                tracing::warn!(
                    path = %folder.display(),
                    error = %error,
                    "Failed to delete session folder"
                );
            }
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn generated_ids_embed_timestamp_and_suffix() {
        let id = SessionId::generate_at(datetime!(2024-03-05 07:08:09 UTC));
        let value = id.as_str();
        assert!(value.starts_with("session_20240305_070809_"), "{value}");
        let suffix = value.rsplit('_').next().unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn parse_rejects_path_traversal() {
        assert!(SessionId::parse("../etc").is_err());
        assert!(SessionId::parse("a/b").is_err());
        assert!(SessionId::parse("..").is_err());
        assert!(SessionId::parse("   ").is_err());
        assert_eq!(SessionId::parse(" abc ").unwrap().as_str(), "abc");
    }

    #[test]
    fn clean_old_sessions_keeps_newest() {
        let temp = tempfile::tempdir().unwrap();
        for name in [
            "session_20240101_000000_aaaaaaaa",
            "session_20240102_000000_bbbbbbbb",
            "session_20240103_000000_cccccccc",
            "session_20240104_000000_dddddddd",
        ] {
            std::fs::create_dir_all(temp.path().join(name)).unwrap();
        }
        std::fs::write(temp.path().join("stray.txt"), b"x").unwrap();

        let removed = clean_old_sessions(temp.path(), 2).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(temp.path().join("session_20240104_000000_dddddddd").exists());
        assert!(temp.path().join("session_20240103_000000_cccccccc").exists());
        assert!(!temp.path().join("session_20240101_000000_aaaaaaaa").exists());
        assert!(temp.path().join("stray.txt").exists());
    }

    #[test]
    fn clean_old_sessions_ignores_missing_base() {
        let temp = tempfile::tempdir().unwrap();
        let removed = clean_old_sessions(&temp.path().join("missing"), 3).unwrap();
        assert!(removed.is_empty());
    }
}
