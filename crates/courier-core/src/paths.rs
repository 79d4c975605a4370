//! On-disk artifact locations for provider sessions.
//!
//! The provider client persists credential material and a profile cache per
//! session. Both live under the daemon's data directory, keyed by session
//! id, and are removed when the session is destroyed.

use std::path::{Path, PathBuf};

/// Credential storage for a session.
pub fn auth_dir(data_dir: &Path, session_id: &str) -> PathBuf {
    data_dir.join("auth").join(session_id)
}

/// Provider profile cache for a session.
pub fn cache_dir(data_dir: &Path, session_id: &str) -> PathBuf {
    data_dir.join("cache").join(session_id)
}

/// Delete a session's artifact directories.
///
/// Best-effort: the data is reproducible by re-linking, so failures are
/// logged rather than surfaced.
pub fn remove_session_artifacts(data_dir: &Path, session_id: &str) {
    for dir in [
        auth_dir(data_dir, session_id),
        cache_dir(data_dir, session_id),
    ] {
        if !dir.exists() {
            continue;
        }
        if let Err(err) = std::fs::remove_dir_all(&dir) {
            log::warn!(
                "failed to remove session artifacts at {}: {err}",
                dir.display()
            );
        }
    }
}
