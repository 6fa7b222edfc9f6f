//! Per-portal session persistence.
//!
//! One JSON blob per portal identifier lives under the state directory. The
//! orchestrator treats the blob as opaque: the cookie map is interpreted by
//! the HTTP transport, and `profile_dir` is a reference to a persistent
//! browser profile for browser-backed portals. An operator can force a fresh
//! session by deleting a portal's file; the store never deletes entries
//! itself, only overwrites them.

use std::collections::BTreeMap;
use std::path::PathBuf;

use padron_core::Portal;
use serde::{Deserialize, Serialize};

use crate::error::ScrapeError;

/// Persisted browsing state for one portal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Cookie name → value pairs, replayed on every request and refreshed
    /// from `Set-Cookie` response headers.
    #[serde(default)]
    pub cookies: BTreeMap<String, String>,
    /// Browser profile directory for browser-backed portals. Opaque here;
    /// consumed by the transport layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_dir: Option<PathBuf>,
}

impl SessionState {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty() && self.profile_dir.is_none()
    }
}

/// File-backed store of [`SessionState`] blobs keyed by portal identifier.
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        SessionStore { dir: dir.into() }
    }

    fn entry_path(&self, portal: Portal) -> PathBuf {
        self.dir.join(format!("session-{portal}.json"))
    }

    /// Loads the persisted state for a portal.
    ///
    /// Never fails: a missing or corrupt entry degrades to `None`, which
    /// triggers a fresh session.
    #[must_use]
    pub fn load(&self, portal: Portal) -> Option<SessionState> {
        let path = self.entry_path(portal);
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(portal = %portal, path = %path.display(), error = %e,
                    "failed to read session entry; starting fresh");
                return None;
            }
        };
        match serde_json::from_slice::<SessionState>(&raw) {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::warn!(portal = %portal, path = %path.display(), error = %e,
                    "corrupt session entry; starting fresh");
                None
            }
        }
    }

    /// Overwrites the persisted state for a portal.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Session`] on I/O failure. Callers treat this
    /// as fatal to the run: continuing would silently lose a trusted
    /// session.
    pub fn save(&self, portal: Portal, state: &SessionState) -> Result<(), ScrapeError> {
        let session_err = |source: std::io::Error| ScrapeError::Session {
            portal: portal.as_str(),
            source,
        };
        std::fs::create_dir_all(&self.dir).map_err(session_err)?;
        let body = serde_json::to_vec_pretty(state).map_err(|e| {
            session_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        std::fs::write(self.entry_path(portal), body).map_err(session_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let mut state = SessionState::default();
        state
            .cookies
            .insert("incap_ses".to_owned(), "abc123".to_owned());
        state.profile_dir = Some(dir.path().join("chrome-profile-empresia"));

        store.save(Portal::Empresia, &state).unwrap();
        let loaded = store.load(Portal::Empresia).expect("entry should exist");
        assert_eq!(loaded, state);
    }

    #[test]
    fn missing_entry_is_absent_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        assert!(store.load(Portal::Einforma).is_none());
    }

    #[test]
    fn corrupt_entry_degrades_to_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        std::fs::write(dir.path().join("session-librebor.json"), b"{not json").unwrap();
        assert!(store.load(Portal::Librebor).is_none());
    }

    #[test]
    fn entries_are_keyed_per_portal() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let mut state = SessionState::default();
        state.cookies.insert("sid".to_owned(), "x".to_owned());
        store.save(Portal::Europages, &state).unwrap();

        assert!(store.load(Portal::Europages).is_some());
        assert!(store.load(Portal::Empresite).is_none());
    }

    #[test]
    fn save_overwrites_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let mut state = SessionState::default();
        state.cookies.insert("sid".to_owned(), "old".to_owned());
        store.save(Portal::Empresia, &state).unwrap();
        state.cookies.insert("sid".to_owned(), "new".to_owned());
        store.save(Portal::Empresia, &state).unwrap();

        let loaded = store.load(Portal::Empresia).unwrap();
        assert_eq!(loaded.cookies.get("sid").map(String::as_str), Some("new"));
    }
}
