//! Persisted session id.
//!
//! After a successful end the id is written as `{"session_id": "…"}` so a
//! later `--restore` run can ask the service to end it again.  Nothing else
//! about the session is kept.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::StoreError;

pub const DEFAULT_SESSION_FILE: &str = "session_id.json";

#[derive(Debug, Serialize, Deserialize)]
struct SessionRecord {
    session_id: String,
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_FILE)
    }
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// # Errors
    ///
    /// [`StoreError::Io`] or [`StoreError::Json`].
    pub fn save(&self, session_id: &str) -> Result<(), StoreError> {
        let record = SessionRecord {
            session_id: session_id.to_string(),
        };
        fs::write(&self.path, serde_json::to_string(&record)?)?;
        info!(path = %self.path.display(), %session_id, "session id saved");
        Ok(())
    }

    /// # Errors
    ///
    /// [`StoreError::Io`] when the file is missing or unreadable and
    /// [`StoreError::Json`] when it is not a session record.
    pub fn load(&self) -> Result<String, StoreError> {
        let raw = fs::read_to_string(&self.path)?;
        let record: SessionRecord = serde_json::from_str(&raw)?;
        Ok(record.session_id)
    }
}
