//! `airis-memory` – what survives a tick, and what survives a run.
//!
//! # Modules
//!
//! - [`artifacts`] – [`ArtifactPublisher`][artifacts::ArtifactPublisher]:
//!   decodes the decision service's intermediate outputs and publishes them,
//!   together with the local voxel map, as files for external viewers.
//! - [`session_store`] – [`SessionStore`][session_store::SessionStore]:
//!   persists the id of an ended session so a later run can end it again.

pub mod artifacts;
pub mod session_store;

pub use artifacts::{ArtifactPublisher, decode_artifact};
pub use session_store::SessionStore;

use thiserror::Error;

/// Errors that can arise while reading or writing local state.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("artifact is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("artifact is not a valid pickle: {0}")]
    Pickle(#[from] serde_pickle::Error),
}
