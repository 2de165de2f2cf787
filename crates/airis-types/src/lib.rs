//! `airis-types` – shared vocabulary of the AIRIS voxel agent.
//!
//! Everything that crosses a crate boundary lives here: the continuous and
//! discrete agent pose, the 16-member action vocabulary exchanged with the
//! decision service, the local voxel grid and the environment snapshot that is
//! sent on every `pre_action` / `post_action` call.
//!
//! # Modules
//!
//! - [`pose`] – [`Pose`], [`DiscretePose`], [`Cell`] and angle helpers.
//! - [`action`] – [`ActionToken`], [`Verb`] and the [`Heading`] offset table.
//! - [`state`] – [`LocalGrid`], [`Voxel`] and [`EnvironmentState`].

pub mod action;
pub mod pose;
pub mod state;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use action::{ActionToken, Heading, Verb};
pub use pose::{Cell, DiscretePose, Pose, normalize_angle};
pub use state::{EnvironmentPayload, EnvironmentState, GridExtent, LocalGrid, Voxel};

/// Error type shared by the world-facing crates.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AirisError {
    #[error("World fault on {component}: {details}")]
    WorldFault { component: String, details: String },

    #[error("Local grid has {actual} voxels, expected {expected}")]
    GridShape { expected: usize, actual: usize },

    #[error("Unknown action token: {0:?}")]
    UnknownAction(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn airis_error_display() {
        let err = AirisError::UnknownAction("fly 90".to_string());
        assert!(err.to_string().contains("fly 90"));

        let err = AirisError::GridShape {
            expected: 125,
            actual: 3,
        };
        assert!(err.to_string().contains("125"));
    }

    #[test]
    fn world_fault_roundtrip() {
        let err = AirisError::WorldFault {
            component: "observer".to_string(),
            details: "no pose".to_string(),
        };
        let json = serde_json::to_string(&err).unwrap();
        let back: AirisError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}
