//! Pose and neighbourhood reader.
//!
//! An observation is two world queries, pose first and grid second, combined
//! into an [`EnvironmentState`].  The pose is projected with
//! [`Pose::discretize`] so the decision service always sees integer
//! coordinates, rounded pitch and a yaw in `[0, 360)`.
//!
//! # Example
//!
//! ```rust
//! use airis_hal::SimWorld;
//! use airis_perception::PerceptionReader;
//!
//! let mut world = SimWorld::flat(64);
//! let state = PerceptionReader::default().observe(&mut world).unwrap();
//! assert_eq!(state.pose.as_array(), [0, 64, 0, 0, 0]);
//! assert_eq!(state.grid.labels().len(), 125);
//! ```

use airis_hal::World;
use airis_types::{AirisError, EnvironmentState, GridExtent, LocalGrid, Pose};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Shape of the neighbourhood the world is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PerceptionConfig {
    pub extent: GridExtent,
}

/// Turns raw world queries into [`EnvironmentState`] snapshots.
#[derive(Debug, Clone, Default)]
pub struct PerceptionReader {
    config: PerceptionConfig,
}

impl PerceptionReader {
    pub fn new(config: PerceptionConfig) -> Self {
        Self { config }
    }

    pub fn extent(&self) -> GridExtent {
        self.config.extent
    }

    /// Continuous pose, unmodified.
    ///
    /// # Errors
    ///
    /// Propagates [`AirisError::WorldFault`].
    pub fn pose<W: World>(&self, world: &mut W) -> Result<Pose, AirisError> {
        world.pose()
    }

    /// Read pose and grid and build a snapshot.
    ///
    /// # Errors
    ///
    /// [`AirisError::WorldFault`] when either query fails and
    /// [`AirisError::GridShape`] when the world returns a grid that does not
    /// match the configured extent.
    pub fn observe<W: World>(&self, world: &mut W) -> Result<EnvironmentState, AirisError> {
        let pose = world.pose()?.discretize();
        let labels = world.near_grid()?;
        let grid = LocalGrid::new(labels, self.config.extent)?;
        debug!(position = ?pose.as_array(), "observed environment");
        Ok(EnvironmentState::new(pose, grid))
    }
}
