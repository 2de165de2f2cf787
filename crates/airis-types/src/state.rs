//! Local voxel grid and the environment snapshot exchanged with the decision
//! service.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::AirisError;
use crate::pose::{Cell, DiscretePose};

/// Label the world uses for empty voxels.
pub const AIR: &str = "air";

/// Dimensions of the cuboid around the agent and the grid index that maps to
/// the agent's own cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridExtent {
    pub size_x: usize,
    pub size_y: usize,
    pub size_z: usize,
    pub origin_x: i32,
    pub origin_y: i32,
    pub origin_z: i32,
}

impl GridExtent {
    pub fn len(&self) -> usize {
        self.size_x * self.size_y * self.size_z
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for GridExtent {
    /// 5×5×5 centred on the agent.
    fn default() -> Self {
        Self {
            size_x: 5,
            size_y: 5,
            size_z: 5,
            origin_x: 2,
            origin_y: 2,
            origin_z: 2,
        }
    }
}

/// A non-air voxel at an absolute world coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voxel {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub label: String,
}

/// Voxel labels around the agent, flattened in `(y, z, x)` order with `x`
/// varying fastest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalGrid {
    labels: Vec<String>,
    extent: GridExtent,
}

impl LocalGrid {
    /// # Errors
    ///
    /// [`AirisError::GridShape`] when `labels` does not fill `extent`.
    pub fn new(labels: Vec<String>, extent: GridExtent) -> Result<Self, AirisError> {
        if labels.len() != extent.len() {
            return Err(AirisError::GridShape {
                expected: extent.len(),
                actual: labels.len(),
            });
        }
        Ok(Self { labels, extent })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn extent(&self) -> GridExtent {
        self.extent
    }

    /// Label at grid indices, or `None` outside the cuboid.
    pub fn get(&self, xi: usize, yi: usize, zi: usize) -> Option<&str> {
        let e = &self.extent;
        if xi >= e.size_x || yi >= e.size_y || zi >= e.size_z {
            return None;
        }
        self.labels
            .get((yi * e.size_z + zi) * e.size_x + xi)
            .map(String::as_str)
    }

    /// Every non-air voxel translated to absolute coordinates, given the cell
    /// the grid was sampled around.
    pub fn solid_voxels(&self, center: Cell) -> Vec<Voxel> {
        let e = &self.extent;
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, label)| label.as_str() != AIR)
            .map(|(i, label)| {
                let xi = (i % e.size_x) as i32;
                let zi = ((i / e.size_x) % e.size_z) as i32;
                let yi = (i / (e.size_x * e.size_z)) as i32;
                Voxel {
                    x: center.x + xi - e.origin_x,
                    y: center.y + yi - e.origin_y,
                    z: center.z + zi - e.origin_z,
                    label: label.clone(),
                }
            })
            .collect()
    }
}

/// The unit of information sent to the decision service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentState {
    pub pose: DiscretePose,
    pub grid: LocalGrid,
}

impl EnvironmentState {
    pub fn new(pose: DiscretePose, grid: LocalGrid) -> Self {
        Self { pose, grid }
    }

    /// Transport-neutral form of this state.
    pub fn to_payload(&self) -> EnvironmentPayload {
        EnvironmentPayload {
            position: self.pose.as_array().to_vec(),
            nearby_grid: self.grid.labels().to_vec(),
        }
    }

    pub fn solid_voxels(&self) -> Vec<Voxel> {
        self.grid.solid_voxels(self.pose.cell)
    }
}

/// `{position: [x, y, z, pitch, yaw], nearby_grid: [label, …]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EnvironmentPayload {
    pub position: Vec<i32>,
    pub nearby_grid: Vec<String>,
}
