//! Agent pose, its discrete projection, and angle arithmetic.
//!
//! World convention: yaw 0 faces `+z`, yaw 90 faces `-x`, positive pitch looks
//! down.  All controller errors are computed in radians and wrapped into
//! `(-π, π]` with [`normalize_angle`].

use std::f64::consts::{PI, TAU};

use serde::{Deserialize, Serialize};

/// Wrap an angle in radians into `(-π, π]`.
pub fn normalize_angle(rad: f64) -> f64 {
    let wrapped = (rad + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}

/// Integer voxel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// World-space point at the horizontal centre of the cell, at its floor.
    pub fn center(&self) -> [f64; 3] {
        [self.x as f64 + 0.5, self.y as f64, self.z as f64 + 0.5]
    }

    /// Chebyshev distance between two cells.
    pub fn chebyshev(&self, other: &Cell) -> i32 {
        (self.x - other.x)
            .abs()
            .max((self.y - other.y).abs())
            .max((self.z - other.z).abs())
    }

    /// `true` when both cells share the same `x` and `z`.
    pub fn same_column(&self, other: &Cell) -> bool {
        self.x == other.x && self.z == other.z
    }
}

/// Continuous agent pose as reported by the world: position in world units,
/// orientation in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, z: f64, pitch: f64, yaw: f64) -> Self {
        Self { x, y, z, pitch, yaw }
    }

    /// The voxel the agent's feet are in.
    pub fn cell(&self) -> Cell {
        Cell::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }

    /// Floored position, rounded pitch and yaw wrapped into `[0, 360)`.
    pub fn discretize(&self) -> DiscretePose {
        DiscretePose {
            cell: self.cell(),
            pitch: self.pitch.round_ties_even() as i32,
            yaw: (self.yaw.round_ties_even() as i32).rem_euclid(360),
        }
    }

    /// Distance to `target` in the horizontal (x, z) plane.
    pub fn planar_distance(&self, target: [f64; 3]) -> f64 {
        let dx = target[0] - self.x;
        let dz = target[2] - self.z;
        (dx * dx + dz * dz).sqrt()
    }

    /// Absolute `(pitch, yaw)` in radians that points from the agent at
    /// `target`.
    pub fn direction_to(&self, target: [f64; 3]) -> (f64, f64) {
        let dx = target[0] - self.x;
        let dz = target[2] - self.z;
        let yaw = -dx.atan2(dz);
        let pitch = -(target[1] - self.y).atan2((dx * dx + dz * dz).sqrt());
        (pitch, yaw)
    }

    /// Wrapped `(pitch, yaw)` error in radians from the current orientation to
    /// the absolute target angles, also in radians.
    pub fn angular_error(&self, target_pitch: f64, target_yaw: f64) -> (f64, f64) {
        (
            normalize_angle(target_pitch - self.pitch.to_radians()),
            normalize_angle(target_yaw - self.yaw.to_radians()),
        )
    }
}

/// Integer projection of a [`Pose`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiscretePose {
    pub cell: Cell,
    pub pitch: i32,
    pub yaw: i32,
}

impl DiscretePose {
    /// `[x, y, z, pitch, yaw]`, the order used on the wire.
    pub fn as_array(&self) -> [i32; 5] {
        [self.cell.x, self.cell.y, self.cell.z, self.pitch, self.yaw]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_angle_stays_in_half_open_range() {
        for deg in (-720..=720).step_by(15) {
            let a = normalize_angle((deg as f64).to_radians());
            assert!(a > -PI - 1e-12 && a <= PI + 1e-12, "{deg} -> {a}");
        }
        assert!((normalize_angle(PI) - PI).abs() < 1e-12);
        assert!((normalize_angle(-PI) - PI).abs() < 1e-12);
        assert!((normalize_angle(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn discretize_floors_position_and_wraps_yaw() {
        let pose = Pose::new(-0.5, 64.99, 3.2, 12.6, -90.2);
        let d = pose.discretize();
        assert_eq!(d.cell, Cell::new(-1, 64, 3));
        assert_eq!(d.pitch, 13);
        assert_eq!(d.yaw, 270);

        let pose = Pose::new(0.0, 0.0, 0.0, 0.0, 719.6);
        assert_eq!(pose.discretize().yaw, 0);
    }

    #[test]
    fn discretize_rounds_half_to_even() {
        assert_eq!(Pose::new(0.0, 0.0, 0.0, 0.5, 44.5).discretize().pitch, 0);
        assert_eq!(Pose::new(0.0, 0.0, 0.0, 1.5, 44.5).discretize().yaw, 44);
    }

    #[test]
    fn direction_to_matches_world_convention() {
        let pose = Pose::new(0.5, 4.0, 0.5, 0.0, 0.0);
        let (_, yaw) = pose.direction_to([-0.5, 4.0, 0.5]);
        assert!((yaw - PI / 2.0).abs() < 1e-9, "-x is yaw 90");
        let (pitch, yaw) = pose.direction_to([0.5, 4.0, 1.5]);
        assert!(yaw.abs() < 1e-9, "+z is yaw 0");
        assert!(pitch.abs() < 1e-9);
    }

    #[test]
    fn angular_error_is_wrapped() {
        let pose = Pose::new(0.0, 0.0, 0.0, 0.0, 350.0);
        let (_, dyaw) = pose.angular_error(0.0, 10f64.to_radians());
        assert!((dyaw - 20f64.to_radians()).abs() < 1e-9);
    }

    #[test]
    fn chebyshev_distance() {
        let a = Cell::new(0, 0, 0);
        assert_eq!(a.chebyshev(&Cell::new(1, 0, -1)), 1);
        assert_eq!(a.chebyshev(&Cell::new(2, 1, 0)), 2);
    }
}
