//! In-process voxel world for tests and headless runs.
//!
//! [`SimWorld`] integrates the same continuous commands a live game client
//! accepts (turn/pitch rates, forward throttle, jump) on a virtual clock, so the
//! full control loop can run in CI without a game server and without real
//! sleeps.
//!
//! The model:
//!
//! * the agent is a point at its feet position;
//! * every cell below `ground_y` is solid, plus any block placed with
//!   [`SimWorld::with_block`];
//! * walking into a solid cell stops horizontal motion, unless jump is held,
//!   the agent is standing, and the cell above the obstacle is free, in which
//!   case it steps up one block;
//! * an unsupported agent falls at a constant speed until it lands.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use airis_hal::sim::SimWorld;
//! use airis_hal::world::{Command, World};
//!
//! let mut world = SimWorld::flat(4).with_pose(0.5, 4.0, 0.5, 0.0, 0.0);
//! world.send(Command::Move(1.0)).unwrap();
//! world.wait(Duration::from_millis(100));
//! assert!(world.pose().unwrap().z > 0.5);
//! ```

use std::collections::HashMap;
use std::time::Duration;

use airis_types::{AirisError, Cell, GridExtent, Pose};

use crate::world::{Command, World};

/// Degrees per second at full turn/pitch rate.
const TURN_SPEED_DEG: f64 = 180.0;
/// Blocks per second at full throttle.
const WALK_SPEED: f64 = 4.317;
/// Blocks per second while falling.
const FALL_SPEED: f64 = 10.0;
/// Largest integration step.
const MAX_STEP: Duration = Duration::from_millis(10);

/// Headless kinematic voxel world.
#[derive(Debug, Clone)]
pub struct SimWorld {
    pose: Pose,
    ground_y: i32,
    blocks: HashMap<Cell, String>,
    extent: GridExtent,
    turn_rate: f64,
    pitch_rate: f64,
    throttle: f64,
    jumping: bool,
    clock: Duration,
    commands: Vec<Command>,
}

impl SimWorld {
    /// Flat world whose surface is at `ground_y`: cells with `y < ground_y`
    /// are solid.  The agent starts standing at the centre of cell
    /// `(0, ground_y, 0)` facing yaw 0.
    pub fn flat(ground_y: i32) -> Self {
        Self {
            pose: Pose::new(0.5, ground_y as f64, 0.5, 0.0, 0.0),
            ground_y,
            blocks: HashMap::new(),
            extent: GridExtent::default(),
            turn_rate: 0.0,
            pitch_rate: 0.0,
            throttle: 0.0,
            jumping: false,
            clock: Duration::ZERO,
            commands: Vec::new(),
        }
    }

    pub fn with_pose(mut self, x: f64, y: f64, z: f64, pitch: f64, yaw: f64) -> Self {
        self.pose = Pose::new(x, y, z, pitch, yaw);
        self
    }

    /// Place a labelled block.  Placing `"air"` carves a hole in the ground.
    pub fn with_block(mut self, cell: Cell, label: impl Into<String>) -> Self {
        self.blocks.insert(cell, label.into());
        self
    }

    pub fn with_extent(mut self, extent: GridExtent) -> Self {
        self.extent = extent;
        self
    }

    /// Every command received so far, oldest first.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Label of the voxel at `cell`.
    pub fn label_at(&self, cell: Cell) -> &str {
        if let Some(label) = self.blocks.get(&cell) {
            return label;
        }
        if cell.y == self.ground_y - 1 {
            "grass_block"
        } else if cell.y < self.ground_y {
            "dirt"
        } else {
            "air"
        }
    }

    fn is_solid(&self, cell: Cell) -> bool {
        self.label_at(cell) != "air"
    }

    fn standing(&self) -> bool {
        let feet = self.pose.cell();
        self.pose.y.fract().abs() < 1e-9 && self.is_solid(Cell::new(feet.x, feet.y - 1, feet.z))
    }

    fn step(&mut self, h: f64) {
        self.pose.yaw += self.turn_rate.clamp(-1.0, 1.0) * TURN_SPEED_DEG * h;
        self.pose.pitch = (self.pose.pitch + self.pitch_rate.clamp(-1.0, 1.0) * TURN_SPEED_DEG * h)
            .clamp(-90.0, 90.0);

        let throttle = self.throttle.clamp(-1.0, 1.0);
        if throttle != 0.0 {
            let yaw = self.pose.yaw.to_radians();
            let nx = self.pose.x - yaw.sin() * throttle * WALK_SPEED * h;
            let nz = self.pose.z + yaw.cos() * throttle * WALK_SPEED * h;
            let feet = Cell::new(nx.floor() as i32, self.pose.y.floor() as i32, nz.floor() as i32);
            let head = Cell::new(feet.x, feet.y + 1, feet.z);
            if !self.is_solid(feet) && !self.is_solid(head) {
                self.pose.x = nx;
                self.pose.z = nz;
            } else if self.is_solid(feet)
                && self.jumping
                && self.standing()
                && !self.is_solid(head)
                && !self.is_solid(Cell::new(feet.x, feet.y + 2, feet.z))
            {
                self.pose.x = nx;
                self.pose.z = nz;
                self.pose.y = (feet.y + 1) as f64;
            }
        }

        if !self.standing() {
            let ny = self.pose.y - FALL_SPEED * h;
            let below = Cell::new(
                self.pose.x.floor() as i32,
                ny.floor() as i32,
                self.pose.z.floor() as i32,
            );
            self.pose.y = if self.is_solid(below) { (below.y + 1) as f64 } else { ny };
        }
    }
}

impl World for SimWorld {
    fn pose(&mut self) -> Result<Pose, AirisError> {
        Ok(self.pose)
    }

    fn near_grid(&mut self) -> Result<Vec<String>, AirisError> {
        let at = self.pose.cell();
        let e = self.extent;
        let mut labels = Vec::with_capacity(e.len());
        for yi in 0..e.size_y as i32 {
            for zi in 0..e.size_z as i32 {
                for xi in 0..e.size_x as i32 {
                    let cell = Cell::new(
                        at.x + xi - e.origin_x,
                        at.y + yi - e.origin_y,
                        at.z + zi - e.origin_z,
                    );
                    labels.push(self.label_at(cell).to_string());
                }
            }
        }
        Ok(labels)
    }

    fn send(&mut self, command: Command) -> Result<(), AirisError> {
        match command {
            Command::Turn(r) => self.turn_rate = r,
            Command::Pitch(r) => self.pitch_rate = r,
            Command::Move(t) => self.throttle = t,
            Command::Jump(on) => self.jumping = on,
        }
        self.commands.push(command);
        Ok(())
    }

    fn wait(&mut self, duration: Duration) {
        let mut remaining = duration;
        while !remaining.is_zero() {
            let h = remaining.min(MAX_STEP);
            self.step(h.as_secs_f64());
            remaining -= h;
        }
        self.clock += duration;
    }

    fn elapsed(&self) -> Duration {
        self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airis_types::{GridExtent, LocalGrid};

    #[test]
    fn idle_agent_stays_put_and_clock_advances() {
        let mut world = SimWorld::flat(4);
        world.wait(Duration::from_secs(2));
        let pose = world.pose().unwrap();
        assert_eq!(pose, Pose::new(0.5, 4.0, 0.5, 0.0, 0.0));
        assert_eq!(world.elapsed(), Duration::from_secs(2));
    }

    #[test]
    fn full_turn_rate_is_180_degrees_per_second() {
        let mut world = SimWorld::flat(4);
        world.send(Command::Turn(1.0)).unwrap();
        world.wait(Duration::from_millis(500));
        assert!((world.pose().unwrap().yaw - 90.0).abs() < 1e-6);
    }

    #[test]
    fn walking_follows_yaw_convention() {
        let mut world = SimWorld::flat(4).with_pose(0.5, 4.0, 0.5, 0.0, 90.0);
        world.send(Command::Move(1.0)).unwrap();
        world.wait(Duration::from_millis(100));
        let pose = world.pose().unwrap();
        assert!(pose.x < 0.5, "yaw 90 walks toward -x");
        assert!((pose.z - 0.5).abs() < 1e-9);
    }

    #[test]
    fn wall_blocks_walking() {
        let mut world = SimWorld::flat(4).with_block(Cell::new(0, 4, 1), "stone");
        world.send(Command::Move(1.0)).unwrap();
        world.wait(Duration::from_secs(1));
        let pose = world.pose().unwrap();
        assert!(pose.z < 1.0);
        assert_eq!(pose.cell(), Cell::new(0, 4, 0));
    }

    #[test]
    fn jumping_steps_onto_a_single_block() {
        let mut world = SimWorld::flat(4).with_block(Cell::new(0, 4, 1), "stone");
        world.send(Command::Jump(true)).unwrap();
        world.send(Command::Move(1.0)).unwrap();
        world.wait(Duration::from_millis(300));
        let pose = world.pose().unwrap();
        assert_eq!(pose.cell(), Cell::new(0, 5, 1));
    }

    #[test]
    fn walking_off_a_ledge_falls_until_landing() {
        let mut world = SimWorld::flat(4)
            .with_block(Cell::new(0, 3, 1), "air")
            .with_block(Cell::new(0, 2, 1), "air");
        world.send(Command::Move(1.0)).unwrap();
        world.wait(Duration::from_millis(200));
        world.send(Command::Move(0.0)).unwrap();
        world.wait(Duration::from_secs(1));
        let pose = world.pose().unwrap();
        assert_eq!(pose.cell(), Cell::new(0, 2, 1));
        assert_eq!(pose.y, 2.0);
    }

    #[test]
    fn near_grid_matches_local_grid_layout() {
        let mut world = SimWorld::flat(4).with_block(Cell::new(1, 5, 0), "oak_log");
        let labels = world.near_grid().unwrap();
        let grid = LocalGrid::new(labels, GridExtent::default()).unwrap();
        // agent cell (0, 4, 0), origin (2, 2, 2): (1, 5, 0) → xi 3, yi 3, zi 2
        assert_eq!(grid.get(3, 3, 2), Some("oak_log"));
        // row yi = 1 is the grass directly under the agent
        assert_eq!(grid.get(2, 1, 2), Some("grass_block"));
        assert_eq!(grid.get(2, 2, 2), Some("air"));
    }

    #[test]
    fn commands_are_recorded() {
        let mut world = SimWorld::flat(0);
        world.send(Command::Turn(0.3)).unwrap();
        world.send(Command::Turn(0.0)).unwrap();
        assert_eq!(world.commands(), &[Command::Turn(0.3), Command::Turn(0.0)]);
        world.clear_commands();
        assert!(world.commands().is_empty());
    }
}
