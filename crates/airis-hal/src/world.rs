//! The [`World`] trait: the only way the agent touches the simulator.
//!
//! Implementations wrap a concrete connection (a live game client, or the
//! in-process [`SimWorld`][crate::sim::SimWorld]).  The rest of the stack only
//! ever talks to the trait, so the world backend can be swapped without
//! touching control or protocol logic.
//!
//! The clock is part of the trait: every polling wait in the actuator goes
//! through [`World::wait`] and every timeout is measured with
//! [`World::elapsed`], which lets a simulated world run on virtual time.

use std::fmt;
use std::time::Duration;

use airis_types::{AirisError, Pose};

/// A continuous control command understood by the world.
///
/// Rates and throttle are fractions of the world's maximum speed in
/// `[-1, 1]`; the world clamps anything outside that range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Yaw rate; positive turns toward increasing yaw.
    Turn(f64),
    /// Pitch rate; positive looks down.
    Pitch(f64),
    /// Forward throttle.
    Move(f64),
    /// Hold or release jump.
    Jump(bool),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Turn(r) => write!(f, "turn {r}"),
            Command::Pitch(r) => write!(f, "pitch {r}"),
            Command::Move(t) => write!(f, "move {t}"),
            Command::Jump(on) => write!(f, "jump {}", u8::from(*on)),
        }
    }
}

/// Connection to the voxel world the agent is embodied in.
pub trait World {
    /// Current continuous pose of the agent.
    ///
    /// # Errors
    ///
    /// [`AirisError::WorldFault`] when the world cannot report a pose.
    fn pose(&mut self) -> Result<Pose, AirisError>;

    /// Voxel labels of the cuboid around the agent in `(y, z, x)` order.
    ///
    /// # Errors
    ///
    /// [`AirisError::WorldFault`] when no observation is available.
    fn near_grid(&mut self) -> Result<Vec<String>, AirisError>;

    /// Send one control command.
    ///
    /// # Errors
    ///
    /// [`AirisError::WorldFault`] when the command cannot be delivered.
    fn send(&mut self, command: Command) -> Result<(), AirisError>;

    /// Block for `duration` of world time.
    fn wait(&mut self, duration: Duration);

    /// Monotonic world time since the connection was opened.
    fn elapsed(&self) -> Duration;
}

impl<W: World + ?Sized> World for &mut W {
    fn pose(&mut self) -> Result<Pose, AirisError> {
        (**self).pose()
    }

    fn near_grid(&mut self) -> Result<Vec<String>, AirisError> {
        (**self).near_grid()
    }

    fn send(&mut self, command: Command) -> Result<(), AirisError> {
        (**self).send(command)
    }

    fn wait(&mut self, duration: Duration) {
        (**self).wait(duration)
    }

    fn elapsed(&self) -> Duration {
        (**self).elapsed()
    }
}
