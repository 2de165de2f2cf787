//! `airis-hal` – the world connection and everything that moves the agent.
//!
//! # Modules
//!
//! - [`world`] – [`World`][world::World]: the boundary to the simulator
//!   (pose, local grid, control commands, clock).
//! - [`controller`] – [`HeadingController`][controller::HeadingController]:
//!   proportional steering law shared by every closed loop.
//! - [`actuator`] – [`Actuator`][actuator::Actuator]: turns a discrete
//!   [`ActionToken`][airis_types::ActionToken] into a bounded sequence of
//!   turn/pitch/throttle commands driven by live pose feedback.
//! - [`sim`] – [`SimWorld`][sim::SimWorld]: headless kinematic voxel world for
//!   tests and offline runs.

pub mod actuator;
pub mod controller;
pub mod sim;
pub mod world;

pub use actuator::{Actuator, ActuatorConfig, Arrival, Convergence, StepReport};
pub use controller::HeadingController;
pub use sim::SimWorld;
pub use world::{Command, World};
