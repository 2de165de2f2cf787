//! `airis-perception` – what the agent knows about where it is.
//!
//! Reads the continuous pose and the voxel neighbourhood from a
//! [`World`][airis_hal::World] and normalises them into the domain types the
//! decision service consumes.
//!
//! # Modules
//!
//! - [`reader`] – [`PerceptionReader`][reader::PerceptionReader]: one
//!   observation → [`EnvironmentState`][airis_types::EnvironmentState].

pub mod reader;

pub use reader::{PerceptionConfig, PerceptionReader};
