//! `airis-runtime` – the control loop.
//!
//! # Modules
//!
//! - [`control_loop`] – [`ControlLoop`][control_loop::ControlLoop]: observe →
//!   decide → act → report, once per tick, until cancelled; plus
//!   [`restore_and_end`][control_loop::restore_and_end] for ending a session
//!   left over from an earlier run.
//! - [`cancel`] – [`CancelToken`][cancel::CancelToken]: stop signal that is
//!   ignored until the loop is running.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: `tracing`
//!   subscriber with optional OTLP span export.

pub mod cancel;
pub mod control_loop;
pub mod telemetry;

pub use cancel::CancelToken;
pub use control_loop::{
    ControlLoop, ControlLoopConfig, LoopState, RuntimeError, TickOutcome, restore_and_end,
};
pub use telemetry::{TracerProviderGuard, init_tracing};
