//! `airis-middleware` – the wire to the decision service.
//!
//! Speaks the five-operation session protocol (initialize, pre-action,
//! post-action, update-goal, end) over one of two interchangeable bindings
//! chosen at construction time.  The rest of the stack only sees the
//! [`DecisionSession`] trait.
//!
//! # Modules
//!
//! - [`session`] – [`DecisionSession`]: the synchronous contract, its result
//!   types and [`SessionError`].
//! - [`protocol`] – request/response bodies and the [`Model`][protocol::Model]
//!   schema digest.
//! - [`http`] – [`HttpSession`]: one blocking JSON `POST` per operation.
//! - [`agent`] – [`AgentSession`]: signed, correlated envelopes exchanged with
//!   a remote agent, bounded by a reply timeout.
//! - [`envelope`] / [`identity`] – envelope sealing and the ephemeral ed25519
//!   identity behind it.

pub mod agent;
pub mod envelope;
pub mod http;
pub mod identity;
pub mod protocol;
pub mod session;

pub use agent::{AgentSession, AgentSessionConfig, AgentTarget, Courier, HttpCourier};
pub use http::{DEFAULT_API_URL, HttpSession, HttpSessionConfig};
pub use session::{
    Decision, DecisionArtifact, DecisionSession, PostActionAck, SessionError, StatusReply,
};
