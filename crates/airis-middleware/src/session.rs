//! The [`DecisionSession`] contract shared by every transport binding.
//!
//! A session is created by [`initialize`][DecisionSession::initialize],
//! referenced by every later call and destroyed remotely by
//! [`end`][DecisionSession::end].  Bindings never retry and never invent a
//! session id: every call that needs one fails locally with
//! [`SessionError::NoSession`] before anything is sent.

use std::time::Duration;

use airis_types::EnvironmentState;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Failures of a single protocol call.  None of them poison the session; the
/// next call is attempted normally.
#[derive(Error, Debug)]
pub enum SessionError {
    /// No live session id: never initialized, or already ended.
    #[error("no active session")]
    NoSession,
    /// The HTTP request failed before a status was received.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The decision service answered with a non-success status.
    #[error("{operation} returned status {status}")]
    Status { operation: &'static str, status: u16 },
    /// No response envelope arrived in time.
    #[error("no response within {0:?}")]
    Timeout(Duration),
    /// A response arrived but it is not the one that was expected.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
    /// A message could not be encoded or decoded.
    #[error("encoding error: {0}")]
    Encoding(String),
    /// Bad binding configuration (malformed agent target, runtime setup).
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for SessionError {
    fn from(e: serde_json::Error) -> Self {
        SessionError::Encoding(e.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Results
// ─────────────────────────────────────────────────────────────────────────────

/// Opaque intermediate outputs of the decision service: base64 text wrapping
/// a serialized object graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionArtifact {
    pub state_output: String,
    pub edges_output: String,
}

/// Answer to `pre_action`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Raw action token, not yet validated against the vocabulary.
    pub suggested_action: String,
    pub artifact: DecisionArtifact,
}

/// Best-effort answer to `post_action`; every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostActionAck {
    #[serde(default)]
    pub suggested_action: Option<String>,
    #[serde(default)]
    pub state_output: Option<String>,
    #[serde(default)]
    pub edges_output: Option<String>,
}

/// `{status, message}` returned by `update_goal` and `end`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReply {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// DecisionSession
// ─────────────────────────────────────────────────────────────────────────────

/// Five-operation lifecycle against the remote decision service.
///
/// Every method blocks until the transport answers or fails.  At most one
/// call is in flight at a time because every method takes `&mut self`.
pub trait DecisionSession {
    /// Open a session for `goal` with the ordered action vocabulary and return
    /// the new session id.
    ///
    /// # Errors
    ///
    /// Any transport or status failure; the binding then holds no session.
    fn initialize(&mut self, goal: &Value, actions: &[String]) -> Result<String, SessionError>;

    /// Ask for the next action given the state observed at tick start.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoSession`] without sending when not initialized,
    /// otherwise any transport failure.
    fn pre_action(&mut self, state: &EnvironmentState) -> Result<Decision, SessionError>;

    /// Report the state after acting.
    ///
    /// # Errors
    ///
    /// As [`pre_action`][Self::pre_action].
    fn post_action(&mut self, state: &EnvironmentState) -> Result<PostActionAck, SessionError>;

    /// Replace the goal of the running session.  The locally held goal only
    /// changes when the service accepts the update.
    ///
    /// # Errors
    ///
    /// As [`pre_action`][Self::pre_action].
    fn update_goal(&mut self, goal: &Value) -> Result<StatusReply, SessionError>;

    /// End the session and return its id.  A successful end clears the id, so
    /// ending again fails locally with [`SessionError::NoSession`].
    ///
    /// # Errors
    ///
    /// As [`pre_action`][Self::pre_action].
    fn end(&mut self) -> Result<String, SessionError>;

    /// The live session id, if any.
    fn session_id(&self) -> Option<&str>;

    /// Adopt a previously persisted id so the session can be ended.
    fn resume(&mut self, session_id: String);

    /// The goal the service last accepted.
    fn goal(&self) -> Option<&Value>;
}

impl<S: DecisionSession + ?Sized> DecisionSession for Box<S> {
    fn initialize(&mut self, goal: &Value, actions: &[String]) -> Result<String, SessionError> {
        (**self).initialize(goal, actions)
    }

    fn pre_action(&mut self, state: &EnvironmentState) -> Result<Decision, SessionError> {
        (**self).pre_action(state)
    }

    fn post_action(&mut self, state: &EnvironmentState) -> Result<PostActionAck, SessionError> {
        (**self).post_action(state)
    }

    fn update_goal(&mut self, goal: &Value) -> Result<StatusReply, SessionError> {
        (**self).update_goal(goal)
    }

    fn end(&mut self) -> Result<String, SessionError> {
        (**self).end()
    }

    fn session_id(&self) -> Option<&str> {
        (**self).session_id()
    }

    fn resume(&mut self, session_id: String) {
        (**self).resume(session_id)
    }

    fn goal(&self) -> Option<&Value> {
        (**self).goal()
    }
}

/// Local lifecycle bookkeeping shared by the bindings.
#[derive(Debug, Clone, Default)]
pub(crate) struct SessionLedger {
    id: Option<String>,
    goal: Option<Value>,
}

impl SessionLedger {
    pub(crate) fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub(crate) fn require(&self) -> Result<String, SessionError> {
        self.id.clone().ok_or(SessionError::NoSession)
    }

    pub(crate) fn opened(&mut self, id: String, goal: &Value) {
        self.id = Some(id);
        self.goal = Some(goal.clone());
    }

    pub(crate) fn resume(&mut self, id: String) {
        self.id = Some(id);
    }

    pub(crate) fn goal(&self) -> Option<&Value> {
        self.goal.as_ref()
    }

    pub(crate) fn set_goal(&mut self, goal: &Value) {
        self.goal = Some(goal.clone());
    }

    pub(crate) fn closed(&mut self) {
        self.id = None;
    }
}
