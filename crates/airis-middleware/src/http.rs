//! Synchronous HTTP binding.
//!
//! One blocking JSON `POST` per operation under a base URL:
//!
//! | Operation | Path |
//! |---|---|
//! | initialize | `/initialize` |
//! | pre_action | `/preaction` |
//! | post_action | `/postaction` |
//! | update_goal | `/runtime` |
//! | end | `/end` |
//!
//! Any status outside `2xx` fails that call only.
//!
//! # Example
//!
//! ```rust,no_run
//! use airis_middleware::{DecisionSession, HttpSession, HttpSessionConfig};
//!
//! let mut session = HttpSession::new(HttpSessionConfig::default()).unwrap();
//! // Requires a running decision service.
//! // let id = session.initialize(&serde_json::json!({"type": "explore"}), &[]).unwrap();
//! ```

use std::time::Duration;

use airis_types::EnvironmentState;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::protocol::{
    EndSessionRequest, EndSessionResponse, InitializeRequest, InitializeResponse,
    PostActionRequest, PostActionResponse, PreActionRequest, PreActionResponse, RuntimeRequest,
    RuntimeResponse,
};
use crate::session::{
    Decision, DecisionArtifact, DecisionSession, PostActionAck, SessionError, SessionLedger,
    StatusReply,
};

/// Default base URL of a locally hosted decision service.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSessionConfig {
    pub base_url: String,
    /// Per-request timeout; `None` keeps the client default.
    #[serde(default)]
    pub timeout: Option<Duration>,
}

impl Default for HttpSessionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout: None,
        }
    }
}

/// [`DecisionSession`] over blocking HTTP.
///
/// Must not be used from inside an async runtime.
pub struct HttpSession {
    base_url: String,
    client: Client,
    ledger: SessionLedger,
}

impl HttpSession {
    /// # Errors
    ///
    /// [`SessionError::Http`] when the HTTP client cannot be built.
    pub fn new(config: HttpSessionConfig) -> Result<Self, SessionError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client: builder.build()?,
            ledger: SessionLedger::default(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        body: &B,
    ) -> Result<R, SessionError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(operation, %url, "posting");
        let response = self.client.post(&url).json(body).send()?;
        let status = response.status();
        if !status.is_success() {
            warn!(operation, status = status.as_u16(), "decision service rejected call");
            return Err(SessionError::Status {
                operation,
                status: status.as_u16(),
            });
        }
        Ok(response.json()?)
    }
}

impl DecisionSession for HttpSession {
    fn initialize(&mut self, goal: &Value, actions: &[String]) -> Result<String, SessionError> {
        let body = InitializeRequest {
            goal: goal.clone(),
            actions: actions.to_vec(),
        };
        let reply: InitializeResponse = self.post("initialize", "/initialize", &body)?;
        info!(session_id = %reply.session_id, "session initialized");
        self.ledger.opened(reply.session_id.clone(), goal);
        Ok(reply.session_id)
    }

    fn pre_action(&mut self, state: &EnvironmentState) -> Result<Decision, SessionError> {
        let body = PreActionRequest {
            session_id: self.ledger.require()?,
            environment_state: state.to_payload(),
        };
        let reply: PreActionResponse = self.post("pre_action", "/preaction", &body)?;
        Ok(Decision {
            suggested_action: reply.suggested_action,
            artifact: DecisionArtifact {
                state_output: reply.state_output,
                edges_output: reply.edges_output,
            },
        })
    }

    fn post_action(&mut self, state: &EnvironmentState) -> Result<PostActionAck, SessionError> {
        let body = PostActionRequest {
            session_id: self.ledger.require()?,
            environment_state: state.to_payload(),
        };
        let reply: PostActionResponse = self.post("post_action", "/postaction", &body)?;
        Ok(reply.into())
    }

    fn update_goal(&mut self, goal: &Value) -> Result<StatusReply, SessionError> {
        let body = RuntimeRequest {
            session_id: self.ledger.require()?,
            goal: goal.clone(),
        };
        let reply: RuntimeResponse = self.post("update_goal", "/runtime", &body)?;
        self.ledger.set_goal(goal);
        Ok(reply.into())
    }

    fn end(&mut self) -> Result<String, SessionError> {
        let session_id = self.ledger.require()?;
        let body = EndSessionRequest {
            session_id: session_id.clone(),
        };
        let _: EndSessionResponse = self.post("end", "/end", &body)?;
        info!(%session_id, "session ended");
        self.ledger.closed();
        Ok(session_id)
    }

    fn session_id(&self) -> Option<&str> {
        self.ledger.id()
    }

    fn resume(&mut self, session_id: String) {
        self.ledger.resume(session_id);
    }

    fn goal(&self) -> Option<&Value> {
        self.ledger.goal()
    }
}
