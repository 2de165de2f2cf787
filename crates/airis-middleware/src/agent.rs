//! Correlated signed-message binding.
//!
//! Every operation seals a typed request in an [`Envelope`] addressed to a
//! fixed remote agent, hands it to a [`Courier`] and blocks until the reply
//! envelope arrives or the timeout (5 s by default) expires.  A reply is only
//! accepted when it
//!
//! * carries the same correlation id as the request,
//! * was sent by the target agent to this client,
//! * carries a valid signature,
//! * declares the schema digest of the expected response model.
//!
//! Anything else is logged and reported as
//! [`SessionError::UnexpectedResponse`]; nothing is retried.
//!
//! The async courier runs on a private current-thread Tokio runtime so the
//! [`DecisionSession`] contract stays synchronous.  Consequently an
//! [`AgentSession`] must not be driven from inside another async runtime.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use airis_types::EnvironmentState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::envelope::Envelope;
use crate::identity::Identity;
use crate::protocol::{
    EndSessionRequest, EndSessionResponse, InitializeRequest, InitializeResponse, Model,
    PostActionRequest, PostActionResponse, PreActionRequest, PreActionResponse, RuntimeRequest,
    RuntimeResponse,
};
use crate::session::{
    Decision, DecisionArtifact, DecisionSession, PostActionAck, SessionError, SessionLedger,
    StatusReply,
};

// ─────────────────────────────────────────────────────────────────────────────
// Target address
// ─────────────────────────────────────────────────────────────────────────────

/// Remote agent written as `address@endpoint`, e.g.
/// `agent1q…@http://127.0.0.1:8001/submit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentTarget {
    pub address: String,
    pub endpoint: String,
}

impl FromStr for AgentTarget {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('@') {
            Some((address, endpoint)) if !address.is_empty() && !endpoint.is_empty() => {
                Ok(AgentTarget {
                    address: address.to_string(),
                    endpoint: endpoint.to_string(),
                })
            }
            _ => Err(SessionError::Config(format!(
                "agent target must look like address@endpoint, got {s:?}"
            ))),
        }
    }
}

impl fmt::Display for AgentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.address, self.endpoint)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Courier
// ─────────────────────────────────────────────────────────────────────────────

/// Delivers one envelope to an endpoint and returns the reply envelope.
#[async_trait]
pub trait Courier: Send + Sync {
    async fn exchange(&self, endpoint: &str, envelope: Envelope) -> Result<Envelope, SessionError>;
}

/// Posts the envelope as JSON and reads the reply envelope from the body.
#[derive(Debug, Clone, Default)]
pub struct HttpCourier {
    client: reqwest::Client,
}

#[async_trait]
impl Courier for HttpCourier {
    async fn exchange(&self, endpoint: &str, envelope: Envelope) -> Result<Envelope, SessionError> {
        let response = self.client.post(endpoint).json(&envelope).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::Status {
                operation: "exchange",
                status: status.as_u16(),
            });
        }
        Ok(response.json().await?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AgentSession
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSessionConfig {
    /// How long to wait for each reply envelope.
    pub timeout: Duration,
}

impl Default for AgentSessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
        }
    }
}

/// [`DecisionSession`] over signed envelopes exchanged with a remote agent.
pub struct AgentSession<C: Courier = HttpCourier> {
    identity: Identity,
    target: AgentTarget,
    courier: C,
    runtime: Runtime,
    timeout: Duration,
    nonce: u64,
    ledger: SessionLedger,
}

impl AgentSession<HttpCourier> {
    /// # Errors
    ///
    /// [`SessionError::Config`] when the private runtime cannot start.
    pub fn new(target: AgentTarget, config: AgentSessionConfig) -> Result<Self, SessionError> {
        Self::with_courier(target, config, HttpCourier::default())
    }
}

impl<C: Courier> AgentSession<C> {
    /// # Errors
    ///
    /// [`SessionError::Config`] when the private runtime cannot start.
    pub fn with_courier(
        target: AgentTarget,
        config: AgentSessionConfig,
        courier: C,
    ) -> Result<Self, SessionError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SessionError::Config(format!("failed to start runtime: {e}")))?;
        let identity = Identity::generate();
        debug!(sender = identity.address(), %target, "agent session created");
        Ok(Self {
            identity,
            target,
            courier,
            runtime,
            timeout: config.timeout,
            nonce: 0,
            ledger: SessionLedger::default(),
        })
    }

    /// Address this client signs with.
    pub fn address(&self) -> &str {
        self.identity.address()
    }

    pub fn target(&self) -> &AgentTarget {
        &self.target
    }

    fn exchange<Req: Model, Resp: Model>(
        &mut self,
        operation: &'static str,
        request: &Req,
    ) -> Result<Resp, SessionError> {
        self.nonce += 1;
        let correlation = Uuid::new_v4();
        let envelope = Envelope::seal(
            &self.identity,
            &self.target.address,
            correlation,
            self.nonce,
            request,
        )?;

        let timeout = self.timeout;
        let delivery = self.courier.exchange(&self.target.endpoint, envelope);
        let reply = match self
            .runtime
            .block_on(async move { tokio::time::timeout(timeout, delivery).await })
        {
            Ok(reply) => reply?,
            Err(_) => {
                warn!(operation, ?timeout, "no reply from agent");
                return Err(SessionError::Timeout(timeout));
            }
        };

        self.accept(operation, correlation, &reply)
            .and_then(|()| reply.open::<Resp>())
            .inspect_err(|e| warn!(operation, error = %e, "discarding agent reply"))
    }

    fn accept(&self, operation: &str, correlation: Uuid, reply: &Envelope) -> Result<(), SessionError> {
        if reply.session != correlation {
            return Err(SessionError::UnexpectedResponse(format!(
                "{operation}: reply correlates to {} instead of {correlation}",
                reply.session
            )));
        }
        if reply.sender != self.target.address {
            return Err(SessionError::UnexpectedResponse(format!(
                "{operation}: reply sent by {} instead of {}",
                reply.sender, self.target.address
            )));
        }
        if reply.target != self.identity.address() {
            return Err(SessionError::UnexpectedResponse(format!(
                "{operation}: reply addressed to {} instead of {}",
                reply.target,
                self.identity.address()
            )));
        }
        reply.verify()
    }
}

impl<C: Courier> DecisionSession for AgentSession<C> {
    fn initialize(&mut self, goal: &Value, actions: &[String]) -> Result<String, SessionError> {
        let request = InitializeRequest {
            goal: goal.clone(),
            actions: actions.to_vec(),
        };
        let reply: InitializeResponse = self.exchange("initialize", &request)?;
        info!(session_id = %reply.session_id, "session initialized");
        self.ledger.opened(reply.session_id.clone(), goal);
        Ok(reply.session_id)
    }

    fn pre_action(&mut self, state: &EnvironmentState) -> Result<Decision, SessionError> {
        let request = PreActionRequest {
            session_id: self.ledger.require()?,
            environment_state: state.to_payload(),
        };
        let reply: PreActionResponse = self.exchange("pre_action", &request)?;
        Ok(Decision {
            suggested_action: reply.suggested_action,
            artifact: DecisionArtifact {
                state_output: reply.state_output,
                edges_output: reply.edges_output,
            },
        })
    }

    fn post_action(&mut self, state: &EnvironmentState) -> Result<PostActionAck, SessionError> {
        let request = PostActionRequest {
            session_id: self.ledger.require()?,
            environment_state: state.to_payload(),
        };
        let reply: PostActionResponse = self.exchange("post_action", &request)?;
        Ok(reply.into())
    }

    fn update_goal(&mut self, goal: &Value) -> Result<StatusReply, SessionError> {
        let request = RuntimeRequest {
            session_id: self.ledger.require()?,
            goal: goal.clone(),
        };
        let reply: RuntimeResponse = self.exchange("update_goal", &request)?;
        self.ledger.set_goal(goal);
        Ok(reply.into())
    }

    fn end(&mut self) -> Result<String, SessionError> {
        let session_id = self.ledger.require()?;
        let request = EndSessionRequest {
            session_id: session_id.clone(),
        };
        let _: EndSessionResponse = self.exchange("end", &request)?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use airis_types::{Cell, DiscretePose, GridExtent, LocalGrid};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// How the loopback agent misbehaves, if at all.
    #[derive(Clone, Copy, PartialEq)]
    enum Fault {
        None,
        WrongSchema,
        WrongCorrelation,
        WrongTarget,
        Silent,
    }

    /// In-process stand-in for the remote agent.
    struct Loopback {
        identity: Arc<Identity>,
        fault: Fault,
        delivered: Arc<AtomicUsize>,
        last_goal: Arc<Mutex<Option<Value>>>,
    }

    impl Loopback {
        fn new(fault: Fault) -> Self {
            Self {
                identity: Arc::new(Identity::generate()),
                fault,
                delivered: Arc::new(AtomicUsize::new(0)),
                last_goal: Arc::new(Mutex::new(None)),
            }
        }

        fn target(&self) -> AgentTarget {
            AgentTarget {
                address: self.identity.address().to_string(),
                endpoint: "loopback".into(),
            }
        }

        fn reply<M: Model>(&self, request: &Envelope, message: &M) -> Result<Envelope, SessionError> {
            let session = if self.fault == Fault::WrongCorrelation {
                Uuid::new_v4()
            } else {
                request.session
            };
            let stranger;
            let target = if self.fault == Fault::WrongTarget {
                stranger = Identity::generate();
                stranger.address()
            } else {
                request.sender.as_str()
            };
            Envelope::seal(&self.identity, target, session, request.nonce, message)
        }
    }

    #[async_trait]
    impl Courier for Loopback {
        async fn exchange(&self, _endpoint: &str, envelope: Envelope) -> Result<Envelope, SessionError> {
            self.delivered.fetch_add(1, Ordering::SeqCst);
            envelope.verify()?;
            if self.fault == Fault::Silent {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            let digest = envelope.schema_digest.as_str();
            if digest == InitializeRequest::schema_digest() {
                let req: InitializeRequest = envelope.open()?;
                *self.last_goal.lock().unwrap() = Some(req.goal);
                self.reply(
                    &envelope,
                    &InitializeResponse {
                        session_id: "loop-1".into(),
                        status: "success".into(),
                        message: String::new(),
                    },
                )
            } else if digest == PreActionRequest::schema_digest() {
                let _: PreActionRequest = envelope.open()?;
                if self.fault == Fault::WrongSchema {
                    return self.reply(&envelope, &PostActionResponse::default());
                }
                self.reply(
                    &envelope,
                    &PreActionResponse {
                        suggested_action: "move 90".into(),
                        state_output: "c3RhdGU=".into(),
                        edges_output: "ZWRnZXM=".into(),
                    },
                )
            } else if digest == PostActionRequest::schema_digest() {
                self.reply(&envelope, &PostActionResponse::default())
            } else if digest == RuntimeRequest::schema_digest() {
                let req: RuntimeRequest = envelope.open()?;
                *self.last_goal.lock().unwrap() = Some(req.goal);
                self.reply(
                    &envelope,
                    &RuntimeResponse {
                        status: "success".into(),
                        message: "updated".into(),
                    },
                )
            } else {
                self.reply(
                    &envelope,
                    &EndSessionResponse {
                        status: "success".into(),
                        message: "ended".into(),
                    },
                )
            }
        }
    }

    fn state() -> EnvironmentState {
        EnvironmentState::new(
            DiscretePose {
                cell: Cell::new(0, 64, 0),
                pitch: 0,
                yaw: 0,
            },
            LocalGrid::new(vec!["air".to_string(); 125], GridExtent::default()).unwrap(),
        )
    }

    fn session(courier: Loopback, timeout: Duration) -> AgentSession<Loopback> {
        let target = courier.target();
        AgentSession::with_courier(target, AgentSessionConfig { timeout }, courier).unwrap()
    }

    #[test]
    fn target_parses_address_at_endpoint() {
        let t: AgentTarget = "agent1abc@http://127.0.0.1:8001/submit".parse().unwrap();
        assert_eq!(t.address, "agent1abc");
        assert_eq!(t.endpoint, "http://127.0.0.1:8001/submit");
        assert_eq!(t.to_string(), "agent1abc@http://127.0.0.1:8001/submit");
        assert!("agent1abc".parse::<AgentTarget>().is_err());
        assert!("@http://x".parse::<AgentTarget>().is_err());
    }

    #[test]
    fn full_lifecycle_over_loopback() {
        let courier = Loopback::new(Fault::None);
        let goals = courier.last_goal.clone();
        let mut s = session(courier, Duration::from_secs(5));

        let id = s.initialize(&json!({"type": "explore"}), &["move 0".into()]).unwrap();
        assert_eq!(id, "loop-1");
        assert_eq!(*goals.lock().unwrap(), Some(json!({"type": "explore"})));

        let decision = s.pre_action(&state()).unwrap();
        assert_eq!(decision.suggested_action, "move 90");
        assert_eq!(decision.artifact.edges_output, "ZWRnZXM=");

        s.post_action(&state()).unwrap();
        s.update_goal(&json!({"type": "build"})).unwrap();
        assert_eq!(s.goal(), Some(&json!({"type": "build"})));

        assert_eq!(s.end().unwrap(), "loop-1");
        assert!(s.session_id().is_none());
    }

    #[test]
    fn calls_before_initialize_send_nothing() {
        let courier = Loopback::new(Fault::None);
        let delivered = courier.delivered.clone();
        let mut s = session(courier, Duration::from_secs(5));
        assert!(matches!(s.pre_action(&state()), Err(SessionError::NoSession)));
        assert!(matches!(s.post_action(&state()), Err(SessionError::NoSession)));
        assert!(matches!(s.end(), Err(SessionError::NoSession)));
        assert!(matches!(s.end(), Err(SessionError::NoSession)));
        assert_eq!(delivered.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn wrong_schema_reply_is_rejected() {
        let mut s = session(Loopback::new(Fault::WrongSchema), Duration::from_secs(5));
        s.initialize(&json!({"type": "explore"}), &[]).unwrap();
        let err = s.pre_action(&state()).unwrap_err();
        assert!(matches!(err, SessionError::UnexpectedResponse(_)), "{err}");
        // the session itself survives
        assert_eq!(s.session_id(), Some("loop-1"));
    }

    #[test]
    fn uncorrelated_reply_is_rejected() {
        let mut s = session(Loopback::new(Fault::WrongCorrelation), Duration::from_secs(5));
        let err = s.initialize(&json!({"type": "explore"}), &[]).unwrap_err();
        assert!(matches!(err, SessionError::UnexpectedResponse(_)));
        assert!(s.session_id().is_none());
    }

    #[test]
    fn reply_from_another_agent_is_rejected() {
        let courier = Loopback::new(Fault::None);
        let target = AgentTarget {
            address: Identity::generate().address().to_string(),
            endpoint: "loopback".into(),
        };
        let mut s = AgentSession::with_courier(target, AgentSessionConfig::default(), courier).unwrap();
        let err = s.initialize(&json!({"type": "explore"}), &[]).unwrap_err();
        assert!(matches!(err, SessionError::UnexpectedResponse(_)));
    }

    #[test]
    fn reply_addressed_to_another_client_is_rejected() {
        let mut s = session(Loopback::new(Fault::WrongTarget), Duration::from_secs(5));
        let err = s.initialize(&json!({"type": "explore"}), &[]).unwrap_err();
        assert!(matches!(err, SessionError::UnexpectedResponse(_)));
        assert!(s.session_id().is_none());
    }

    #[test]
    fn silent_agent_times_out() {
        let timeout = Duration::from_millis(50);
        let mut s = session(Loopback::new(Fault::Silent), timeout);
        let err = s.initialize(&json!({"type": "explore"}), &[]).unwrap_err();
        assert!(matches!(err, SessionError::Timeout(t) if t == timeout));
    }

    #[test]
    fn default_timeout_is_five_seconds() {
        assert_eq!(AgentSessionConfig::default().timeout, Duration::from_secs(5));
    }
}
