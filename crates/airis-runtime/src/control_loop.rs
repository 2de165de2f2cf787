//! [`ControlLoop`] – the per-tick orchestrator.
//!
//! Ties perception, the decision session and the actuator together.  The loop
//! is a small state machine:
//!
//! ```text
//! Uninitialized ──start()──▶ Running ──cancel + shutdown()──▶ Ended
//! ```
//!
//! Each tick, strictly in order:
//!
//! 1. **Observe** – pose and local grid → [`EnvironmentState`].
//! 2. **Decide** – `pre_action(state)`; a failure aborts the tick before any
//!    actuation.
//! 3. **Publish** – decision artifacts and the voxel map, when a publisher is
//!    attached; failures are logged and the tick continues.
//! 4. **Act** – parse the token (an unknown token degrades the tick to a
//!    no-op that still reports the unchanged state), face the token's
//!    heading, step, settle.
//! 5. **Report** – wait the settle delay, observe again and send
//!    `post_action` best-effort.
//!
//! Cancellation is only checked between ticks.  An aborted tick is followed
//! by `retry_delay` of world time so a failing service is not polled in a
//! tight loop.
//!
//! # Example
//!
//! ```rust,no_run
//! use airis_hal::SimWorld;
//! use airis_middleware::{HttpSession, HttpSessionConfig};
//! use airis_runtime::control_loop::{ControlLoop, ControlLoopConfig};
//!
//! let session = HttpSession::new(HttpSessionConfig::default()).unwrap();
//! let mut ctl = ControlLoop::new(SimWorld::flat(64), session, ControlLoopConfig::default());
//! // Requires a running decision service.
//! // ctl.start().unwrap();
//! // ctl.run().unwrap();
//! ```

use std::fmt;
use std::time::Duration;

use airis_hal::{Actuator, ActuatorConfig, StepReport, World};
use airis_memory::{ArtifactPublisher, SessionStore, StoreError};
use airis_middleware::{DecisionSession, SessionError};
use airis_perception::{PerceptionConfig, PerceptionReader};
use airis_types::{ActionToken, EnvironmentState};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("operation not allowed while {0}")]
    InvalidState(LoopState),
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ControlLoopConfig {
    /// Goal sent with `initialize`.
    pub goal: Value,
    /// Ordered action vocabulary sent with `initialize`.
    pub actions: Vec<String>,
    /// Pause between actuation and the post-action observation.
    pub settle_delay: Duration,
    /// World-clock pause after an aborted tick before the next one starts.
    pub retry_delay: Duration,
    pub actuator: ActuatorConfig,
    pub perception: PerceptionConfig,
}

impl Default for ControlLoopConfig {
    fn default() -> Self {
        Self {
            goal: json!({"type": "explore"}),
            actions: ActionToken::vocabulary(),
            settle_delay: Duration::from_secs(1),
            retry_delay: Duration::from_secs(1),
            actuator: ActuatorConfig::default(),
            perception: PerceptionConfig::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// States and outcomes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Uninitialized,
    Running,
    Ended,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopState::Uninitialized => write!(f, "uninitialized"),
            LoopState::Running => write!(f, "running"),
            LoopState::Ended => write!(f, "ended"),
        }
    }
}

/// How one tick ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The action was executed.  `acknowledged` reports whether the
    /// post-action call went through.
    Completed {
        action: ActionToken,
        report: StepReport,
        acknowledged: bool,
    },
    /// The decision could not be acted on; nothing moved.  The unchanged
    /// state was still reported, `acknowledged` as for a completed tick.
    Degraded { reason: String, acknowledged: bool },
    /// The tick stopped before actuation finished.
    Aborted { reason: String },
}

// ─────────────────────────────────────────────────────────────────────────────
// ControlLoop
// ─────────────────────────────────────────────────────────────────────────────

/// Owns the world handle and the session for the lifetime of a run and lends
/// the world to perception and the actuator each tick.
pub struct ControlLoop<W: World, S: DecisionSession> {
    world: W,
    session: S,
    reader: PerceptionReader,
    actuator: Actuator,
    publisher: Option<ArtifactPublisher>,
    store: Option<SessionStore>,
    config: ControlLoopConfig,
    cancel: CancelToken,
    state: LoopState,
    ticks: u64,
}

impl<W: World, S: DecisionSession> ControlLoop<W, S> {
    pub fn new(world: W, session: S, config: ControlLoopConfig) -> Self {
        Self {
            world,
            session,
            reader: PerceptionReader::new(config.perception),
            actuator: Actuator::new(config.actuator.clone()),
            publisher: None,
            store: None,
            config,
            cancel: CancelToken::new(),
            state: LoopState::Uninitialized,
            ticks: 0,
        }
    }

    /// Publish artifacts into `publisher`'s directory every tick.
    pub fn with_publisher(mut self, publisher: ArtifactPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Persist the session id here after a successful end.
    pub fn with_session_store(mut self, store: SessionStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Handle for stopping the loop from another thread or a signal handler.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// Open the session and enter the running state.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::InvalidState`] unless uninitialized, and
    /// [`RuntimeError::Session`] when `initialize` fails, in which case the
    /// loop must not run.
    pub fn start(&mut self) -> Result<String, RuntimeError> {
        if self.state != LoopState::Uninitialized {
            return Err(RuntimeError::InvalidState(self.state));
        }
        let session_id = self
            .session
            .initialize(&self.config.goal, &self.config.actions)?;
        self.state = LoopState::Running;
        self.cancel.arm();
        info!(%session_id, actions = self.config.actions.len(), "control loop running");
        Ok(session_id)
    }

    /// Tick until cancelled, then end the session.  Returns the ended
    /// session id, if the end call succeeded.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::InvalidState`] unless running.
    pub fn run(&mut self) -> Result<Option<String>, RuntimeError> {
        if self.state != LoopState::Running {
            return Err(RuntimeError::InvalidState(self.state));
        }
        while !self.cancel.is_cancelled() {
            if let TickOutcome::Aborted { .. } = self.tick() {
                self.world.wait(self.config.retry_delay);
            }
        }
        info!(ticks = self.ticks, "stop requested");
        Ok(self.shutdown())
    }

    /// Run one observe → decide → act → report cycle.
    pub fn tick(&mut self) -> TickOutcome {
        if self.state != LoopState::Running {
            return TickOutcome::Aborted {
                reason: format!("loop is {}", self.state),
            };
        }
        self.ticks += 1;
        let tick = self.ticks;

        let before = match self.reader.observe(&mut self.world) {
            Ok(state) => state,
            Err(e) => return self.aborted(tick, format!("observation failed: {e}")),
        };

        let decision = match self.session.pre_action(&before) {
            Ok(decision) => decision,
            Err(e) => return self.aborted(tick, format!("pre_action failed: {e}")),
        };
        debug!(tick, action = %decision.suggested_action, "decision received");

        if let Some(publisher) = &self.publisher {
            if let Err(e) = publisher.publish_decision(
                &decision.artifact.state_output,
                &decision.artifact.edges_output,
            ) {
                warn!(tick, error = %e, "decision artifacts not published");
            }
            if let Err(e) = publisher.publish_grid(&before.solid_voxels()) {
                warn!(tick, error = %e, "grid artifact not published");
            }
        }

        let action: ActionToken = match decision.suggested_action.parse() {
            Ok(action) => action,
            Err(e) => {
                warn!(tick, error = %e, "skipping undefined action");
                self.world.wait(self.config.settle_delay);
                let acknowledged = self.report(tick);
                return TickOutcome::Degraded {
                    reason: e.to_string(),
                    acknowledged,
                };
            }
        };

        let report = match self.actuator.execute(&mut self.world, action, before.pose.cell) {
            Ok(report) => report,
            Err(e) => return self.aborted(tick, format!("actuation failed: {e}")),
        };
        self.world.wait(self.config.settle_delay);

        let acknowledged = self.report(tick);
        info!(
            tick,
            %action,
            arrived = report.reached_destination(),
            acknowledged,
            "tick completed"
        );
        TickOutcome::Completed {
            action,
            report,
            acknowledged,
        }
    }

    fn report(&mut self, tick: u64) -> bool {
        let after: EnvironmentState = match self.reader.observe(&mut self.world) {
            Ok(state) => state,
            Err(e) => {
                warn!(tick, error = %e, "post-action observation failed");
                return false;
            }
        };
        match self.session.post_action(&after) {
            Ok(_) => true,
            Err(e) => {
                debug!(tick, error = %e, "post_action ignored");
                false
            }
        }
    }

    fn aborted(&self, tick: u64, reason: String) -> TickOutcome {
        warn!(tick, %reason, "tick aborted");
        TickOutcome::Aborted { reason }
    }

    /// Replace the goal of the running session.  Failures are logged and the
    /// previous goal stays in force.
    pub fn update_goal(&mut self, goal: Value) -> bool {
        match self.session.update_goal(&goal) {
            Ok(reply) => {
                info!(status = %reply.status, "goal updated");
                self.config.goal = goal;
                true
            }
            Err(e) => {
                warn!(error = %e, "goal update failed; keeping previous goal");
                false
            }
        }
    }

    /// Leave the running state, end the session and persist its id.
    /// Idempotent: later calls do nothing and return `None`.
    pub fn shutdown(&mut self) -> Option<String> {
        if self.state != LoopState::Running {
            return None;
        }
        self.state = LoopState::Ended;
        let session_id = match self.session.end() {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "failed to end session");
                return None;
            }
        };
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&session_id) {
                warn!(error = %e, "failed to persist session id");
            }
        }
        Some(session_id)
    }
}

/// End a session left over from an earlier run, using the persisted id.
///
/// # Errors
///
/// [`RuntimeError::Store`] when no id can be read and
/// [`RuntimeError::Session`] when the end call fails.
pub fn restore_and_end<S: DecisionSession>(
    session: &mut S,
    store: &SessionStore,
) -> Result<String, RuntimeError> {
    let session_id = store.load()?;
    info!(%session_id, path = %store.path().display(), "restoring session to end it");
    session.resume(session_id);
    Ok(session.end()?)
}
