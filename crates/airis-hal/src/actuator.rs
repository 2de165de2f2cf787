//! Closed-loop actuator.
//!
//! Converts one discrete [`ActionToken`] into continuous turn, pitch and
//! throttle commands against live pose feedback.  Every loop here is bounded
//! by an iteration budget or a world-clock timeout and always ends by zeroing
//! the rates it drove, whether it converged, timed out, or failed mid-way.
//!
//! Non-convergence is not an error: the loops report
//! [`Convergence::Exhausted`] and the caller carries on with whatever pose
//! resulted.  Only world faults surface as `Err`.
//!
//! # Building blocks
//!
//! | Loop | Target | Ends when |
//! |---|---|---|
//! | [`Actuator::face`] | absolute pitch/yaw | both errors < `face_tolerance`, or `max_iterations` |
//! | [`Actuator::look_at`] | a point | planar distance < `aim_reach`, aimed within `aim_tolerance`, or `step_timeout` |
//! | [`Actuator::approach`] | a cell | the [`Arrival`] condition holds, or `step_timeout` |
//! | [`Actuator::settle`] | – | vertical position stops changing |

use std::time::Duration;

use airis_types::{ActionToken, AirisError, Cell, Heading, Pose, Verb};
use tracing::{debug, warn};

use crate::controller::HeadingController;
use crate::world::{Command, World};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Tunables for every closed loop.  [`Default`] carries the reference values.
#[derive(Debug, Clone, PartialEq)]
pub struct ActuatorConfig {
    /// Proportional gain applied to pitch/yaw error in radians.
    pub gain: f64,
    /// Per-axis tolerance (radians) at which [`Actuator::face`] stops.
    pub face_tolerance: f64,
    /// Per-axis tolerance (radians) at which [`Actuator::look_at`] stops.
    pub aim_tolerance: f64,
    /// Heading error (radians) under which forward throttle is applied.
    pub align_tolerance: f64,
    /// Iteration budget of the orientation and aiming loops.
    pub max_iterations: usize,
    /// Sleep between pose samples.
    pub poll_interval: Duration,
    /// Wall-clock budget of one aiming or translation phase.
    pub step_timeout: Duration,
    /// Planar distance at which aiming is pointless and stops.
    pub aim_reach: f64,
    /// Planar distance counted as arrival for a plain move.
    pub move_reach: f64,
    /// Planar distance counted as arrival when centring in a cell.
    pub center_reach: f64,
    /// Forward throttle for move and jump steps.
    pub step_throttle: f64,
    /// Forward throttle while centring.
    pub center_throttle: f64,
    /// Delay before the first settle comparison.
    pub settle_delay: Duration,
    /// Interval between settle samples.
    pub settle_interval: Duration,
    /// Consecutive equal vertical readings that count as settled.
    pub settle_stable_samples: usize,
    /// Upper bound on settle samples before giving up.
    pub settle_max_polls: usize,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            gain: 0.4,
            face_tolerance: 0.006,
            aim_tolerance: 0.02,
            align_tolerance: 0.3,
            max_iterations: 3000,
            poll_interval: Duration::from_millis(20),
            step_timeout: Duration::from_secs(1),
            aim_reach: 0.5,
            move_reach: 0.5,
            center_reach: 0.2,
            step_throttle: 1.0,
            center_throttle: 0.2,
            settle_delay: Duration::from_millis(500),
            settle_interval: Duration::from_millis(50),
            settle_stable_samples: 2,
            settle_max_polls: 200,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outcomes
// ─────────────────────────────────────────────────────────────────────────────

/// How a bounded loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
    /// The loop reached its target condition.
    Converged,
    /// The iteration or time budget ran out first.
    Exhausted,
}

impl Convergence {
    pub fn is_converged(&self) -> bool {
        matches!(self, Convergence::Converged)
    }
}

/// When a translation counts as arrived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arrival {
    /// Planar distance to the cell centre is below the threshold.
    Within(f64),
    /// The floored cell equals the destination, the agent is within
    /// `move_reach`, or the vertical level changed on the way.
    EnterCell,
    /// The floored `(x, z)` equals the destination's.
    EnterColumn,
}

impl Arrival {
    fn reached(&self, pose: &Pose, dest: Cell, reach: f64) -> bool {
        let here = pose.cell();
        match *self {
            Arrival::Within(threshold) => pose.planar_distance(dest.center()) < threshold,
            Arrival::EnterCell => {
                here == dest || here.y != dest.y || pose.planar_distance(dest.center()) < reach
            }
            Arrival::EnterColumn => here.same_column(&dest),
        }
    }
}

/// Result of one move or jump step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    /// The neighbouring cell the step aimed for.
    pub destination: Cell,
    /// Whether the translation phase arrived before its timeout.
    pub translation: Convergence,
    /// Pose after settling.
    pub pose: Pose,
}

impl StepReport {
    /// `true` when the settled agent stands in the destination column.
    pub fn reached_destination(&self) -> bool {
        self.pose.cell().same_column(&self.destination)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Actuator
// ─────────────────────────────────────────────────────────────────────────────

/// Stateless executor of discrete actions.  Every call is a fresh closed loop
/// driven only by live pose reads from the supplied [`World`].
#[derive(Debug, Clone, Default)]
pub struct Actuator {
    config: ActuatorConfig,
}

impl Actuator {
    pub fn new(config: ActuatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ActuatorConfig {
        &self.config
    }

    fn controller(&self) -> HeadingController {
        HeadingController::new(self.config.gain, self.config.face_tolerance)
    }

    /// Face the token's heading, then step one cell along it.
    ///
    /// `start` is the cell observed at the beginning of the tick.
    ///
    /// # Errors
    ///
    /// Propagates world faults; timeouts are reported in the [`StepReport`].
    pub fn execute<W: World>(
        &self,
        world: &mut W,
        token: ActionToken,
        start: Cell,
    ) -> Result<StepReport, AirisError> {
        debug!(action = %token, ?start, "executing action");
        self.face(world, 0.0, token.heading.degrees() as f64)?;
        self.step(world, start, token.verb)
    }

    /// Step from `start` into the neighbouring cell the agent is currently
    /// facing, restore the original look direction, and settle.
    ///
    /// # Errors
    ///
    /// Propagates world faults.
    pub fn step<W: World>(
        &self,
        world: &mut W,
        start: Cell,
        verb: Verb,
    ) -> Result<StepReport, AirisError> {
        let pose = world.pose()?;
        let look_pitch = pose.pitch.round_ties_even();
        let look_yaw = pose.yaw.round_ties_even().rem_euclid(360.0);
        let destination = Heading::nearest(pose.yaw).step(start);

        self.look_at(world, destination.center())?;
        let translation = match verb {
            Verb::Move => self.approach(world, destination, Arrival::EnterCell, false)?,
            Verb::Jump => self.approach(world, destination, Arrival::EnterColumn, true)?,
        };
        if !translation.is_converged() {
            debug!(?destination, "translation timed out; settling where we are");
        }
        world.wait(self.config.settle_interval);

        self.face(world, look_pitch, look_yaw)?;
        let pose = self.settle(world)?;
        Ok(StepReport {
            destination,
            translation,
            pose,
        })
    }

    /// Rotate to absolute `pitch`/`yaw` in degrees.
    ///
    /// # Errors
    ///
    /// Propagates world faults after attempting to zero both rates.
    pub fn face<W: World>(&self, world: &mut W, pitch: f64, yaw: f64) -> Result<Convergence, AirisError> {
        let outcome = self.face_loop(world, pitch.to_radians(), yaw.to_radians());
        let stopped = self.stop_rotation(world);
        world.wait(self.config.poll_interval);
        let outcome = outcome?;
        stopped?;
        Ok(outcome)
    }

    fn face_loop<W: World>(&self, world: &mut W, pitch: f64, yaw: f64) -> Result<Convergence, AirisError> {
        let ctl = self.controller();
        for _ in 0..self.config.max_iterations {
            world.wait(self.config.poll_interval);
            let (dp, dy) = world.pose()?.angular_error(pitch, yaw);
            if ctl.converged(dp, dy) {
                world.wait(self.config.poll_interval);
                return Ok(Convergence::Converged);
            }
            let (turn, pitch_rate) = ctl.rates(dp, dy);
            world.send(Command::Turn(turn))?;
            world.send(Command::Pitch(pitch_rate))?;
            world.wait(self.config.poll_interval);
        }
        warn!(pitch, yaw, "orientation did not converge within the iteration budget");
        Ok(Convergence::Exhausted)
    }

    /// Aim at `target` and return the last planar distance to it.
    ///
    /// # Errors
    ///
    /// Propagates world faults after attempting to zero both rates.
    pub fn look_at<W: World>(&self, world: &mut W, target: [f64; 3]) -> Result<f64, AirisError> {
        let distance = self.aim_loop(world, target);
        let stopped = self.stop_rotation(world);
        world.wait(self.config.poll_interval);
        let distance = distance?;
        stopped?;
        Ok(distance)
    }

    fn aim_loop<W: World>(&self, world: &mut W, target: [f64; 3]) -> Result<f64, AirisError> {
        let ctl = self.controller().with_tolerance(self.config.aim_tolerance);
        let started = world.elapsed();
        let mut distance = 0.0;
        for _ in 0..self.config.max_iterations {
            world.wait(self.config.poll_interval);
            let pose = world.pose()?;
            distance = pose.planar_distance(target);
            if distance < self.config.aim_reach {
                break;
            }
            let (pitch, yaw) = pose.direction_to(target);
            let (dp, dy) = pose.angular_error(pitch, yaw);
            if ctl.converged(dp, dy) {
                break;
            }
            let (turn, pitch_rate) = ctl.rates(dp, dy);
            world.send(Command::Turn(turn))?;
            world.send(Command::Pitch(pitch_rate))?;
            world.wait(self.config.poll_interval);
            if world.elapsed() - started > self.config.step_timeout {
                break;
            }
        }
        Ok(distance)
    }

    /// Drive toward the centre of `dest` until `arrival` holds or the step
    /// timeout elapses.  Throttle is applied only while the heading error is
    /// inside `align_tolerance`; with `jump` the jump key is held throughout.
    ///
    /// # Errors
    ///
    /// Propagates world faults after attempting to release every control.
    pub fn approach<W: World>(
        &self,
        world: &mut W,
        dest: Cell,
        arrival: Arrival,
        jump: bool,
    ) -> Result<Convergence, AirisError> {
        self.approach_with(world, dest, arrival, jump, self.config.step_throttle)
    }

    fn approach_with<W: World>(
        &self,
        world: &mut W,
        dest: Cell,
        arrival: Arrival,
        jump: bool,
        throttle: f64,
    ) -> Result<Convergence, AirisError> {
        let outcome = self.approach_loop(world, dest, arrival, jump, throttle);
        let released = self.stop_all(world, jump);
        let outcome = outcome?;
        released?;
        Ok(outcome)
    }

    fn approach_loop<W: World>(
        &self,
        world: &mut W,
        dest: Cell,
        arrival: Arrival,
        jump: bool,
        throttle: f64,
    ) -> Result<Convergence, AirisError> {
        let ctl = self.controller();
        let target = dest.center();
        let started = world.elapsed();
        if jump {
            world.send(Command::Jump(true))?;
        }
        let mut throttling = false;
        loop {
            let pose = world.pose()?;
            if arrival.reached(&pose, dest, self.config.move_reach) {
                return Ok(Convergence::Converged);
            }
            if world.elapsed() - started > self.config.step_timeout {
                return Ok(Convergence::Exhausted);
            }
            let (pitch, yaw) = pose.direction_to(target);
            let (dp, dy) = pose.angular_error(pitch, yaw);
            let (turn, pitch_rate) = ctl.rates(dp, dy);
            world.send(Command::Turn(turn))?;
            world.send(Command::Pitch(pitch_rate))?;

            let aligned = dy.abs() <= self.config.align_tolerance;
            if aligned != throttling {
                world.send(Command::Move(if aligned { throttle } else { 0.0 }))?;
                throttling = aligned;
            }
            world.wait(self.config.poll_interval);
        }
    }

    /// Walk slowly to the centre of `cell`, then restore `pitch`/`yaw`.
    ///
    /// # Errors
    ///
    /// Propagates world faults.
    pub fn center<W: World>(
        &self,
        world: &mut W,
        cell: Cell,
        pitch: f64,
        yaw: f64,
    ) -> Result<Convergence, AirisError> {
        let distance = self.look_at(world, cell.center())?;
        let outcome = if distance > self.config.center_reach {
            self.approach_with(
                world,
                cell,
                Arrival::Within(self.config.center_reach),
                false,
                self.config.center_throttle,
            )?
        } else {
            Convergence::Converged
        };
        self.face(world, pitch, yaw)?;
        Ok(outcome)
    }

    /// Wait until consecutive vertical readings agree, then return the pose.
    ///
    /// Gives up after `settle_max_polls` samples and returns the latest pose.
    ///
    /// # Errors
    ///
    /// Propagates world faults.
    pub fn settle<W: World>(&self, world: &mut W) -> Result<Pose, AirisError> {
        let mut last = world.pose()?;
        world.wait(self.config.settle_delay);
        let mut stable = 1;
        for _ in 0..self.config.settle_max_polls {
            let pose = world.pose()?;
            if (pose.y - last.y).abs() < 1e-9 {
                stable += 1;
            } else {
                stable = 1;
            }
            last = pose;
            if stable >= self.config.settle_stable_samples {
                return Ok(last);
            }
            world.wait(self.config.settle_interval);
        }
        warn!(y = last.y, "vertical position still changing; giving up on settle");
        Ok(last)
    }

    fn stop_rotation<W: World>(&self, world: &mut W) -> Result<(), AirisError> {
        let turn = world.send(Command::Turn(0.0));
        let pitch = world.send(Command::Pitch(0.0));
        turn.and(pitch)
    }

    fn stop_all<W: World>(&self, world: &mut W, jump: bool) -> Result<(), AirisError> {
        let throttle = world.send(Command::Move(0.0));
        let released = if jump { world.send(Command::Jump(false)) } else { Ok(()) };
        let rotation = self.stop_rotation(world);
        throttle.and(released).and(rotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimWorld;

    /// World wrapper that records the yaw error seen at every pose read.
    struct Recording {
        inner: SimWorld,
        target_yaw: f64,
        errors: Vec<f64>,
    }

    impl World for Recording {
        fn pose(&mut self) -> Result<Pose, AirisError> {
            let pose = self.inner.pose()?;
            self.errors.push(pose.angular_error(0.0, self.target_yaw).1);
            Ok(pose)
        }
        fn near_grid(&mut self) -> Result<Vec<String>, AirisError> {
            self.inner.near_grid()
        }
        fn send(&mut self, command: Command) -> Result<(), AirisError> {
            self.inner.send(command)
        }
        fn wait(&mut self, duration: Duration) {
            self.inner.wait(duration)
        }
        fn elapsed(&self) -> Duration {
            self.inner.elapsed()
        }
    }

    /// World that accepts commands but never reports a pose.
    struct Blind(SimWorld);

    impl World for Blind {
        fn pose(&mut self) -> Result<Pose, AirisError> {
            Err(AirisError::WorldFault {
                component: "observer".into(),
                details: "no observation".into(),
            })
        }
        fn near_grid(&mut self) -> Result<Vec<String>, AirisError> {
            self.0.near_grid()
        }
        fn send(&mut self, command: Command) -> Result<(), AirisError> {
            self.0.send(command)
        }
        fn wait(&mut self, duration: Duration) {
            self.0.wait(duration)
        }
        fn elapsed(&self) -> Duration {
            self.0.elapsed()
        }
    }

    fn last_rotation(commands: &[Command]) -> (Option<Command>, Option<Command>) {
        let turn = commands.iter().rev().find(|c| matches!(c, Command::Turn(_))).copied();
        let pitch = commands.iter().rev().find(|c| matches!(c, Command::Pitch(_))).copied();
        (turn, pitch)
    }

    #[test]
    fn face_strictly_reduces_error_and_always_stops() {
        let actuator = Actuator::default();
        let tolerance = actuator.config().face_tolerance;
        for start in (-175..=180).step_by(25) {
            let target = 0.0;
            let mut world = Recording {
                inner: SimWorld::flat(4).with_pose(0.5, 4.0, 0.5, 0.0, start as f64),
                target_yaw: target,
                errors: Vec::new(),
            };
            let outcome = actuator.face(&mut world, 0.0, target).unwrap();
            assert_eq!(outcome, Convergence::Converged, "start {start}");

            for pair in world.errors.windows(2) {
                if pair[0].abs() > tolerance {
                    assert!(pair[1].abs() < pair[0].abs(), "start {start}: {pair:?}");
                }
            }
            assert!(world.errors.len() <= actuator.config().max_iterations);
            assert_eq!(
                last_rotation(world.inner.commands()),
                (Some(Command::Turn(0.0)), Some(Command::Pitch(0.0)))
            );
        }
    }

    #[test]
    fn face_handles_pitch_and_wraparound() {
        let actuator = Actuator::default();
        let mut world = SimWorld::flat(4).with_pose(0.5, 4.0, 0.5, 30.0, 350.0);
        actuator.face(&mut world, 0.0, 10.0).unwrap();
        let pose = world.pose().unwrap();
        let (dp, dy) = pose.angular_error(0.0, 10f64.to_radians());
        assert!(dp.abs() < 0.006 && dy.abs() < 0.006);
        // went the short way through 0 rather than back through 180
        assert!(pose.yaw > 340.0);
    }

    #[test]
    fn face_exhausts_budget_and_still_stops() {
        let config = ActuatorConfig {
            max_iterations: 3,
            ..ActuatorConfig::default()
        };
        let actuator = Actuator::new(config);
        let mut world = SimWorld::flat(4);
        let outcome = actuator.face(&mut world, 0.0, 180.0).unwrap();
        assert_eq!(outcome, Convergence::Exhausted);
        assert_eq!(
            last_rotation(world.commands()),
            (Some(Command::Turn(0.0)), Some(Command::Pitch(0.0)))
        );
    }

    #[test]
    fn face_world_fault_still_zeroes_rates() {
        let actuator = Actuator::default();
        let mut world = Blind(SimWorld::flat(4));
        assert!(actuator.face(&mut world, 0.0, 90.0).is_err());
        assert_eq!(world.0.commands(), &[Command::Turn(0.0), Command::Pitch(0.0)]);
    }

    #[test]
    fn approach_reaches_neighbour_before_timeout() {
        let actuator = Actuator::default();
        let mut world = SimWorld::flat(4);
        let start = world.elapsed();
        let dest = Cell::new(0, 4, 1);
        assert!(world.pose().unwrap().planar_distance(dest.center()) > 0.5);

        let outcome = actuator.approach(&mut world, dest, Arrival::Within(0.5), false).unwrap();
        assert_eq!(outcome, Convergence::Converged);
        assert!(world.elapsed() - start < Duration::from_secs(1));
        assert!(world.pose().unwrap().planar_distance(dest.center()) < 0.5);
        assert!(world.commands().contains(&Command::Move(1.0)));
        assert_eq!(
            world.commands().iter().rev().find(|c| matches!(c, Command::Move(_))),
            Some(&Command::Move(0.0))
        );
    }

    #[test]
    fn blocked_approach_times_out_and_releases_throttle() {
        let actuator = Actuator::default();
        let dest = Cell::new(0, 4, 1);
        let mut world = SimWorld::flat(4).with_block(dest, "stone");
        let start = world.elapsed();
        let outcome = actuator.approach(&mut world, dest, Arrival::Within(0.5), false).unwrap();
        assert_eq!(outcome, Convergence::Exhausted);
        assert!(world.elapsed() - start >= Duration::from_secs(1));
        let tail = &world.commands()[world.commands().len() - 3..];
        assert_eq!(tail, &[Command::Move(0.0), Command::Turn(0.0), Command::Pitch(0.0)]);
    }

    #[test]
    fn look_at_turns_toward_the_point() {
        let actuator = Actuator::new(ActuatorConfig {
            step_timeout: Duration::from_secs(10),
            ..ActuatorConfig::default()
        });
        let mut world = SimWorld::flat(4);
        let distance = actuator.look_at(&mut world, [-2.5, 4.0, 0.5]).unwrap();
        assert!((distance - 3.0).abs() < 1e-9);
        let yaw = world.pose().unwrap().yaw;
        assert!((yaw - 90.0).abs() < 2.0, "yaw {yaw}");
    }

    #[test]
    fn move_90_steps_to_negative_x_and_settles() {
        let actuator = Actuator::default();
        let mut world = SimWorld::flat(64).with_pose(10.5, 64.0, 10.5, 0.0, 0.0);
        let start = world.pose().unwrap().cell();
        let report = actuator.execute(&mut world, "move 90".parse().unwrap(), start).unwrap();
        assert_eq!(report.destination, Cell::new(9, 64, 10));
        assert_eq!(report.translation, Convergence::Converged);
        assert!(report.reached_destination());
        let yaw = report.pose.yaw.rem_euclid(360.0);
        assert!((yaw - 90.0).abs() < 1.0, "original look direction restored: {yaw}");
    }

    #[test]
    fn every_token_lands_one_step_away_on_open_ground() {
        let actuator = Actuator::default();
        for token in ActionToken::all() {
            let mut world = SimWorld::flat(4);
            let start = world.pose().unwrap().cell();
            let report = actuator.execute(&mut world, token, start).unwrap();
            assert_eq!(report.destination, token.heading.step(start), "{token}");
            assert!(report.reached_destination(), "{token}: {:?}", report.pose);
        }
    }

    #[test]
    fn jump_climbs_onto_a_block() {
        let actuator = Actuator::default();
        let mut world = SimWorld::flat(4).with_block(Cell::new(0, 4, 1), "stone");
        let start = world.pose().unwrap().cell();
        let report = actuator.execute(&mut world, "jump 0".parse().unwrap(), start).unwrap();
        assert_eq!(report.translation, Convergence::Converged);
        assert_eq!(report.pose.cell(), Cell::new(0, 5, 1));
        assert!(world.commands().contains(&Command::Jump(true)));
        assert_eq!(
            world.commands().iter().rev().find(|c| matches!(c, Command::Jump(_))),
            Some(&Command::Jump(false))
        );
    }

    #[test]
    fn move_into_wall_gives_up_and_reports_pose() {
        let actuator = Actuator::default();
        let mut world = SimWorld::flat(4).with_block(Cell::new(0, 4, 1), "stone");
        let start = world.pose().unwrap().cell();
        let report = actuator.execute(&mut world, "move 0".parse().unwrap(), start).unwrap();
        assert_eq!(report.translation, Convergence::Exhausted);
        assert!(!report.reached_destination());
        assert_eq!(report.pose.cell(), start);
    }

    #[test]
    fn settle_waits_for_landing() {
        let actuator = Actuator::default();
        let mut world = SimWorld::flat(4).with_pose(0.5, 40.0, 0.5, 0.0, 0.0);
        let pose = actuator.settle(&mut world).unwrap();
        assert_eq!(pose.y, 4.0);
    }

    #[test]
    fn settle_gives_up_after_poll_cap() {
        let config = ActuatorConfig {
            settle_max_polls: 3,
            ..ActuatorConfig::default()
        };
        let actuator = Actuator::new(config);
        let mut world = SimWorld::flat(-10_000).with_pose(0.5, 100.0, 0.5, 0.0, 0.0);
        let pose = actuator.settle(&mut world).unwrap();
        assert!(pose.y < 100.0);
    }

    #[test]
    fn center_pulls_agent_to_cell_middle() {
        let actuator = Actuator::default();
        let mut world = SimWorld::flat(4).with_pose(0.9, 4.0, 0.5, 0.0, 90.0);
        let outcome = actuator.center(&mut world, Cell::new(0, 4, 0), 0.0, 0.0).unwrap();
        assert_eq!(outcome, Convergence::Converged);
        let pose = world.pose().unwrap();
        assert!(pose.planar_distance([0.5, 4.0, 0.5]) < 0.2);
        assert!(airis_types::normalize_angle(pose.yaw.to_radians()).abs() < 0.01);
        assert!(world.commands().contains(&Command::Move(0.2)));
    }
}
