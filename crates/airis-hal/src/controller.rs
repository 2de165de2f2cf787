//! Proportional heading controller.
//!
//! Given the wrapped `(pitch, yaw)` error in radians, the controller produces
//! the turn and pitch rate commands `gain × error` and reports whether both
//! errors are already inside the tolerance.  It is stateless: every closed
//! loop in [`actuator`][crate::actuator] re-reads the pose and asks again.
//!
//! # Example
//!
//! ```rust
//! use airis_hal::controller::HeadingController;
//!
//! let ctl = HeadingController::new(0.4, 0.006);
//! let (turn, pitch) = ctl.rates(0.0, 1.0);
//! assert!((turn - 0.4).abs() < 1e-12);
//! assert_eq!(pitch, 0.0);
//! assert!(!ctl.converged(0.0, 1.0));
//! ```

/// Proportional law shared by the orientation and translation loops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingController {
    gain: f64,
    tolerance: f64,
}

impl HeadingController {
    /// `tolerance` is in radians and applies to each axis independently.
    pub fn new(gain: f64, tolerance: f64) -> Self {
        Self { gain, tolerance }
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Same gain, different tolerance.
    pub fn with_tolerance(self, tolerance: f64) -> Self {
        Self { tolerance, ..self }
    }

    /// `(turn, pitch)` rate commands for the given errors.
    pub fn rates(&self, pitch_error: f64, yaw_error: f64) -> (f64, f64) {
        (self.gain * yaw_error, self.gain * pitch_error)
    }

    /// `true` when both errors are strictly inside the tolerance.
    pub fn converged(&self, pitch_error: f64, yaw_error: f64) -> bool {
        pitch_error.abs() < self.tolerance && yaw_error.abs() < self.tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_are_proportional_and_signed() {
        let ctl = HeadingController::new(0.4, 0.006);
        let (turn, pitch) = ctl.rates(-0.5, 2.0);
        assert!((turn - 0.8).abs() < 1e-12);
        assert!((pitch + 0.2).abs() < 1e-12);
    }

    #[test]
    fn zero_error_gives_zero_rates() {
        let ctl = HeadingController::new(0.4, 0.006);
        assert_eq!(ctl.rates(0.0, 0.0), (0.0, 0.0));
        assert!(ctl.converged(0.0, 0.0));
    }

    #[test]
    fn convergence_requires_both_axes() {
        let ctl = HeadingController::new(0.4, 0.006);
        assert!(!ctl.converged(0.01, 0.0));
        assert!(!ctl.converged(0.0, -0.01));
        assert!(ctl.converged(0.005, -0.005));
    }

    #[test]
    fn with_tolerance_keeps_gain() {
        let ctl = HeadingController::new(0.4, 0.006).with_tolerance(0.02);
        assert_eq!(ctl.gain(), 0.4);
        assert_eq!(ctl.tolerance(), 0.02);
        assert!(ctl.converged(0.01, 0.01));
    }
}
