// Holonomic trajectory tracking: feedforward + independent x, y and heading loops

use std::f64::consts::PI;

use super::pid::{PidController, ProfileConstraints, ProfiledPidController};
use crate::drive::kinematics::ChassisSpeeds;
use crate::geometry::{Pose, Rotation};
use crate::path::TrajectoryState;

/// Gains for the three tracking loops
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerGains {
    pub translation_kp: f64,
    pub translation_ki: f64,
    pub translation_kd: f64,
    pub heading_kp: f64,
    pub heading_ki: f64,
    pub heading_kd: f64,
    /// rad/s
    pub heading_max_velocity: f64,
    /// rad/s²
    pub heading_max_acceleration: f64,
}

impl Default for ControllerGains {
    fn default() -> Self {
        // Heading kP is kept low so the rotation loop doesn't saturate the
        // modules during autonomous paths
        Self {
            translation_kp: 0.4,
            translation_ki: 0.0,
            translation_kd: 0.0,
            heading_kp: 3.0,
            heading_ki: 0.0,
            heading_kd: 0.2,
            heading_max_velocity: PI,
            heading_max_acceleration: PI,
        }
    }
}

/// Tracks a trajectory reference while holding an independent heading target
///
/// Translation and rotation are decoupled: the path tangent drives x/y, the
/// heading loop only ever looks at the requested robot heading.
#[derive(Debug, Clone)]
pub struct HolonomicController {
    x: PidController,
    y: PidController,
    heading: ProfiledPidController,
    first_run: bool,
}

impl HolonomicController {
    pub fn new(x: PidController, y: PidController, mut heading: ProfiledPidController) -> Self {
        heading.enable_continuous_input(-PI, PI);
        Self {
            x,
            y,
            heading,
            first_run: true,
        }
    }

    /// Build the three loops from gains at the given loop period (s)
    pub fn from_gains(gains: &ControllerGains, period: f64) -> Self {
        let translation = || {
            PidController::new(
                gains.translation_kp,
                gains.translation_ki,
                gains.translation_kd,
                period,
            )
        };
        let heading = ProfiledPidController::new(
            gains.heading_kp,
            gains.heading_ki,
            gains.heading_kd,
            ProfileConstraints {
                max_velocity: gains.heading_max_velocity,
                max_acceleration: gains.heading_max_acceleration,
            },
            period,
        );
        Self::new(translation(), translation(), heading)
    }

    /// Forget loop history; the heading profile restarts from the next measurement
    pub fn reset(&mut self) {
        self.x.reset();
        self.y.reset();
        self.first_run = true;
    }

    /// Robot-relative chassis speeds that track `reference` and turn towards `target_heading`
    pub fn calculate(
        &mut self,
        current: Pose,
        reference: &TrajectoryState,
        target_heading: Rotation,
    ) -> ChassisSpeeds {
        let measured_heading = current.rotation.radians();
        if self.first_run {
            self.heading.reset(measured_heading);
            self.first_run = false;
        }

        // Feedforward along the path tangent
        let tangent = reference.pose.rotation;
        let x_ff = reference.velocity * tangent.cos();
        let y_ff = reference.velocity * tangent.sin();

        let x_fb = self.x.calculate(current.x(), reference.pose.x());
        let y_fb = self.y.calculate(current.y(), reference.pose.y());

        // Profiled heading loop plus the profile's own rate as feedforward
        let omega_fb = self.heading.calculate(measured_heading, target_heading.radians());
        let omega = omega_fb + self.heading.setpoint().velocity;

        ChassisSpeeds::from_field_relative(x_ff + x_fb, y_ff + y_fb, omega, current.rotation)
    }
}
