// Swerve inverse and forward kinematics for a four-module chassis
// Converts body-frame velocities (vx, vy, omega) to per-wheel speed/angle and back.

use nalgebra::{Matrix3, SMatrix, SVector};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SwerveError};
use crate::geometry::{Rotation, Translation};

/// Number of swerve modules on the chassis
pub const WHEEL_COUNT: usize = 4;

/// Core wheel order; every `[_; 4]` in the drive core follows it
pub const WHEEL_NAMES: [&str; WHEEL_COUNT] = ["front_left", "front_right", "back_left", "back_right"];

/// Wheel speeds below this are treated as "not moving" and keep their last angle
const ZERO_SPEED_EPSILON: f64 = 1e-9;

/// Chassis velocity: m/s along x (forward) and y (left), rad/s counter-clockwise
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChassisSpeeds {
    pub vx: f64,
    pub vy: f64,
    pub omega: f64,
}

impl ChassisSpeeds {
    pub fn new(vx: f64, vy: f64, omega: f64) -> Self {
        Self { vx, vy, omega }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        self.vx == 0.0 && self.vy == 0.0 && self.omega == 0.0
    }

    /// Convert field-relative velocities to robot-relative using the current heading
    pub fn from_field_relative(vx: f64, vy: f64, omega: f64, heading: Rotation) -> Self {
        let robot = Translation::new(vx, vy).rotate_by(heading.inverse());
        Self::new(robot.x, robot.y, omega)
    }

    /// Express these robot-relative speeds in the field frame
    pub fn to_field_relative(&self, heading: Rotation) -> Self {
        let field = Translation::new(self.vx, self.vy).rotate_by(heading);
        Self::new(field.x, field.y, self.omega)
    }
}

/// Commanded or measured state of one module
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WheelState {
    /// m/s, positive drives along `angle`
    pub speed: f64,
    pub angle: Rotation,
}

impl WheelState {
    pub fn new(speed: f64, angle: Rotation) -> Self {
        Self { speed, angle }
    }

    /// Shortest-turn equivalent of this state given the module's current angle
    ///
    /// A wheel never needs to steer more than 90°: the same ground velocity
    /// is reached by turning the other way and driving backwards.
    pub fn optimize(&self, current: Rotation) -> Self {
        let delta = current.shortest_distance(self.angle);
        if delta.abs() > std::f64::consts::FRAC_PI_2 {
            Self::new(-self.speed, self.angle + Rotation::from_degrees(180.0))
        } else {
            *self
        }
    }
}

/// Cumulative drive distance (m) and current angle of one module
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WheelPosition {
    pub distance: f64,
    pub angle: Rotation,
}

impl WheelPosition {
    pub fn new(distance: f64, angle: Rotation) -> Self {
        Self { distance, angle }
    }
}

/// Kinematics for four modules at fixed offsets from the rotation center
///
/// Offsets never change after construction. The only mutable state is the
/// last commanded angle per wheel, so a wheel told to stop stays pointed
/// where it was instead of snapping back to zero.
#[derive(Debug, Clone)]
pub struct SwerveKinematics {
    offsets: [Translation; WHEEL_COUNT],
    // Least-squares solver (A^T A)^-1 A^T for the 8x3 system about the geometric center
    forward: SMatrix<f64, 3, 8>,
    headings: [Rotation; WHEEL_COUNT],
}

impl SwerveKinematics {
    /// Create from wheel offsets in core wheel order
    pub fn new(offsets: [Translation; WHEEL_COUNT]) -> Result<Self> {
        if offsets.iter().any(|o| !o.is_finite()) {
            return Err(SwerveError::DegenerateGeometry(format!(
                "non-finite wheel offset in {:?}",
                offsets
            )));
        }

        let inverse = inverse_matrix(&offsets, Translation::default());
        let normal: Matrix3<f64> = inverse.transpose() * inverse;
        let normal_inv = normal.try_inverse().ok_or_else(|| {
            SwerveError::DegenerateGeometry(format!(
                "wheel offsets {:?} do not determine a unique body velocity",
                offsets
            ))
        })?;

        Ok(Self {
            offsets,
            forward: normal_inv * inverse.transpose(),
            headings: [Rotation::IDENTITY; WHEEL_COUNT],
        })
    }

    /// Rectangular chassis: `width` between left and right wheels, `length` between front and back
    pub fn rectangular(width: f64, length: f64) -> Result<Self> {
        let (hw, hl) = (width / 2.0, length / 2.0);
        Self::new([
            Translation::new(hl, hw),
            Translation::new(hl, -hw),
            Translation::new(-hl, hw),
            Translation::new(-hl, -hw),
        ])
    }

    pub fn offsets(&self) -> &[Translation; WHEEL_COUNT] {
        &self.offsets
    }

    /// Last angle commanded to each wheel
    pub fn headings(&self) -> &[Rotation; WHEEL_COUNT] {
        &self.headings
    }

    /// Seed the remembered wheel angles (e.g. from measured module states)
    pub fn reset_headings(&mut self, headings: [Rotation; WHEEL_COUNT]) {
        self.headings = headings;
    }

    /// Convert a robot-relative body velocity into four wheel states
    pub fn to_wheel_states(&mut self, speeds: ChassisSpeeds) -> [WheelState; WHEEL_COUNT] {
        self.to_wheel_states_about(speeds, Translation::default())
    }

    /// Same as [`to_wheel_states`](Self::to_wheel_states) but rotating about `center`
    ///
    /// `center` is robot-relative, e.g. the location of a camera to pivot around.
    pub fn to_wheel_states_about(
        &mut self,
        speeds: ChassisSpeeds,
        center: Translation,
    ) -> [WheelState; WHEEL_COUNT] {
        if speeds.is_zero() {
            return self.headings.map(|angle| WheelState::new(0.0, angle));
        }

        let vectors = self.wheel_vectors(speeds, center);
        let mut states = [WheelState::default(); WHEEL_COUNT];
        for (i, vector) in vectors.iter().enumerate() {
            let speed = vector.norm();
            if speed > ZERO_SPEED_EPSILON {
                self.headings[i] = vector.angle();
                states[i] = WheelState::new(speed, self.headings[i]);
            } else {
                states[i] = WheelState::new(0.0, self.headings[i]);
            }
        }
        states
    }

    /// Raw per-wheel velocity vectors: v_i = (vx - ω·y_i, vy + ω·x_i), offsets taken from `center`
    pub fn wheel_vectors(&self, speeds: ChassisSpeeds, center: Translation) -> [Translation; WHEEL_COUNT] {
        self.offsets.map(|offset| {
            let r = offset - center;
            Translation::new(speeds.vx - speeds.omega * r.y, speeds.vy + speeds.omega * r.x)
        })
    }

    /// Forward kinematics: best-fit body velocity for the given wheel states
    pub fn to_chassis_speeds(&self, states: &[WheelState; WHEEL_COUNT]) -> ChassisSpeeds {
        let mut wheel_vectors = SVector::<f64, 8>::zeros();
        for (i, state) in states.iter().enumerate() {
            wheel_vectors[2 * i] = state.speed * state.angle.cos();
            wheel_vectors[2 * i + 1] = state.speed * state.angle.sin();
        }
        let body = self.forward * wheel_vectors;
        ChassisSpeeds::new(body[0], body[1], body[2])
    }
}

/// Scale all wheel speeds down uniformly so none exceeds `max_speed`
///
/// Speed ratios (and therefore the direction of travel) are preserved and
/// angles are never touched. No-op when every wheel is within the limit.
pub fn desaturate(states: &mut [WheelState; WHEEL_COUNT], max_speed: f64) {
    let max_observed = states.iter().map(|s| s.speed.abs()).fold(0.0f64, f64::max);

    if max_observed > max_speed {
        let scale = max_speed / max_observed;
        for state in states.iter_mut() {
            state.speed *= scale;
        }
    }
}

// Each wheel contributes two rows: [1, 0, -y] and [0, 1, x]
fn inverse_matrix(offsets: &[Translation; WHEEL_COUNT], center: Translation) -> SMatrix<f64, 8, 3> {
    let mut m = SMatrix::<f64, 8, 3>::zeros();
    for (i, offset) in offsets.iter().enumerate() {
        let r = *offset - center;
        m[(2 * i, 0)] = 1.0;
        m[(2 * i, 2)] = -r.y;
        m[(2 * i + 1, 1)] = 1.0;
        m[(2 * i + 1, 2)] = r.x;
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn square_chassis() -> SwerveKinematics {
        SwerveKinematics::rectangular(0.5, 0.5).unwrap()
    }

    #[test]
    fn test_zero_velocity_keeps_angles() {
        let mut kinematics = square_chassis();
        kinematics.to_wheel_states(ChassisSpeeds::new(0.0, 1.0, 0.0));
        let states = kinematics.to_wheel_states(ChassisSpeeds::zero());
        for state in states {
            assert_eq!(state.speed, 0.0);
            assert_abs_diff_eq!(state.angle.degrees(), 90.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_forward_motion() {
        // Pure translation points every wheel the same way at the same speed
        let mut kinematics = square_chassis();
        let states = kinematics.to_wheel_states(ChassisSpeeds::new(2.0, 0.0, 0.0));
        for state in states {
            assert_abs_diff_eq!(state.speed, 2.0, epsilon = 1e-12);
            assert_abs_diff_eq!(state.angle.degrees(), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_rotation_only() {
        // Spinning in place puts every wheel tangent to the circle through it
        let mut kinematics = square_chassis();
        let states = kinematics.to_wheel_states(ChassisSpeeds::new(0.0, 0.0, 1.0));
        let radius = (0.25f64).hypot(0.25);
        let expected = [135.0, 45.0, -135.0, -45.0];
        for (state, angle) in states.iter().zip(expected) {
            assert_abs_diff_eq!(state.speed, radius, epsilon = 1e-12);
            assert_abs_diff_eq!(state.angle.degrees(), angle, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_center_of_rotation_at_wheel() {
        // Pivoting around the front-left wheel leaves that wheel stationary
        let mut kinematics = square_chassis();
        kinematics.to_wheel_states(ChassisSpeeds::new(0.0, 1.0, 0.0));
        let pivot = kinematics.offsets()[0];
        let states = kinematics.to_wheel_states_about(ChassisSpeeds::new(0.0, 0.0, 1.0), pivot);
        assert_eq!(states[0].speed, 0.0, "Pivot wheel should not move");
        assert_abs_diff_eq!(states[0].angle.degrees(), 90.0, epsilon = 1e-9);
        assert_abs_diff_eq!(states[3].speed, 0.5f64.hypot(0.5), epsilon = 1e-12);
    }

    #[test]
    fn test_round_trip() {
        let kinematics_template = SwerveKinematics::rectangular(0.52, 0.61).unwrap();
        for speeds in [
            ChassisSpeeds::new(1.0, 0.0, 0.0),
            ChassisSpeeds::new(-0.3, 2.1, 0.7),
            ChassisSpeeds::new(0.0, 0.0, -3.0),
            ChassisSpeeds::new(2.5, -1.5, 1.2),
        ] {
            let mut kinematics = kinematics_template.clone();
            let states = kinematics.to_wheel_states(speeds);
            let back = kinematics.to_chassis_speeds(&states);
            assert_abs_diff_eq!(back.vx, speeds.vx, epsilon = 1e-9);
            assert_abs_diff_eq!(back.vy, speeds.vy, epsilon = 1e-9);
            assert_abs_diff_eq!(back.omega, speeds.omega, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_desaturate_preserves_ratios_and_angles() {
        let mut kinematics = square_chassis();
        let mut states = kinematics.to_wheel_states(ChassisSpeeds::new(4.0, 1.0, 6.0));
        let before = states;
        desaturate(&mut states, 3.63);

        let max = states.iter().map(|s| s.speed.abs()).fold(0.0f64, f64::max);
        assert_abs_diff_eq!(max, 3.63, epsilon = 1e-12);
        for i in 0..WHEEL_COUNT {
            assert_eq!(states[i].angle, before[i].angle, "Desaturation changed an angle");
            for j in 0..WHEEL_COUNT {
                assert_abs_diff_eq!(
                    states[i].speed * before[j].speed,
                    states[j].speed * before[i].speed,
                    epsilon = 1e-9
                );
            }
        }
    }

    #[test]
    fn test_desaturate_noop_within_limit() {
        let mut kinematics = square_chassis();
        let mut states = kinematics.to_wheel_states(ChassisSpeeds::new(1.0, 0.5, 0.2));
        let before = states;
        desaturate(&mut states, 3.63);
        assert_eq!(states, before);
    }

    #[test]
    fn test_field_relative_conversion() {
        // Driving field +y while facing +y is driving robot-forward
        let speeds = ChassisSpeeds::from_field_relative(0.0, 1.0, 0.0, Rotation::from_degrees(90.0));
        assert_abs_diff_eq!(speeds.vx, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(speeds.vy, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_optimize_never_turns_more_than_quarter() {
        let state = WheelState::new(1.5, Rotation::from_degrees(170.0));
        let optimized = state.optimize(Rotation::from_degrees(0.0));
        assert_abs_diff_eq!(optimized.speed, -1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(optimized.angle.degrees(), -10.0, epsilon = 1e-9);

        let kept = WheelState::new(1.5, Rotation::from_degrees(60.0)).optimize(Rotation::IDENTITY);
        assert_abs_diff_eq!(kept.speed, 1.5, epsilon = 1e-12);
    }

    #[test]
    fn test_colocated_wheels_rejected() {
        let result = SwerveKinematics::new([Translation::default(); WHEEL_COUNT]);
        assert!(matches!(result, Err(SwerveError::DegenerateGeometry(_))));
    }
}
