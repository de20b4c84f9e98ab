// Operator input mixing: joystick axes and hat trims -> field-relative chassis speeds

use serde::{Deserialize, Serialize};

use crate::drive::kinematics::ChassisSpeeds;

/// Translation hat directions (field trim moves)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslateHat {
    Forward,
    Back,
    Left,
    Right,
}

/// Rotation hat directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotateHat {
    Left,
    Right,
}

/// Raw operator input, one sample per teleop publish
///
/// Axes are in [-1, 1] using the robot convention: +forward, +left,
/// +counter-clockwise. Missing fields mean "centred".
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TeleopInput {
    pub forward: f64,
    pub strafe: f64,
    pub twist: f64,
    pub translate_hat: Option<TranslateHat>,
    pub rotate_hat: Option<RotateHat>,
}

impl TeleopInput {
    /// Centred sticks, no hats
    pub fn neutral() -> Self {
        Self::default()
    }
}

/// Zero inside `[-deadband, deadband]`, unchanged outside
pub fn apply_deadband(value: f64, deadband: f64) -> f64 {
    if value.abs() <= deadband { 0.0 } else { value }
}

fn clamp_axis(value: f64) -> f64 {
    // NaN from a flaky joystick bridge is treated as centred
    if value.is_nan() { 0.0 } else { value.clamp(-1.0, 1.0) }
}

/// Shapes operator input into chassis velocity commands
#[derive(Debug, Clone)]
pub struct TeleopMixer {
    max_speed: f64,
    max_angular_speed: f64,
    deadband: f64,
    hat_power_move: f64,
    hat_power_rotate: f64,
}

impl TeleopMixer {
    pub fn new(
        max_speed: f64,
        max_angular_speed: f64,
        deadband: f64,
        hat_power_move: f64,
        hat_power_rotate: f64,
    ) -> Self {
        Self {
            max_speed,
            max_angular_speed,
            deadband,
            hat_power_move,
            hat_power_rotate,
        }
    }

    /// Field-relative speeds for this input sample
    ///
    /// Every call starts from the given sample; nothing latches between ticks.
    pub fn mix(&self, input: &TeleopInput) -> ChassisSpeeds {
        let mut forward = apply_deadband(clamp_axis(input.forward), self.deadband);
        let mut strafe = apply_deadband(clamp_axis(input.strafe), self.deadband);
        // Cubing gives fine control near centre
        let mut twist = apply_deadband(clamp_axis(input.twist).powi(3), self.deadband);

        // Hats trim the position and override the matching axis
        match input.translate_hat {
            Some(TranslateHat::Forward) => forward = self.hat_power_move,
            Some(TranslateHat::Back) => forward = -self.hat_power_move,
            Some(TranslateHat::Left) => strafe = self.hat_power_move,
            Some(TranslateHat::Right) => strafe = -self.hat_power_move,
            None => {}
        }
        match input.rotate_hat {
            Some(RotateHat::Left) => twist = self.hat_power_rotate,
            Some(RotateHat::Right) => twist = -self.hat_power_rotate,
            None => {}
        }

        ChassisSpeeds::new(
            forward * self.max_speed,
            strafe * self.max_speed,
            twist * self.max_angular_speed,
        )
    }
}
