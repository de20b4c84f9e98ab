// Drive core for the four-module swerve base
//
// Provides:
// - Swerve inverse/forward kinematics and wheel-speed desaturation
// - Wheel + gyro odometry
// - The hardware dispatch table at the actuation boundary

pub mod actuation;
pub mod kinematics;
pub mod odometry;

pub use actuation::{Actuation, DEFAULT_DISPATCH_ORDER, ModuleMapping};
pub use kinematics::{
    ChassisSpeeds, SwerveKinematics, WHEEL_COUNT, WHEEL_NAMES, WheelPosition, WheelState, desaturate,
};
pub use odometry::SwerveOdometry;
