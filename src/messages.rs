// Message types exchanged with the sensor bridge, teleop, sequencer and actuators

use serde::{Deserialize, Serialize};

use crate::alliance::Alliance;
use crate::autonomous::{PathRequest, Routine};
use crate::control::FollowerState;
use crate::control_loop::DriveMode;
use crate::drive::{ChassisSpeeds, WHEEL_COUNT, WheelPosition, WheelState};
use crate::geometry::{Pose, Rotation, Translation};

// Sensor bridge -> runtime
// Wheel arrays are in core order (FL, FR, BL, BR)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorFrame {
    /// Gyro yaw in degrees, counter-clockwise positive
    pub heading_deg: f64,
    pub wheel_positions: [WheelPosition; WHEEL_COUNT],
    pub wheel_states: [WheelState; WHEEL_COUNT],
}

impl SensorFrame {
    /// Gyro heading; `invert` for a clockwise-positive gyro
    pub fn heading(&self, invert: bool) -> Rotation {
        let degrees = if invert { -self.heading_deg } else { self.heading_deg };
        Rotation::from_degrees(degrees)
    }
}

// Runtime -> module controllers, in hardware slot order
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WheelSetpoints {
    pub wheels: [WheelState; WHEEL_COUNT],
}

// Sequencer/dashboard -> runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AutoRequest {
    /// Run a named routine
    Routine {
        routine: Routine,
        #[serde(default)]
        alliance: Option<Alliance>,
    },
    /// Follow an ad-hoc path
    Path {
        path: PathRequest,
        #[serde(default)]
        alliance: Option<Alliance>,
    },
    /// Cancel any path and stop
    Stop,
    /// Re-seed odometry
    ResetPose { pose: Pose },
    /// Hand the drive back to the operator
    Teleop,
    /// Pivot about a robot-relative point; the origin restores the chassis centre
    CenterOfRotation { center: Translation },
}

/// Snapshot published every tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriveStatus {
    pub pose: Pose,
    /// Robot-relative, from wheel feedback
    pub measured: ChassisSpeeds,
    /// Robot-relative, before desaturation
    pub commanded: ChassisSpeeds,
    pub mode: DriveMode,
    pub follower: FollowerState,
    /// Seconds into the active path
    pub path_elapsed: Option<f64>,
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
    SensorStale,
}
