// Ideal chassis model used by --simulate and the closed-loop tests
//
// Modules reach their commanded speed and angle instantly and never slip.
// Heading comes from the forward-kinematics turn rate, as a perfect gyro would report.

use tracing::trace;

use crate::drive::{SwerveKinematics, WHEEL_COUNT, WheelPosition, WheelState};
use crate::geometry::{Pose, Rotation, Translation};
use crate::messages::SensorFrame;

pub struct SimulatedChassis {
    kinematics: SwerveKinematics,
    pose: Pose,
    positions: [WheelPosition; WHEEL_COUNT],
    states: [WheelState; WHEEL_COUNT],
}

impl SimulatedChassis {
    pub fn new(kinematics: SwerveKinematics) -> Self {
        Self {
            kinematics,
            pose: Pose::default(),
            positions: [WheelPosition::default(); WHEEL_COUNT],
            states: [WheelState::default(); WHEEL_COUNT],
        }
    }

    /// Ground-truth pose
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Apply `commanded` (core order) for `dt` seconds
    pub fn step(&mut self, commanded: &[WheelState; WHEEL_COUNT], dt: f64) {
        self.states = *commanded;
        for (position, state) in self.positions.iter_mut().zip(commanded.iter()) {
            position.distance += state.speed * dt;
            position.angle = state.angle;
        }

        let body = self.kinematics.to_chassis_speeds(commanded);
        let displacement = Translation::new(body.vx * dt, body.vy * dt).rotate_by(self.pose.rotation);
        self.pose = Pose::new(
            self.pose.translation + displacement,
            self.pose.rotation + Rotation::from_radians(body.omega * dt),
        );
        trace!(
            "Sim pose: ({:.3}, {:.3}, {:.1}°)",
            self.pose.x(),
            self.pose.y(),
            self.pose.rotation.degrees()
        );
    }

    /// What the sensor bridge would publish right now
    pub fn frame(&self) -> SensorFrame {
        SensorFrame {
            heading_deg: self.pose.rotation.degrees(),
            wheel_positions: self.positions,
            wheel_states: self.states,
        }
    }
}
