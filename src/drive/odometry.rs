// Dead-reckoning pose estimate from module encoders and the gyro

use tracing::{debug, trace};

use super::kinematics::{WHEEL_COUNT, WheelPosition};
use crate::geometry::{Pose, Rotation, Translation};

/// Field-relative pose integrated from wheel displacement
///
/// The gyro is authoritative for heading: each update replaces the heading
/// with the measured one (shifted by the offset captured at the last reset).
/// Translation drifts without bound; nothing here corrects it.
#[derive(Debug, Clone)]
pub struct SwerveOdometry {
    pose: Pose,
    /// Added to the raw gyro heading to obtain the field heading
    heading_offset: Rotation,
    /// Field heading at the previous update
    previous_heading: Rotation,
    previous_positions: [WheelPosition; WHEEL_COUNT],
}

impl SwerveOdometry {
    /// Start at `initial_pose`, using the current sensor readings as the baseline
    pub fn new(gyro_heading: Rotation, positions: [WheelPosition; WHEEL_COUNT], initial_pose: Pose) -> Self {
        Self {
            pose: initial_pose,
            heading_offset: initial_pose.rotation - gyro_heading,
            previous_heading: initial_pose.rotation,
            previous_positions: positions,
        }
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Replace the pose and re-baseline every stored sensor reference
    ///
    /// The next `update` with unchanged readings yields exactly `pose`.
    pub fn reset_pose(&mut self, pose: Pose, gyro_heading: Rotation, positions: [WheelPosition; WHEEL_COUNT]) {
        debug!(
            "Odometry reset to ({:.3}, {:.3}, {:.1}°)",
            pose.x(),
            pose.y(),
            pose.rotation.degrees()
        );
        self.pose = pose;
        self.heading_offset = pose.rotation - gyro_heading;
        self.previous_heading = pose.rotation;
        self.previous_positions = positions;
    }

    /// Integrate one tick of sensor readings and return the new pose
    pub fn update(&mut self, gyro_heading: Rotation, positions: [WheelPosition; WHEEL_COUNT]) -> Pose {
        let heading = gyro_heading + self.heading_offset;

        // Average displacement of the modules, in the robot frame
        let mut displacement = Translation::default();
        for (current, previous) in positions.iter().zip(self.previous_positions.iter()) {
            let delta = current.distance - previous.distance;
            displacement += Translation::from_polar(delta, current.angle);
        }
        let displacement = displacement / WHEEL_COUNT as f64;

        // Rotate with the heading the robot had while covering that distance
        let field_displacement = displacement.rotate_by(self.previous_heading);

        self.pose = Pose::new(self.pose.translation + field_displacement, heading);
        self.previous_heading = heading;
        self.previous_positions = positions;

        trace!(
            "Odometry: ({:.3}, {:.3}, {:.1}°)",
            self.pose.x(),
            self.pose.y(),
            heading.degrees()
        );
        self.pose
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn positions(distance: f64, angle_deg: f64) -> [WheelPosition; WHEEL_COUNT] {
        [WheelPosition::new(distance, Rotation::from_degrees(angle_deg)); WHEEL_COUNT]
    }

    #[test]
    fn test_no_motion_keeps_pose() {
        let start = Pose::from_xy_degrees(1.0, 2.0, 30.0);
        let mut odometry = SwerveOdometry::new(Rotation::IDENTITY, positions(0.5, 10.0), start);
        let pose = odometry.update(Rotation::IDENTITY, positions(0.5, 10.0));
        assert_eq!(pose.translation, start.translation);
        assert_abs_diff_eq!(pose.rotation.degrees(), 30.0, epsilon = 1e-9);
    }

    #[test]
    fn test_straight_drive_while_rotated() {
        // Facing +y and driving robot-forward moves the robot along field +y
        let start = Pose::from_xy_degrees(0.0, 0.0, 90.0);
        let gyro = Rotation::from_degrees(0.0);
        let mut odometry = SwerveOdometry::new(gyro, positions(0.0, 0.0), start);
        let pose = odometry.update(gyro, positions(1.0, 0.0));
        assert_abs_diff_eq!(pose.x(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pose.y(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pose.rotation.degrees(), 90.0, epsilon = 1e-9);
    }

    #[test]
    fn test_uses_previous_heading() {
        let mut odometry = SwerveOdometry::new(Rotation::IDENTITY, positions(0.0, 0.0), Pose::default());
        // The robot turned to 90° during this tick; the displacement belongs to the old heading
        let pose = odometry.update(Rotation::from_degrees(90.0), positions(1.0, 0.0));
        assert_abs_diff_eq!(pose.x(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pose.y(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pose.rotation.degrees(), 90.0, epsilon = 1e-9);

        let pose = odometry.update(Rotation::from_degrees(90.0), positions(2.0, 0.0));
        assert_abs_diff_eq!(pose.x(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pose.y(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_reset_rebaselines() {
        let mut odometry = SwerveOdometry::new(Rotation::IDENTITY, positions(0.0, 0.0), Pose::default());
        odometry.update(Rotation::from_degrees(20.0), positions(3.0, 45.0));

        let target = Pose::from_xy_degrees(5.0, -1.0, 180.0);
        odometry.reset_pose(target, Rotation::from_degrees(20.0), positions(3.0, 45.0));
        let pose = odometry.update(Rotation::from_degrees(20.0), positions(3.0, 45.0));
        assert_abs_diff_eq!(pose.x(), 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pose.y(), -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pose.rotation.degrees().abs(), 180.0, epsilon = 1e-9);

        // Gyro turning 10° after the reset shows up relative to the reset heading
        let pose = odometry.update(Rotation::from_degrees(30.0), positions(3.0, 45.0));
        assert_abs_diff_eq!(pose.rotation.degrees(), -170.0, epsilon = 1e-9);
    }

    #[test]
    fn test_averages_modules() {
        let mut odometry = SwerveOdometry::new(Rotation::IDENTITY, positions(0.0, 0.0), Pose::default());
        let moved = [
            WheelPosition::new(1.0, Rotation::from_degrees(0.0)),
            WheelPosition::new(1.0, Rotation::from_degrees(0.0)),
            WheelPosition::new(1.0, Rotation::from_degrees(90.0)),
            WheelPosition::new(1.0, Rotation::from_degrees(90.0)),
        ];
        let pose = odometry.update(Rotation::IDENTITY, moved);
        assert_abs_diff_eq!(pose.x(), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(pose.y(), 0.5, epsilon = 1e-12);
    }
}
