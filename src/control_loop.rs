// Single owner of all mutable drive state, advanced one tick at a time
//
// Commands are queued by `submit` and applied at the start of the next tick,
// so a tick always sees one consistent set of inputs.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::autonomous::PlannedPath;
use crate::config::{DriveConfig, loop_period};
use crate::control::{FollowerState, HolonomicController, PathFollower};
use crate::drive::{ChassisSpeeds, SwerveKinematics, SwerveOdometry, WHEEL_COUNT, WheelState, desaturate};
use crate::error::Result;
use crate::geometry::{Pose, Translation};
use crate::messages::{DriveStatus, SensorFrame};
use crate::teleop::{TeleopInput, TeleopMixer};

/// Which source drives the chassis this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveMode {
    #[default]
    Teleop,
    Autonomous,
}

/// Requests applied at the next tick boundary
#[derive(Debug, Clone)]
pub enum ControlCommand {
    /// Start (or restart) following a planned path
    FollowPath(PlannedPath),
    /// Abandon any path; the follower goes Idle
    Stop,
    /// Re-seed odometry at this pose using the current sensor readings
    ResetPose(Pose),
    SetMode(DriveMode),
    /// Rotate about this robot-relative point instead of the chassis centre
    SetCenterOfRotation(Translation),
}

pub struct ControlLoop {
    kinematics: SwerveKinematics,
    odometry: SwerveOdometry,
    follower: PathFollower,
    mixer: TeleopMixer,
    mode: DriveMode,
    pending: VecDeque<ControlCommand>,
    max_speed: f64,
    field_relative: bool,
    invert_heading: bool,
    center_of_rotation: Translation,
    commanded: ChassisSpeeds,
    measured: ChassisSpeeds,
    last_tick: f64,
}

impl ControlLoop {
    /// Build the drive core, taking `initial` as the sensor baseline at the field origin
    pub fn new(config: &DriveConfig, initial: &SensorFrame) -> Result<Self> {
        config.validate()?;

        let mut kinematics = config.kinematics()?;
        kinematics.reset_headings(initial.wheel_states.map(|s| s.angle));

        let invert_heading = config.chassis.invert_heading;
        let odometry = SwerveOdometry::new(
            initial.heading(invert_heading),
            initial.wheel_positions,
            Pose::default(),
        );
        let follower = PathFollower::new(HolonomicController::from_gains(&config.gains(), loop_period()));

        Ok(Self {
            kinematics,
            odometry,
            follower,
            mixer: config.teleop_mixer(),
            mode: DriveMode::Teleop,
            pending: VecDeque::new(),
            max_speed: config.chassis.max_speed,
            field_relative: config.teleop.field_relative,
            invert_heading,
            center_of_rotation: Translation::default(),
            commanded: ChassisSpeeds::zero(),
            measured: ChassisSpeeds::zero(),
            last_tick: 0.0,
        })
    }

    /// Queue a command for the next tick
    pub fn submit(&mut self, command: ControlCommand) {
        debug!("Queued {}", describe(&command));
        self.pending.push_back(command);
    }

    pub fn pose(&self) -> Pose {
        self.odometry.pose()
    }

    pub fn mode(&self) -> DriveMode {
        self.mode
    }

    pub fn follower_state(&self) -> FollowerState {
        self.follower.state()
    }

    /// Advance one tick and return the desaturated wheel commands in core order
    ///
    /// `now` is a monotonic time in seconds.
    pub fn tick(&mut self, now: f64, sensors: &SensorFrame, teleop: &TeleopInput) -> [WheelState; WHEEL_COUNT] {
        self.last_tick = now;
        let heading = sensors.heading(self.invert_heading);

        // 1. Commands submitted since the last tick, in order
        while let Some(command) = self.pending.pop_front() {
            self.apply(command, now, sensors);
        }

        // 2. Odometry
        let pose = self.odometry.update(heading, sensors.wheel_positions);

        // 3. Measured body velocity from module feedback
        self.measured = self.kinematics.to_chassis_speeds(&sensors.wheel_states);

        // 4. Exactly one velocity source
        let speeds = match self.mode {
            DriveMode::Autonomous => self.follower.update(now, pose),
            DriveMode::Teleop => {
                let field = self.mixer.mix(teleop);
                if self.field_relative {
                    ChassisSpeeds::from_field_relative(field.vx, field.vy, field.omega, pose.rotation)
                } else {
                    field
                }
            }
        };
        self.commanded = speeds;

        // 5. Kinematics + desaturation
        let mut states = self.kinematics.to_wheel_states_about(speeds, self.center_of_rotation);
        desaturate(&mut states, self.max_speed);
        states
    }

    fn apply(&mut self, command: ControlCommand, now: f64, sensors: &SensorFrame) {
        info!("Applying {}", describe(&command));
        match command {
            ControlCommand::FollowPath(path) => {
                self.follower.start(path.trajectory, path.target_heading, now);
            }
            ControlCommand::Stop => self.follower.stop(),
            ControlCommand::ResetPose(pose) => {
                self.odometry
                    .reset_pose(pose, sensors.heading(self.invert_heading), sensors.wheel_positions);
            }
            ControlCommand::SetMode(mode) => {
                // Leaving autonomous never leaves a path running in the background
                if mode == DriveMode::Teleop {
                    self.follower.stop();
                }
                self.mode = mode;
            }
            ControlCommand::SetCenterOfRotation(center) => self.center_of_rotation = center,
        }
    }

    /// Read-only snapshot of the last tick
    pub fn status(&self) -> DriveStatus {
        DriveStatus {
            pose: self.odometry.pose(),
            measured: self.measured,
            commanded: self.commanded,
            mode: self.mode,
            follower: self.follower.state(),
            path_elapsed: match self.follower.state() {
                FollowerState::Running => self.follower.elapsed(self.last_tick),
                _ => None,
            },
        }
    }
}

fn describe(command: &ControlCommand) -> String {
    match command {
        ControlCommand::FollowPath(path) => format!(
            "follow path ({:.2} s, hold {:.1}°)",
            path.trajectory.duration(),
            path.target_heading.degrees()
        ),
        ControlCommand::Stop => "stop".to_string(),
        ControlCommand::ResetPose(pose) => format!(
            "reset pose to ({:.3}, {:.3}, {:.1}°)",
            pose.x(),
            pose.y(),
            pose.rotation.degrees()
        ),
        ControlCommand::SetMode(mode) => format!("mode {:?}", mode),
        ControlCommand::SetCenterOfRotation(center) => {
            format!("center of rotation ({:.3}, {:.3})", center.x, center.y)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autonomous::{PathPlanner, PathRequest};
    use crate::alliance::Alliance;
    use crate::geometry::Rotation;
    use crate::teleop::TranslateHat;
    use approx::assert_abs_diff_eq;

    fn control_loop() -> ControlLoop {
        ControlLoop::new(&DriveConfig::default(), &SensorFrame::default()).unwrap()
    }

    fn planned() -> PlannedPath {
        let config = DriveConfig::default();
        let planner = PathPlanner::new(config.trajectory_config().unwrap());
        let request = PathRequest {
            start: Pose::from_xy_degrees(0.0, 0.0, 0.0),
            waypoints: vec![Translation::new(0.5, 0.0)],
            end: Pose::from_xy_degrees(1.0, 0.0, 0.0),
            target_heading: Rotation::IDENTITY,
        };
        planner.plan(&request, Alliance::Blue).unwrap()
    }

    #[test]
    fn test_neutral_teleop_outputs_zero() {
        let mut drive = control_loop();
        let states = drive.tick(0.0, &SensorFrame::default(), &TeleopInput::neutral());
        assert!(states.iter().all(|s| s.speed == 0.0));
        assert_eq!(drive.status().commanded, ChassisSpeeds::zero());
    }

    #[test]
    fn test_field_relative_teleop_uses_heading() {
        let mut drive = control_loop();
        let sensors = SensorFrame {
            heading_deg: 90.0,
            ..SensorFrame::default()
        };
        let input = TeleopInput {
            forward: 0.5,
            ..TeleopInput::default()
        };
        drive.tick(0.0, &sensors, &input);
        // Facing +y, field-forward is robot-right
        let commanded = drive.status().commanded;
        assert_abs_diff_eq!(commanded.vx, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(commanded.vy, -0.5 * 3.63, epsilon = 1e-9);
    }

    #[test]
    fn test_output_is_desaturated() {
        let mut drive = control_loop();
        let input = TeleopInput {
            forward: 1.0,
            twist: 1.0,
            ..TeleopInput::default()
        };
        let states = drive.tick(0.0, &SensorFrame::default(), &input);
        let fastest = states.iter().map(|s| s.speed.abs()).fold(0.0, f64::max);
        assert_abs_diff_eq!(fastest, 3.63, epsilon = 1e-9);
    }

    #[test]
    fn test_commands_apply_on_next_tick() {
        let mut drive = control_loop();
        drive.submit(ControlCommand::SetMode(DriveMode::Autonomous));
        assert_eq!(drive.mode(), DriveMode::Teleop, "Submit must not apply immediately");

        drive.submit(ControlCommand::FollowPath(planned()));
        drive.tick(0.0, &SensorFrame::default(), &TeleopInput::neutral());
        assert_eq!(drive.mode(), DriveMode::Autonomous);
        assert_eq!(drive.follower_state(), FollowerState::Running);
        assert_eq!(drive.status().path_elapsed, Some(0.0));
    }

    #[test]
    fn test_autonomous_ignores_teleop() {
        let mut drive = control_loop();
        drive.submit(ControlCommand::SetMode(DriveMode::Autonomous));
        let input = TeleopInput {
            translate_hat: Some(TranslateHat::Left),
            ..TeleopInput::default()
        };
        let states = drive.tick(0.0, &SensorFrame::default(), &input);
        assert!(states.iter().all(|s| s.speed == 0.0), "Idle follower must output zero");
    }

    #[test]
    fn test_reset_pose_rebaselines_odometry() {
        let mut drive = control_loop();
        let sensors = SensorFrame {
            heading_deg: 42.0,
            ..SensorFrame::default()
        };
        drive.submit(ControlCommand::ResetPose(Pose::from_xy_degrees(1.0, 2.0, 0.0)));
        drive.tick(0.0, &sensors, &TeleopInput::neutral());
        let pose = drive.pose();
        assert_abs_diff_eq!(pose.x(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pose.y(), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pose.rotation.degrees(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_spin_about_front_left_wheel() {
        let mut drive = control_loop();
        let input = TeleopInput {
            twist: 0.5,
            ..TeleopInput::default()
        };

        // About the chassis centre every module turns
        let centred = drive.tick(0.0, &SensorFrame::default(), &input);
        assert!(centred.iter().all(|s| s.speed.abs() > 1e-3));

        let wheel = DriveConfig::default().kinematics().unwrap().offsets()[0];
        drive.submit(ControlCommand::SetCenterOfRotation(wheel));
        let states = drive.tick(0.02, &SensorFrame::default(), &input);
        println!("Wheel states about {:?}: {:?}", wheel, states);

        assert_abs_diff_eq!(states[0].speed, 0.0, epsilon = 1e-9);
        assert!(
            states[1..].iter().all(|s| s.speed.abs() > 1e-3),
            "Other modules must still move when pivoting on a wheel"
        );
        // Opposite corner is twice as far from the pivot as from the centre
        let fastest = states.iter().map(|s| s.speed.abs()).fold(0.0, f64::max);
        assert!(fastest > centred[0].speed.abs() + 1e-3);
    }

    #[test]
    fn test_back_to_teleop_stops_follower() {
        let mut drive = control_loop();
        drive.submit(ControlCommand::SetMode(DriveMode::Autonomous));
        drive.submit(ControlCommand::FollowPath(planned()));
        drive.tick(0.0, &SensorFrame::default(), &TeleopInput::neutral());

        drive.submit(ControlCommand::SetMode(DriveMode::Teleop));
        drive.tick(0.02, &SensorFrame::default(), &TeleopInput::neutral());
        assert_eq!(drive.follower_state(), FollowerState::Idle);
        assert_eq!(drive.status().path_elapsed, None);
    }
}
