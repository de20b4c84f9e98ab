// Autonomous planning: path requests, alliance resolution and named routines

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::alliance::Alliance;
use crate::control_loop::{ControlCommand, DriveMode};
use crate::error::Result;
use crate::geometry::{Pose, Rotation, Translation};
use crate::path::{Trajectory, TrajectoryConfig, generate};

/// A path authored in Blue-alliance field coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathRequest {
    pub start: Pose,
    #[serde(default)]
    pub waypoints: Vec<Translation>,
    pub end: Pose,
    /// Heading to hold while driving, independent of the path tangent
    #[serde(default)]
    pub target_heading: Rotation,
}

/// A generated trajectory ready for the follower
#[derive(Debug, Clone)]
pub struct PlannedPath {
    pub trajectory: Trajectory,
    pub target_heading: Rotation,
}

/// Turns path requests into trajectories for the current alliance
#[derive(Debug, Clone)]
pub struct PathPlanner {
    config: TrajectoryConfig,
}

impl PathPlanner {
    pub fn new(config: TrajectoryConfig) -> Self {
        Self { config }
    }

    /// Mirror for Red, then generate
    ///
    /// On error nothing is produced; callers never see a partial trajectory.
    pub fn plan(&self, request: &PathRequest, alliance: Alliance) -> Result<PlannedPath> {
        let start = alliance.apply_pose(request.start);
        let end = alliance.apply_pose(request.end);
        let waypoints: Vec<Translation> = request
            .waypoints
            .iter()
            .map(|&w| alliance.apply_translation(w))
            .collect();

        let trajectory = generate(&start, &waypoints, &end, &self.config)?;
        info!(
            "Planned {:?} path: {} states, {:.2} s",
            alliance,
            trajectory.states().len(),
            trajectory.duration()
        );

        Ok(PlannedPath {
            trajectory,
            target_heading: alliance.apply_heading_target(request.target_heading),
        })
    }
}

/// Named autonomous routines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Routine {
    /// One metre straight up the field, wheels pointing along +y, holding 0°
    PostSeasonStraight,
}

impl Routine {
    /// The paths this routine drives, in Blue coordinates
    pub fn paths(&self) -> Vec<PathRequest> {
        match self {
            Routine::PostSeasonStraight => vec![PathRequest {
                start: Pose::from_xy_degrees(0.0, 0.0, 90.0),
                waypoints: vec![Translation::new(0.0, 0.5)],
                end: Pose::from_xy_degrees(0.0, 1.0, 90.0),
                target_heading: Rotation::IDENTITY,
            }],
        }
    }

    /// Commands to submit to the control loop, all planned up front
    ///
    /// If any path fails to plan the routine yields nothing at all.
    pub fn commands(&self, planner: &PathPlanner, alliance: Alliance) -> Result<Vec<ControlCommand>> {
        let planned = self
            .paths()
            .iter()
            .map(|request| planner.plan(request, alliance))
            .collect::<Result<Vec<_>>>()?;

        let mut commands = vec![
            ControlCommand::ResetPose(Pose::default()),
            ControlCommand::SetMode(DriveMode::Autonomous),
        ];
        commands.extend(planned.into_iter().map(ControlCommand::FollowPath));
        Ok(commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::SwerveKinematics;
    use crate::error::SwerveError;
    use approx::assert_abs_diff_eq;

    fn planner() -> PathPlanner {
        let kinematics = SwerveKinematics::rectangular(0.57, 0.57).unwrap();
        PathPlanner::new(TrajectoryConfig::new(3.5, 4.0).with_kinematics(kinematics, 3.63))
    }

    fn offset_request() -> PathRequest {
        PathRequest {
            start: Pose::from_xy_degrees(1.0, 0.0, 30.0),
            waypoints: vec![Translation::new(1.5, 0.5)],
            end: Pose::from_xy_degrees(2.0, 1.0, 60.0),
            target_heading: Rotation::from_degrees(45.0),
        }
    }

    #[test]
    fn test_blue_plan_follows_request() {
        let planned = planner().plan(&offset_request(), Alliance::Blue).unwrap();
        let last = planned.trajectory.final_state().pose;
        assert_abs_diff_eq!(last.x(), 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(last.y(), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(planned.target_heading.degrees(), 45.0, epsilon = 1e-9);
    }

    #[test]
    fn test_red_plan_is_mirrored() {
        let planned = planner().plan(&offset_request(), Alliance::Red).unwrap();
        let first = planned.trajectory.initial_pose();
        let last = planned.trajectory.final_state().pose;
        assert_abs_diff_eq!(first.x(), -1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(last.x(), -2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(last.y(), 1.0, epsilon = 1e-9);
        // -(60 + 180) = -240 ≡ 120
        assert_abs_diff_eq!(last.rotation.degrees(), 120.0, epsilon = 1e-9);
        assert_abs_diff_eq!(planned.target_heading.degrees(), -45.0, epsilon = 1e-9);
    }

    #[test]
    fn test_infeasible_request_is_rejected() {
        let request = PathRequest {
            start: Pose::default(),
            waypoints: vec![],
            end: Pose::default(),
            target_heading: Rotation::IDENTITY,
        };
        assert!(matches!(
            planner().plan(&request, Alliance::Blue),
            Err(SwerveError::InfeasiblePath(_))
        ));
    }

    #[test]
    fn test_straight_routine_commands() {
        let commands = Routine::PostSeasonStraight.commands(&planner(), Alliance::Blue).unwrap();
        assert_eq!(commands.len(), 3);
        assert!(matches!(commands[0], ControlCommand::ResetPose(p) if p == Pose::default()));
        assert!(matches!(commands[1], ControlCommand::SetMode(DriveMode::Autonomous)));
        let ControlCommand::FollowPath(path) = &commands[2] else {
            panic!("Expected the routine to end with a path");
        };
        let last = path.trajectory.final_state().pose;
        assert_abs_diff_eq!(last.x(), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(last.y(), 1.0, epsilon = 1e-9);
        assert_eq!(path.target_heading, Rotation::IDENTITY);
    }

    #[test]
    fn test_straight_routine_same_for_red() {
        // x = 0 and 90° headings are fixed points of the mirror
        let commands = Routine::PostSeasonStraight.commands(&planner(), Alliance::Red).unwrap();
        let ControlCommand::FollowPath(path) = &commands[2] else {
            panic!("Expected the routine to end with a path");
        };
        assert_abs_diff_eq!(path.trajectory.final_state().pose.x(), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(path.trajectory.final_state().pose.rotation.degrees(), 90.0, epsilon = 1e-9);
    }
}
