// Path follower state machine: Idle -> Running -> Finished

use serde::{Deserialize, Serialize};
use tracing::info;

use super::holonomic::HolonomicController;
use crate::drive::kinematics::ChassisSpeeds;
use crate::geometry::{Pose, Rotation};
use crate::path::Trajectory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowerState {
    Idle,
    Running,
    Finished,
}

#[derive(Debug, Clone)]
struct ActivePath {
    trajectory: Trajectory,
    target_heading: Rotation,
    started_at: f64,
}

/// Drives a trajectory to completion with a [`HolonomicController`]
///
/// Outputs exactly zero whenever it is not Running.
#[derive(Debug, Clone)]
pub struct PathFollower {
    controller: HolonomicController,
    active: Option<ActivePath>,
    state: FollowerState,
}

impl PathFollower {
    pub fn new(controller: HolonomicController) -> Self {
        Self {
            controller,
            active: None,
            state: FollowerState::Idle,
        }
    }

    pub fn state(&self) -> FollowerState {
        self.state
    }

    /// Begin (or restart from t = 0) following `trajectory`
    ///
    /// `target_heading` is fixed for the whole run. `now` is the tick time in seconds.
    pub fn start(&mut self, trajectory: Trajectory, target_heading: Rotation, now: f64) {
        info!(
            "Following path: {:.2} m over {:.2} s, holding {:.1}°",
            trajectory.length(),
            trajectory.duration(),
            target_heading.degrees()
        );
        self.controller.reset();
        self.active = Some(ActivePath {
            trajectory,
            target_heading,
            started_at: now,
        });
        self.state = FollowerState::Running;
    }

    /// Abandon the current path
    pub fn stop(&mut self) {
        if self.state == FollowerState::Running {
            info!("Path cancelled");
        }
        self.active = None;
        self.state = FollowerState::Idle;
    }

    /// Seconds since `start`, if a path has been started
    pub fn elapsed(&self, now: f64) -> Option<f64> {
        self.active.as_ref().map(|a| now - a.started_at)
    }

    /// One control tick; returns robot-relative chassis speeds
    pub fn update(&mut self, now: f64, pose: Pose) -> ChassisSpeeds {
        if self.state != FollowerState::Running {
            return ChassisSpeeds::zero();
        }
        let Some(active) = self.active.as_ref() else {
            self.state = FollowerState::Idle;
            return ChassisSpeeds::zero();
        };

        let elapsed = now - active.started_at;
        if elapsed >= active.trajectory.duration() {
            info!(
                "Path finished after {:.2} s at ({:.3}, {:.3}, {:.1}°)",
                elapsed,
                pose.x(),
                pose.y(),
                pose.rotation.degrees()
            );
            self.state = FollowerState::Finished;
            return ChassisSpeeds::zero();
        }

        let reference = active.trajectory.sample(elapsed);
        self.controller.calculate(pose, &reference, active.target_heading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::holonomic::ControllerGains;
    use crate::geometry::Translation;
    use crate::path::{TrajectoryConfig, generate};

    fn follower() -> PathFollower {
        PathFollower::new(HolonomicController::from_gains(&ControllerGains::default(), 0.02))
    }

    fn straight() -> Trajectory {
        generate(
            &Pose::from_xy_degrees(0.0, 0.0, 0.0),
            &[Translation::new(0.5, 0.0)],
            &Pose::from_xy_degrees(1.0, 0.0, 0.0),
            &TrajectoryConfig::new(3.5, 4.0),
        )
        .unwrap()
    }

    #[test]
    fn test_idle_outputs_zero() {
        let mut follower = follower();
        assert_eq!(follower.state(), FollowerState::Idle);
        assert_eq!(follower.update(0.0, Pose::default()), ChassisSpeeds::zero());
    }

    #[test]
    fn test_start_runs_then_finishes() {
        let mut follower = follower();
        let trajectory = straight();
        let duration = trajectory.duration();

        follower.start(trajectory, Rotation::IDENTITY, 0.0);
        assert_eq!(follower.state(), FollowerState::Running);

        let mid = follower.update(duration / 2.0, Pose::from_xy_degrees(0.5, 0.0, 0.0));
        assert!(mid.vx > 0.0, "Should be driving forward mid-path");

        let done = follower.update(duration, Pose::from_xy_degrees(1.0, 0.0, 0.0));
        assert_eq!(done, ChassisSpeeds::zero());
        assert_eq!(follower.state(), FollowerState::Finished);

        // Finished ignores further ticks, even with a pose error
        let later = follower.update(duration + 1.0, Pose::from_xy_degrees(0.0, 3.0, 45.0));
        assert_eq!(later, ChassisSpeeds::zero());
        assert_eq!(follower.state(), FollowerState::Finished);
    }

    #[test]
    fn test_restart_begins_at_zero() {
        let mut follower = follower();
        follower.start(straight(), Rotation::IDENTITY, 0.0);
        follower.update(100.0, Pose::default());
        assert_eq!(follower.state(), FollowerState::Finished);

        follower.start(straight(), Rotation::IDENTITY, 200.0);
        assert_eq!(follower.state(), FollowerState::Running);
        assert_eq!(follower.elapsed(200.0), Some(0.0));

        // Restarting while running also resets the clock
        follower.start(straight(), Rotation::IDENTITY, 200.1);
        assert_eq!(follower.elapsed(200.1), Some(0.0));
    }

    #[test]
    fn test_stop_forces_idle() {
        let mut follower = follower();
        follower.start(straight(), Rotation::IDENTITY, 0.0);
        follower.stop();
        assert_eq!(follower.state(), FollowerState::Idle);
        assert_eq!(follower.update(0.1, Pose::default()), ChassisSpeeds::zero());
    }
}
