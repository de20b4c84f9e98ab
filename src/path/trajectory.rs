// Time-parameterized path produced by the generator

use serde::{Deserialize, Serialize};

use crate::error::{Result, SwerveError};
use crate::geometry::Pose;

/// One sample of a trajectory
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrajectoryState {
    /// Seconds since the start of the trajectory
    pub time: f64,
    /// Speed along the path, m/s
    pub velocity: f64,
    /// m/s², constant until the next state
    pub acceleration: f64,
    /// Position on the path; the rotation is the path tangent, not the robot heading
    pub pose: Pose,
    /// rad/m
    pub curvature: f64,
}

impl TrajectoryState {
    // Constant-acceleration interpolation towards `end`
    fn interpolate(&self, end: &TrajectoryState, i: f64) -> TrajectoryState {
        let time = self.time + (end.time - self.time) * i;
        let dt = time - self.time;

        if dt < 0.0 {
            return end.interpolate(self, 1.0 - i);
        }

        let velocity = self.velocity + self.acceleration * dt;
        let travelled = self.velocity * dt + 0.5 * self.acceleration * dt * dt;
        let span = self.pose.translation.distance(&end.pose.translation);
        let fraction = if span > 1e-12 {
            (travelled / span).clamp(0.0, 1.0)
        } else {
            i
        };

        TrajectoryState {
            time,
            velocity,
            acceleration: self.acceleration,
            pose: self.pose.interpolate(&end.pose, fraction),
            curvature: self.curvature + (end.curvature - self.curvature) * fraction,
        }
    }
}

/// An immutable, non-empty sequence of states with strictly increasing time stamps
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trajectory {
    states: Vec<TrajectoryState>,
}

impl Trajectory {
    /// Wrap generated states, checking the ordering invariants
    pub fn new(states: Vec<TrajectoryState>) -> Result<Self> {
        let Some(first) = states.first() else {
            return Err(SwerveError::InfeasiblePath("trajectory has no states".to_string()));
        };
        if first.time != 0.0 {
            return Err(SwerveError::InfeasiblePath(format!(
                "trajectory starts at t = {} instead of 0",
                first.time
            )));
        }
        if states.iter().any(|s| !s.time.is_finite() || !s.velocity.is_finite()) {
            return Err(SwerveError::InfeasiblePath("trajectory contains non-finite values".to_string()));
        }
        if states.windows(2).any(|w| w[1].time <= w[0].time) {
            return Err(SwerveError::InfeasiblePath(
                "trajectory time stamps are not strictly increasing".to_string(),
            ));
        }
        Ok(Self { states })
    }

    pub fn states(&self) -> &[TrajectoryState] {
        &self.states
    }

    /// Total time in seconds
    pub fn duration(&self) -> f64 {
        self.final_state().time
    }

    pub fn initial_pose(&self) -> Pose {
        self.states[0].pose
    }

    pub fn final_state(&self) -> &TrajectoryState {
        // Non-empty by construction
        &self.states[self.states.len() - 1]
    }

    /// Path length in meters
    pub fn length(&self) -> f64 {
        self.states
            .windows(2)
            .map(|w| w[0].pose.translation.distance(&w[1].pose.translation))
            .sum()
    }

    /// State at time `t`, clamped to [0, duration]
    ///
    /// Sampling past the end returns the final state, so a follower that keeps
    /// ticking after the path completes just holds the end point.
    pub fn sample(&self, t: f64) -> TrajectoryState {
        let first = &self.states[0];
        if t.is_nan() || t <= first.time {
            return *first;
        }
        if t >= self.duration() {
            return *self.final_state();
        }

        // First state at or after t; index is at least 1 because t > first.time
        let index = self.states.partition_point(|s| s.time < t);
        let previous = &self.states[index - 1];
        let next = &self.states[index];

        previous.interpolate(next, (t - previous.time) / (next.time - previous.time))
    }
}
