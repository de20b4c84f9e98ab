// Trajectory generation: spline fitting plus a velocity profile under constraints

use tracing::debug;

use super::spline::{self, PoseWithCurvature};
use super::trajectory::{Trajectory, TrajectoryState};
use crate::drive::kinematics::{ChassisSpeeds, SwerveKinematics};
use crate::error::{Result, SwerveError};
use crate::geometry::{Pose, Translation};

/// Distances and accelerations below this are treated as zero
const EPSILON: f64 = 1e-6;

/// Extra limits applied on top of the global max velocity/acceleration
#[derive(Debug, Clone)]
pub enum TrajectoryConstraint {
    /// v²·|κ| never exceeds this lateral acceleration (m/s²)
    CentripetalAcceleration(f64),
    /// No module may be asked to exceed `max_speed` while following the path
    WheelSpeed {
        kinematics: SwerveKinematics,
        max_speed: f64,
    },
}

impl TrajectoryConstraint {
    /// Highest speed allowed at `point`, given the speed the profile would otherwise use
    fn max_velocity(&self, point: &PoseWithCurvature, velocity: f64) -> f64 {
        match self {
            Self::CentripetalAcceleration(max) => {
                if point.curvature.abs() < EPSILON {
                    f64::INFINITY
                } else {
                    (max / point.curvature.abs()).sqrt()
                }
            }
            Self::WheelSpeed { kinematics, max_speed } => {
                // Same chassis motion as the path demands at this point: moving
                // along the tangent and turning with the path curvature
                let heading = point.pose.rotation;
                let speeds = ChassisSpeeds::new(
                    velocity * heading.cos(),
                    velocity * heading.sin(),
                    velocity * point.curvature,
                );
                let fastest = kinematics
                    .wheel_vectors(speeds, Translation::default())
                    .iter()
                    .map(|v| v.norm())
                    .fold(0.0f64, f64::max);
                if fastest > *max_speed {
                    velocity * max_speed / fastest
                } else {
                    velocity
                }
            }
        }
    }
}

/// Velocity/acceleration limits for generation
#[derive(Debug, Clone)]
pub struct TrajectoryConfig {
    pub max_velocity: f64,
    pub max_acceleration: f64,
    pub start_velocity: f64,
    pub end_velocity: f64,
    pub constraints: Vec<TrajectoryConstraint>,
}

impl TrajectoryConfig {
    /// Start and end at rest
    pub fn new(max_velocity: f64, max_acceleration: f64) -> Self {
        Self {
            max_velocity,
            max_acceleration,
            start_velocity: 0.0,
            end_velocity: 0.0,
            constraints: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, constraint: TrajectoryConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Keep every module under `max_speed` (desaturation-aware profile)
    pub fn with_kinematics(self, kinematics: SwerveKinematics, max_speed: f64) -> Self {
        self.with_constraint(TrajectoryConstraint::WheelSpeed { kinematics, max_speed })
    }

    fn validate(&self) -> Result<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.max_velocity) {
            return Err(SwerveError::InfeasiblePath(format!(
                "max velocity must be positive, got {}",
                self.max_velocity
            )));
        }
        if !positive(self.max_acceleration) {
            return Err(SwerveError::InfeasiblePath(format!(
                "max acceleration must be positive, got {}",
                self.max_acceleration
            )));
        }
        for velocity in [self.start_velocity, self.end_velocity] {
            if !velocity.is_finite() || velocity < 0.0 || velocity > self.max_velocity {
                return Err(SwerveError::InfeasiblePath(format!(
                    "endpoint velocity {} outside [0, {}]",
                    velocity, self.max_velocity
                )));
            }
        }
        for constraint in &self.constraints {
            let ok = match constraint {
                TrajectoryConstraint::CentripetalAcceleration(max) => positive(*max),
                TrajectoryConstraint::WheelSpeed { max_speed, .. } => positive(*max_speed),
            };
            if !ok {
                return Err(SwerveError::InfeasiblePath(format!(
                    "constraint {:?} has a non-positive limit",
                    constraint
                )));
            }
        }
        Ok(())
    }
}

/// Fit a trajectory from `start` through `waypoints` to `end`
///
/// The path leaves `start` along its rotation and arrives at `end` along its
/// rotation. Fails with `InfeasiblePath` instead of returning a malformed
/// trajectory.
pub fn generate(
    start: &Pose,
    waypoints: &[Translation],
    end: &Pose,
    config: &TrajectoryConfig,
) -> Result<Trajectory> {
    config.validate()?;

    if !start.is_finite() || !end.is_finite() || waypoints.iter().any(|w| !w.is_finite()) {
        return Err(SwerveError::InfeasiblePath("non-finite waypoint".to_string()));
    }

    let mut points = Vec::with_capacity(waypoints.len() + 2);
    points.push(start.translation);
    points.extend_from_slice(waypoints);
    points.push(end.translation);
    if let Some(i) = points.windows(2).position(|w| w[0].distance(&w[1]) < EPSILON) {
        return Err(SwerveError::InfeasiblePath(format!(
            "waypoints {} and {} coincide at ({:.3}, {:.3})",
            i,
            i + 1,
            points[i].x,
            points[i].y
        )));
    }

    let (initial, last) = spline::endpoint_control_vectors(start, waypoints, end);
    let splines = spline::splines_from_control_vectors(&initial, waypoints, &last);

    let mut samples: Vec<PoseWithCurvature> = Vec::new();
    for segment in &splines {
        for point in spline::parameterize(segment)? {
            // Drop repeats (spline joints and degenerate subdivisions)
            let repeated = samples
                .last()
                .is_some_and(|prev| prev.pose.translation.distance(&point.pose.translation) < EPSILON);
            if !repeated {
                samples.push(point);
            }
        }
    }

    // The ends are exactly the requested poses, free of evaluation round-off
    if let Some(first) = samples.first_mut() {
        first.pose = *start;
    }
    if let Some(final_sample) = samples.last_mut() {
        final_sample.pose = *end;
    }

    let states = time_parameterize(&samples, config)?;
    let trajectory = Trajectory::new(states)?;

    debug!(
        "Generated trajectory: {} states, {:.2} m, {:.2} s",
        trajectory.states().len(),
        trajectory.length(),
        trajectory.duration()
    );
    Ok(trajectory)
}

#[derive(Debug, Clone, Copy)]
struct ConstrainedState {
    point: PoseWithCurvature,
    distance: f64,
    max_velocity: f64,
    min_acceleration: f64,
    max_acceleration: f64,
}

// Forward pass (accelerate), backward pass (decelerate), then integrate time
fn time_parameterize(points: &[PoseWithCurvature], config: &TrajectoryConfig) -> Result<Vec<TrajectoryState>> {
    let Some(first) = points.first() else {
        return Err(SwerveError::InfeasiblePath("path has no samples".to_string()));
    };
    let accel = config.max_acceleration;

    let mut constrained: Vec<ConstrainedState> = Vec::with_capacity(points.len());
    let mut predecessor = ConstrainedState {
        point: *first,
        distance: 0.0,
        max_velocity: config.start_velocity,
        min_acceleration: -accel,
        max_acceleration: accel,
    };

    for point in points {
        let ds = point.pose.translation.distance(&predecessor.point.pose.translation);
        let mut state = ConstrainedState {
            point: *point,
            distance: predecessor.distance + ds,
            max_velocity: 0.0,
            min_acceleration: -accel,
            max_acceleration: accel,
        };

        loop {
            let reachable = (predecessor.max_velocity.powi(2) + 2.0 * predecessor.max_acceleration * ds)
                .max(0.0)
                .sqrt();
            state.max_velocity = config.max_velocity.min(reachable);
            for constraint in &config.constraints {
                state.max_velocity = state.max_velocity.min(constraint.max_velocity(point, state.max_velocity));
            }

            if ds < EPSILON {
                break;
            }

            let actual = (state.max_velocity.powi(2) - predecessor.max_velocity.powi(2)) / (2.0 * ds);
            if state.max_acceleration < actual - EPSILON {
                predecessor.max_acceleration = state.max_acceleration;
            } else {
                if actual > predecessor.min_acceleration {
                    predecessor.max_acceleration = actual;
                }
                break;
            }
        }

        if let Some(previous) = constrained.last_mut() {
            previous.max_acceleration = predecessor.max_acceleration;
        }
        constrained.push(state);
        predecessor = state;
    }

    let mut successor = ConstrainedState {
        max_velocity: config.end_velocity,
        min_acceleration: -accel,
        max_acceleration: accel,
        ..*constrained.last().unwrap_or(&predecessor)
    };

    for state in constrained.iter_mut().rev() {
        let ds = state.distance - successor.distance;
        loop {
            let reachable = (successor.max_velocity.powi(2) + 2.0 * successor.min_acceleration * ds)
                .max(0.0)
                .sqrt();
            if reachable >= state.max_velocity {
                break;
            }
            state.max_velocity = reachable;

            if ds > -EPSILON {
                break;
            }

            let actual = (state.max_velocity.powi(2) - successor.max_velocity.powi(2)) / (2.0 * ds);
            if state.min_acceleration > actual + EPSILON {
                successor.min_acceleration = state.min_acceleration;
            } else {
                break;
            }
        }
        successor = *state;
    }

    let mut states: Vec<TrajectoryState> = Vec::with_capacity(constrained.len());
    let (mut time, mut distance, mut velocity) = (0.0, 0.0, 0.0);

    for (i, state) in constrained.iter().enumerate() {
        let ds = state.distance - distance;
        let mut dt = 0.0;

        if i > 0 {
            let acceleration = (state.max_velocity.powi(2) - velocity * velocity) / (2.0 * ds);
            if let Some(previous) = states.last_mut() {
                previous.acceleration = acceleration;
            }
            if acceleration.abs() > EPSILON {
                dt = (state.max_velocity - velocity) / acceleration;
            } else if velocity.abs() > EPSILON {
                dt = ds / velocity;
            } else {
                return Err(SwerveError::InfeasiblePath(format!(
                    "robot cannot make progress at {:.3} m along the path",
                    state.distance
                )));
            }
        }

        velocity = state.max_velocity;
        distance = state.distance;
        time += dt;

        states.push(TrajectoryState {
            time,
            velocity,
            acceleration: 0.0,
            pose: state.point.pose,
            curvature: state.point.curvature,
        });
    }

    Ok(states)
}
