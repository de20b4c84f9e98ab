// Path planning: spline fitting, velocity profiling and sampling
//
// Provides:
// - Clamped cubic Hermite splines through waypoints
// - Forward/backward velocity profile under speed, acceleration and curvature limits
// - Immutable trajectories sampled by time

pub mod generator;
pub mod spline;
pub mod trajectory;

pub use generator::{TrajectoryConfig, TrajectoryConstraint, generate};
pub use trajectory::{Trajectory, TrajectoryState};
