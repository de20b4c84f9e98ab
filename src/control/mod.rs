// Closed-loop path following
//
// Provides:
// - PID, trapezoid profile and profiled PID loops
// - Holonomic tracking controller (x, y, heading decoupled)
// - Idle/Running/Finished path follower

pub mod follower;
pub mod holonomic;
pub mod pid;

pub use follower::{FollowerState, PathFollower};
pub use holonomic::{ControllerGains, HolonomicController};
