// Swerve drive motion-control core plus the zenoh runtime shell

pub mod alliance;
pub mod autonomous;
pub mod config;
pub mod control;
pub mod control_loop;
pub mod drive;
pub mod error;
pub mod geometry;
pub mod messages;
pub mod path;
pub mod runtime;
pub mod sim;
pub mod teleop;

pub use error::{Result, SwerveError};
