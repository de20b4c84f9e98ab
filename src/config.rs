// Loop timing, topics and the drive configuration file
//
// Fixed runtime parameters are constants. Everything that depends on the
// physical chassis is read from a TOML file ([chassis], [teleop],
// [trajectory], [controller]); every field has a default so a partial file,
// or no file at all, still yields a usable configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::control::ControllerGains;
use crate::drive::{Actuation, DEFAULT_DISPATCH_ORDER, ModuleMapping, SwerveKinematics, WHEEL_COUNT};
use crate::error::{Result, SwerveError};
use crate::path::{TrajectoryConfig, TrajectoryConstraint};
use crate::teleop::TeleopMixer;

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Teleop input older than this is replaced by neutral input
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Without a fresh sensor frame the drive is stopped
pub const SENSOR_TIMEOUT: Duration = Duration::from_millis(100);

// Zenoh topics
pub const TOPIC_SENSOR_DRIVE: &str = "swerve/sensor/drive"; // gyro + module encoders
pub const TOPIC_CMD_TELEOP: &str = "swerve/cmd/teleop"; // operator input
pub const TOPIC_CMD_AUTO: &str = "swerve/cmd/auto"; // routines, paths, stop
pub const TOPIC_RT_WHEELS: &str = "swerve/rt/wheels"; // module set-points
pub const TOPIC_STATE_DRIVE: &str = "swerve/state/drive"; // pose + follower status
pub const TOPIC_HEALTH: &str = "swerve/state/health"; // health status

/// Loop period in seconds
pub fn loop_period() -> f64 {
    1.0 / LOOP_HZ as f64
}

mod defaults {
    use std::f64::consts::PI;

    pub fn wheelbase() -> f64 {
        0.57
    }
    pub fn max_speed() -> f64 {
        3.63
    }
    pub fn max_angular_speed() -> f64 {
        PI
    }
    pub fn dispatch_order() -> [usize; 4] {
        super::DEFAULT_DISPATCH_ORDER
    }
    pub fn optimize_module_states() -> bool {
        true
    }
    pub fn deadband() -> f64 {
        0.05
    }
    pub fn hat_power() -> f64 {
        0.3
    }
    pub fn field_relative() -> bool {
        true
    }
    pub fn max_velocity() -> f64 {
        3.5
    }
    pub fn max_acceleration() -> f64 {
        4.0
    }
    pub fn translation_kp() -> f64 {
        0.4
    }
    pub fn heading_kp() -> f64 {
        3.0
    }
    pub fn heading_kd() -> f64 {
        0.2
    }
    pub fn heading_limit() -> f64 {
        PI
    }
}

/// Complete drive configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriveConfig {
    #[serde(default)]
    pub chassis: ChassisSettings,

    #[serde(default)]
    pub teleop: TeleopSettings,

    #[serde(default)]
    pub trajectory: TrajectorySettings,

    #[serde(default)]
    pub controller: ControllerSettings,
}

/// Physical chassis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChassisSettings {
    /// Left-right distance between module centres (m)
    #[serde(default = "defaults::wheelbase")]
    pub wheelbase_width: f64,

    /// Front-back distance between module centres (m)
    #[serde(default = "defaults::wheelbase")]
    pub wheelbase_length: f64,

    /// Max wheel speed (m/s); also the teleop full-stick speed
    #[serde(default = "defaults::max_speed")]
    pub max_speed: f64,

    /// Full-stick rotation rate (rad/s)
    #[serde(default = "defaults::max_angular_speed")]
    pub max_angular_speed: f64,

    /// Hardware slot i is driven by core wheel dispatch_order[i]
    #[serde(default = "defaults::dispatch_order")]
    pub dispatch_order: [usize; WHEEL_COUNT],

    /// Gyro reports clockwise-positive
    #[serde(default)]
    pub invert_heading: bool,

    /// Flip wheel direction instead of steering more than 90°
    #[serde(default = "defaults::optimize_module_states")]
    pub optimize_module_states: bool,
}

impl Default for ChassisSettings {
    fn default() -> Self {
        Self {
            wheelbase_width: defaults::wheelbase(),
            wheelbase_length: defaults::wheelbase(),
            max_speed: defaults::max_speed(),
            max_angular_speed: defaults::max_angular_speed(),
            dispatch_order: defaults::dispatch_order(),
            invert_heading: false,
            optimize_module_states: defaults::optimize_module_states(),
        }
    }
}

/// Operator input shaping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeleopSettings {
    #[serde(default = "defaults::deadband")]
    pub deadband: f64,

    /// Fraction of max speed for a translation hat press
    #[serde(default = "defaults::hat_power")]
    pub hat_power_move: f64,

    /// Fraction of max angular speed for a rotation hat press
    #[serde(default = "defaults::hat_power")]
    pub hat_power_rotate: f64,

    /// Interpret stick axes in the field frame
    #[serde(default = "defaults::field_relative")]
    pub field_relative: bool,
}

impl Default for TeleopSettings {
    fn default() -> Self {
        Self {
            deadband: defaults::deadband(),
            hat_power_move: defaults::hat_power(),
            hat_power_rotate: defaults::hat_power(),
            field_relative: defaults::field_relative(),
        }
    }
}

/// Limits used when planning paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySettings {
    #[serde(default = "defaults::max_velocity")]
    pub max_velocity: f64,

    #[serde(default = "defaults::max_acceleration")]
    pub max_acceleration: f64,

    /// Optional lateral acceleration limit (m/s²)
    #[serde(default)]
    pub max_centripetal_acceleration: Option<f64>,
}

impl Default for TrajectorySettings {
    fn default() -> Self {
        Self {
            max_velocity: defaults::max_velocity(),
            max_acceleration: defaults::max_acceleration(),
            max_centripetal_acceleration: None,
        }
    }
}

/// Path-following gains
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerSettings {
    #[serde(default = "defaults::translation_kp")]
    pub translation_kp: f64,
    #[serde(default)]
    pub translation_ki: f64,
    #[serde(default)]
    pub translation_kd: f64,

    #[serde(default = "defaults::heading_kp")]
    pub heading_kp: f64,
    #[serde(default)]
    pub heading_ki: f64,
    #[serde(default = "defaults::heading_kd")]
    pub heading_kd: f64,

    /// Heading profile velocity limit (rad/s)
    #[serde(default = "defaults::heading_limit")]
    pub heading_max_velocity: f64,

    /// Heading profile acceleration limit (rad/s²)
    #[serde(default = "defaults::heading_limit")]
    pub heading_max_acceleration: f64,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            translation_kp: defaults::translation_kp(),
            translation_ki: 0.0,
            translation_kd: 0.0,
            heading_kp: defaults::heading_kp(),
            heading_ki: 0.0,
            heading_kd: defaults::heading_kd(),
            heading_max_velocity: defaults::heading_limit(),
            heading_max_acceleration: defaults::heading_limit(),
        }
    }
}

impl DriveConfig {
    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&text)?;
        info!("Loaded drive configuration from {}", path.display());
        Ok(config)
    }

    /// Load `path` if given, otherwise use the built-in defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                info!("No configuration file given, using defaults");
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the drive cannot run with
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("chassis.wheelbase_width", self.chassis.wheelbase_width),
            ("chassis.wheelbase_length", self.chassis.wheelbase_length),
            ("chassis.max_speed", self.chassis.max_speed),
            ("chassis.max_angular_speed", self.chassis.max_angular_speed),
            ("trajectory.max_velocity", self.trajectory.max_velocity),
            ("trajectory.max_acceleration", self.trajectory.max_acceleration),
            ("controller.heading_max_velocity", self.controller.heading_max_velocity),
            ("controller.heading_max_acceleration", self.controller.heading_max_acceleration),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(SwerveError::Config(format!("{} must be positive, got {}", name, value)));
            }
        }

        if let Some(limit) = self.trajectory.max_centripetal_acceleration {
            if !limit.is_finite() || limit <= 0.0 {
                return Err(SwerveError::Config(format!(
                    "trajectory.max_centripetal_acceleration must be positive, got {}",
                    limit
                )));
            }
        }

        let fractions = [
            ("teleop.deadband", self.teleop.deadband),
            ("teleop.hat_power_move", self.teleop.hat_power_move),
            ("teleop.hat_power_rotate", self.teleop.hat_power_rotate),
        ];
        for (name, value) in fractions {
            if !(0.0..1.0).contains(&value) {
                return Err(SwerveError::Config(format!("{} must be in [0, 1), got {}", name, value)));
            }
        }

        let gains = [
            self.controller.translation_kp,
            self.controller.translation_ki,
            self.controller.translation_kd,
            self.controller.heading_kp,
            self.controller.heading_ki,
            self.controller.heading_kd,
        ];
        if gains.iter().any(|g| !g.is_finite() || *g < 0.0) {
            return Err(SwerveError::Config(format!(
                "controller gains must be finite and non-negative, got {:?}",
                gains
            )));
        }

        // Surfaces a bad dispatch table as a config error
        ModuleMapping::new(self.chassis.dispatch_order)?;
        Ok(())
    }

    pub fn kinematics(&self) -> Result<SwerveKinematics> {
        SwerveKinematics::rectangular(self.chassis.wheelbase_width, self.chassis.wheelbase_length)
    }

    pub fn actuation(&self) -> Result<Actuation> {
        Ok(Actuation::new(
            ModuleMapping::new(self.chassis.dispatch_order)?,
            self.chassis.optimize_module_states,
        ))
    }

    /// Planning limits plus the wheel-speed constraint for this chassis
    pub fn trajectory_config(&self) -> Result<TrajectoryConfig> {
        let mut config = TrajectoryConfig::new(self.trajectory.max_velocity, self.trajectory.max_acceleration)
            .with_kinematics(self.kinematics()?, self.chassis.max_speed);
        if let Some(limit) = self.trajectory.max_centripetal_acceleration {
            config = config.with_constraint(TrajectoryConstraint::CentripetalAcceleration(limit));
        }
        Ok(config)
    }

    pub fn gains(&self) -> ControllerGains {
        let c = &self.controller;
        ControllerGains {
            translation_kp: c.translation_kp,
            translation_ki: c.translation_ki,
            translation_kd: c.translation_kd,
            heading_kp: c.heading_kp,
            heading_ki: c.heading_ki,
            heading_kd: c.heading_kd,
            heading_max_velocity: c.heading_max_velocity,
            heading_max_acceleration: c.heading_max_acceleration,
        }
    }

    pub fn teleop_mixer(&self) -> TeleopMixer {
        TeleopMixer::new(
            self.chassis.max_speed,
            self.chassis.max_angular_speed,
            self.teleop.deadband,
            self.teleop.hat_power_move,
            self.teleop.hat_power_rotate,
        )
    }
}
