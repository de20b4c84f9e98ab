// 50 Hz loop with watchdogs
// Moves messages between zenoh and the control loop at tick boundaries; no control math here.
// Watchdogs: stale teleop input becomes neutral input, stale sensors stop the drive.

use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::alliance::Alliance;
use crate::autonomous::PathPlanner;
use crate::config::{
    CMD_TIMEOUT, DriveConfig, LOOP_HZ, SENSOR_TIMEOUT, TOPIC_CMD_AUTO, TOPIC_CMD_TELEOP, TOPIC_HEALTH,
    TOPIC_RT_WHEELS, TOPIC_SENSOR_DRIVE, TOPIC_STATE_DRIVE, loop_period,
};
use crate::control_loop::{ControlCommand, ControlLoop, DriveMode};
use crate::drive::{Actuation, WHEEL_COUNT, WheelState};
use crate::error::Result;
use crate::messages::{AutoRequest, DriveStatus, RuntimeHealth, SensorFrame, WheelSetpoints};
use crate::sim::SimulatedChassis;
use crate::teleop::TeleopInput;

/// Startup options from the command line
#[derive(Debug, Clone, Default)]
pub struct RuntimeOptions {
    pub config: DriveConfig,
    /// Used when an auto request does not name an alliance
    pub alliance: Option<Alliance>,
    /// Drive a simulated chassis instead of listening for sensor frames
    pub simulate: bool,
}

pub struct Runtime {
    config: DriveConfig,
    planner: PathPlanner,
    actuation: Actuation,
    default_alliance: Option<Alliance>,
    // Built on the first sensor frame, which becomes the odometry baseline
    control: Option<ControlLoop>,
    // Commands received before the control loop exists
    backlog: Vec<ControlCommand>,
    sim: Option<SimulatedChassis>,
    latest_teleop: Option<TeleopInput>,
    teleop_received_at: Instant,
    latest_sensors: Option<SensorFrame>,
    sensors_received_at: Instant,
    started_at: Instant,
    health: RuntimeHealth,
}

impl Runtime {
    pub fn new(options: RuntimeOptions, now: Instant) -> Result<Self> {
        let config = options.config;
        config.validate()?;

        let sim = if options.simulate {
            info!("Simulating chassis");
            Some(SimulatedChassis::new(config.kinematics()?))
        } else {
            None
        };

        Ok(Self {
            planner: PathPlanner::new(config.trajectory_config()?),
            actuation: config.actuation()?,
            config,
            default_alliance: options.alliance,
            control: None,
            backlog: Vec::new(),
            sim,
            latest_teleop: None,
            teleop_received_at: now,
            latest_sensors: None,
            sensors_received_at: now,
            started_at: now,
            health: RuntimeHealth::SensorStale, // Start stale until first frame
        })
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    pub fn status(&self) -> Option<DriveStatus> {
        self.control.as_ref().map(|c| c.status())
    }

    /// Process incoming operator input
    pub fn on_teleop(&mut self, input: TeleopInput, now: Instant) {
        debug!("Received teleop: {:?}", &input);
        self.latest_teleop = Some(input);
        self.teleop_received_at = now;
    }

    /// Process an incoming sensor frame
    pub fn on_sensors(&mut self, frame: SensorFrame, now: Instant) {
        self.latest_sensors = Some(frame);
        self.sensors_received_at = now;
    }

    /// Plan or forward an autonomous request
    ///
    /// Planning failures are logged and the request is dropped.
    pub fn on_auto(&mut self, request: AutoRequest) {
        info!("Received auto request: {:?}", &request);
        match request {
            AutoRequest::Routine { routine, alliance } => {
                let alliance = Alliance::resolve(alliance.or(self.default_alliance));
                match routine.commands(&self.planner, alliance) {
                    Ok(commands) => commands.into_iter().for_each(|c| self.submit(c)),
                    Err(e) => warn!("Routine {:?} not started: {}", routine, e),
                }
            }
            AutoRequest::Path { path, alliance } => {
                let alliance = Alliance::resolve(alliance.or(self.default_alliance));
                match self.planner.plan(&path, alliance) {
                    Ok(planned) => {
                        self.submit(ControlCommand::SetMode(DriveMode::Autonomous));
                        self.submit(ControlCommand::FollowPath(planned));
                    }
                    Err(e) => warn!("Path not started: {}", e),
                }
            }
            AutoRequest::Stop => self.submit(ControlCommand::Stop),
            AutoRequest::ResetPose { pose } => self.submit(ControlCommand::ResetPose(pose)),
            AutoRequest::Teleop => self.submit(ControlCommand::SetMode(DriveMode::Teleop)),
            AutoRequest::CenterOfRotation { center } => {
                self.submit(ControlCommand::SetCenterOfRotation(center))
            }
        }
    }

    fn submit(&mut self, command: ControlCommand) {
        match self.control.as_mut() {
            Some(control) => control.submit(command),
            None => self.backlog.push(command),
        }
    }

    /// Run one tick and return the set-points to publish
    pub fn step(&mut self, now: Instant) -> Result<WheelSetpoints> {
        if let Some(frame) = self.sim.as_ref().map(|sim| sim.frame()) {
            self.on_sensors(frame, now);
        }

        // Sensor watchdog: without fresh feedback the drive is stopped
        let sensor_age = now.saturating_duration_since(self.sensors_received_at);
        let sensors = match self.latest_sensors {
            Some(frame) if sensor_age <= SENSOR_TIMEOUT => frame,
            Some(frame) => {
                if self.health != RuntimeHealth::SensorStale {
                    warn!("Sensor frame stale ({:?} old), stopping drive", sensor_age);
                }
                self.health = RuntimeHealth::SensorStale;
                return Ok(self.actuation.stopped(&frame.wheel_states));
            }
            None => {
                self.health = RuntimeHealth::SensorStale;
                return Ok(self.actuation.stopped(&[WheelState::default(); WHEEL_COUNT]));
            }
        };

        if self.control.is_none() {
            info!("First sensor frame received, odometry starts at the field origin");
            let mut control = ControlLoop::new(&self.config, &sensors)?;
            for command in self.backlog.drain(..) {
                control.submit(command);
            }
            self.control = Some(control);
        }
        let Some(control) = self.control.as_mut() else {
            return Ok(self.actuation.stopped(&sensors.wheel_states));
        };

        // Command watchdog: stale operator input is treated as centred sticks
        let teleop_age = now.saturating_duration_since(self.teleop_received_at);
        let teleop = match self.latest_teleop {
            Some(input) if teleop_age <= CMD_TIMEOUT => input,
            _ => TeleopInput::neutral(),
        };
        let teleop_stale = self.latest_teleop.is_none() || teleop_age > CMD_TIMEOUT;

        let elapsed = now.saturating_duration_since(self.started_at).as_secs_f64();
        let wheels = control.tick(elapsed, &sensors, &teleop);

        let health = if teleop_stale && control.mode() == DriveMode::Teleop {
            RuntimeHealth::CmdStale
        } else {
            RuntimeHealth::Ok
        };
        if health != self.health {
            match health {
                RuntimeHealth::CmdStale => warn!("Teleop input stale ({:?} old), holding still", teleop_age),
                _ => info!("Runtime healthy"),
            }
        }
        self.health = health;

        if let Some(sim) = self.sim.as_mut() {
            sim.step(&wheels, loop_period());
        }

        Ok(self.actuation.setpoints(&wheels, &sensors.wheel_states))
    }
}

fn parse<T: DeserializeOwned>(sample: &zenoh::sample::Sample, what: &str) -> Option<T> {
    let payload = sample.payload().to_bytes();
    match serde_json::from_slice::<T>(&payload) {
        Ok(message) => Some(message),
        Err(e) => {
            warn!("Failed to parse {}: {}", what, e);
            None
        }
    }
}

pub async fn run(options: RuntimeOptions) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let simulate = options.simulate;
    let mut runtime = Runtime::new(options, Instant::now())?;

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let sub_sensors = if simulate {
        None
    } else {
        Some(session.declare_subscriber(TOPIC_SENSOR_DRIVE).await?)
    };
    let sub_teleop = session.declare_subscriber(TOPIC_CMD_TELEOP).await?;
    let sub_auto = session.declare_subscriber(TOPIC_CMD_AUTO).await?;
    let pub_wheels = session.declare_publisher(TOPIC_RT_WHEELS).await?;
    let pub_status = session.declare_publisher(TOPIC_STATE_DRIVE).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));

    info!(
        "Runtime started: {}Hz loop, {}ms command watchdog, {}ms sensor watchdog",
        LOOP_HZ,
        CMD_TIMEOUT.as_millis(),
        SENSOR_TIMEOUT.as_millis()
    );
    info!("Subscribed to: {}, {}, {}", TOPIC_SENSOR_DRIVE, TOPIC_CMD_TELEOP, TOPIC_CMD_AUTO);
    info!("Publishing to: {}, {}, {}", TOPIC_RT_WHEELS, TOPIC_STATE_DRIVE, TOPIC_HEALTH);

    loop {
        tick.tick().await;
        let now = Instant::now();

        // 1. Drain all pending messages (non-blocking)
        if let Some(subscriber) = &sub_sensors {
            while let Ok(Some(sample)) = subscriber.try_recv() {
                if let Some(frame) = parse::<SensorFrame>(&sample, "sensor frame") {
                    runtime.on_sensors(frame, now);
                }
            }
        }
        while let Ok(Some(sample)) = sub_teleop.try_recv() {
            if let Some(input) = parse::<TeleopInput>(&sample, "teleop input") {
                runtime.on_teleop(input, now);
            }
        }
        while let Ok(Some(sample)) = sub_auto.try_recv() {
            if let Some(request) = parse::<AutoRequest>(&sample, "auto request") {
                runtime.on_auto(request);
            }
        }

        // 2. Tick the control loop (includes watchdog logic)
        let setpoints = runtime.step(now)?;

        // 3. Publish set-points
        let setpoints_json = serde_json::to_string(&setpoints)?;
        pub_wheels.put(setpoints_json).await?;

        // 4. Publish drive status and health
        if let Some(status) = runtime.status() {
            pub_status.put(serde_json::to_string(&status)?).await?;
        }
        let health_json = serde_json::to_string(&runtime.health())?;
        pub_health.put(health_json).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autonomous::Routine;
    use crate::control::FollowerState;
    use crate::geometry::{Pose, Translation};

    fn runtime(simulate: bool) -> (Runtime, Instant) {
        let now = Instant::now();
        let options = RuntimeOptions {
            simulate,
            ..RuntimeOptions::default()
        };
        (Runtime::new(options, now).unwrap(), now)
    }

    #[test]
    fn test_no_sensors_means_stopped() {
        let (mut runtime, now) = runtime(false);
        let setpoints = runtime.step(now).unwrap();
        assert!(setpoints.wheels.iter().all(|w| w.speed == 0.0));
        assert_eq!(runtime.health(), RuntimeHealth::SensorStale);
        assert!(runtime.status().is_none());
    }

    #[test]
    fn test_stale_sensors_stop_drive() {
        let (mut runtime, now) = runtime(false);
        runtime.on_sensors(SensorFrame::default(), now);
        runtime.on_teleop(
            TeleopInput {
                forward: 1.0,
                ..TeleopInput::default()
            },
            now,
        );
        let moving = runtime.step(now).unwrap();
        assert!(moving.wheels.iter().any(|w| w.speed != 0.0));
        assert_eq!(runtime.health(), RuntimeHealth::Ok);

        let later = now + SENSOR_TIMEOUT + Duration::from_millis(1);
        let stopped = runtime.step(later).unwrap();
        assert!(stopped.wheels.iter().all(|w| w.speed == 0.0));
        assert_eq!(runtime.health(), RuntimeHealth::SensorStale);
    }

    #[test]
    fn test_stale_teleop_is_neutral() {
        let (mut runtime, now) = runtime(true);
        runtime.on_teleop(
            TeleopInput {
                strafe: 1.0,
                ..TeleopInput::default()
            },
            now,
        );
        let later = now + CMD_TIMEOUT + Duration::from_millis(1);
        let setpoints = runtime.step(later).unwrap();
        assert!(setpoints.wheels.iter().all(|w| w.speed == 0.0), "Stale input must not move the robot");
        assert_eq!(runtime.health(), RuntimeHealth::CmdStale);
    }

    #[test]
    fn test_commands_before_first_frame_are_kept() {
        let (mut runtime, now) = runtime(false);
        runtime.on_auto(AutoRequest::ResetPose {
            pose: Pose::from_xy_degrees(2.0, 0.0, 0.0),
        });
        runtime.on_sensors(SensorFrame::default(), now);
        runtime.step(now).unwrap();
        let status = runtime.status().unwrap();
        assert!((status.pose.x() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_routine_request_starts_follower() {
        let (mut runtime, now) = runtime(true);
        runtime.on_auto(AutoRequest::Routine {
            routine: Routine::PostSeasonStraight,
            alliance: None,
        });
        runtime.step(now).unwrap();
        let status = runtime.status().unwrap();
        assert_eq!(status.mode, DriveMode::Autonomous);
        assert_eq!(status.follower, FollowerState::Running);
        assert_eq!(runtime.health(), RuntimeHealth::Ok, "Teleop staleness is irrelevant in autonomous");
    }

    #[test]
    fn test_setpoints_use_dispatch_order() {
        let (mut runtime, now) = runtime(false);
        runtime.on_sensors(SensorFrame::default(), now);
        runtime.on_teleop(
            TeleopInput {
                twist: 1.0,
                ..TeleopInput::default()
            },
            now,
        );
        let setpoints = runtime.step(now).unwrap();
        // Spinning in place: front-left points to 135°, front-right to 45°.
        // Hardware slot 0 is driven by core wheel 1 (front-right).
        let slot0 = setpoints.wheels[0].angle.degrees();
        assert!((slot0 - 45.0).abs() < 1e-6, "Slot 0 should carry front-right, got {}°", slot0);
    }

    #[test]
    fn test_center_of_rotation_request_reaches_wheels() {
        let (mut runtime, now) = runtime(false);
        runtime.on_sensors(SensorFrame::default(), now);
        runtime.on_auto(AutoRequest::CenterOfRotation {
            center: Translation::new(0.285, 0.285),
        });
        runtime.on_teleop(
            TeleopInput {
                twist: 1.0,
                ..TeleopInput::default()
            },
            now,
        );
        let setpoints = runtime.step(now).unwrap();
        println!("Pivot set-points: {:?}", setpoints.wheels);
        // Hardware slot 1 carries core wheel 0 (front-left), which sits on the pivot
        assert!(setpoints.wheels[1].speed.abs() < 1e-9, "Pivot wheel should not drive");
        assert!(setpoints.wheels[0].speed.abs() > 1e-3);
    }
}
