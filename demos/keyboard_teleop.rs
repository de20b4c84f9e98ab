// Keyboard teleop: WASD move, Z/X rotate, arrows trim, ,/. rotate trim, R/F speed, P routine, O stop, T teleop, Q quit
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::{Duration, Instant};
use tracing::info;

use swerve_zenoh_runtime::autonomous::Routine;
use swerve_zenoh_runtime::config::{TOPIC_CMD_AUTO, TOPIC_CMD_TELEOP};
use swerve_zenoh_runtime::messages::AutoRequest;
use swerve_zenoh_runtime::teleop::{RotateHat, TeleopInput, TranslateHat};

const AXIS_LEVELS: [f64; 3] = [0.25, 0.5, 1.0]; // stick deflection
const INPUT_TIMEOUT_MS: u64 = 100; // Release the sticks after this much time with no input

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let pub_teleop = session.declare_publisher(TOPIC_CMD_TELEOP).await?;
    let pub_auto = session.declare_publisher(TOPIC_CMD_AUTO).await?;

    info!("Controls: WASD=move, Z/X=rotate, arrows=trim, ,/.=rotate trim, R/F=speed, P=auto routine, O=stop, T=teleop, Q=quit");
    info!("Speed: LOW");

    enable_raw_mode()?;
    let result = run_teleop(&pub_teleop, &pub_auto).await;
    disable_raw_mode()?;

    result
}

async fn run_teleop(
    pub_teleop: &zenoh::pubsub::Publisher<'_>,
    pub_auto: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut level: usize = 0;

    // Persistent stick state
    let mut input = TeleopInput::neutral();
    let mut last_movement_input = Instant::now();

    loop {
        // Poll for key with 20ms timeout (50Hz effective rate)
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;
                let axis = AXIS_LEVELS[level];
                let mut moved = true;

                match code {
                    // Sticks
                    KeyCode::Char('w') if pressed => input.forward = axis,
                    KeyCode::Char('s') if pressed => input.forward = -axis,
                    KeyCode::Char('a') if pressed => input.strafe = axis,
                    KeyCode::Char('d') if pressed => input.strafe = -axis,
                    KeyCode::Char('z') if pressed => input.twist = axis,
                    KeyCode::Char('x') if pressed => input.twist = -axis,

                    // Hats
                    KeyCode::Up if pressed => input.translate_hat = Some(TranslateHat::Forward),
                    KeyCode::Down if pressed => input.translate_hat = Some(TranslateHat::Back),
                    KeyCode::Left if pressed => input.translate_hat = Some(TranslateHat::Left),
                    KeyCode::Right if pressed => input.translate_hat = Some(TranslateHat::Right),
                    KeyCode::Char(',') if pressed => input.rotate_hat = Some(RotateHat::Left),
                    KeyCode::Char('.') if pressed => input.rotate_hat = Some(RotateHat::Right),

                    // Speed control
                    KeyCode::Char('r') if pressed => {
                        level = (level + 1).min(AXIS_LEVELS.len() - 1);
                        print_speed(level);
                        moved = false;
                    }
                    KeyCode::Char('f') if pressed => {
                        level = level.saturating_sub(1);
                        print_speed(level);
                        moved = false;
                    }

                    // Autonomous
                    KeyCode::Char('p') if pressed => {
                        send(pub_auto, &AutoRequest::Routine {
                            routine: Routine::PostSeasonStraight,
                            alliance: None,
                        })
                        .await?;
                        moved = false;
                    }
                    KeyCode::Char('o') if pressed => {
                        send(pub_auto, &AutoRequest::Stop).await?;
                        moved = false;
                    }
                    KeyCode::Char('t') if pressed => {
                        send(pub_auto, &AutoRequest::Teleop).await?;
                        moved = false;
                    }

                    // Quit
                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => moved = false,
                }

                if moved {
                    last_movement_input = Instant::now();
                }
            }
        }

        // Release sticks and hats if no movement input for INPUT_TIMEOUT_MS
        if last_movement_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            input = TeleopInput::neutral();
        }

        // Always publish at ~50Hz
        pub_teleop.put(serde_json::to_string(&input)?).await?;
    }

    Ok(())
}

async fn send(
    publisher: &zenoh::pubsub::Publisher<'_>,
    request: &AutoRequest,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Sending {:?}", request);
    publisher.put(serde_json::to_string(request)?).await?;
    Ok(())
}

fn print_speed(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Speed: {}", label);
}
