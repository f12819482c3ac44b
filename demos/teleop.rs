// Keyboard teleop: P start, WASD move, Z/X rotate, R/F stick scale, Space stop, Q quit
//
// Usage: cargo run --example teleop
// Pair with: cargo run -- manual
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::{Duration, Instant};
use tracing::info;

use mecanum_zenoh_runtime::config::{TICK, TOPIC_CMD_INTENT, TOPIC_CMD_LIFECYCLE};
use mecanum_zenoh_runtime::messages::{IntentCommand, LifecycleSignal};

const STICK_SCALES: [f64; 3] = [0.25, 0.5, 1.0]; // fraction of full stick deflection
const INPUT_TIMEOUT_MS: u64 = 100; // Release the stick after this much time with no input

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let intent_pub = session.declare_publisher(TOPIC_CMD_INTENT).await?;
    let lifecycle_pub = session.declare_publisher(TOPIC_CMD_LIFECYCLE).await?;

    info!("Controls: P=start, WASD=move, Z/X=rotate, R/F=scale, Space=stop, Q=quit");
    print_scale(0);

    enable_raw_mode()?;
    let result = run_teleop(&intent_pub, &lifecycle_pub).await;
    disable_raw_mode()?;

    result
}

async fn send_signal(
    publisher: &zenoh::pubsub::Publisher<'_>,
    signal: LifecycleSignal,
) -> Result<(), BoxError> {
    info!("Sending {:?}", signal);
    publisher.put(serde_json::to_string(&signal)?).await?;
    Ok(())
}

async fn run_teleop(
    intent_pub: &zenoh::pubsub::Publisher<'_>,
    lifecycle_pub: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), BoxError> {
    let mut scale_idx: usize = 0;

    // Persistent stick state
    let mut cmd = IntentCommand {
        forward: 0.0,
        strafe: 0.0,
        rotate: 0.0,
    };
    let mut last_movement_input = Instant::now();

    loop {
        // Poll for key once per runtime tick
        if event::poll(TICK)? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;
                let scale = STICK_SCALES[scale_idx];

                match code {
                    // Translation - update stick and refresh timestamp
                    KeyCode::Char('w') if pressed => {
                        cmd.forward = scale;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('s') if pressed => {
                        cmd.forward = -scale;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('a') if pressed => {
                        cmd.strafe = -scale;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('d') if pressed => {
                        cmd.strafe = scale;
                        last_movement_input = Instant::now();
                    }

                    // Rotation (positive = clockwise)
                    KeyCode::Char('z') if pressed => {
                        cmd.rotate = -scale;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('x') if pressed => {
                        cmd.rotate = scale;
                        last_movement_input = Instant::now();
                    }

                    // Stick scale
                    KeyCode::Char('r') if pressed => {
                        scale_idx = (scale_idx + 1).min(2);
                        print_scale(scale_idx);
                    }
                    KeyCode::Char('f') if pressed => {
                        scale_idx = scale_idx.saturating_sub(1);
                        print_scale(scale_idx);
                    }

                    // Lifecycle
                    KeyCode::Char('p') if pressed => {
                        send_signal(lifecycle_pub, LifecycleSignal::Start).await?;
                    }
                    KeyCode::Char(' ') if pressed => {
                        send_signal(lifecycle_pub, LifecycleSignal::Stop).await?;
                    }

                    // Quit also stops the robot
                    KeyCode::Char('q') | KeyCode::Esc if pressed => {
                        send_signal(lifecycle_pub, LifecycleSignal::Stop).await?;
                        break;
                    }

                    _ => {}
                }
            }
        }

        // Center the stick if no movement input for INPUT_TIMEOUT_MS
        if last_movement_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            cmd.forward = 0.0;
            cmd.strafe = 0.0;
            cmd.rotate = 0.0;
        }

        // Always publish at the runtime tick rate
        intent_pub.put(serde_json::to_string(&cmd)?).await?;
    }

    Ok(())
}

fn print_scale(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Stick scale: {}", label);
}
