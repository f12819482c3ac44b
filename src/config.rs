// Loop rate, timeouts, topics, drive limits
use std::time::Duration;

// Control loop frequency
pub const LOOP_HZ: u64 = 50;

// One control tick, the longest the loops ever idle in one go
pub const TICK: Duration = Duration::from_millis(1000 / LOOP_HZ);

// Intent older than this is treated as zero (teleop watchdog)
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Zenoh topics
pub const TOPIC_CMD_INTENT: &str = "mecanum/cmd/intent"; // joystick intent
pub const TOPIC_CMD_LIFECYCLE: &str = "mecanum/cmd/lifecycle"; // start / stop
pub const TOPIC_RT_WHEELS: &str = "mecanum/rt/wheels"; // wheel power actuation
pub const TOPIC_TELEMETRY: &str = "mecanum/state/telemetry"; // driver station feed

// Wheel power ceiling for RUN_USING_ENCODER motors, fraction of full scale
pub const DEFAULT_MOTOR_MAX: f64 = 0.6;

// Hard ceiling on an autonomous run
pub const DEFAULT_BUDGET_MS: u64 = 10_000;

// Hold per step for the built-in plans
pub const DEFAULT_HOLD_MS: u64 = 1_000;
