// Message types exchanged over zenoh

use serde::{Deserialize, Serialize};

use crate::drive::{ContinuousIntent, MotionPrimitive, MotorPowerVector};

// Joystick command from teleop -> runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentCommand {
    pub forward: f64,
    pub strafe: f64,
    pub rotate: f64,
}

// Axes are clamped to [-1, 1] so a misbehaving publisher cannot exceed stick range
impl From<&IntentCommand> for ContinuousIntent {
    fn from(cmd: &IntentCommand) -> Self {
        let axis = |v: f64| if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 };
        ContinuousIntent::new(axis(cmd.forward), axis(cmd.strafe), axis(cmd.rotate))
    }
}

/// Operator lifecycle signal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleSignal {
    Start,
    Stop,
}

/// Driver station feed, published after every power emission
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TelemetryFrame {
    pub label: String,
    pub power: MotorPowerVector,
    pub primitive: Option<MotionPrimitive>,
    pub run_time_ms: u64,
}
