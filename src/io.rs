// Boundary between the drive core and the world around it.
//
// The mode loops in `runtime` only talk to hardware, operators and the
// driver station through these traits. `transport` implements them over
// zenoh; tests implement them in memory.
#![allow(async_fn_in_trait)]

use std::time::Duration;

use crate::drive::{ContinuousIntent, MotorPowerVector};
use crate::error::RuntimeError;
use crate::messages::TelemetryFrame;

/// Monotonic time source
pub trait Clock {
    fn elapsed_millis(&self) -> u64;
}

/// Operator start/stop gate and the environment's heartbeat
pub trait LifecycleGate {
    /// Block until the operator starts the run
    async fn wait_for_start(&mut self) -> Result<(), RuntimeError>;

    fn is_stop_requested(&mut self) -> bool;

    /// Yield to the environment for at most `max_wait`
    async fn idle(&mut self, max_wait: Duration);
}

/// Joystick (or other operator input), sampled once per tick
pub trait IntentSource {
    fn read_continuous_intent(&mut self) -> ContinuousIntent;
}

/// Applies wheel power to the actuators. Only ever handed clamped values.
pub trait MotorSink {
    async fn apply(&mut self, power: MotorPowerVector) -> Result<(), RuntimeError>;
}

/// Observational side channel. Never read back by the core.
pub trait Telemetry {
    async fn record(&mut self, frame: &TelemetryFrame);
}
