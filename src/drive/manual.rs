// Joystick driving: one intent in, one clamped power vector out, every tick.
// Nothing is carried between ticks.

use super::kinematics::{ContinuousIntent, intent_to_power};
use super::power::{MotorPowerVector, PowerLimit};

#[derive(Debug, Clone, Copy, Default)]
pub struct ManualDriver {
    limit: PowerLimit,
}

impl ManualDriver {
    pub fn new(limit: PowerLimit) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> PowerLimit {
        self.limit
    }

    /// Map one intent snapshot to wheel power
    pub fn tick(&self, intent: ContinuousIntent) -> MotorPowerVector {
        self.limit.clamp(intent_to_power(intent))
    }
}
