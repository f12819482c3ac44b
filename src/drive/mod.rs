// Drive core for the mecanum base
//
// Provides:
// - Wheel power vector and per-wheel power ceiling
// - Mecanum inverse kinematics (motion primitives and joystick intent -> wheel power)
// - Timed autonomous plan sequencing
// - Stateless per-tick manual driving

pub mod kinematics;
mod manual;
pub mod power;
pub mod sequencer;

pub use kinematics::{ContinuousIntent, MotionPrimitive, intent_to_power, primitive_to_power};
pub use manual::ManualDriver;
pub use power::{MotorPowerVector, PowerLimit};
pub use sequencer::{
    Emission, LONG_SQUARE_HOLD_MS, Plan, PlanStep, Sequencer, SequencerState,
    StopReason,
};
