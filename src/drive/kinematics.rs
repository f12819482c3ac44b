// Mecanum inverse kinematics for a four-wheel base
// Maps named motion primitives and continuous joystick intent to per-wheel power.
//
// Wheel order everywhere is [front_left, front_right, back_left, back_right].
// Results are unclamped; PowerLimit bounds them before they reach a motor.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::power::MotorPowerVector;

/// A whole-robot motion with a fixed per-wheel sign pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionPrimitive {
    Forward,
    Backward,
    StrafeLeft,
    StrafeRight,
    PivotFrontLeft,
    PivotFrontRight,
    PivotBackLeft,
    PivotBackRight,
    RotateClockwise,
    Stop,
}

impl MotionPrimitive {
    pub const ALL: [MotionPrimitive; 10] = [
        Self::Forward,
        Self::Backward,
        Self::StrafeLeft,
        Self::StrafeRight,
        Self::PivotFrontLeft,
        Self::PivotFrontRight,
        Self::PivotBackLeft,
        Self::PivotBackRight,
        Self::RotateClockwise,
        Self::Stop,
    ];

    /// Unit sign pattern [FL, FR, BL, BR]
    pub const fn pattern(self) -> [f64; 4] {
        match self {
            Self::Forward => [1.0, 1.0, 1.0, 1.0],
            Self::Backward => [-1.0, -1.0, -1.0, -1.0],
            Self::StrafeRight => [1.0, -1.0, -1.0, 1.0],
            Self::StrafeLeft => [-1.0, 1.0, 1.0, -1.0],
            Self::PivotFrontRight => [1.0, 1.0, 0.0, 0.0],
            Self::PivotFrontLeft => [0.0, 0.0, 1.0, 1.0],
            Self::PivotBackRight => [-1.0, -1.0, 0.0, 0.0],
            Self::PivotBackLeft => [0.0, 0.0, -1.0, -1.0],
            Self::RotateClockwise => [1.0, -1.0, 1.0, -1.0],
            Self::Stop => [0.0, 0.0, 0.0, 0.0],
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
            Self::StrafeLeft => "strafe_left",
            Self::StrafeRight => "strafe_right",
            Self::PivotFrontLeft => "pivot_front_left",
            Self::PivotFrontRight => "pivot_front_right",
            Self::PivotBackLeft => "pivot_back_left",
            Self::PivotBackRight => "pivot_back_right",
            Self::RotateClockwise => "rotate_clockwise",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Display for MotionPrimitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Joystick intent for one control tick, each axis in [-1, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ContinuousIntent {
    pub forward: f64, // positive = forward
    pub strafe: f64,  // positive = right
    pub rotate: f64,  // positive = clockwise
}

impl ContinuousIntent {
    pub const fn new(forward: f64, strafe: f64, rotate: f64) -> Self {
        Self {
            forward,
            strafe,
            rotate,
        }
    }
}

/// Scale a primitive's sign pattern by `magnitude`
///
/// # Arguments
/// * `primitive` - Which motion to perform
/// * `magnitude` - Power fraction, nominally in [0, 1]; a negative value
///   reverses every wheel
pub fn primitive_to_power(primitive: MotionPrimitive, magnitude: f64) -> MotorPowerVector {
    let [fl, fr, bl, br] = primitive.pattern();
    MotorPowerVector::new(fl * magnitude, fr * magnitude, bl * magnitude, br * magnitude)
}

/// Superpose forward, strafe and rotate contributions on each wheel
///
/// Each axis drives the wheels with the same signs as its pure primitive
/// (Forward, StrafeRight, RotateClockwise), so the mapping is linear.
pub fn intent_to_power(intent: ContinuousIntent) -> MotorPowerVector {
    let ContinuousIntent {
        forward,
        strafe,
        rotate,
    } = intent;

    MotorPowerVector {
        front_left: forward + strafe + rotate,
        front_right: forward - strafe - rotate,
        back_left: forward - strafe + rotate,
        back_right: forward + strafe - rotate,
    }
}
