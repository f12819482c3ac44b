// Four-wheel power state and the per-wheel clamp applied before any command
// leaves the core.

use std::ops::{Add, Mul, Neg};

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_MOTOR_MAX;
use crate::error::ConfigError;

/// Power for each mecanum wheel, as a signed fraction of full scale
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotorPowerVector {
    pub front_left: f64,
    pub front_right: f64,
    pub back_left: f64,
    pub back_right: f64,
}

impl MotorPowerVector {
    pub const fn new(front_left: f64, front_right: f64, back_left: f64, back_right: f64) -> Self {
        Self {
            front_left,
            front_right,
            back_left,
            back_right,
        }
    }

    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }

    /// Returns powers as array [front_left, front_right, back_left, back_right]
    pub fn as_array(&self) -> [f64; 4] {
        [
            self.front_left,
            self.front_right,
            self.back_left,
            self.back_right,
        ]
    }

    pub fn is_zero(&self) -> bool {
        self.as_array().iter().all(|&p| p == 0.0)
    }

    fn map(self, f: impl Fn(f64) -> f64) -> Self {
        Self::new(
            f(self.front_left),
            f(self.front_right),
            f(self.back_left),
            f(self.back_right),
        )
    }
}

impl Add for MotorPowerVector {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(
            self.front_left + rhs.front_left,
            self.front_right + rhs.front_right,
            self.back_left + rhs.back_left,
            self.back_right + rhs.back_right,
        )
    }
}

impl Mul<f64> for MotorPowerVector {
    type Output = Self;

    fn mul(self, k: f64) -> Self {
        self.map(|p| p * k)
    }
}

impl Neg for MotorPowerVector {
    type Output = Self;

    fn neg(self) -> Self {
        self.map(|p| -p)
    }
}

/// Symmetric ceiling on wheel power.
///
/// Each wheel is clamped on its own. A vector with one saturated wheel is
/// NOT rescaled to keep its direction, so a hard turn under saturation
/// runs a wider radius than requested.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerLimit {
    max: f64,
}

impl PowerLimit {
    /// Create a limit, rejecting a ceiling outside (0, 1]
    pub fn new(max: f64) -> Result<Self, ConfigError> {
        // Written so that NaN fails too
        if !(max > 0.0 && max <= 1.0) {
            return Err(ConfigError::MotorMaxOutOfRange { value: max });
        }
        Ok(Self { max })
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Bound every wheel to [-max, max]
    pub fn clamp(&self, power: MotorPowerVector) -> MotorPowerVector {
        power.map(|p| p.clamp(-self.max, self.max))
    }
}

impl Default for PowerLimit {
    fn default() -> Self {
        Self {
            max: DEFAULT_MOTOR_MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_ceiling_out_of_range() {
        for bad in [0.0, -0.5, 1.01, f64::NAN, f64::INFINITY] {
            assert!(
                matches!(
                    PowerLimit::new(bad),
                    Err(ConfigError::MotorMaxOutOfRange { .. })
                ),
                "ceiling {} should be rejected",
                bad
            );
        }
        assert!(PowerLimit::new(1.0).is_ok());
        assert!(PowerLimit::new(0.05).is_ok());
    }

    #[test]
    fn test_default_ceiling() {
        assert_eq!(PowerLimit::default().max(), 0.6);
    }

    #[test]
    fn test_clamp_bounds_every_wheel() {
        let limit = PowerLimit::default();
        let clamped = limit.clamp(MotorPowerVector::new(3.0, -3.0, 0.61, -0.61));
        assert_eq!(clamped, MotorPowerVector::new(0.6, -0.6, 0.6, -0.6));
        for p in clamped.as_array() {
            assert!(p.abs() <= limit.max());
        }
    }

    #[test]
    fn test_clamp_leaves_in_range_values_alone() {
        let limit = PowerLimit::default();
        let inside = MotorPowerVector::new(0.6, -0.25, 0.0, -0.6);
        assert_eq!(limit.clamp(inside), inside);
        assert_eq!(limit.clamp(limit.clamp(inside)), inside);
    }

    #[test]
    fn test_clamp_is_per_wheel_not_rescale() {
        // Only FL saturates. A rescale would shrink the other three as well.
        let limit = PowerLimit::default();
        let raw = MotorPowerVector::new(1.0, -0.4, 0.4, 0.2);
        let clamped = limit.clamp(raw);
        assert_eq!(clamped.front_left, 0.6);
        assert_eq!(clamped.front_right, -0.4);
        assert_eq!(clamped.back_left, 0.4);
        assert_eq!(clamped.back_right, 0.2);
    }

    #[test]
    fn test_vector_arithmetic() {
        let a = MotorPowerVector::new(0.1, 0.2, 0.3, 0.4);
        assert_eq!(-a, MotorPowerVector::new(-0.1, -0.2, -0.3, -0.4));
        assert_eq!(a * 2.0, MotorPowerVector::new(0.2, 0.4, 0.6, 0.8));
        assert!((a + -a).is_zero());
        assert!(MotorPowerVector::zero().is_zero());
    }
}
