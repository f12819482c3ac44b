// Error types for configuration and the runtime loops

use std::path::PathBuf;

/// Rejected drive configuration, detected before anything moves
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Motor power ceiling {value} is outside (0, 1]")]
    MotorMaxOutOfRange { value: f64 },

    #[error("Plan step {step} has negative hold {hold_ms}ms")]
    NegativeHold { step: usize, hold_ms: i64 },

    #[error("Plan budget {budget_ms}ms is negative")]
    NegativeBudget { budget_ms: i64 },

    #[error("Plan step {step} has magnitude {magnitude} outside [0, 1]")]
    MagnitudeOutOfRange { step: usize, magnitude: f64 },

    #[error("Repeating plan has zero total hold time")]
    StalledRepeat,

    #[error("Failed to read plan {}: {source}", path.display())]
    ReadPlan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse plan: {0}")]
    ParsePlan(#[from] serde_json::Error),
}

/// Failure surfaced by the mode loops or their collaborators
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(Box<dyn std::error::Error + Send + Sync>),

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}
