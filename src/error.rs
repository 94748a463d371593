//! Error types
//!
//! Construction and I/O return `Result<T, PinballError>`. Collaborator
//! failures (telemetry, highscore file) are logged by the caller and never
//! interrupt the simulation loop.

use glam::Vec2;

/// Unified error type for the pinball crate
#[derive(thiserror::Error, Debug)]
pub enum PinballError {
    /// Segment whose endpoints coincide
    #[error("degenerate segment: endpoints {0} and {1} coincide")]
    DegenerateSegment(Vec2, Vec2),

    /// Shape with invalid geometry (non-positive radius, bad polygon, ...)
    #[error("invalid shape: {0}")]
    InvalidShape(String),

    /// Constraint with invalid parameters or joining a body to itself
    #[error("invalid constraint: {0}")]
    InvalidConstraint(String),

    /// Handle that does not refer to a live world object
    #[error("unknown {kind} handle {index}")]
    UnknownHandle { kind: &'static str, index: usize },

    /// Configuration value out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A collision handler could not complete
    #[error("collision handler failed: {0}")]
    Handler(String),

    /// Telemetry delivery failed
    #[error("telemetry delivery failed: {0}")]
    Telemetry(String),

    #[error("I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON (de)serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PinballError>;
