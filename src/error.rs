// src/error.rs
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, TryOnError>;

#[derive(Debug, thiserror::Error)]
pub enum TryOnError {
    /// Landmark model could not be started. Fatal for the session.
    #[error("Hand landmark model failed to load: {0}")]
    ModelLoad(String),

    /// A single detection call failed. Isolated to its tick.
    #[error("Hand detection failed: {0}")]
    Detection(String),

    #[error("Expected 21 hand landmarks, got {0}")]
    LandmarkCount(usize),

    #[error("Camera unavailable: {0}")]
    Camera(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Catalog {path} could not be read: {reason}")]
    Catalog { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl TryOnError {
    /// Only initialization failures end the tracking feature for a session.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, TryOnError::ModelLoad(_))
    }
}
