//! Error types for the `vacance-models` crate.

/// Errors produced when encoding or decoding chat frames.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// A frame was not valid JSON or did not match the frame shape.
    #[error("invalid frame: {0}")]
    InvalidFrame(#[source] serde_json::Error),
}
