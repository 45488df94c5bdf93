//! Error types for the slicer core library.

/// Top-level error enum for the slicer core library.
#[derive(Debug, thiserror::Error)]
pub enum SlicerError {
    #[error("No vertex matching the declaration found: {0}")]
    VertexNotFound(String),

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Call {call} could not be located in the program points of {declaration}")]
    ProgramPointNotFound { call: String, declaration: String },

    #[error("Unresolved: {0}")]
    Unresolved(String),

    #[error("No dispatch targets: {0}")]
    NoDispatchTargets(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SlicerError {
    /// Errors that the builder absorbs at a single call site instead of
    /// aborting the whole build.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SlicerError::Unresolved(_)
                | SlicerError::ProgramPointNotFound { .. }
                | SlicerError::VertexNotFound(_)
        )
    }
}

pub type SlicerResult<T> = Result<T, SlicerError>;
