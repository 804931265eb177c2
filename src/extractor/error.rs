//! Error types for document extraction

use crate::error::Error as CrateError;
use thiserror::Error;

/// Error type for document extraction
///
/// `Unsupported` is kept distinct from the transient failure modes so callers
/// can report "will never work" separately from "failed this time", even
/// though the sync pipeline currently counts both the same way.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The file extension is not handled
    #[error("Unsupported file extension: {0}")]
    Unsupported(String),

    /// The file bytes could not be decoded to text
    #[error("Decode error: {0}")]
    Decode(String),

    /// The model reply did not contain valid JSON
    #[error("Parse error: {0}")]
    Parse(String),

    /// The extraction model call failed
    #[error("Generation error: {0}")]
    Generation(String),
}

impl From<ExtractError> for CrateError {
    fn from(err: ExtractError) -> Self {
        CrateError::Extraction(err.to_string())
    }
}
