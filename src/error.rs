//! Error types for pipeline compilation and the Metal backend.
//!
//! Only recoverable failures live here. Misuse of the generators (an
//! incomplete descriptor, an unknown precision tag) panics instead; see
//! [`crate::precondition!`].

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GemmError {
    #[error("no Metal device available")]
    DeviceNotAvailable,
    #[error("kernel compilation failed: {0}")]
    Compilation(String),
    #[error("function not found: {0}")]
    FunctionNotFound(String),
    #[error("pipeline creation failed: {0}")]
    PipelineCreation(String),
}

pub type GemmResult<T> = Result<T, GemmError>;
