//! Error types for the link layer.

use qlink_core::SchemaError;
use qlink_correlator::CorrelationError;
use qlink_magic::GeneratorError;
use thiserror::Error;

/// Errors that can occur during link-layer operations.
#[derive(Debug, Error)]
pub enum LinkError {
    /// A request failed validation.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The correlator refused the operation.
    #[error("correlation error: {0}")]
    Correlation(#[from] CorrelationError),

    /// The entanglement generator failed.
    #[error("generator error: {0}")]
    Generator(#[from] GeneratorError),
}

/// Result type for link-layer operations.
pub type Result<T> = std::result::Result<T, LinkError>;
