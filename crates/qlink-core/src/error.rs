//! Error types for the QLink core schema.

use thiserror::Error;

/// A record violates a per-field invariant of the schema.
///
/// Fatal to the offending record only: it is rejected at the boundary and
/// never enters correlator state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("field {field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("invalid probability distribution in {field}: {reason}")]
    InvalidDistribution {
        field: &'static str,
        reason: &'static str,
    },

    #[error("invalid sequence number range: low {low} > high {high}")]
    InvalidRange { low: u16, high: u16 },

    #[error("invalid record variant: {0}")]
    InvalidVariant(String),
}

/// Result type for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;
