//! Error types for entanglement generators.

use qlink_core::{NodeId, SchemaError};
use thiserror::Error;

/// Errors that can occur when handing requests to a generator.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// The request names a node the generator cannot reach.
    #[error("unknown peer: {0}")]
    UnknownPeer(NodeId),

    /// A create-type request arrived without the create ID assigned to it.
    #[error("create request without a create id")]
    MissingCreateId,

    /// The response channel to a node has no room for a request's responses.
    #[error("channel to node {0} full")]
    ChannelFull(NodeId),

    /// The response channel to a node is closed.
    #[error("channel to node {0} closed")]
    ChannelClosed(NodeId),

    /// A record could not be handled under the schema.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
}

/// Result type for generator operations.
pub type Result<T> = std::result::Result<T, GeneratorError>;
