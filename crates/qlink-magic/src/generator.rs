//! The entanglement generator seam.
//!
//! The link layer hands validated requests to a generator and receives raw
//! responses back. Implementations may drive hardware, a simulator, or the
//! in-memory [`MagicLinkLayer`](crate::MagicLinkLayer).

use std::time::Duration;

use async_trait::async_trait;

use qlink_core::{CreateId, NodeId, Response, ValidatedRequest};

use crate::error::Result;

/// Produces entangled pairs for the requests handed to it.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait EntanglementGenerator: Send + Sync {
    /// Hand a request to the generator.
    ///
    /// `create_id` is the ID the local correlator assigned; it is `None` for
    /// receive-window requests.
    async fn submit(&self, create_id: Option<CreateId>, request: &ValidatedRequest) -> Result<()>;

    /// Receive the next response addressed to this node.
    ///
    /// Responses are raw records; callers validate them before use.
    async fn recv(&self) -> Result<Response>;

    /// Receive with timeout.
    ///
    /// Returns None if timeout expires before a response arrives.
    async fn recv_timeout(&self, timeout: Duration) -> Result<Option<Response>>;

    /// Get the local node's identity.
    fn local_node_id(&self) -> NodeId;
}
