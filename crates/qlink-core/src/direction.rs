//! Directionality: which node created an exchange.
//!
//! Both endpoints of an exchange must agree on its creator without further
//! negotiation, so resolution is a pure function of the record's flag and
//! node ids. It never looks at clocks or arrival order.

use crate::request::Request;
use crate::response::{KeepOk, MeasureOk, OkParams, Response, StatePrepOk};
use crate::types::NodeId;

/// A record that can be resolved to its creator.
pub trait Directed {
    /// True if the record concerns an exchange created by the remote peer.
    fn directionality_flag(&self) -> bool;

    /// The peer of the node holding the record.
    fn remote_node_id(&self) -> NodeId;
}

/// Resolve the node that created the exchange `record` belongs to.
pub fn creator_node_id<R: Directed + ?Sized>(local_node_id: NodeId, record: &R) -> NodeId {
    if record.directionality_flag() {
        record.remote_node_id()
    } else {
        local_node_id
    }
}

impl Directed for OkParams {
    fn directionality_flag(&self) -> bool {
        self.directionality_flag
    }

    fn remote_node_id(&self) -> NodeId {
        self.remote_node_id
    }
}

macro_rules! directed_via_pair {
    ($($ty:ty),*) => {
        $(
            impl Directed for $ty {
                fn directionality_flag(&self) -> bool {
                    self.pair.directionality_flag
                }

                fn remote_node_id(&self) -> NodeId {
                    self.pair.remote_node_id
                }
            }
        )*
    };
}

directed_via_pair!(KeepOk, MeasureOk, StatePrepOk);

/// A request submitted at a node is created by that node.
impl Directed for Request {
    fn directionality_flag(&self) -> bool {
        false
    }

    fn remote_node_id(&self) -> NodeId {
        Request::remote_node_id(self)
    }
}

/// An error names its creator directly in `origin_node_id`; it is reported
/// as peer-created with the origin as the peer, which resolves to the origin.
impl Directed for Response {
    fn directionality_flag(&self) -> bool {
        match self {
            Response::Error(_) => true,
            _ => self.ok_params().map_or(false, |p| p.directionality_flag),
        }
    }

    fn remote_node_id(&self) -> NodeId {
        match self {
            Response::Error(e) => e.origin_node_id,
            _ => self.ok_params().map(|p| p.remote_node_id).unwrap_or_default(),
        }
    }
}
