//! Requests: what a higher layer asks of the link layer.
//!
//! A request is a tagged union over the five request types. Create-type
//! variants share [`CreateParams`]; the measuring variants add a basis
//! selection for each side of the pair.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schema::{RandomBasis, RequestType};
use crate::types::{NodeId, PurposeId, TimeUnit};
use crate::validation::{validate_request, ValidatedRequest};

/// Fields common to every request that generates entanglement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateParams {
    /// The peer to generate entanglement with.
    pub remote_node_id: NodeId,

    /// Opaque application tag.
    pub purpose_id: PurposeId,

    /// Number of pairs requested (at least 1).
    pub number: u16,

    /// Minimum acceptable fidelity, in [0, 1].
    pub minimum_fidelity: f64,

    /// Unit of `max_time`.
    pub time_unit: TimeUnit,

    /// Maximum time to wait for the request, 0 for no limit.
    pub max_time: u32,

    /// Higher is more urgent.
    pub priority: u8,

    /// All pairs must co-exist in memory simultaneously.
    pub atomic: bool,

    /// Pairs must be generated back-to-back in time.
    pub consecutive: bool,
}

impl CreateParams {
    /// Create parameters for `number` pairs with `remote`, everything else default.
    pub fn new(remote_node_id: NodeId, purpose_id: PurposeId, number: u16) -> Self {
        Self {
            remote_node_id,
            purpose_id,
            number,
            ..Self::default()
        }
    }

    /// The deadline budget in microseconds, or `None` if `max_time` is 0.
    pub fn max_time_micros(&self) -> Option<u64> {
        if self.max_time == 0 {
            None
        } else {
            Some(self.time_unit.to_micros(self.max_time))
        }
    }
}

impl Default for CreateParams {
    fn default() -> Self {
        Self {
            remote_node_id: NodeId::default(),
            purpose_id: PurposeId::default(),
            number: 1,
            minimum_fidelity: 0.0,
            time_unit: TimeUnit::default(),
            max_time: 0,
            priority: 0,
            atomic: false,
            consecutive: false,
        }
    }
}

/// Euler rotation applied before measuring, as `X(x1) · Y(y) · X(x2)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rotation {
    pub x1: f64,
    pub y: f64,
    pub x2: f64,
}

/// Basis selection for one side of a measured pair.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BasisChoice {
    pub random_basis: RandomBasis,
    /// Probability parameters, see [`RandomBasis::outcomes`].
    pub probability_dist: [f64; 2],
    pub rotation: Rotation,
}

impl BasisChoice {
    /// A random selection over `random_basis` with the given parameters.
    pub fn random(random_basis: RandomBasis, probability_dist: [f64; 2]) -> Self {
        Self {
            random_basis,
            probability_dist,
            rotation: Rotation::default(),
        }
    }

    /// A fixed basis reached by `rotation`.
    pub fn rotated(rotation: Rotation) -> Self {
        Self {
            random_basis: RandomBasis::None,
            probability_dist: [0.0; 2],
            rotation,
        }
    }
}

/// Parameters of measure-directly and remote-state-preparation requests.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MeasureParams {
    #[serde(flatten)]
    pub create: CreateParams,

    pub random_basis_local: RandomBasis,
    pub random_basis_remote: RandomBasis,

    pub probability_dist_local1: f64,
    pub probability_dist_local2: f64,
    pub probability_dist_remote1: f64,
    pub probability_dist_remote2: f64,

    #[serde(rename = "rotation_X_local1")]
    pub rotation_x_local1: f64,
    #[serde(rename = "rotation_Y_local")]
    pub rotation_y_local: f64,
    #[serde(rename = "rotation_X_local2")]
    pub rotation_x_local2: f64,
    #[serde(rename = "rotation_X_remote1")]
    pub rotation_x_remote1: f64,
    #[serde(rename = "rotation_Y_remote")]
    pub rotation_y_remote: f64,
    #[serde(rename = "rotation_X_remote2")]
    pub rotation_x_remote2: f64,
}

impl MeasureParams {
    /// Measure parameters with no basis randomness on either side.
    pub fn new(create: CreateParams) -> Self {
        Self {
            create,
            ..Self::default()
        }
    }

    /// The basis selection on the requesting node's side.
    pub fn local(&self) -> BasisChoice {
        BasisChoice {
            random_basis: self.random_basis_local,
            probability_dist: [self.probability_dist_local1, self.probability_dist_local2],
            rotation: Rotation {
                x1: self.rotation_x_local1,
                y: self.rotation_y_local,
                x2: self.rotation_x_local2,
            },
        }
    }

    /// The basis selection on the remote node's side.
    pub fn remote(&self) -> BasisChoice {
        BasisChoice {
            random_basis: self.random_basis_remote,
            probability_dist: [self.probability_dist_remote1, self.probability_dist_remote2],
            rotation: Rotation {
                x1: self.rotation_x_remote1,
                y: self.rotation_y_remote,
                x2: self.rotation_x_remote2,
            },
        }
    }

    /// Set the local basis selection.
    pub fn with_local(mut self, choice: BasisChoice) -> Self {
        self.random_basis_local = choice.random_basis;
        self.probability_dist_local1 = choice.probability_dist[0];
        self.probability_dist_local2 = choice.probability_dist[1];
        self.rotation_x_local1 = choice.rotation.x1;
        self.rotation_y_local = choice.rotation.y;
        self.rotation_x_local2 = choice.rotation.x2;
        self
    }

    /// Set the remote basis selection.
    pub fn with_remote(mut self, choice: BasisChoice) -> Self {
        self.random_basis_remote = choice.random_basis;
        self.probability_dist_remote1 = choice.probability_dist[0];
        self.probability_dist_remote2 = choice.probability_dist[1];
        self.rotation_x_remote1 = choice.rotation.x1;
        self.rotation_y_remote = choice.rotation.y;
        self.rotation_x_remote2 = choice.rotation.x2;
        self
    }
}

/// Parameters of receive-window requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ReceiveParams {
    /// The peer allowed to create entanglement with this node.
    pub remote_node_id: NodeId,
    pub purpose_id: PurposeId,
}

impl ReceiveParams {
    pub fn new(remote_node_id: NodeId, purpose_id: PurposeId) -> Self {
        Self {
            remote_node_id,
            purpose_id,
        }
    }
}

/// A request to the link layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    #[serde(rename = "K")]
    CreateAndKeep(CreateParams),
    #[serde(rename = "M")]
    MeasureDirectly(MeasureParams),
    #[serde(rename = "R")]
    RemoteStatePrep(MeasureParams),
    #[serde(rename = "RECV")]
    Receive(ReceiveParams),
    #[serde(rename = "STOP_RECV")]
    StopReceive(ReceiveParams),
}

impl Request {
    /// The request type tag.
    pub fn request_type(&self) -> RequestType {
        match self {
            Request::CreateAndKeep(_) => RequestType::CreateAndKeep,
            Request::MeasureDirectly(_) => RequestType::MeasureDirectly,
            Request::RemoteStatePrep(_) => RequestType::RemoteStatePrep,
            Request::Receive(_) => RequestType::Receive,
            Request::StopReceive(_) => RequestType::StopReceive,
        }
    }

    /// The create parameters, for create-type requests.
    pub fn create_params(&self) -> Option<&CreateParams> {
        match self {
            Request::CreateAndKeep(p) => Some(p),
            Request::MeasureDirectly(m) | Request::RemoteStatePrep(m) => Some(&m.create),
            Request::Receive(_) | Request::StopReceive(_) => None,
        }
    }

    /// The measure parameters, for measuring requests.
    pub fn measure_params(&self) -> Option<&MeasureParams> {
        match self {
            Request::MeasureDirectly(m) | Request::RemoteStatePrep(m) => Some(m),
            _ => None,
        }
    }

    /// The peer this request concerns.
    pub fn remote_node_id(&self) -> NodeId {
        match self {
            Request::CreateAndKeep(p) => p.remote_node_id,
            Request::MeasureDirectly(m) | Request::RemoteStatePrep(m) => m.create.remote_node_id,
            Request::Receive(r) | Request::StopReceive(r) => r.remote_node_id,
        }
    }

    /// The purpose tag of this request.
    pub fn purpose_id(&self) -> PurposeId {
        match self {
            Request::CreateAndKeep(p) => p.purpose_id,
            Request::MeasureDirectly(m) | Request::RemoteStatePrep(m) => m.create.purpose_id,
            Request::Receive(r) | Request::StopReceive(r) => r.purpose_id,
        }
    }
}

/// Builder for create-type requests.
///
/// Finishing the builder runs the validator, so a built request has always
/// passed construction-time validation.
pub struct CreateRequestBuilder {
    request_type: RequestType,
    create: CreateParams,
    local: BasisChoice,
    remote: BasisChoice,
}

impl CreateRequestBuilder {
    /// Start a create-and-keep request.
    pub fn keep(remote_node_id: NodeId, purpose_id: PurposeId) -> Self {
        Self::new(RequestType::CreateAndKeep, remote_node_id, purpose_id)
    }

    /// Start a measure-directly request.
    pub fn measure(remote_node_id: NodeId, purpose_id: PurposeId) -> Self {
        Self::new(RequestType::MeasureDirectly, remote_node_id, purpose_id)
    }

    /// Start a remote-state-preparation request.
    pub fn remote_state_prep(remote_node_id: NodeId, purpose_id: PurposeId) -> Self {
        Self::new(RequestType::RemoteStatePrep, remote_node_id, purpose_id)
    }

    fn new(request_type: RequestType, remote_node_id: NodeId, purpose_id: PurposeId) -> Self {
        Self {
            request_type,
            create: CreateParams::new(remote_node_id, purpose_id, 1),
            local: BasisChoice::default(),
            remote: BasisChoice::default(),
        }
    }

    /// Set the number of pairs.
    pub fn number(mut self, number: u16) -> Self {
        self.create.number = number;
        self
    }

    /// Set the minimum fidelity.
    pub fn minimum_fidelity(mut self, fidelity: f64) -> Self {
        self.create.minimum_fidelity = fidelity;
        self
    }

    /// Set the maximum waiting time.
    pub fn max_time(mut self, max_time: u32, unit: TimeUnit) -> Self {
        self.create.max_time = max_time;
        self.create.time_unit = unit;
        self
    }

    /// Set the priority.
    pub fn priority(mut self, priority: u8) -> Self {
        self.create.priority = priority;
        self
    }

    /// Require all pairs to be available simultaneously.
    pub fn atomic(mut self, atomic: bool) -> Self {
        self.create.atomic = atomic;
        self
    }

    /// Require pairs to be generated back-to-back.
    pub fn consecutive(mut self, consecutive: bool) -> Self {
        self.create.consecutive = consecutive;
        self
    }

    /// Set the local basis selection (ignored for create-and-keep).
    pub fn local_basis(mut self, choice: BasisChoice) -> Self {
        self.local = choice;
        self
    }

    /// Set the remote basis selection (ignored for create-and-keep).
    pub fn remote_basis(mut self, choice: BasisChoice) -> Self {
        self.remote = choice;
        self
    }

    /// Assemble the request without validating it.
    pub fn into_request(self) -> Request {
        let Self {
            request_type,
            create,
            local,
            remote,
        } = self;
        match request_type {
            RequestType::MeasureDirectly => Request::MeasureDirectly(
                MeasureParams::new(create).with_local(local).with_remote(remote),
            ),
            RequestType::RemoteStatePrep => Request::RemoteStatePrep(
                MeasureParams::new(create).with_local(local).with_remote(remote),
            ),
            _ => Request::CreateAndKeep(create),
        }
    }

    /// Assemble and validate the request.
    pub fn build(self) -> Result<ValidatedRequest> {
        validate_request(&self.into_request())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RandomBasis;

    #[test]
    fn test_builder_keep() {
        let request = CreateRequestBuilder::keep(NodeId(2), PurposeId(7))
            .number(3)
            .priority(1)
            .into_request();

        assert_eq!(request.request_type(), RequestType::CreateAndKeep);
        assert_eq!(request.remote_node_id(), NodeId(2));
        assert_eq!(request.purpose_id(), PurposeId(7));
        assert_eq!(request.create_params().unwrap().number, 3);
        assert!(request.measure_params().is_none());
    }

    #[test]
    fn test_builder_measure_sides() {
        let local = BasisChoice::random(RandomBasis::Xz, [0.25, 0.0]);
        let remote = BasisChoice::rotated(Rotation {
            x1: 0.5,
            y: 1.0,
            x2: 1.5,
        });

        let request = CreateRequestBuilder::measure(NodeId(2), PurposeId(0))
            .local_basis(local)
            .remote_basis(remote)
            .into_request();

        let params = request.measure_params().unwrap();
        assert_eq!(params.local(), local);
        assert_eq!(params.remote(), remote);
        assert_eq!(params.rotation_y_remote, 1.0);
    }

    #[test]
    fn test_max_time_micros() {
        let mut params = CreateParams::new(NodeId(1), PurposeId(0), 1);
        assert_eq!(params.max_time_micros(), None);

        params.max_time = 5;
        params.time_unit = TimeUnit::Milliseconds;
        assert_eq!(params.max_time_micros(), Some(5_000));
    }

    #[test]
    fn test_receive_accessors() {
        let request = Request::Receive(ReceiveParams::new(NodeId(9), PurposeId(3)));
        assert_eq!(request.request_type(), RequestType::Receive);
        assert_eq!(request.remote_node_id(), NodeId(9));
        assert!(request.create_params().is_none());
    }
}
