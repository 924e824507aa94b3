//! Responses: what the link layer hands back for a request.
//!
//! Success variants share [`OkParams`]; each describes one generated pair
//! identified by `(create_id, sequence_number)`. [`ErrorResponse`] terminates
//! an exchange or voids a range of its sequence numbers.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::schema::{Basis, BellState, ErrorCode, ReturnType};
use crate::types::{CreateId, LogicalQubitId, NodeId, PurposeId};

/// Fields common to every success response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OkParams {
    /// The exchange this pair belongs to.
    pub create_id: CreateId,

    /// False if addressed to the node that issued the request, true if
    /// addressed to its remote peer.
    pub directionality_flag: bool,

    /// Index of this pair within the request's batch.
    pub sequence_number: u16,

    pub purpose_id: PurposeId,

    /// The peer of the node receiving this response.
    pub remote_node_id: NodeId,

    /// Estimated fidelity, in [0, 1].
    pub goodness: f64,

    pub bell_state: BellState,
}

/// Success response for a create-and-keep request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeepOk {
    #[serde(flatten)]
    pub pair: OkParams,

    /// Where the kept qubit lives.
    pub logical_qubit_id: LogicalQubitId,

    /// When `goodness` was estimated, in link-layer microseconds.
    #[serde(rename = "goodness_time", alias = "time_of_goodness")]
    pub time_of_goodness: u64,
}

/// Success response for a measure-directly request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureOk {
    #[serde(flatten)]
    pub pair: OkParams,

    pub measurement_outcome: bool,
    pub measurement_basis: Basis,
}

/// Success response for a remote-state-preparation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatePrepOk {
    #[serde(flatten)]
    pub pair: OkParams,

    /// Only meaningful on the creator's side.
    pub measurement_outcome: bool,
}

/// Error response from the link layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub create_id: CreateId,
    pub error_code: ErrorCode,

    /// Whether only `[sequence_number_low, sequence_number_high]` is affected.
    pub use_sequence_number_range: bool,
    pub sequence_number_low: u16,
    pub sequence_number_high: u16,

    /// The node that created the exchange.
    pub origin_node_id: NodeId,
}

impl ErrorResponse {
    /// An error affecting the whole exchange.
    pub fn unranged(create_id: CreateId, error_code: ErrorCode, origin_node_id: NodeId) -> Self {
        Self {
            create_id,
            error_code,
            use_sequence_number_range: false,
            sequence_number_low: 0,
            sequence_number_high: 0,
            origin_node_id,
        }
    }

    /// An error affecting the inclusive range `[low, high]`.
    pub fn ranged(
        create_id: CreateId,
        error_code: ErrorCode,
        low: u16,
        high: u16,
        origin_node_id: NodeId,
    ) -> Self {
        Self {
            create_id,
            error_code,
            use_sequence_number_range: true,
            sequence_number_low: low,
            sequence_number_high: high,
            origin_node_id,
        }
    }

    /// The affected sequence numbers, or `None` if the whole exchange is affected.
    pub fn voided_range(&self) -> Option<RangeInclusive<u16>> {
        self.use_sequence_number_range
            .then(|| self.sequence_number_low..=self.sequence_number_high)
    }
}

/// A response from the link layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    #[serde(rename = "OK_K")]
    CreateAndKeep(KeepOk),
    #[serde(rename = "OK_M")]
    MeasureDirectly(MeasureOk),
    #[serde(rename = "OK_R")]
    RemoteStatePrep(StatePrepOk),
    #[serde(rename = "ERR")]
    Error(ErrorResponse),
}

impl Response {
    /// The return type tag.
    pub fn return_type(&self) -> ReturnType {
        match self {
            Response::CreateAndKeep(_) => ReturnType::OkK,
            Response::MeasureDirectly(_) => ReturnType::OkM,
            Response::RemoteStatePrep(_) => ReturnType::OkR,
            Response::Error(_) => ReturnType::Err,
        }
    }

    /// The exchange this response belongs to.
    pub fn create_id(&self) -> CreateId {
        match self {
            Response::Error(e) => e.create_id,
            _ => self.ok_params().map(|p| p.create_id).unwrap_or_default(),
        }
    }

    /// The shared success fields, if this is a success response.
    pub fn ok_params(&self) -> Option<&OkParams> {
        match self {
            Response::CreateAndKeep(ok) => Some(&ok.pair),
            Response::MeasureDirectly(ok) => Some(&ok.pair),
            Response::RemoteStatePrep(ok) => Some(&ok.pair),
            Response::Error(_) => None,
        }
    }

    /// The error, if this is an error response.
    pub fn as_error(&self) -> Option<&ErrorResponse> {
        match self {
            Response::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Whether this is an error response.
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }

    /// The sequence number of a success response.
    pub fn sequence_number(&self) -> Option<u16> {
        self.ok_params().map(|p| p.sequence_number)
    }
}
