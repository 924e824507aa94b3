//! Schema versions of the interface records.
//!
//! Each historical version keeps its own record types. Records are moved
//! forward by one conversion function per version transition; there is no
//! silent field drift between versions.
//!
//! - **V0**: create-type requests are a single flat record whose `type` is one
//!   of `K`, `M`, `R`; success responses carry no `bell_state`.
//! - **V1** (current): tagged-union requests and responses, `bell_state` on
//!   every success response.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError};
use crate::request::{BasisChoice, CreateParams, MeasureParams, Request, Rotation};
use crate::response::{self, ErrorResponse, Response};
use crate::schema::{BellState, RandomBasis, RequestType};
use crate::types::{NodeId, PurposeId, TimeUnit};

/// A version of the interface schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SchemaVersion {
    V0 = 0,
    V1 = 1,
}

/// The schema version produced by this crate.
pub const CURRENT_SCHEMA_VERSION: SchemaVersion = SchemaVersion::V1;

/// The Bell state assumed for V0 success responses, which did not report one.
pub const V0_BELL_STATE: BellState = BellState::PhiPlus;

impl SchemaVersion {
    /// Convert to u8 for interchange.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Try to parse from u8.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::V0),
            1 => Some(Self::V1),
            _ => None,
        }
    }
}

/// Version 0 record types.
pub mod v0 {
    use super::*;
    use crate::schema::Basis;
    use crate::types::{CreateId, LogicalQubitId};

    /// The flat V0 create record.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct CreateRecord {
        pub remote_node_id: NodeId,
        pub purpose_id: PurposeId,
        #[serde(rename = "type")]
        pub request_type: RequestType,
        pub number: u16,
        pub random_basis_local: RandomBasis,
        pub random_basis_remote: RandomBasis,
        pub minimum_fidelity: f64,
        pub time_unit: TimeUnit,
        pub max_time: u32,
        pub priority: u8,
        pub atomic: bool,
        pub consecutive: bool,
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

    impl Default for CreateRecord {
        fn default() -> Self {
            Self {
                remote_node_id: NodeId::default(),
                purpose_id: PurposeId::default(),
                request_type: RequestType::CreateAndKeep,
                number: 1,
                random_basis_local: RandomBasis::None,
                random_basis_remote: RandomBasis::None,
                minimum_fidelity: 0.0,
                time_unit: TimeUnit::default(),
                max_time: 0,
                priority: 0,
                atomic: false,
                consecutive: false,
                probability_dist_local1: 0.0,
                probability_dist_local2: 0.0,
                probability_dist_remote1: 0.0,
                probability_dist_remote2: 0.0,
                rotation_x_local1: 0.0,
                rotation_y_local: 0.0,
                rotation_x_local2: 0.0,
                rotation_x_remote1: 0.0,
                rotation_y_remote: 0.0,
                rotation_x_remote2: 0.0,
            }
        }
    }

    /// V0 success fields, without `bell_state`.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct OkParams {
        pub create_id: CreateId,
        pub directionality_flag: bool,
        pub sequence_number: u16,
        pub purpose_id: PurposeId,
        pub remote_node_id: NodeId,
        pub goodness: f64,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct KeepOk {
        #[serde(flatten)]
        pub pair: OkParams,
        pub logical_qubit_id: LogicalQubitId,
        pub goodness_time: u64,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct MeasureOk {
        #[serde(flatten)]
        pub pair: OkParams,
        pub measurement_outcome: bool,
        pub measurement_basis: Basis,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct StatePrepOk {
        #[serde(flatten)]
        pub pair: OkParams,
        pub measurement_outcome: bool,
    }

    /// A V0 response. Error records did not change between V0 and V1.
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
}

/// Move a V0 create record to V1.
///
/// The flat record is split by its `type`; basis fields are dropped for
/// create-and-keep, where they never applied. Receive-window types were never
/// valid in a create record.
pub fn upgrade_create_v0(record: v0::CreateRecord) -> Result<Request> {
    let create = CreateParams {
        remote_node_id: record.remote_node_id,
        purpose_id: record.purpose_id,
        number: record.number,
        minimum_fidelity: record.minimum_fidelity,
        time_unit: record.time_unit,
        max_time: record.max_time,
        priority: record.priority,
        atomic: record.atomic,
        consecutive: record.consecutive,
    };

    let measure = |create: CreateParams| {
        MeasureParams::new(create)
            .with_local(BasisChoice {
                random_basis: record.random_basis_local,
                probability_dist: [record.probability_dist_local1, record.probability_dist_local2],
                rotation: Rotation {
                    x1: record.rotation_x_local1,
                    y: record.rotation_y_local,
                    x2: record.rotation_x_local2,
                },
            })
            .with_remote(BasisChoice {
                random_basis: record.random_basis_remote,
                probability_dist: [
                    record.probability_dist_remote1,
                    record.probability_dist_remote2,
                ],
                rotation: Rotation {
                    x1: record.rotation_x_remote1,
                    y: record.rotation_y_remote,
                    x2: record.rotation_x_remote2,
                },
            })
    };

    match record.request_type {
        RequestType::CreateAndKeep => Ok(Request::CreateAndKeep(create)),
        RequestType::MeasureDirectly => Ok(Request::MeasureDirectly(measure(create))),
        RequestType::RemoteStatePrep => Ok(Request::RemoteStatePrep(measure(create))),
        other => Err(SchemaError::InvalidVariant(format!(
            "{:?} is not a create request type",
            other
        ))),
    }
}

/// Move a V0 response to V1, filling in [`V0_BELL_STATE`].
pub fn upgrade_response_v0(response: v0::Response) -> Response {
    fn pair(p: v0::OkParams) -> response::OkParams {
        response::OkParams {
            create_id: p.create_id,
            directionality_flag: p.directionality_flag,
            sequence_number: p.sequence_number,
            purpose_id: p.purpose_id,
            remote_node_id: p.remote_node_id,
            goodness: p.goodness,
            bell_state: V0_BELL_STATE,
        }
    }

    match response {
        v0::Response::CreateAndKeep(ok) => Response::CreateAndKeep(response::KeepOk {
            pair: pair(ok.pair),
            logical_qubit_id: ok.logical_qubit_id,
            time_of_goodness: ok.goodness_time,
        }),
        v0::Response::MeasureDirectly(ok) => Response::MeasureDirectly(response::MeasureOk {
            pair: pair(ok.pair),
            measurement_outcome: ok.measurement_outcome,
            measurement_basis: ok.measurement_basis,
        }),
        v0::Response::RemoteStatePrep(ok) => Response::RemoteStatePrep(response::StatePrepOk {
            pair: pair(ok.pair),
            measurement_outcome: ok.measurement_outcome,
        }),
        v0::Response::Error(err) => Response::Error(err),
    }
}

/// A create-type request at any schema version.
#[derive(Debug, Clone, PartialEq)]
pub enum VersionedRequest {
    V0(v0::CreateRecord),
    V1(Request),
}

impl VersionedRequest {
    /// The schema version of the held record.
    pub fn schema_version(&self) -> SchemaVersion {
        match self {
            Self::V0(_) => SchemaVersion::V0,
            Self::V1(_) => SchemaVersion::V1,
        }
    }

    /// Upgrade to the current schema.
    pub fn into_current(self) -> Result<Request> {
        match self {
            Self::V0(record) => upgrade_create_v0(record),
            Self::V1(request) => Ok(request),
        }
    }
}

/// A response at any schema version.
#[derive(Debug, Clone, PartialEq)]
pub enum VersionedResponse {
    V0(v0::Response),
    V1(Response),
}

impl VersionedResponse {
    /// The schema version of the held record.
    pub fn schema_version(&self) -> SchemaVersion {
        match self {
            Self::V0(_) => SchemaVersion::V0,
            Self::V1(_) => SchemaVersion::V1,
        }
    }

    /// Upgrade to the current schema.
    pub fn into_current(self) -> Response {
        match self {
            Self::V0(response) => upgrade_response_v0(response),
            Self::V1(response) => response,
        }
    }
}
