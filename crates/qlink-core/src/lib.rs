//! # QLink Core
//!
//! Pure primitives for the QLink link layer: the request/response schema,
//! its enumerants, validation, and directionality.
//!
//! This crate contains no I/O, no clocks, no networking. It is pure computation
//! over interface records.
//!
//! ## Key Types
//!
//! - [`Request`] - Create-and-keep, measure-directly, remote-state-prep,
//!   receive and stop-receive requests
//! - [`Response`] - Success records (`OK_K`, `OK_M`, `OK_R`) and [`ErrorResponse`]
//! - [`CreateId`] - Identifies an exchange together with its creator node
//! - [`ValidatedRequest`] / [`ValidatedResponse`] - Records that passed
//!   [`validate_request`] / [`validate_response`]
//!
//! ## Directionality
//!
//! Every success response carries a `directionality_flag`; [`creator_node_id`]
//! resolves it to the node that created the exchange.
//!
//! ## Versions
//!
//! Older record layouts live in [`version`] with explicit upgrades to the
//! current schema.

pub mod direction;
pub mod error;
pub mod request;
pub mod response;
pub mod schema;
pub mod types;
pub mod validation;
pub mod version;

pub use direction::{creator_node_id, Directed};
pub use error::{Result, SchemaError};
pub use request::{
    BasisChoice, CreateParams, CreateRequestBuilder, MeasureParams, ReceiveParams, Request,
    Rotation,
};
pub use response::{ErrorResponse, KeepOk, MeasureOk, OkParams, Response, StatePrepOk};
pub use schema::{Basis, BellState, ErrorCode, RandomBasis, RequestType, ReturnType};
pub use types::{CreateId, LogicalQubitId, NodeId, PurposeId, TimeUnit};
pub use validation::{
    validate_request, validate_response, ValidatedRequest, ValidatedResponse, ValidationFlag,
};
pub use version::{SchemaVersion, VersionedRequest, VersionedResponse, CURRENT_SCHEMA_VERSION};
