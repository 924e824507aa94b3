//! Test fixtures and helpers.
//!
//! Common setup code for correlator and link-layer tests.

use std::cell::Cell;

use qlink::magic::{MagicConfig, MagicLinkLayer, MagicNetwork};
use qlink::{LinkLayer, LinkLayerConfig};
use qlink_core::{
    validate_request, validate_response, BellState, CreateRequestBuilder, ErrorCode,
    ErrorResponse, KeepOk, LogicalQubitId, NodeId, OkParams, PurposeId, ReceiveParams, Request,
    Response,
};
use qlink_correlator::{Correlator, CorrelatorConfig, Exchange, ExchangeKey, IngestOutcome};

/// The node the fixture's correlator runs at.
pub const CREATOR: NodeId = NodeId(1);
/// The remote end of every exchange the fixture creates.
pub const PEER: NodeId = NodeId(2);
/// Purpose used by the fixture.
pub const PURPOSE: PurposeId = PurposeId(7);

/// A correlator at [`CREATOR`] with a manual clock.
pub struct ExchangeFixture {
    pub correlator: Correlator,
    now: Cell<u64>,
}

impl ExchangeFixture {
    /// Create a fixture with the default configuration.
    pub fn new() -> Self {
        Self::with_config(CorrelatorConfig::default())
    }

    /// Create a fixture with a custom configuration.
    pub fn with_config(config: CorrelatorConfig) -> Self {
        Self {
            correlator: Correlator::new(CREATOR, config),
            now: Cell::new(0),
        }
    }

    /// Current fixture time in microseconds.
    pub fn now(&self) -> u64 {
        self.now.get()
    }

    /// Move the clock forward.
    pub fn advance(&self, micros: u64) {
        self.now.set(self.now.get() + micros);
    }

    /// Submit a create-and-keep request for `number` pairs.
    pub fn submit_keep(&self, number: u16, atomic: bool) -> ExchangeKey {
        let request = CreateRequestBuilder::keep(PEER, PURPOSE)
            .number(number)
            .atomic(atomic)
            .build()
            .expect("fixture request is valid");
        self.correlator
            .submit(&request, self.now())
            .expect("submit succeeds")
            .key()
            .expect("create requests open an exchange")
    }

    /// Deliver the success for `sequence_number` of `key`.
    pub fn deliver(
        &self,
        key: ExchangeKey,
        sequence_number: u16,
    ) -> qlink_correlator::Result<IngestOutcome> {
        self.ingest(&ok(key, sequence_number))
    }

    /// Deliver an unranged error as if the peer reported it.
    pub fn fail_remotely(
        &self,
        key: ExchangeKey,
        code: ErrorCode,
    ) -> qlink_correlator::Result<IngestOutcome> {
        self.ingest(&Response::Error(ErrorResponse::unranged(
            key.create_id,
            code,
            key.creator,
        )))
    }

    /// Deliver an error voiding `[low, high]` of `key`.
    pub fn void_range(
        &self,
        key: ExchangeKey,
        code: ErrorCode,
        low: u16,
        high: u16,
    ) -> qlink_correlator::Result<IngestOutcome> {
        self.ingest(&ranged_error(key, code, low, high))
    }

    /// Validate and ingest a raw response.
    pub fn ingest(&self, response: &Response) -> qlink_correlator::Result<IngestOutcome> {
        let validated = validate_response(response).expect("fixture response is valid");
        self.correlator.ingest_response(validated, self.now())
    }

    /// Snapshot of an exchange that must exist.
    pub fn exchange(&self, key: ExchangeKey) -> Exchange {
        self.correlator
            .exchange(&key)
            .expect("exchange is tracked")
    }
}

impl Default for ExchangeFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A create-and-keep success for `key`, as seen at the creator.
pub fn ok(key: ExchangeKey, sequence_number: u16) -> Response {
    Response::CreateAndKeep(KeepOk {
        pair: OkParams {
            create_id: key.create_id,
            directionality_flag: false,
            sequence_number,
            purpose_id: PURPOSE,
            remote_node_id: PEER,
            goodness: 0.95,
            bell_state: BellState::PhiPlus,
        },
        logical_qubit_id: LogicalQubitId(sequence_number),
        time_of_goodness: 0,
    })
}

/// An error voiding `[low, high]` of `key`.
pub fn ranged_error(key: ExchangeKey, code: ErrorCode, low: u16, high: u16) -> Response {
    Response::Error(ErrorResponse::ranged(
        key.create_id,
        code,
        low,
        high,
        key.creator,
    ))
}

/// A receive request for pairs `from` creates.
pub fn receive_request(from: NodeId) -> Request {
    Request::Receive(ReceiveParams::new(from, PURPOSE))
}

/// Link layers for [`CREATOR`] and [`PEER`] over a seeded magic network.
pub fn link_layers(seed: u64) -> (LinkLayer<MagicLinkLayer>, LinkLayer<MagicLinkLayer>) {
    let network = MagicNetwork::new(MagicConfig {
        seed: Some(seed),
        ..MagicConfig::default()
    });
    (
        LinkLayer::new(network.create_link_layer(CREATOR), LinkLayerConfig::default()),
        LinkLayer::new(network.create_link_layer(PEER), LinkLayerConfig::default()),
    )
}

/// Check a request is accepted by validation.
pub fn is_valid(request: &Request) -> bool {
    validate_request(request).is_ok()
}
