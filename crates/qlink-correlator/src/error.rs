//! Error types for the correlator.

use qlink_core::{CreateId, NodeId, PurposeId, RequestType};
use thiserror::Error;

use crate::exchange::{ExchangeKey, ExchangeState};

/// Errors that can occur while tracking exchanges.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrelationError {
    /// A response references an exchange not open at this node.
    #[error("unknown exchange {0}")]
    UnknownCreateId(ExchangeKey),

    /// A caller-supplied create ID is already in use by an open exchange.
    #[error("create id {0} is already open")]
    DuplicateCreateId(CreateId),

    /// The sequence number was already resolved for this exchange.
    #[error("duplicate sequence number {sequence_number} for exchange {key}")]
    DuplicateSequenceNumber { key: ExchangeKey, sequence_number: u16 },

    /// The sequence number was voided by an earlier ranged error.
    #[error("sequence number {sequence_number} of exchange {key} was voided")]
    VoidedSequenceNumber { key: ExchangeKey, sequence_number: u16 },

    /// The sequence number is not below the request's `number`.
    #[error("sequence number {sequence_number} out of range for exchange {key} of {number}")]
    SequenceOutOfRange {
        key: ExchangeKey,
        sequence_number: u16,
        number: u16,
    },

    /// A response arrived for an exchange that is already terminal.
    #[error("exchange {key} is already {state:?}")]
    InvalidTransition { key: ExchangeKey, state: ExchangeState },

    /// A response does not describe the request it claims to answer.
    #[error("response does not match exchange {key}: {reason}")]
    ResponseMismatch { key: ExchangeKey, reason: &'static str },

    /// A peer-created pair arrived with no receive window open for it.
    #[error("not receiving from node {remote_node_id} for purpose {purpose_id}")]
    NotReceiving {
        remote_node_id: NodeId,
        purpose_id: PurposeId,
    },

    /// The open exchange limit was reached.
    #[error("too many open exchanges (limit {limit})")]
    TooManyOpenExchanges { limit: usize },

    /// A peer-created pair would open a passive exchange past the open limit.
    #[error("no room for a passive exchange from node {remote_node_id} (limit {limit})")]
    PassiveLimit { remote_node_id: NodeId, limit: usize },

    /// An exchange was requested for a receive-window request.
    #[error("{0:?} requests open no exchange")]
    NotCreateRequest(RequestType),
}

impl CorrelationError {
    /// Whether the offending record should be logged and dropped, leaving
    /// exchange state untouched.
    ///
    /// Non-soft errors are returned to the submitting caller.
    pub fn is_soft(&self) -> bool {
        !matches!(
            self,
            CorrelationError::DuplicateCreateId(_)
                | CorrelationError::TooManyOpenExchanges { .. }
                | CorrelationError::NotCreateRequest(_)
        )
    }
}

/// Result type for correlator operations.
pub type Result<T> = std::result::Result<T, CorrelationError>;
