//! Exchange: one request and the responses that answer it.
//!
//! An exchange is owned by its creator node and identified on both endpoints
//! by [`ExchangeKey`]. Its sequence numbers move from outstanding to either
//! resolved (a success arrived) or voided (a ranged error covered them).

use std::collections::BTreeSet;
use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use qlink_core::{
    CreateId, ErrorCode, ErrorResponse, NodeId, PurposeId, RandomBasis, Request, Response,
    ReturnType, ValidatedRequest, ValidatedResponse,
};

use crate::error::{CorrelationError, Result};

/// Identifies an exchange identically on both endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExchangeKey {
    /// The node that submitted the request.
    pub creator: NodeId,
    pub create_id: CreateId,
}

impl ExchangeKey {
    pub const fn new(creator: NodeId, create_id: CreateId) -> Self {
        Self { creator, create_id }
    }
}

impl fmt::Display for ExchangeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.creator, self.create_id)
    }
}

/// Lifecycle state of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExchangeState {
    /// Submitted, nothing received yet.
    Pending,
    /// Some sequence numbers settled, some outstanding.
    PartiallyFulfilled,
    /// Every sequence number resolved successfully.
    Fulfilled,
    /// Terminated by an `EXPIRE` error.
    Expired,
    /// Terminated by any other error code.
    Failed(ErrorCode),
}

impl ExchangeState {
    /// The terminal state an error with `code` leads to.
    pub fn from_error_code(code: ErrorCode) -> Self {
        if code.is_expiry() {
            ExchangeState::Expired
        } else {
            ExchangeState::Failed(code)
        }
    }

    /// Check if no further responses are accepted.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExchangeState::Fulfilled | ExchangeState::Expired | ExchangeState::Failed(_)
        )
    }
}

/// Which side of the exchange this node is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExchangeRole {
    /// Created at this node by a submitted request.
    Local,
    /// Created by the peer and accepted through a receive window.
    Passive,
}

/// A validated response together with its resolved creator.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelatedResponse {
    pub creator: NodeId,
    pub response: ValidatedResponse,
}

impl CorrelatedResponse {
    /// The exchange this response belongs to.
    pub fn key(&self) -> ExchangeKey {
        ExchangeKey::new(self.creator, self.response.response().create_id())
    }

    /// The sequence number, for success responses.
    pub fn sequence_number(&self) -> Option<u16> {
        self.response.response().sequence_number()
    }
}

/// Tracked state of one exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub key: ExchangeKey,
    pub role: ExchangeRole,

    /// The success record type this exchange accepts.
    pub return_type: ReturnType,

    pub purpose_id: PurposeId,

    /// The peer of this node in the exchange.
    pub remote_node_id: NodeId,

    /// Target pair count. Unknown for passive exchanges.
    pub number: Option<u16>,

    /// Successes are held until every sequence number resolves.
    pub atomic: bool,

    /// Local random basis selection, for measure-directly exchanges.
    pub local_basis: Option<RandomBasis>,

    pub created_at: u64,
    pub updated_at: u64,

    /// Link-layer time after which a timeout is synthesized.
    pub deadline: Option<u64>,

    pub state: ExchangeState,

    /// Sequence numbers with a success recorded.
    pub resolved: BTreeSet<u16>,

    /// Sequence numbers covered by a ranged error.
    pub voided: BTreeSet<u16>,

    /// Sequence numbers handed to the caller and still valid.
    pub released: BTreeSet<u16>,

    held: Vec<CorrelatedResponse>,

    /// Error code of the most recent ranged error.
    void_code: Option<ErrorCode>,

    /// Count of sequence numbers resolved or voided.
    settled: usize,
}

/// Result of recording a success.
#[derive(Debug, Clone, PartialEq)]
pub struct SuccessRecord {
    /// Responses that became visible to the caller.
    pub released: Vec<CorrelatedResponse>,
}

/// Result of applying an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    /// Previously released sequence numbers voided by this error.
    pub invalidated: Vec<u16>,

    /// Held successes dropped without release.
    pub discarded: usize,
}

impl Exchange {
    /// Open a local exchange for a create-type request.
    ///
    /// Receive-window requests open no exchange and fail with
    /// [`CorrelationError::NotCreateRequest`].
    pub fn from_request(key: ExchangeKey, request: &ValidatedRequest, now: u64) -> Result<Self> {
        let inner = request.request();
        let not_create = || CorrelationError::NotCreateRequest(inner.request_type());
        let create = inner.create_params().ok_or_else(not_create)?;
        let return_type = inner
            .request_type()
            .ok_return_type()
            .ok_or_else(not_create)?;

        let local_basis = match inner {
            Request::MeasureDirectly(measure) => Some(measure.random_basis_local),
            _ => None,
        };

        Ok(Self {
            key,
            role: ExchangeRole::Local,
            return_type,
            purpose_id: create.purpose_id,
            remote_node_id: create.remote_node_id,
            number: Some(create.number),
            atomic: create.atomic,
            local_basis,
            created_at: now,
            updated_at: now,
            deadline: create.max_time_micros().map(|budget| now.saturating_add(budget)),
            state: ExchangeState::Pending,
            resolved: BTreeSet::new(),
            voided: BTreeSet::new(),
            released: BTreeSet::new(),
            held: Vec::new(),
            void_code: None,
            settled: 0,
        })
    }

    /// Open a passive exchange for a pair created by `key.creator`.
    pub fn passive(
        key: ExchangeKey,
        purpose_id: PurposeId,
        return_type: ReturnType,
        now: u64,
    ) -> Self {
        Self {
            key,
            role: ExchangeRole::Passive,
            return_type,
            purpose_id,
            remote_node_id: key.creator,
            number: None,
            atomic: false,
            local_basis: None,
            created_at: now,
            updated_at: now,
            deadline: None,
            state: ExchangeState::Pending,
            resolved: BTreeSet::new(),
            voided: BTreeSet::new(),
            released: BTreeSet::new(),
            held: Vec::new(),
            void_code: None,
            settled: 0,
        }
    }

    /// Record a success response.
    ///
    /// Soft errors leave the exchange unchanged.
    pub fn record_success(
        &mut self,
        response: CorrelatedResponse,
        now: u64,
    ) -> Result<SuccessRecord> {
        self.check_open()?;
        self.check_matches(response.response.response())?;

        let sequence_number = response
            .sequence_number()
            .ok_or(CorrelationError::ResponseMismatch {
                key: self.key,
                reason: "not a success response",
            })?;

        if let Some(number) = self.number {
            if sequence_number >= number {
                return Err(CorrelationError::SequenceOutOfRange {
                    key: self.key,
                    sequence_number,
                    number,
                });
            }
        }

        if self.voided.contains(&sequence_number) {
            return Err(CorrelationError::VoidedSequenceNumber {
                key: self.key,
                sequence_number,
            });
        }

        if !self.resolved.insert(sequence_number) {
            return Err(CorrelationError::DuplicateSequenceNumber {
                key: self.key,
                sequence_number,
            });
        }

        self.settled += 1;
        self.updated_at = now;

        let mut released = Vec::new();
        if self.atomic {
            self.held.push(response);
        } else {
            self.released.insert(sequence_number);
            released.push(response);
        }

        self.advance();

        if self.atomic && self.state == ExchangeState::Fulfilled {
            for held in self.held.drain(..) {
                if let Some(seq) = held.sequence_number() {
                    self.released.insert(seq);
                }
                released.push(held);
            }
        }

        Ok(SuccessRecord { released })
    }

    /// Apply an error response.
    ///
    /// Unranged errors terminate the exchange. Ranged errors void the covered
    /// sequence numbers that belong to the exchange and terminate it only when
    /// nothing is left outstanding. An atomic exchange with a void can no
    /// longer be fulfilled; its held successes stay unusable and are dropped
    /// once it terminates.
    pub fn apply_error(&mut self, error: &ErrorResponse, now: u64) -> Result<ErrorRecord> {
        self.check_open()?;
        self.updated_at = now;

        let range = match error.voided_range() {
            None => {
                self.state = ExchangeState::from_error_code(error.error_code);
                return Ok(ErrorRecord {
                    invalidated: Vec::new(),
                    discarded: self.discard_held(),
                });
            }
            Some(range) => range,
        };

        let mut invalidated = Vec::new();
        let mut newly_voided = false;
        for seq in self.clamp(range) {
            if !self.voided.insert(seq) {
                continue;
            }
            newly_voided = true;
            if !self.resolved.contains(&seq) {
                self.settled += 1;
            }
            if self.released.remove(&seq) {
                invalidated.push(seq);
            }
            self.held.retain(|held| held.sequence_number() != Some(seq));
        }

        if !newly_voided {
            return Ok(ErrorRecord {
                invalidated,
                discarded: 0,
            });
        }

        self.void_code = Some(error.error_code);

        let held_before = self.held.len();
        self.advance();

        Ok(ErrorRecord {
            invalidated,
            discarded: held_before - self.held.len(),
        })
    }

    /// Number of sequence numbers neither resolved nor voided.
    ///
    /// `None` for passive exchanges, whose target count is unknown.
    pub fn outstanding(&self) -> Option<usize> {
        self.number
            .map(|number| usize::from(number).saturating_sub(self.settled))
    }

    /// Sequence numbers the caller may use.
    ///
    /// Always empty for an atomic exchange that is not `Fulfilled`.
    pub fn usable_pairs(&self) -> Vec<u16> {
        if self.atomic && self.state != ExchangeState::Fulfilled {
            return Vec::new();
        }
        self.released.iter().copied().collect()
    }

    /// Check if any pair of this exchange is usable.
    pub fn is_usable(&self) -> bool {
        if self.atomic {
            self.state == ExchangeState::Fulfilled
        } else {
            !self.released.is_empty()
        }
    }

    /// Number of successes held back awaiting atomic release.
    pub fn held_count(&self) -> usize {
        self.held.len()
    }

    /// Check if the deadline has passed at `now`.
    pub fn is_overdue(&self, now: u64) -> bool {
        !self.state.is_terminal() && self.deadline.map_or(false, |deadline| now >= deadline)
    }

    fn check_open(&self) -> Result<()> {
        if self.state.is_terminal() {
            return Err(CorrelationError::InvalidTransition {
                key: self.key,
                state: self.state,
            });
        }
        Ok(())
    }

    fn check_matches(&self, response: &Response) -> Result<()> {
        let mismatch = |reason| CorrelationError::ResponseMismatch {
            key: self.key,
            reason,
        };

        if response.return_type() != self.return_type {
            return Err(mismatch("response type"));
        }

        if let Some(pair) = response.ok_params() {
            if pair.purpose_id != self.purpose_id {
                return Err(mismatch("purpose_id"));
            }
            if pair.remote_node_id != self.remote_node_id {
                return Err(mismatch("remote_node_id"));
            }
        }

        if let (Response::MeasureDirectly(ok), Some(basis)) = (response, self.local_basis) {
            if !basis.admits(ok.measurement_basis) {
                return Err(mismatch("measurement_basis"));
            }
        }

        Ok(())
    }

    /// Restrict a ranged error to this exchange's sequence numbers.
    fn clamp(&self, range: RangeInclusive<u16>) -> RangeInclusive<u16> {
        let (low, high) = range.into_inner();
        match self.number {
            Some(0) => 1..=0,
            Some(number) => low..=high.min(number - 1),
            None => low..=high,
        }
    }

    fn advance(&mut self) {
        match self.outstanding() {
            Some(0) => {
                self.state = match self.void_code {
                    None => ExchangeState::Fulfilled,
                    Some(code) => ExchangeState::from_error_code(code),
                };
                if self.state != ExchangeState::Fulfilled {
                    self.discard_held();
                }
            }
            _ if self.settled > 0 => self.state = ExchangeState::PartiallyFulfilled,
            _ => {}
        }
    }

    fn discard_held(&mut self) -> usize {
        let discarded = self.held.len();
        self.held.clear();
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qlink_core::{
        validate_response, Basis, BasisChoice, BellState, CreateRequestBuilder, KeepOk,
        LogicalQubitId, MeasureOk, OkParams, TimeUnit,
    };

    const LOCAL: NodeId = NodeId(1);
    const PEER: NodeId = NodeId(2);
    const PURPOSE: PurposeId = PurposeId(7);
    const KEY: ExchangeKey = ExchangeKey::new(LOCAL, CreateId(0));

    fn keep_exchange(number: u16, atomic: bool) -> Exchange {
        let request = CreateRequestBuilder::keep(PEER, PURPOSE)
            .number(number)
            .atomic(atomic)
            .build()
            .unwrap();
        Exchange::from_request(KEY, &request, 0).unwrap()
    }

    fn pair(seq: u16) -> OkParams {
        OkParams {
            create_id: KEY.create_id,
            directionality_flag: false,
            sequence_number: seq,
            purpose_id: PURPOSE,
            remote_node_id: PEER,
            goodness: 0.9,
            bell_state: BellState::PhiPlus,
        }
    }

    fn keep_ok(seq: u16) -> CorrelatedResponse {
        let response = Response::CreateAndKeep(KeepOk {
            pair: pair(seq),
            logical_qubit_id: LogicalQubitId(seq),
            time_of_goodness: 0,
        });
        CorrelatedResponse {
            creator: LOCAL,
            response: validate_response(&response).unwrap(),
        }
    }

    fn expire(low: u16, high: u16) -> ErrorResponse {
        ErrorResponse::ranged(KEY.create_id, ErrorCode::Expire, low, high, LOCAL)
    }

    #[test]
    fn test_key_display() {
        assert_eq!(ExchangeKey::new(NodeId(3), CreateId(9)).to_string(), "3:9");
    }

    #[test]
    fn test_fulfilled_on_last_success() {
        let mut ex = keep_exchange(3, false);
        assert_eq!(ex.state, ExchangeState::Pending);

        ex.record_success(keep_ok(2), 1).unwrap();
        assert_eq!(ex.state, ExchangeState::PartiallyFulfilled);
        ex.record_success(keep_ok(0), 2).unwrap();
        assert_eq!(ex.state, ExchangeState::PartiallyFulfilled);
        ex.record_success(keep_ok(1), 3).unwrap();
        assert_eq!(ex.state, ExchangeState::Fulfilled);
        assert_eq!(ex.outstanding(), Some(0));
        assert_eq!(ex.usable_pairs(), vec![0, 1, 2]);
    }

    #[test]
    fn test_duplicate_is_soft_and_idempotent() {
        let mut ex = keep_exchange(2, false);
        ex.record_success(keep_ok(0), 1).unwrap();
        let before = ex.clone();

        let err = ex.record_success(keep_ok(0), 2).unwrap_err();
        assert!(matches!(
            err,
            CorrelationError::DuplicateSequenceNumber {
                sequence_number: 0,
                ..
            }
        ));
        assert_eq!(ex, before);
    }

    #[test]
    fn test_sequence_out_of_range() {
        let mut ex = keep_exchange(2, false);
        let err = ex.record_success(keep_ok(2), 1).unwrap_err();
        assert!(matches!(err, CorrelationError::SequenceOutOfRange { number: 2, .. }));
        assert_eq!(ex.state, ExchangeState::Pending);
    }

    #[test]
    fn test_ranged_expiry_covering_outstanding() {
        let mut ex = keep_exchange(3, false);
        ex.record_success(keep_ok(0), 1).unwrap();

        let record = ex.apply_error(&expire(1, 2), 2).unwrap();
        assert!(record.invalidated.is_empty());
        assert_eq!(ex.state, ExchangeState::Expired);
        assert_eq!(ex.usable_pairs(), vec![0]);
    }

    #[test]
    fn test_ranged_expiry_partial() {
        let mut ex = keep_exchange(3, false);
        ex.record_success(keep_ok(0), 1).unwrap();

        ex.apply_error(&expire(1, 1), 2).unwrap();
        assert_eq!(ex.state, ExchangeState::PartiallyFulfilled);
        assert_eq!(ex.outstanding(), Some(1));

        let err = ex.record_success(keep_ok(1), 3).unwrap_err();
        assert!(matches!(err, CorrelationError::VoidedSequenceNumber { .. }));

        // The last outstanding number resolves, but a void means the
        // exchange ends with the voiding error's state.
        ex.record_success(keep_ok(2), 4).unwrap();
        assert_eq!(ex.state, ExchangeState::Expired);
    }

    #[test]
    fn test_ranged_error_invalidates_released() {
        let mut ex = keep_exchange(4, false);
        ex.record_success(keep_ok(0), 1).unwrap();
        ex.record_success(keep_ok(1), 1).unwrap();

        let err = ErrorResponse::ranged(KEY.create_id, ErrorCode::Other, 1, 10, LOCAL);
        let record = ex.apply_error(&err, 2).unwrap();
        assert_eq!(record.invalidated, vec![1]);
        assert_eq!(ex.state, ExchangeState::Failed(ErrorCode::Other));
        assert_eq!(ex.usable_pairs(), vec![0]);
    }

    #[test]
    fn test_ranged_error_beyond_number_is_noop() {
        let mut ex = keep_exchange(2, false);
        ex.apply_error(&expire(5, 9), 1).unwrap();
        assert_eq!(ex.state, ExchangeState::Pending);
        assert_eq!(ex.outstanding(), Some(2));
    }

    #[test]
    fn test_unranged_error_terminates() {
        for successes in 0..3u16 {
            let mut ex = keep_exchange(3, false);
            for seq in 0..successes {
                ex.record_success(keep_ok(seq), 1).unwrap();
            }
            let err = ErrorResponse::unranged(KEY.create_id, ErrorCode::NoTime, LOCAL);
            ex.apply_error(&err, 2).unwrap();
            assert_eq!(ex.state, ExchangeState::Failed(ErrorCode::NoTime));
        }
    }

    #[test]
    fn test_terminal_rejects_responses() {
        let mut ex = keep_exchange(1, false);
        ex.record_success(keep_ok(0), 1).unwrap();

        let err = ex.apply_error(&expire(0, 0), 2).unwrap_err();
        assert!(matches!(
            err,
            CorrelationError::InvalidTransition {
                state: ExchangeState::Fulfilled,
                ..
            }
        ));
    }

    #[test]
    fn test_atomic_holds_until_fulfilled() {
        let mut ex = keep_exchange(3, true);

        assert!(ex.record_success(keep_ok(0), 1).unwrap().released.is_empty());
        assert!(ex.record_success(keep_ok(1), 1).unwrap().released.is_empty());
        assert_eq!(ex.state, ExchangeState::PartiallyFulfilled);
        assert!(!ex.is_usable());
        assert!(ex.usable_pairs().is_empty());
        assert_eq!(ex.held_count(), 2);

        let record = ex.record_success(keep_ok(2), 2).unwrap();
        assert_eq!(record.released.len(), 3);
        assert!(ex.is_usable());
        assert_eq!(ex.held_count(), 0);
    }

    #[test]
    fn test_atomic_partial_void_stays_open() {
        let mut ex = keep_exchange(3, true);
        ex.record_success(keep_ok(0), 1).unwrap();

        let record = ex.apply_error(&expire(1, 1), 2).unwrap();
        assert_eq!(record.discarded, 0);
        assert_eq!(ex.state, ExchangeState::PartiallyFulfilled);
        assert_eq!(ex.outstanding(), Some(1));
        assert_eq!(ex.held_count(), 1);
        assert!(!ex.is_usable());

        // The last success settles the exchange, but never as fulfilled.
        let record = ex.record_success(keep_ok(2), 3).unwrap();
        assert!(record.released.is_empty());
        assert_eq!(ex.state, ExchangeState::Expired);
        assert_eq!(ex.held_count(), 0);
        assert!(!ex.is_usable());
    }

    #[test]
    fn test_atomic_void_covering_rest_discards_held() {
        let mut ex = keep_exchange(3, true);
        ex.record_success(keep_ok(0), 1).unwrap();

        let record = ex.apply_error(&expire(1, 2), 2).unwrap();
        assert_eq!(record.discarded, 1);
        assert_eq!(ex.state, ExchangeState::Expired);
        assert!(!ex.is_usable());
    }

    #[test]
    fn test_response_type_mismatch() {
        let request = CreateRequestBuilder::measure(PEER, PURPOSE)
            .local_basis(BasisChoice::random(RandomBasis::Xz, [0.5, 0.0]))
            .build()
            .unwrap();
        let mut ex = Exchange::from_request(KEY, &request, 0).unwrap();

        let err = ex.record_success(keep_ok(0), 1).unwrap_err();
        assert!(matches!(err, CorrelationError::ResponseMismatch { .. }));

        let measured = |basis| {
            let response = Response::MeasureDirectly(MeasureOk {
                pair: pair(0),
                measurement_outcome: false,
                measurement_basis: basis,
            });
            CorrelatedResponse {
                creator: LOCAL,
                response: validate_response(&response).unwrap(),
            }
        };

        let err = ex.record_success(measured(Basis::Y), 1).unwrap_err();
        assert!(matches!(
            err,
            CorrelationError::ResponseMismatch {
                reason: "measurement_basis",
                ..
            }
        ));

        ex.record_success(measured(Basis::X), 1).unwrap();
        assert_eq!(ex.state, ExchangeState::Fulfilled);
    }

    #[test]
    fn test_deadline() {
        let request = CreateRequestBuilder::keep(PEER, PURPOSE)
            .max_time(5, TimeUnit::Milliseconds)
            .build()
            .unwrap();
        let ex = Exchange::from_request(KEY, &request, 100).unwrap();
        assert_eq!(ex.deadline, Some(5_100));
        assert!(!ex.is_overdue(5_099));
        assert!(ex.is_overdue(5_100));

        let unbounded = keep_exchange(1, false);
        assert_eq!(unbounded.deadline, None);
        assert!(!unbounded.is_overdue(u64::MAX));
    }

    #[test]
    fn test_passive_never_fulfills() {
        let key = ExchangeKey::new(PEER, CreateId(4));
        let mut ex = Exchange::passive(key, PURPOSE, ReturnType::OkK, 0);

        let mut ok = pair(0);
        ok.create_id = key.create_id;
        ok.directionality_flag = true;
        ok.remote_node_id = PEER;
        for seq in 0..5 {
            ok.sequence_number = seq;
            let response = Response::CreateAndKeep(KeepOk {
                pair: ok.clone(),
                logical_qubit_id: LogicalQubitId(0),
                time_of_goodness: 0,
            });
            ex.record_success(
                CorrelatedResponse {
                    creator: PEER,
                    response: validate_response(&response).unwrap(),
                },
                1,
            )
            .unwrap();
        }
        assert_eq!(ex.state, ExchangeState::PartiallyFulfilled);
        assert_eq!(ex.outstanding(), None);

        let err = ErrorResponse::unranged(key.create_id, ErrorCode::Expire, PEER);
        ex.apply_error(&err, 2).unwrap();
        assert_eq!(ex.state, ExchangeState::Expired);
    }

    #[test]
    fn test_receive_request_opens_no_exchange() {
        let request = qlink_core::validate_request(&Request::Receive(
            qlink_core::ReceiveParams::new(PEER, PURPOSE),
        ))
        .unwrap();
        assert_eq!(
            Exchange::from_request(KEY, &request, 0).unwrap_err(),
            CorrelationError::NotCreateRequest(qlink_core::RequestType::Receive)
        );
    }
}
