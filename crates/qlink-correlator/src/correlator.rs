//! The correlator: a table of open exchanges at one node.
//!
//! Every operation takes the table lock for a bounded critical section, so
//! `submit` check-and-insert is atomic and all updates to one exchange are
//! linearized.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use qlink_core::{
    creator_node_id, CreateId, ErrorCode, ErrorResponse, NodeId, PurposeId, ReceiveParams,
    Request, Response, ValidatedRequest, ValidatedResponse,
};

use crate::error::{CorrelationError, Result};
use crate::exchange::{
    CorrelatedResponse, Exchange, ExchangeKey, ExchangeRole, ExchangeState,
};

/// Configuration for the correlator.
#[derive(Debug, Clone)]
pub struct CorrelatorConfig {
    /// Maximum number of non-terminal exchanges, local and passive.
    pub max_open_exchanges: usize,

    /// How long terminal exchanges are kept, in microseconds.
    pub retain_terminal_us: u64,

    /// How long a passive exchange may go without a response before it is
    /// dropped, in microseconds.
    pub passive_idle_us: u64,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            max_open_exchanges: 1024,
            retain_terminal_us: 1_000_000,
            passive_idle_us: 60_000_000,
        }
    }
}

/// Result of submitting a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A create-type request opened an exchange.
    Created(ExchangeKey),

    /// A receive window was opened.
    ReceiveOpened {
        remote_node_id: NodeId,
        purpose_id: PurposeId,
    },

    /// A receive window was closed and its passive exchanges dropped.
    ReceiveClosed {
        remote_node_id: NodeId,
        purpose_id: PurposeId,
        swept: usize,
    },
}

impl SubmitOutcome {
    /// The created exchange, if any.
    pub fn key(&self) -> Option<ExchangeKey> {
        match self {
            SubmitOutcome::Created(key) => Some(*key),
            _ => None,
        }
    }
}

/// Result of folding a response or a synthesized error into an exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    pub key: ExchangeKey,

    /// State after the update.
    pub state: ExchangeState,

    /// Responses that became visible to the caller.
    pub released: Vec<CorrelatedResponse>,

    /// Previously released sequence numbers voided by a ranged error.
    pub invalidated: Vec<u16>,
}

/// Tracks every exchange this node takes part in.
pub struct Correlator {
    local_node_id: NodeId,
    config: CorrelatorConfig,
    inner: Mutex<CorrelatorInner>,
}

struct CorrelatorInner {
    exchanges: HashMap<ExchangeKey, Exchange>,

    /// Open receive windows: (peer, purpose).
    windows: HashSet<(NodeId, PurposeId)>,

    /// Next candidate for fresh create ID allocation.
    next_create_id: CreateId,

    /// Number of non-terminal exchanges in `exchanges`.
    open: usize,
}

impl CorrelatorInner {
    fn insert(&mut self, key: ExchangeKey, exchange: Exchange) {
        if !exchange.state.is_terminal() {
            self.open += 1;
        }
        if let Some(replaced) = self.exchanges.insert(key, exchange) {
            if !replaced.state.is_terminal() {
                self.open -= 1;
            }
        }
    }

    /// Account for an update that may have moved an exchange to a terminal state.
    fn settle(&mut self, was_open: bool, state: ExchangeState) {
        if was_open && state.is_terminal() {
            self.open -= 1;
        }
    }

    /// Remove every exchange `keep` rejects, returning how many went.
    fn sweep<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&ExchangeKey, &Exchange) -> bool,
    {
        let before = self.exchanges.len();
        let mut open_removed = 0;
        self.exchanges.retain(|key, ex| {
            let kept = keep(key, ex);
            if !kept && !ex.state.is_terminal() {
                open_removed += 1;
            }
            kept
        });
        self.open -= open_removed;
        before - self.exchanges.len()
    }
}

impl Correlator {
    /// Create a correlator for the node `local_node_id`.
    pub fn new(local_node_id: NodeId, config: CorrelatorConfig) -> Self {
        Self {
            local_node_id,
            config,
            inner: Mutex::new(CorrelatorInner {
                exchanges: HashMap::new(),
                windows: HashSet::new(),
                next_create_id: CreateId(0),
                open: 0,
            }),
        }
    }

    /// The node this correlator runs on.
    pub fn local_node_id(&self) -> NodeId {
        self.local_node_id
    }

    /// Get the configuration.
    pub fn config(&self) -> &CorrelatorConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Submission
    // ─────────────────────────────────────────────────────────────────────────

    /// Submit a request, allocating a fresh create ID for create-type requests.
    pub fn submit(&self, request: &ValidatedRequest, now: u64) -> Result<SubmitOutcome> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        match request.request() {
            Request::Receive(params) => Ok(Self::open_window(inner, params)),
            Request::StopReceive(params) => Ok(Self::close_window(inner, params)),
            _ => {
                self.check_capacity(inner)?;
                let create_id = self.allocate(inner)?;
                self.open(inner, create_id, request, now)
            }
        }
    }

    /// Submit a request under a caller-chosen create ID.
    ///
    /// An ID held by a terminal exchange is reused.
    pub fn submit_with_id(
        &self,
        create_id: CreateId,
        request: &ValidatedRequest,
        now: u64,
    ) -> Result<SubmitOutcome> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        match request.request() {
            Request::Receive(params) => Ok(Self::open_window(inner, params)),
            Request::StopReceive(params) => Ok(Self::close_window(inner, params)),
            _ => {
                let key = ExchangeKey::new(self.local_node_id, create_id);
                if inner
                    .exchanges
                    .get(&key)
                    .map_or(false, |ex| !ex.state.is_terminal())
                {
                    return Err(CorrelationError::DuplicateCreateId(create_id));
                }

                self.check_capacity(inner)?;
                self.open(inner, create_id, request, now)
            }
        }
    }

    fn open_window(inner: &mut CorrelatorInner, params: &ReceiveParams) -> SubmitOutcome {
        inner
            .windows
            .insert((params.remote_node_id, params.purpose_id));
        tracing::info!(
            remote = %params.remote_node_id,
            purpose = %params.purpose_id,
            "receive window opened"
        );
        SubmitOutcome::ReceiveOpened {
            remote_node_id: params.remote_node_id,
            purpose_id: params.purpose_id,
        }
    }

    fn close_window(inner: &mut CorrelatorInner, params: &ReceiveParams) -> SubmitOutcome {
        let (remote, purpose) = (params.remote_node_id, params.purpose_id);
        inner.windows.remove(&(remote, purpose));

        let swept = inner.sweep(|key, ex| {
            !(ex.role == ExchangeRole::Passive && key.creator == remote && ex.purpose_id == purpose)
        });

        tracing::info!(
            remote = %remote,
            purpose = %purpose,
            swept,
            "receive window closed"
        );
        SubmitOutcome::ReceiveClosed {
            remote_node_id: remote,
            purpose_id: purpose,
            swept,
        }
    }

    fn check_capacity(&self, inner: &CorrelatorInner) -> Result<()> {
        if inner.open >= self.config.max_open_exchanges {
            return Err(CorrelationError::TooManyOpenExchanges {
                limit: self.config.max_open_exchanges,
            });
        }
        Ok(())
    }

    /// Find an ID not held by any exchange created here, open or retained.
    fn allocate(&self, inner: &mut CorrelatorInner) -> Result<CreateId> {
        let mut candidate = inner.next_create_id;
        for _ in 0..=u16::MAX {
            let key = ExchangeKey::new(self.local_node_id, candidate);
            if !inner.exchanges.contains_key(&key) {
                inner.next_create_id = candidate.next();
                return Ok(candidate);
            }
            candidate = candidate.next();
        }
        Err(CorrelationError::TooManyOpenExchanges {
            limit: self.config.max_open_exchanges,
        })
    }

    fn open(
        &self,
        inner: &mut CorrelatorInner,
        create_id: CreateId,
        request: &ValidatedRequest,
        now: u64,
    ) -> Result<SubmitOutcome> {
        let key = ExchangeKey::new(self.local_node_id, create_id);
        let exchange = Exchange::from_request(key, request, now)?;

        if request.requires_simultaneity() {
            tracing::warn!(
                exchange = %key,
                number = ?exchange.number,
                "atomic request requires simultaneous pairs"
            );
        }

        tracing::info!(
            exchange = %key,
            kind = ?request.request().request_type(),
            remote = %exchange.remote_node_id,
            number = ?exchange.number,
            "exchange submitted"
        );

        inner.insert(key, exchange);
        Ok(SubmitOutcome::Created(key))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Ingestion
    // ─────────────────────────────────────────────────────────────────────────

    /// Fold a validated response into the exchange it belongs to.
    pub fn ingest_response(&self, response: ValidatedResponse, now: u64) -> Result<IngestOutcome> {
        let creator = creator_node_id(self.local_node_id, response.response());
        let key = ExchangeKey::new(creator, response.response().create_id());
        let correlated = CorrelatedResponse { creator, response };

        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if !inner.exchanges.contains_key(&key) {
            let passive = self.open_passive(inner, key, correlated.response.response(), now)?;
            inner.insert(key, passive);
            tracing::debug!(exchange = %key, "passive exchange opened");
        }

        let exchange = inner
            .exchanges
            .get_mut(&key)
            .ok_or(CorrelationError::UnknownCreateId(key))?;
        let was_open = !exchange.state.is_terminal();

        let outcome = match correlated.response.response().as_error().copied() {
            Some(error) => Self::apply_error(exchange, &error, now)?,
            None => {
                let record = exchange.record_success(correlated, now)?;
                IngestOutcome {
                    key,
                    state: exchange.state,
                    released: record.released,
                    invalidated: Vec::new(),
                }
            }
        };

        inner.settle(was_open, outcome.state);
        Self::log_transition(&outcome);
        Ok(outcome)
    }

    /// Build a passive exchange for a response whose exchange is not tracked.
    fn open_passive(
        &self,
        inner: &CorrelatorInner,
        key: ExchangeKey,
        response: &Response,
        now: u64,
    ) -> Result<Exchange> {
        let pair = match response.ok_params() {
            Some(pair) if key.creator != self.local_node_id => pair,
            _ => return Err(CorrelationError::UnknownCreateId(key)),
        };

        if !inner.windows.contains(&(key.creator, pair.purpose_id)) {
            return Err(CorrelationError::NotReceiving {
                remote_node_id: key.creator,
                purpose_id: pair.purpose_id,
            });
        }

        // Peer traffic past the limit is dropped, never returned to a caller.
        if inner.open >= self.config.max_open_exchanges {
            return Err(CorrelationError::PassiveLimit {
                remote_node_id: key.creator,
                limit: self.config.max_open_exchanges,
            });
        }
        Ok(Exchange::passive(
            key,
            pair.purpose_id,
            response.return_type(),
            now,
        ))
    }

    fn apply_error(exchange: &mut Exchange, error: &ErrorResponse, now: u64) -> Result<IngestOutcome> {
        let record = exchange.apply_error(error, now)?;
        if record.discarded > 0 {
            tracing::debug!(
                exchange = %exchange.key,
                discarded = record.discarded,
                "held pairs discarded"
            );
        }
        Ok(IngestOutcome {
            key: exchange.key,
            state: exchange.state,
            released: Vec::new(),
            invalidated: record.invalidated,
        })
    }

    fn log_transition(outcome: &IngestOutcome) {
        if outcome.state.is_terminal() {
            tracing::info!(exchange = %outcome.key, state = ?outcome.state, "exchange terminal");
        } else {
            tracing::debug!(
                exchange = %outcome.key,
                state = ?outcome.state,
                released = outcome.released.len(),
                "exchange updated"
            );
        }
        if !outcome.invalidated.is_empty() {
            tracing::warn!(
                exchange = %outcome.key,
                invalidated = ?outcome.invalidated,
                "released pairs voided"
            );
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Local errors and timeouts
    // ─────────────────────────────────────────────────────────────────────────

    /// Synthesize a timeout for a local exchange whose deadline has passed.
    ///
    /// Returns `None` if the exchange is terminal or still within its deadline.
    pub fn on_timeout(&self, create_id: CreateId, now: u64) -> Result<Option<IngestOutcome>> {
        let key = ExchangeKey::new(self.local_node_id, create_id);
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let exchange = inner
            .exchanges
            .get_mut(&key)
            .ok_or(CorrelationError::UnknownCreateId(key))?;

        if !exchange.is_overdue(now) {
            return Ok(None);
        }

        let was_open = !exchange.state.is_terminal();
        let outcome = self.timeout(exchange, now)?;
        inner.settle(was_open, outcome.state);
        Self::log_transition(&outcome);
        Ok(Some(outcome))
    }

    fn timeout(&self, exchange: &mut Exchange, now: u64) -> Result<IngestOutcome> {
        let error =
            ErrorResponse::unranged(exchange.key.create_id, ErrorCode::Timeout, self.local_node_id);
        Self::apply_error(exchange, &error, now)
    }

    /// Fail a local exchange with a locally synthesized unranged error.
    pub fn fail(&self, create_id: CreateId, code: ErrorCode, now: u64) -> Result<IngestOutcome> {
        let key = ExchangeKey::new(self.local_node_id, create_id);
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let exchange = inner
            .exchanges
            .get_mut(&key)
            .ok_or(CorrelationError::UnknownCreateId(key))?;

        let was_open = !exchange.state.is_terminal();
        let error = ErrorResponse::unranged(create_id, code, self.local_node_id);
        let outcome = Self::apply_error(exchange, &error, now)?;
        inner.settle(was_open, outcome.state);
        Self::log_transition(&outcome);
        Ok(outcome)
    }

    /// Time out overdue local exchanges and sweep stale ones.
    pub fn tick(&self, now: u64) -> Vec<IngestOutcome> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let mut outcomes = Vec::new();

        for exchange in inner.exchanges.values_mut() {
            if exchange.role != ExchangeRole::Local || !exchange.is_overdue(now) {
                continue;
            }
            match self.timeout(exchange, now) {
                Ok(outcome) => {
                    Self::log_transition(&outcome);
                    outcomes.push(outcome);
                }
                Err(e) => tracing::warn!(exchange = %exchange.key, "timeout not applied: {}", e),
            }
        }
        // Overdue exchanges are never terminal beforehand.
        inner.open -= outcomes.iter().filter(|o| o.state.is_terminal()).count();

        let retain = self.config.retain_terminal_us;
        let idle = self.config.passive_idle_us;
        let swept = inner.sweep(|_, ex| {
            let age = now.saturating_sub(ex.updated_at);
            if ex.state.is_terminal() {
                age < retain
            } else if ex.role == ExchangeRole::Passive {
                age < idle
            } else {
                true
            }
        });
        if swept > 0 {
            tracing::debug!(swept, "stale exchanges swept");
        }

        outcomes
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Snapshot of an exchange.
    pub fn exchange(&self, key: &ExchangeKey) -> Option<Exchange> {
        self.inner.lock().exchanges.get(key).cloned()
    }

    /// Number of non-terminal exchanges.
    pub fn open_exchanges(&self) -> usize {
        self.inner.lock().open
    }

    /// Check if a receive window is open for `(remote_node_id, purpose_id)`.
    pub fn is_receiving(&self, remote_node_id: NodeId, purpose_id: PurposeId) -> bool {
        self.inner
            .lock()
            .windows
            .contains(&(remote_node_id, purpose_id))
    }
}
