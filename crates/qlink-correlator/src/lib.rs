//! # QLink Correlator
//!
//! Request/response correlation for the QLink interface.
//!
//! Each request becomes an [`Exchange`], keyed by its creator node and create
//! ID. Success and error responses are folded into the exchange's state
//! machine:
//!
//! ```text
//! Pending → PartiallyFulfilled → Fulfilled | Expired | Failed(code)
//! ```
//!
//! The [`Correlator`] holds every exchange at one node, opens passive
//! exchanges for pairs the peer created inside a receive window, and
//! synthesizes timeouts when a request's `max_time` lapses.

pub mod correlator;
pub mod error;
pub mod exchange;

pub use correlator::{Correlator, CorrelatorConfig, IngestOutcome, SubmitOutcome};
pub use error::{CorrelationError, Result};
pub use exchange::{
    CorrelatedResponse, ErrorRecord, Exchange, ExchangeKey, ExchangeRole, ExchangeState,
    SuccessRecord,
};
