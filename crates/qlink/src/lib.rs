//! # QLink
//!
//! The unified link-layer interface for requesting entangled pairs between
//! two nodes of a quantum network.
//!
//! ## Overview
//!
//! A node submits requests that name a remote node and a purpose:
//!
//! - **Create and keep** (`K`): store the pair in quantum memory
//! - **Measure directly** (`M`): measure immediately, optionally in a random basis
//! - **Remote state preparation** (`R`): measure at the creator only
//! - **Receive / stop receive**: open or close a window for pairs a peer creates
//!
//! Every pair is answered by a response carrying `(create_id, sequence_number)`
//! and a `directionality_flag` that tells either endpoint who created it.
//! Errors terminate an exchange or void a range of its sequence numbers.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use qlink::{LinkLayer, LinkLayerConfig};
//! use qlink::core::{CreateRequestBuilder, NodeId, PurposeId, ReceiveParams, Request};
//! use qlink::magic::{MagicConfig, MagicNetwork};
//!
//! async fn example() {
//!     let network = MagicNetwork::new(MagicConfig::default());
//!     let alice = LinkLayer::new(network.create_link_layer(NodeId(1)), LinkLayerConfig::default());
//!     let bob = LinkLayer::new(network.create_link_layer(NodeId(2)), LinkLayerConfig::default());
//!
//!     // Bob accepts pairs from Alice for purpose 0
//!     bob.submit(Request::Receive(ReceiveParams::new(NodeId(1), PurposeId(0))))
//!         .await
//!         .unwrap();
//!
//!     // Alice asks for two pairs
//!     let request = CreateRequestBuilder::keep(NodeId(2), PurposeId(0))
//!         .number(2)
//!         .into_request();
//!     alice.submit(request).await.unwrap();
//!
//!     while let Some(outcome) = alice.poll_once().await.unwrap() {
//!         println!("{} is {:?}", outcome.key, outcome.state);
//!     }
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `qlink::core` - Schema, validation, directionality
//! - `qlink::correlator` - Exchange state tracking
//! - `qlink::magic` - Generator seam and the magic link layer

pub mod error;
pub mod link;

// Re-export component crates
pub use qlink_core as core;
pub use qlink_correlator as correlator;
pub use qlink_magic as magic;

// Re-export main types for convenience
pub use error::{LinkError, Result};
pub use link::{LinkLayer, LinkLayerConfig};

// Re-export commonly used types
pub use qlink_core::{
    CreateId, CreateRequestBuilder, ErrorCode, NodeId, PurposeId, Request, Response,
};
pub use qlink_correlator::{
    CorrelatedResponse, ExchangeKey, ExchangeState, IngestOutcome, SubmitOutcome,
};
pub use qlink_magic::EntanglementGenerator;
