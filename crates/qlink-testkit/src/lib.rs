//! # QLink Testkit
//!
//! Testing utilities for the QLink interface.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Interchange vectors**: Records with the exact JSON other implementations exchange
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Helper structs for setting up correlator and link-layer scenarios
//!
//! ## Interchange Vectors
//!
//! Vectors pin field names and enumerant names across implementations:
//!
//! ```rust
//! use qlink_testkit::vectors::verify_all_vectors;
//!
//! for (name, passed, detail) in verify_all_vectors() {
//!     assert!(passed, "{}: {}", name, detail);
//! }
//! ```
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use qlink_core::validate_request;
//! use qlink_testkit::generators::request;
//!
//! proptest! {
//!     #[test]
//!     fn generated_requests_validate(request in request()) {
//!         prop_assert!(validate_request(&request).is_ok());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! Quickly set up exchanges:
//!
//! ```rust
//! use qlink_testkit::fixtures::ExchangeFixture;
//!
//! let fixture = ExchangeFixture::new();
//! let key = fixture.submit_keep(2, false);
//! fixture.deliver(key, 0).unwrap();
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{link_layers, ExchangeFixture};
pub use generators::{create_params, delivery_order, request};
pub use vectors::{all_vectors, verify_all_vectors, InterchangeVector, VectorRecord};
