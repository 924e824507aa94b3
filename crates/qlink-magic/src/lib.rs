//! # QLink Magic
//!
//! The seam between the link-layer interface and whatever produces entangled
//! pairs, plus an in-memory implementation of it.
//!
//! - [`EntanglementGenerator`] - async trait the link layer hands requests to
//! - [`MagicNetwork`] / [`MagicLinkLayer`] - pairs delivered instantly over
//!   tokio channels, with receive windows and a seeded RNG

pub mod error;
pub mod generator;
pub mod magic;

pub use error::{GeneratorError, Result};
pub use generator::EntanglementGenerator;
pub use magic::{MagicConfig, MagicLinkLayer, MagicNetwork};
