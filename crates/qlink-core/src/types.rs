//! Strong type definitions for the QLink interface.
//!
//! All identifiers are newtypes to prevent misuse at compile time. On the
//! interchange side they serialize as plain integers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a node in the quantum network.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Create a new NodeId from its raw value.
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw value.
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Identifier binding a create request to its responses.
///
/// Unique per originating node while the exchange is open.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CreateId(pub u16);

impl CreateId {
    /// Create a new CreateId from its raw value.
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Get the raw value.
    pub const fn get(self) -> u16 {
        self.0
    }

    /// The next identifier, wrapping at `u16::MAX`.
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Debug for CreateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CreateId({})", self.0)
    }
}

impl fmt::Display for CreateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for CreateId {
    fn from(id: u16) -> Self {
        Self(id)
    }
}

/// Opaque application tag carried through an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurposeId(pub u16);

impl From<u16> for PurposeId {
    fn from(id: u16) -> Self {
        Self(id)
    }
}

impl fmt::Display for PurposeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle of a qubit kept in memory by a create-and-keep response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalQubitId(pub u16);

impl From<u16> for LogicalQubitId {
    fn from(id: u16) -> Self {
        Self(id)
    }
}

/// Unit in which a request's `max_time` is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum TimeUnit {
    #[default]
    #[serde(rename = "MICROSECONDS")]
    Microseconds = 0,
    #[serde(rename = "MILLISECONDS")]
    Milliseconds = 1,
    #[serde(rename = "SECONDS")]
    Seconds = 2,
}

impl TimeUnit {
    /// Number of microseconds in one unit.
    pub const fn micros_per_unit(self) -> u64 {
        match self {
            TimeUnit::Microseconds => 1,
            TimeUnit::Milliseconds => 1_000,
            TimeUnit::Seconds => 1_000_000,
        }
    }

    /// Convert `value` units to microseconds, saturating.
    pub fn to_micros(self, value: u32) -> u64 {
        u64::from(value).saturating_mul(self.micros_per_unit())
    }

    /// Convert to u8 for interchange.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Try to parse from u8.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Microseconds),
            1 => Some(Self::Milliseconds),
            2 => Some(Self::Seconds),
            _ => None,
        }
    }
}
