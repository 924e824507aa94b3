//! Closed enumerations of the link-layer service interface.
//!
//! The numeric values and the serialized names of every enumerant are part of
//! the interchange contract with other implementations of the protocol.

use serde::{Deserialize, Serialize};

/// Kind of request handed to the link layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RequestType {
    /// Create and keep.
    #[serde(rename = "K")]
    CreateAndKeep = 0,
    /// Measure directly.
    #[serde(rename = "M")]
    MeasureDirectly = 1,
    /// Remote state preparation.
    #[serde(rename = "R")]
    RemoteStatePrep = 2,
    /// Open a receive window.
    #[serde(rename = "RECV")]
    Receive = 3,
    /// Close a receive window.
    #[serde(rename = "STOP_RECV")]
    StopReceive = 4,
}

impl RequestType {
    /// Convert to u8 for interchange.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Try to parse from u8.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::CreateAndKeep),
            1 => Some(Self::MeasureDirectly),
            2 => Some(Self::RemoteStatePrep),
            3 => Some(Self::Receive),
            4 => Some(Self::StopReceive),
            _ => None,
        }
    }

    /// Whether this request asks for entanglement to be generated.
    pub fn is_create(self) -> bool {
        matches!(
            self,
            Self::CreateAndKeep | Self::MeasureDirectly | Self::RemoteStatePrep
        )
    }

    /// The success return type answering this request, if any.
    pub fn ok_return_type(self) -> Option<ReturnType> {
        match self {
            Self::CreateAndKeep => Some(ReturnType::OkK),
            Self::MeasureDirectly => Some(ReturnType::OkM),
            Self::RemoteStatePrep => Some(ReturnType::OkR),
            Self::Receive | Self::StopReceive => None,
        }
    }
}

/// Kind of reply produced by the link layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ReturnType {
    #[serde(rename = "OK_K")]
    OkK = 0,
    #[serde(rename = "OK_M")]
    OkM = 1,
    #[serde(rename = "OK_R")]
    OkR = 2,
    #[serde(rename = "ERR")]
    Err = 3,
    /// Acknowledgement carrying the create id assigned to a request.
    #[serde(rename = "CREATE_ID")]
    CreateId = 4,
}

impl ReturnType {
    /// Convert to u8 for interchange.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Try to parse from u8.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::OkK),
            1 => Some(Self::OkM),
            2 => Some(Self::OkR),
            3 => Some(Self::Err),
            4 => Some(Self::CreateId),
            _ => None,
        }
    }
}

/// Error codes reported by the link layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ErrorCode {
    /// Requested feature is not supported.
    #[serde(rename = "UNSUPP")]
    Unsupported = 0,
    /// Request cannot be served within `max_time`.
    #[serde(rename = "NOTIME")]
    NoTime = 1,
    /// Not enough resources (e.g. memory for an atomic request).
    #[serde(rename = "NORES")]
    NoResources = 2,
    /// `max_time` elapsed.
    #[serde(rename = "TIMEOUT")]
    Timeout = 3,
    /// The remote node refused the request.
    #[serde(rename = "REJECTED")]
    Rejected = 4,
    #[serde(rename = "OTHER")]
    Other = 5,
    /// Previously delivered pairs are no longer valid.
    #[serde(rename = "EXPIRE")]
    Expire = 6,
    /// Entanglement generation failed.
    #[serde(rename = "CREATE")]
    CreateFailed = 7,
}

impl ErrorCode {
    /// Convert to u8 for interchange.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Try to parse from u8.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Unsupported),
            1 => Some(Self::NoTime),
            2 => Some(Self::NoResources),
            3 => Some(Self::Timeout),
            4 => Some(Self::Rejected),
            5 => Some(Self::Other),
            6 => Some(Self::Expire),
            7 => Some(Self::CreateFailed),
            _ => None,
        }
    }

    /// Whether this code expires pairs rather than failing the request.
    pub fn is_expiry(self) -> bool {
        self == Self::Expire
    }
}

/// Set of bases from which a measurement basis is drawn at random.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum RandomBasis {
    /// Fixed basis, no randomness.
    #[default]
    #[serde(rename = "NONE")]
    None = 0,
    #[serde(rename = "XZ")]
    Xz = 1,
    #[serde(rename = "XYZ")]
    Xyz = 2,
    /// CHSH-rotated bases.
    #[serde(rename = "CHSH")]
    Chsh = 3,
}

impl RandomBasis {
    /// The outcomes this selection draws from, in parameter order.
    ///
    /// A k-outcome selection takes `k - 1` probability parameters giving the
    /// probability of the first `k - 1` outcomes. The last outcome takes the
    /// remaining mass.
    pub fn outcomes(self) -> &'static [Basis] {
        match self {
            Self::None => &[],
            Self::Xz => &[Basis::X, Basis::Z],
            Self::Xyz => &[Basis::X, Basis::Y, Basis::Z],
            Self::Chsh => &[Basis::ZPlusX, Basis::ZMinusX],
        }
    }

    /// Number of probability parameters that apply to this selection.
    pub fn parameter_count(self) -> usize {
        self.outcomes().len().saturating_sub(1)
    }

    /// Whether a measurement reported in `basis` is consistent with this selection.
    ///
    /// Without a random selection the measurement is reported in Z.
    pub fn admits(self, basis: Basis) -> bool {
        match self {
            Self::None => basis == Basis::Z,
            _ => self.outcomes().contains(&basis),
        }
    }

    /// Convert to u8 for interchange.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Try to parse from u8.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Xz),
            2 => Some(Self::Xyz),
            3 => Some(Self::Chsh),
            _ => None,
        }
    }
}

/// Basis in which a measurement was performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Basis {
    #[default]
    #[serde(rename = "Z")]
    Z = 0,
    #[serde(rename = "X")]
    X = 1,
    #[serde(rename = "Y")]
    Y = 2,
    #[serde(rename = "ZPLUSX")]
    ZPlusX = 3,
    #[serde(rename = "ZMINUSX")]
    ZMinusX = 4,
}

impl Basis {
    /// Convert to u8 for interchange.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Try to parse from u8.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Z),
            1 => Some(Self::X),
            2 => Some(Self::Y),
            3 => Some(Self::ZPlusX),
            4 => Some(Self::ZMinusX),
            _ => None,
        }
    }
}

/// The Bell state produced for a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum BellState {
    /// (|00⟩ + |11⟩) / √2
    #[default]
    #[serde(rename = "PHI_PLUS")]
    PhiPlus = 0,
    /// (|01⟩ + |10⟩) / √2
    #[serde(rename = "PSI_PLUS")]
    PsiPlus = 1,
    /// (|01⟩ - |10⟩) / √2
    #[serde(rename = "PSI_MINUS")]
    PsiMinus = 2,
    /// (|00⟩ - |11⟩) / √2
    #[serde(rename = "PHI_MINUS")]
    PhiMinus = 3,
}

impl BellState {
    /// All four Bell states in interchange order.
    pub const ALL: [BellState; 4] = [
        BellState::PhiPlus,
        BellState::PsiPlus,
        BellState::PsiMinus,
        BellState::PhiMinus,
    ];

    /// Convert to u8 for interchange.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Try to parse from u8.
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(usize::from(value)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_type_roundtrip() {
        for ty in [
            RequestType::CreateAndKeep,
            RequestType::MeasureDirectly,
            RequestType::RemoteStatePrep,
            RequestType::Receive,
            RequestType::StopReceive,
        ] {
            assert_eq!(RequestType::from_u8(ty.to_u8()), Some(ty));
        }
        assert_eq!(RequestType::from_u8(5), None);
    }

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::Unsupported.to_u8(), 0);
        assert_eq!(ErrorCode::Expire.to_u8(), 6);
        assert_eq!(ErrorCode::CreateFailed.to_u8(), 7);
        for v in 0..8 {
            assert_eq!(ErrorCode::from_u8(v).unwrap().to_u8(), v);
        }
        assert!(ErrorCode::Expire.is_expiry());
        assert!(!ErrorCode::Timeout.is_expiry());
    }

    #[test]
    fn test_random_basis_parameters() {
        assert_eq!(RandomBasis::None.parameter_count(), 0);
        assert_eq!(RandomBasis::Xz.parameter_count(), 1);
        assert_eq!(RandomBasis::Xyz.parameter_count(), 2);
        assert_eq!(RandomBasis::Chsh.parameter_count(), 1);
    }

    #[test]
    fn test_random_basis_admits() {
        assert!(RandomBasis::None.admits(Basis::Z));
        assert!(!RandomBasis::None.admits(Basis::X));
        assert!(RandomBasis::Xz.admits(Basis::X));
        assert!(!RandomBasis::Xz.admits(Basis::Y));
        assert!(RandomBasis::Xyz.admits(Basis::Y));
        assert!(RandomBasis::Chsh.admits(Basis::ZMinusX));
        assert!(!RandomBasis::Chsh.admits(Basis::Z));
    }

    #[test]
    fn test_ok_return_types() {
        assert_eq!(
            RequestType::CreateAndKeep.ok_return_type(),
            Some(ReturnType::OkK)
        );
        assert_eq!(RequestType::Receive.ok_return_type(), None);
        assert!(RequestType::RemoteStatePrep.is_create());
        assert!(!RequestType::StopReceive.is_create());
    }

    #[test]
    fn test_bell_state_roundtrip() {
        for state in BellState::ALL {
            assert_eq!(BellState::from_u8(state.to_u8()), Some(state));
        }
        assert_eq!(BellState::from_u8(4), None);
    }
}
