//! Proptest generators for property-based testing.

use proptest::prelude::*;

use qlink_core::{
    Basis, BasisChoice, BellState, CreateId, CreateParams, ErrorCode, MeasureParams, NodeId,
    PurposeId, RandomBasis, ReceiveParams, Request, Rotation, TimeUnit,
};

/// Generate a node ID.
pub fn node_id() -> impl Strategy<Value = NodeId> {
    any::<u32>().prop_map(NodeId)
}

/// Generate a create ID.
pub fn create_id() -> impl Strategy<Value = CreateId> {
    any::<u16>().prop_map(CreateId)
}

/// Generate a purpose ID.
pub fn purpose_id() -> impl Strategy<Value = PurposeId> {
    any::<u16>().prop_map(PurposeId)
}

/// Generate a time unit.
pub fn time_unit() -> impl Strategy<Value = TimeUnit> {
    prop_oneof![
        Just(TimeUnit::Microseconds),
        Just(TimeUnit::Milliseconds),
        Just(TimeUnit::Seconds),
    ]
}

/// Generate a random basis selection kind.
pub fn random_basis() -> impl Strategy<Value = RandomBasis> {
    prop_oneof![
        Just(RandomBasis::None),
        Just(RandomBasis::Xz),
        Just(RandomBasis::Xyz),
        Just(RandomBasis::Chsh),
    ]
}

/// Generate a measurement basis.
pub fn basis() -> impl Strategy<Value = Basis> {
    prop_oneof![
        Just(Basis::Z),
        Just(Basis::X),
        Just(Basis::Y),
        Just(Basis::ZPlusX),
        Just(Basis::ZMinusX),
    ]
}

/// Generate a Bell state.
pub fn bell_state() -> impl Strategy<Value = BellState> {
    prop::sample::select(BellState::ALL.to_vec())
}

/// Generate an error code.
pub fn error_code() -> impl Strategy<Value = ErrorCode> {
    prop_oneof![
        Just(ErrorCode::Unsupported),
        Just(ErrorCode::NoTime),
        Just(ErrorCode::NoResources),
        Just(ErrorCode::Timeout),
        Just(ErrorCode::Rejected),
        Just(ErrorCode::Other),
        Just(ErrorCode::Expire),
        Just(ErrorCode::CreateFailed),
    ]
}

/// Generate a valid Euler rotation.
pub fn rotation() -> impl Strategy<Value = Rotation> {
    let angle = -std::f64::consts::PI..std::f64::consts::PI;
    (angle.clone(), angle.clone(), angle).prop_map(|(x1, y, x2)| Rotation { x1, y, x2 })
}

/// Generate a valid basis selection: parameters that apply sum to at most 1,
/// the rest are zero.
pub fn basis_choice() -> impl Strategy<Value = BasisChoice> {
    (random_basis(), 0.0..=1.0f64, 0.0..=1.0f64, rotation()).prop_map(
        |(random_basis, a, b, rotation)| {
            let probability_dist = match random_basis.parameter_count() {
                0 => [0.0, 0.0],
                1 => [a, 0.0],
                _ => [a / 2.0, b / 2.0],
            };
            BasisChoice {
                random_basis,
                probability_dist,
                rotation,
            }
        },
    )
}

/// Parameters for generating a valid create request.
pub fn create_params() -> impl Strategy<Value = CreateParams> {
    (
        node_id(),
        purpose_id(),
        1u16..=64,
        0.0..=1.0f64,
        time_unit(),
        any::<u32>(),
        any::<u8>(),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(
            |(
                remote_node_id,
                purpose_id,
                number,
                minimum_fidelity,
                time_unit,
                max_time,
                priority,
                atomic,
                consecutive,
            )| CreateParams {
                remote_node_id,
                purpose_id,
                number,
                minimum_fidelity,
                time_unit,
                max_time,
                priority,
                atomic,
                consecutive,
            },
        )
}

/// Generate a valid request of any type.
pub fn request() -> impl Strategy<Value = Request> {
    let measure = || {
        (create_params(), basis_choice(), basis_choice()).prop_map(|(create, local, remote)| {
            MeasureParams::new(create)
                .with_local(local)
                .with_remote(remote)
        })
    };
    let receive = || (node_id(), purpose_id()).prop_map(|(n, p)| ReceiveParams::new(n, p));

    prop_oneof![
        create_params().prop_map(Request::CreateAndKeep),
        measure().prop_map(Request::MeasureDirectly),
        measure().prop_map(Request::RemoteStatePrep),
        receive().prop_map(Request::Receive),
        receive().prop_map(Request::StopReceive),
    ]
}

/// Generate a delivery order: a permutation of `0..number` for some `number`
/// in `1..=max`.
pub fn delivery_order(max: u16) -> impl Strategy<Value = Vec<u16>> {
    (1..=max).prop_flat_map(|number| Just((0..number).collect::<Vec<_>>()).prop_shuffle())
}
