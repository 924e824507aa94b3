//! Record validation: per-field invariants checked at construction time.
//!
//! Validation is pure and deterministic. Only the functions in this module can
//! produce a [`ValidatedRequest`] or a [`ValidatedResponse`], so no record with
//! invalid fields can reach correlator state.

use crate::error::{Result, SchemaError};
use crate::request::{BasisChoice, CreateParams, Request};
use crate::response::{ErrorResponse, OkParams, Response};

/// Tolerance for floating error when checking that probabilities sum to at most 1.
pub const PROBABILITY_EPSILON: f64 = 1e-9;

/// A non-fatal condition the collaborator must be told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationFlag {
    /// `atomic` with more than one pair: all pairs must be held simultaneously.
    RequiresSimultaneity { number: u16 },
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    request: Request,
    flags: Vec<ValidationFlag>,
}

impl ValidatedRequest {
    /// The validated request.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Flags raised during validation.
    pub fn flags(&self) -> &[ValidationFlag] {
        &self.flags
    }

    /// Whether the collaborator must hold every pair at once.
    pub fn requires_simultaneity(&self) -> bool {
        self.flags
            .iter()
            .any(|f| matches!(f, ValidationFlag::RequiresSimultaneity { .. }))
    }

    /// Unwrap the request.
    pub fn into_inner(self) -> Request {
        self.request
    }
}

/// A response that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedResponse(Response);

impl ValidatedResponse {
    /// The validated response.
    pub fn response(&self) -> &Response {
        &self.0
    }

    /// Unwrap the response.
    pub fn into_inner(self) -> Response {
        self.0
    }
}

/// Validate a request.
///
/// Checks:
/// - `minimum_fidelity` in [0, 1]
/// - `number >= 1`
/// - probability parameters of each basis selection
/// - rotation angles are finite
///
/// `atomic` with `number > 1` is accepted and flagged.
pub fn validate_request(request: &Request) -> Result<ValidatedRequest> {
    let mut flags = Vec::new();

    if let Some(create) = request.create_params() {
        validate_create(create, &mut flags)?;
    }

    if let Some(measure) = request.measure_params() {
        validate_basis(&measure.local(), &LOCAL_FIELDS)?;
        validate_basis(&measure.remote(), &REMOTE_FIELDS)?;
    }

    Ok(ValidatedRequest {
        request: request.clone(),
        flags,
    })
}

/// Validate a response.
///
/// Checks `goodness` in [0, 1] for successes and `low <= high` for ranged errors.
pub fn validate_response(response: &Response) -> Result<ValidatedResponse> {
    match response {
        Response::Error(err) => validate_error(err)?,
        _ => {
            if let Some(pair) = response.ok_params() {
                validate_ok(pair)?;
            }
        }
    }
    Ok(ValidatedResponse(response.clone()))
}

fn validate_create(create: &CreateParams, flags: &mut Vec<ValidationFlag>) -> Result<()> {
    check_unit_interval("minimum_fidelity", create.minimum_fidelity)?;

    if create.number == 0 {
        return Err(SchemaError::OutOfRange {
            field: "number",
            value: 0.0,
        });
    }

    if create.atomic && create.number > 1 {
        flags.push(ValidationFlag::RequiresSimultaneity {
            number: create.number,
        });
    }

    Ok(())
}

/// Interchange field names for one side of a basis selection.
struct SideFields {
    distribution: &'static str,
    rotation: [&'static str; 3],
}

const LOCAL_FIELDS: SideFields = SideFields {
    distribution: "probability_dist_local",
    rotation: ["rotation_X_local1", "rotation_Y_local", "rotation_X_local2"],
};

const REMOTE_FIELDS: SideFields = SideFields {
    distribution: "probability_dist_remote",
    rotation: ["rotation_X_remote1", "rotation_Y_remote", "rotation_X_remote2"],
};

fn validate_basis(choice: &BasisChoice, fields: &SideFields) -> Result<()> {
    let angles = [choice.rotation.x1, choice.rotation.y, choice.rotation.x2];
    for (field, angle) in fields.rotation.into_iter().zip(angles) {
        if !angle.is_finite() {
            return Err(SchemaError::OutOfRange {
                field,
                value: angle,
            });
        }
    }

    let applicable = choice.random_basis.parameter_count();
    let mut sum = 0.0;
    for (i, p) in choice.probability_dist.iter().copied().enumerate() {
        if !p.is_finite() || p < 0.0 {
            return Err(SchemaError::InvalidDistribution {
                field: fields.distribution,
                reason: "parameters must be finite and non-negative",
            });
        }
        if i >= applicable && p != 0.0 {
            return Err(SchemaError::InvalidDistribution {
                field: fields.distribution,
                reason: "parameter does not apply to the random basis selection",
            });
        }
        sum += p;
    }

    if sum > 1.0 + PROBABILITY_EPSILON {
        return Err(SchemaError::InvalidDistribution {
            field: fields.distribution,
            reason: "parameters sum to more than 1",
        });
    }

    Ok(())
}

fn validate_ok(pair: &OkParams) -> Result<()> {
    check_unit_interval("goodness", pair.goodness)
}

fn validate_error(err: &ErrorResponse) -> Result<()> {
    if err.use_sequence_number_range && err.sequence_number_low > err.sequence_number_high {
        return Err(SchemaError::InvalidRange {
            low: err.sequence_number_low,
            high: err.sequence_number_high,
        });
    }
    Ok(())
}

fn check_unit_interval(field: &'static str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SchemaError::OutOfRange { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{CreateRequestBuilder, ReceiveParams, Rotation};
    use crate::response::{KeepOk, MeasureOk};
    use crate::schema::{Basis, BellState, ErrorCode, RandomBasis};
    use crate::types::{CreateId, LogicalQubitId, NodeId, PurposeId};
    use proptest::prelude::*;

    fn keep() -> CreateRequestBuilder {
        CreateRequestBuilder::keep(NodeId(2), PurposeId(1))
    }

    fn ok_pair(goodness: f64) -> OkParams {
        OkParams {
            create_id: CreateId(0),
            directionality_flag: false,
            sequence_number: 0,
            purpose_id: PurposeId(1),
            remote_node_id: NodeId(2),
            goodness,
            bell_state: BellState::PhiPlus,
        }
    }

    #[test]
    fn test_valid_keep_request() {
        let validated = keep().number(3).minimum_fidelity(0.8).build().unwrap();
        assert!(validated.flags().is_empty());
        assert!(!validated.requires_simultaneity());
    }

    #[test]
    fn test_fidelity_out_of_range() {
        let result = keep().minimum_fidelity(1.5).build();
        assert!(matches!(
            result,
            Err(SchemaError::OutOfRange {
                field: "minimum_fidelity",
                ..
            })
        ));

        let result = keep().minimum_fidelity(f64::NAN).build();
        assert!(matches!(result, Err(SchemaError::OutOfRange { .. })));
    }

    #[test]
    fn test_zero_pairs_rejected() {
        let result = keep().number(0).build();
        assert!(matches!(
            result,
            Err(SchemaError::OutOfRange { field: "number", .. })
        ));
    }

    #[test]
    fn test_atomic_flagged() {
        let validated = keep().number(3).atomic(true).build().unwrap();
        assert!(validated.requires_simultaneity());
        assert_eq!(
            validated.flags(),
            &[ValidationFlag::RequiresSimultaneity { number: 3 }]
        );

        let single = keep().number(1).atomic(true).build().unwrap();
        assert!(!single.requires_simultaneity());
    }

    #[test]
    fn test_distribution_sum() {
        let ok = CreateRequestBuilder::measure(NodeId(2), PurposeId(1))
            .local_basis(BasisChoice::random(RandomBasis::Xyz, [0.5, 0.5]))
            .build();
        assert!(ok.is_ok());

        let over = CreateRequestBuilder::measure(NodeId(2), PurposeId(1))
            .local_basis(BasisChoice::random(RandomBasis::Xyz, [0.6, 0.5]))
            .build();
        assert!(matches!(
            over,
            Err(SchemaError::InvalidDistribution {
                field: "probability_dist_local",
                ..
            })
        ));
    }

    #[test]
    fn test_distribution_epsilon() {
        let result = CreateRequestBuilder::measure(NodeId(2), PurposeId(1))
            .remote_basis(BasisChoice::random(RandomBasis::Xyz, [0.1 + 0.2, 0.7]))
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn test_distribution_negative() {
        let result = CreateRequestBuilder::remote_state_prep(NodeId(2), PurposeId(1))
            .remote_basis(BasisChoice::random(RandomBasis::Xz, [-0.1, 0.0]))
            .build();
        assert!(matches!(
            result,
            Err(SchemaError::InvalidDistribution {
                field: "probability_dist_remote",
                ..
            })
        ));
    }

    #[test]
    fn test_distribution_parameter_does_not_apply() {
        let none = CreateRequestBuilder::measure(NodeId(2), PurposeId(1))
            .local_basis(BasisChoice::random(RandomBasis::None, [0.3, 0.0]))
            .build();
        assert!(matches!(none, Err(SchemaError::InvalidDistribution { .. })));

        let xz = CreateRequestBuilder::measure(NodeId(2), PurposeId(1))
            .local_basis(BasisChoice::random(RandomBasis::Xz, [0.3, 0.3]))
            .build();
        assert!(matches!(xz, Err(SchemaError::InvalidDistribution { .. })));
    }

    #[test]
    fn test_rotation_must_be_finite() {
        let result = CreateRequestBuilder::measure(NodeId(2), PurposeId(1))
            .local_basis(BasisChoice::rotated(Rotation {
                x1: 0.0,
                y: f64::INFINITY,
                x2: 0.0,
            }))
            .build();
        assert!(matches!(
            result,
            Err(SchemaError::OutOfRange {
                field: "rotation_Y_local",
                ..
            })
        ));
    }

    #[test]
    fn test_receive_always_valid() {
        let request = Request::Receive(ReceiveParams::new(NodeId(3), PurposeId(0)));
        assert!(validate_request(&request).is_ok());
    }

    #[test]
    fn test_goodness_range() {
        let good = Response::CreateAndKeep(KeepOk {
            pair: ok_pair(1.0),
            logical_qubit_id: LogicalQubitId(0),
            time_of_goodness: 0,
        });
        assert!(validate_response(&good).is_ok());

        let bad = Response::MeasureDirectly(MeasureOk {
            pair: ok_pair(-0.01),
            measurement_outcome: false,
            measurement_basis: Basis::Z,
        });
        assert!(matches!(
            validate_response(&bad),
            Err(SchemaError::OutOfRange { field: "goodness", .. })
        ));
    }

    #[test]
    fn test_error_range() {
        let inverted = Response::Error(ErrorResponse::ranged(
            CreateId(0),
            ErrorCode::Expire,
            5,
            2,
            NodeId(1),
        ));
        assert_eq!(
            validate_response(&inverted),
            Err(SchemaError::InvalidRange { low: 5, high: 2 })
        );

        // Bounds are ignored when the range is not in use.
        let mut unranged = ErrorResponse::unranged(CreateId(0), ErrorCode::Other, NodeId(1));
        unranged.sequence_number_low = 9;
        assert!(validate_response(&Response::Error(unranged)).is_ok());
    }

    proptest! {
        #[test]
        fn test_validate_is_deterministic(
            fidelity in -0.5f64..1.5,
            number in 0u16..5,
            atomic: bool,
            p1 in -0.2f64..1.2,
            p2 in -0.2f64..1.2,
        ) {
            let request = CreateRequestBuilder::measure(NodeId(2), PurposeId(1))
                .minimum_fidelity(fidelity)
                .number(number)
                .atomic(atomic)
                .local_basis(BasisChoice::random(RandomBasis::Xyz, [p1, p2]))
                .into_request();

            let first = validate_request(&request);
            let second = validate_request(&request);
            prop_assert_eq!(&first, &second);

            let expected = (0.0..=1.0).contains(&fidelity)
                && number >= 1
                && p1 >= 0.0
                && p2 >= 0.0
                && p1 + p2 <= 1.0 + PROBABILITY_EPSILON;
            prop_assert_eq!(first.is_ok(), expected);
        }
    }
}
