//! Interchange vectors for cross-implementation verification.
//!
//! Each vector pairs a record with the JSON object other implementations of
//! the protocol exchange for it. Field names and enumerant names must match
//! verbatim.

use serde_json::Value;

use qlink_core::version::v0;
use qlink_core::{
    Basis, BellState, CreateId, CreateParams, ErrorCode, ErrorResponse, KeepOk, LogicalQubitId,
    MeasureOk, MeasureParams, NodeId, OkParams, PurposeId, RandomBasis, ReceiveParams, Request,
    RequestType, Response, StatePrepOk, TimeUnit,
};

/// A record carried by a vector.
#[derive(Debug, Clone, PartialEq)]
pub enum VectorRecord {
    Request(Request),
    Response(Response),
    CreateV0(v0::CreateRecord),
}

impl VectorRecord {
    /// Serialize the record to a JSON value.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        match self {
            VectorRecord::Request(r) => serde_json::to_value(r),
            VectorRecord::Response(r) => serde_json::to_value(r),
            VectorRecord::CreateV0(r) => serde_json::to_value(r),
        }
    }

    /// Parse JSON as the same kind of record.
    pub fn parse_like(&self, json: &str) -> serde_json::Result<VectorRecord> {
        Ok(match self {
            VectorRecord::Request(_) => VectorRecord::Request(serde_json::from_str(json)?),
            VectorRecord::Response(_) => VectorRecord::Response(serde_json::from_str(json)?),
            VectorRecord::CreateV0(_) => VectorRecord::CreateV0(serde_json::from_str(json)?),
        })
    }
}

/// An interchange vector.
#[derive(Debug, Clone)]
pub struct InterchangeVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// The record.
    pub record: VectorRecord,
    /// Expected JSON encoding.
    pub expected_json: &'static str,
}

fn ok_params(directionality_flag: bool, remote: u32) -> OkParams {
    OkParams {
        create_id: CreateId(5),
        directionality_flag,
        sequence_number: 1,
        purpose_id: PurposeId(1),
        remote_node_id: NodeId(remote),
        goodness: 0.9,
        bell_state: BellState::PsiPlus,
    }
}

/// Get all interchange vectors.
pub fn all_vectors() -> Vec<InterchangeVector> {
    let create = CreateParams {
        remote_node_id: NodeId(2),
        purpose_id: PurposeId(1),
        number: 3,
        minimum_fidelity: 0.5,
        time_unit: TimeUnit::Milliseconds,
        max_time: 20,
        priority: 1,
        atomic: false,
        consecutive: true,
    };

    let measure = MeasureParams {
        create: CreateParams::new(NodeId(2), PurposeId(1), 1),
        random_basis_local: RandomBasis::Xz,
        random_basis_remote: RandomBasis::Xyz,
        probability_dist_local1: 0.5,
        probability_dist_local2: 0.0,
        probability_dist_remote1: 0.25,
        probability_dist_remote2: 0.25,
        rotation_x_local1: 0.0,
        rotation_y_local: 0.0,
        rotation_x_local2: 0.0,
        rotation_x_remote1: 0.5,
        rotation_y_remote: 1.5,
        rotation_x_remote2: 0.0,
    };

    vec![
        InterchangeVector {
            name: "create and keep",
            record: VectorRecord::Request(Request::CreateAndKeep(create)),
            expected_json: r#"{
                "type": "K",
                "remote_node_id": 2,
                "purpose_id": 1,
                "number": 3,
                "minimum_fidelity": 0.5,
                "time_unit": "MILLISECONDS",
                "max_time": 20,
                "priority": 1,
                "atomic": false,
                "consecutive": true
            }"#,
        },
        InterchangeVector {
            name: "measure directly with random bases",
            record: VectorRecord::Request(Request::MeasureDirectly(measure)),
            expected_json: r#"{
                "type": "M",
                "remote_node_id": 2,
                "purpose_id": 1,
                "number": 1,
                "minimum_fidelity": 0.0,
                "time_unit": "MICROSECONDS",
                "max_time": 0,
                "priority": 0,
                "atomic": false,
                "consecutive": false,
                "random_basis_local": "XZ",
                "random_basis_remote": "XYZ",
                "probability_dist_local1": 0.5,
                "probability_dist_local2": 0.0,
                "probability_dist_remote1": 0.25,
                "probability_dist_remote2": 0.25,
                "rotation_X_local1": 0.0,
                "rotation_Y_local": 0.0,
                "rotation_X_local2": 0.0,
                "rotation_X_remote1": 0.5,
                "rotation_Y_remote": 1.5,
                "rotation_X_remote2": 0.0
            }"#,
        },
        InterchangeVector {
            name: "stop receive",
            record: VectorRecord::Request(Request::StopReceive(ReceiveParams::new(
                NodeId(1),
                PurposeId(1),
            ))),
            expected_json: r#"{"type": "STOP_RECV", "remote_node_id": 1, "purpose_id": 1}"#,
        },
        InterchangeVector {
            name: "keep ok at the creator",
            record: VectorRecord::Response(Response::CreateAndKeep(KeepOk {
                pair: ok_params(false, 2),
                logical_qubit_id: LogicalQubitId(1),
                time_of_goodness: 1000,
            })),
            expected_json: r#"{
                "type": "OK_K",
                "create_id": 5,
                "directionality_flag": false,
                "sequence_number": 1,
                "purpose_id": 1,
                "remote_node_id": 2,
                "goodness": 0.9,
                "bell_state": "PSI_PLUS",
                "logical_qubit_id": 1,
                "goodness_time": 1000
            }"#,
        },
        InterchangeVector {
            name: "measure ok at the peer",
            record: VectorRecord::Response(Response::MeasureDirectly(MeasureOk {
                pair: ok_params(true, 1),
                measurement_outcome: true,
                measurement_basis: Basis::ZMinusX,
            })),
            expected_json: r#"{
                "type": "OK_M",
                "create_id": 5,
                "directionality_flag": true,
                "sequence_number": 1,
                "purpose_id": 1,
                "remote_node_id": 1,
                "goodness": 0.9,
                "bell_state": "PSI_PLUS",
                "measurement_outcome": true,
                "measurement_basis": "ZMINUSX"
            }"#,
        },
        InterchangeVector {
            name: "remote state preparation ok",
            record: VectorRecord::Response(Response::RemoteStatePrep(StatePrepOk {
                pair: ok_params(false, 2),
                measurement_outcome: false,
            })),
            expected_json: r#"{
                "type": "OK_R",
                "create_id": 5,
                "directionality_flag": false,
                "sequence_number": 1,
                "purpose_id": 1,
                "remote_node_id": 2,
                "goodness": 0.9,
                "bell_state": "PSI_PLUS",
                "measurement_outcome": false
            }"#,
        },
        InterchangeVector {
            name: "ranged expiry",
            record: VectorRecord::Response(Response::Error(ErrorResponse::ranged(
                CreateId(5),
                ErrorCode::Expire,
                1,
                2,
                NodeId(1),
            ))),
            expected_json: r#"{
                "type": "ERR",
                "create_id": 5,
                "error_code": "EXPIRE",
                "use_sequence_number_range": true,
                "sequence_number_low": 1,
                "sequence_number_high": 2,
                "origin_node_id": 1
            }"#,
        },
        InterchangeVector {
            name: "v0 flat create record",
            record: VectorRecord::CreateV0(v0::CreateRecord {
                remote_node_id: NodeId(2),
                purpose_id: PurposeId(1),
                request_type: RequestType::RemoteStatePrep,
                random_basis_local: RandomBasis::Chsh,
                probability_dist_local1: 0.5,
                ..v0::CreateRecord::default()
            }),
            expected_json: r#"{
                "remote_node_id": 2,
                "purpose_id": 1,
                "type": "R",
                "number": 1,
                "random_basis_local": "CHSH",
                "random_basis_remote": "NONE",
                "minimum_fidelity": 0.0,
                "time_unit": "MICROSECONDS",
                "max_time": 0,
                "priority": 0,
                "atomic": false,
                "consecutive": false,
                "probability_dist_local1": 0.5,
                "probability_dist_local2": 0.0,
                "probability_dist_remote1": 0.0,
                "probability_dist_remote2": 0.0,
                "rotation_X_local1": 0.0,
                "rotation_Y_local": 0.0,
                "rotation_X_local2": 0.0,
                "rotation_X_remote1": 0.0,
                "rotation_Y_remote": 0.0,
                "rotation_X_remote2": 0.0
            }"#,
        },
    ]
}

/// Check one vector: encoding matches and the expected JSON decodes back.
pub fn verify_vector(vector: &InterchangeVector) -> Result<(), String> {
    let expected: Value = serde_json::from_str(vector.expected_json)
        .map_err(|e| format!("expected JSON does not parse: {}", e))?;
    let actual = vector
        .record
        .to_value()
        .map_err(|e| format!("record does not serialize: {}", e))?;

    if actual != expected {
        return Err(format!("encoded as {}", actual));
    }

    let decoded = vector
        .record
        .parse_like(vector.expected_json)
        .map_err(|e| format!("expected JSON does not decode: {}", e))?;
    if decoded != vector.record {
        return Err(format!("decoded as {:?}", decoded));
    }

    Ok(())
}

/// Verify all vectors.
///
/// Returns (name, passed, detail) for each vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|vector| match verify_vector(vector) {
            Ok(()) => (vector.name.to_string(), true, String::new()),
            Err(detail) => (vector.name.to_string(), false, detail),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use qlink_core::validate_request;
    use qlink_core::version::upgrade_create_v0;

    #[test]
    fn test_all_vectors_pass() {
        for (name, passed, detail) in verify_all_vectors() {
            assert!(passed, "{}: {}", name, detail);
        }
    }

    #[test]
    fn test_vector_names_unique() {
        let vectors = all_vectors();
        let mut names: Vec<_> = vectors.iter().map(|v| v.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), vectors.len());
    }

    #[test]
    fn test_request_vectors_are_valid() {
        for vector in all_vectors() {
            if let VectorRecord::Request(request) = &vector.record {
                assert!(validate_request(request).is_ok(), "{}", vector.name);
            }
        }
    }

    #[test]
    fn test_v0_vector_upgrades() {
        let record = all_vectors()
            .into_iter()
            .find_map(|v| match v.record {
                VectorRecord::CreateV0(record) => Some(record),
                _ => None,
            })
            .unwrap();

        let request = upgrade_create_v0(record).unwrap();
        assert_eq!(request.request_type(), RequestType::RemoteStatePrep);
        let params = request.measure_params().unwrap();
        assert_eq!(params.local().random_basis, RandomBasis::Chsh);
        assert!(validate_request(&request).is_ok());
    }

    #[test]
    fn test_tampered_vector_fails() {
        let mut vector = all_vectors().remove(0);
        vector.expected_json = r#"{"type": "K"}"#;
        assert!(verify_vector(&vector).is_err());
    }
}
