//! Versioned machine snapshots for replay and exploration checkpoints.

use serde::{Deserialize, Serialize};

use crate::faults::ContractViolation;
use crate::machine::MachineState;

fn default_snapshot_schema_version() -> u32 {
    1
}

/// Schema version written by [`canonical_snapshot_v1`].
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Versioned snapshot of one machine.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSnapshotV1 {
    /// Schema version for snapshot serialization.
    #[serde(default = "default_snapshot_schema_version")]
    pub schema_version: u32,
    /// Machine state, with the continuation reduced to its nondet choice.
    pub machine: MachineState,
}

/// Failure to take, encode or decode a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Malformed JSON or an encoder failure.
    #[error("snapshot json: {0}")]
    Json(#[from] serde_json::Error),
    /// The machine was not quiesced.
    #[error(transparent)]
    NotQuiesced(#[from] ContractViolation),
    /// Schema version this build cannot read.
    #[error("unsupported snapshot schema version {found}")]
    UnsupportedVersion {
        /// Version found in the payload.
        found: u32,
    },
}

/// Wrap a snapshot of `machine` in the canonical versioned format.
///
/// # Errors
///
/// Fails if `machine` still has a side effect pending.
pub fn canonical_snapshot_v1(
    machine: &MachineState,
) -> Result<MachineSnapshotV1, ContractViolation> {
    Ok(MachineSnapshotV1 {
        schema_version: default_snapshot_schema_version(),
        machine: machine.snapshot()?,
    })
}

/// Encode a canonical snapshot as JSON.
///
/// # Errors
///
/// Fails if `machine` is not quiesced or the encoder fails.
pub fn encode_snapshot(machine: &MachineState) -> Result<String, SnapshotError> {
    Ok(serde_json::to_string(&canonical_snapshot_v1(machine)?)?)
}

/// Decode a JSON snapshot produced by [`encode_snapshot`].
///
/// # Errors
///
/// Fails on malformed input or an unknown schema version.
pub fn decode_snapshot(json: &str) -> Result<MachineState, SnapshotError> {
    let snapshot: MachineSnapshotV1 = serde_json::from_str(json)?;
    if snapshot.schema_version != SNAPSHOT_SCHEMA_VERSION {
        return Err(SnapshotError::UnsupportedVersion {
            found: snapshot.schema_version,
        });
    }
    Ok(snapshot.machine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MachineConfig;
    use esm_types::MachineId;

    #[test]
    fn missing_schema_version_defaults_to_one() {
        let machine = MachineState::new(MachineId::new(3), "Node", &MachineConfig::default());
        let mut json: serde_json::Value =
            serde_json::from_str(&encode_snapshot(&machine).unwrap()).unwrap();
        json.as_object_mut().unwrap().remove("schema_version");
        let decoded = decode_snapshot(&json.to_string()).unwrap();
        assert_eq!(decoded, machine);
    }

    #[test]
    fn pending_send_cannot_be_encoded() {
        let mut machine = MachineState::new(MachineId::new(3), "Node", &MachineConfig::default());
        machine
            .continuation_mut()
            .send(MachineId::new(4), esm_types::EventId::HALT, esm_types::Value::Null);
        assert!(matches!(
            encode_snapshot(&machine),
            Err(SnapshotError::NotQuiesced(ContractViolation::SnapshotWhileSuspended(_)))
        ));
    }

    #[test]
    fn future_schema_version_is_rejected() {
        let machine = MachineState::new(MachineId::new(3), "Node", &MachineConfig::default());
        let mut json: serde_json::Value =
            serde_json::from_str(&encode_snapshot(&machine).unwrap()).unwrap();
        json["schema_version"] = serde_json::json!(2);
        assert!(matches!(
            decode_snapshot(&json.to_string()),
            Err(SnapshotError::UnsupportedVersion { found: 2 })
        ));
    }
}
