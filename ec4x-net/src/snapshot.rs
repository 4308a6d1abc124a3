//! Versioned binary serialization for snapshots and player deltas.
//!
//! Layout: a four-byte magic, a format version, then the bincode body.
//! Snapshot bytes are deterministic for equal states (the engine
//! serializes its entity maps in sorted key order), so equal states
//! produce equal snapshots and the round-trip law holds bitwise.

use ec4x_core::projection::StateDelta;
use ec4x_core::GameState;
use thiserror::Error;

/// Snapshot file magic.
const SNAPSHOT_MAGIC: &[u8; 4] = b"EC4S";
/// Delta payload magic.
const DELTA_MAGIC: &[u8; 4] = b"EC4D";
/// Current format version. Cross-version compatibility is out of scope;
/// a mismatch is an error, never a silent migration.
const FORMAT_VERSION: u16 = 1;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("payload too short ({0} bytes)")]
    Truncated(usize),
    #[error("bad magic: expected {expected:?}")]
    BadMagic { expected: [u8; 4] },
    #[error("unsupported format version {found} (supported: {supported})")]
    VersionMismatch { found: u16, supported: u16 },
    #[error("serialization failed: {0}")]
    Serialize(#[source] bincode::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(#[source] bincode::Error),
}

fn encode_with_header<T: serde::Serialize>(
    magic: &[u8; 4],
    value: &T,
) -> Result<Vec<u8>, CodecError> {
    let body = bincode::serialize(value).map_err(CodecError::Serialize)?;
    let mut out = Vec::with_capacity(6 + body.len());
    out.extend_from_slice(magic);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

fn decode_with_header<'a>(magic: &[u8; 4], bytes: &'a [u8]) -> Result<&'a [u8], CodecError> {
    if bytes.len() < 6 {
        return Err(CodecError::Truncated(bytes.len()));
    }
    if &bytes[0..4] != magic {
        return Err(CodecError::BadMagic { expected: *magic });
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != FORMAT_VERSION {
        return Err(CodecError::VersionMismatch {
            found: version,
            supported: FORMAT_VERSION,
        });
    }
    Ok(&bytes[6..])
}

/// Serialize a full game state for durable storage.
pub fn encode_snapshot(state: &GameState) -> Result<Vec<u8>, CodecError> {
    encode_with_header(SNAPSHOT_MAGIC, state)
}

/// Restore a game state from a snapshot. Secondary indices are rebuilt
/// from primary storage as part of loading.
pub fn decode_snapshot(bytes: &[u8]) -> Result<GameState, CodecError> {
    let body = decode_with_header(SNAPSHOT_MAGIC, bytes)?;
    let mut state: GameState = bincode::deserialize(body).map_err(CodecError::Deserialize)?;
    state.after_load();
    Ok(state)
}

/// Serialize a per-house delta for wire transport.
pub fn encode_delta(delta: &StateDelta) -> Result<Vec<u8>, CodecError> {
    encode_with_header(DELTA_MAGIC, delta)
}

pub fn decode_delta(bytes: &[u8]) -> Result<StateDelta, CodecError> {
    let body = decode_with_header(DELTA_MAGIC, bytes)?;
    bincode::deserialize(body).map_err(CodecError::Deserialize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ec4x_core::ids::{HouseId, SystemId};
    use ec4x_core::projection::{diff_projection, project};
    use ec4x_core::testing::GameStateBuilder;
    use ec4x_core::ShipClass;

    fn sample_state() -> GameState {
        GameStateBuilder::new()
            .with_houses(3)
            .with_colony(HouseId(1), SystemId(10))
            .with_colony(HouseId(2), SystemId(11))
            .with_fleet(HouseId(1), SystemId(10), &[ShipClass::Cruiser, ShipClass::Carrier])
            .with_fleet(HouseId(3), SystemId(12), &[ShipClass::Scout])
            .build()
    }

    #[test]
    fn snapshot_round_trip_is_exact() {
        let state = sample_state();
        let bytes = encode_snapshot(&state).unwrap();
        let restored = decode_snapshot(&bytes).unwrap();
        assert_eq!(state, restored);
        assert_eq!(state.checksum(), restored.checksum());
        assert!(restored.validate().is_ok());

        // Bitwise: re-encoding the restored state reproduces the bytes
        let bytes_again = encode_snapshot(&restored).unwrap();
        assert_eq!(bytes, bytes_again);
    }

    #[test]
    fn equal_states_produce_equal_bytes() {
        let a = sample_state();
        let b = sample_state();
        assert_eq!(encode_snapshot(&a).unwrap(), encode_snapshot(&b).unwrap());
    }

    #[test]
    fn corrupt_header_is_rejected() {
        let state = sample_state();
        let mut bytes = encode_snapshot(&state).unwrap();

        assert!(matches!(
            decode_snapshot(&bytes[..3]),
            Err(CodecError::Truncated(_))
        ));

        bytes[0] = b'X';
        assert!(matches!(
            decode_snapshot(&bytes),
            Err(CodecError::BadMagic { .. })
        ));
    }

    #[test]
    fn future_version_is_refused() {
        let state = sample_state();
        let mut bytes = encode_snapshot(&state).unwrap();
        bytes[4] = 0xff;
        bytes[5] = 0xff;
        assert!(matches!(
            decode_snapshot(&bytes),
            Err(CodecError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn delta_round_trip() {
        let state = sample_state();
        let before = project(&state, HouseId(1));
        let mut mutated = state.clone();
        mutated.houses.get_mut(&HouseId(1)).unwrap().treasury += 777;
        mutated.turn += 1;
        let after = project(&mutated, HouseId(1));

        let delta = diff_projection(&before, &after);
        let bytes = encode_delta(&delta).unwrap();
        let restored = decode_delta(&bytes).unwrap();
        assert_eq!(delta, restored);
    }

    #[test]
    fn snapshot_magic_differs_from_delta_magic() {
        let state = sample_state();
        let snapshot = encode_snapshot(&state).unwrap();
        assert!(matches!(
            decode_delta(&snapshot),
            Err(CodecError::BadMagic { .. })
        ));
    }
}
