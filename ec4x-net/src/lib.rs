//! # EC4X Net
//!
//! The persistence and wire contract around the engine:
//!
//! - **Snapshots**: the full `GameState` in a deterministic, versioned
//!   binary format. Round-trip safe: serialize → deserialize reproduces
//!   the state exactly.
//! - **Player deltas**: per-house fog-of-war projections diffed against
//!   the previous turn, for wire transport. Clients rebuild their local
//!   projection by applying successive deltas to a base snapshot.
//! - **Envelopes**: signed (and optionally per-recipient encrypted)
//!   carriers for the published event kinds 30400–30405.
//!
//! The engine crate knows nothing about any of this; everything here
//! consumes its public types.

pub mod envelope;
pub mod snapshot;

pub use envelope::{
    decrypt_from, encrypt_for, normalize_invite_code, CryptoError, Envelope, EventKind,
    ServerIdentity,
};
pub use snapshot::{
    decode_delta, decode_snapshot, encode_delta, encode_snapshot, CodecError,
};
