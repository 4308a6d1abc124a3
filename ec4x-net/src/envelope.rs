//! Signed, optionally encrypted carriers for published game events.
//!
//! The server publishes five event kinds (30400–30405); every envelope
//! carries the game id and turn and is signed by its author. Turn results
//! and full-state payloads are additionally encrypted per recipient with
//! an ephemeral key exchange, so only the addressed player can read them.
//!
//! Invalid envelopes are dropped by consumers and logged with a short
//! event id; they never abort resolution.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("signature verification failed")]
    BadSignature,
    #[error("malformed key material")]
    BadKey,
    #[error("malformed signature bytes")]
    BadSignatureBytes,
    #[error("decryption failed")]
    DecryptFailed,
    #[error("encrypted payload too short ({0} bytes)")]
    Truncated(usize),
    #[error("unknown event kind {0}")]
    UnknownKind(u16),
}

/// Published event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum EventKind {
    /// Lobby definition: slots, statuses, invite codes.
    GameDefinition = 30400,
    /// Player claims a slot (player → server).
    SlotClaim = 30401,
    /// Turn commands (player → server, encrypted to the server key).
    TurnCommands = 30402,
    /// Turn results (server → player, encrypted per recipient; delta).
    TurnResults = 30404,
    /// Full state (server → player, encrypted per recipient; snapshot
    /// projection).
    FullState = 30405,
}

impl EventKind {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn from_u16(value: u16) -> Result<Self, CryptoError> {
        match value {
            30400 => Ok(EventKind::GameDefinition),
            30401 => Ok(EventKind::SlotClaim),
            30402 => Ok(EventKind::TurnCommands),
            30404 => Ok(EventKind::TurnResults),
            30405 => Ok(EventKind::FullState),
            other => Err(CryptoError::UnknownKind(other)),
        }
    }
}

/// The server's long-lived keypair: an ed25519 signing key and an x25519
/// exchange key, stored together.
pub struct ServerIdentity {
    signing: SigningKey,
    exchange: StaticSecret,
}

impl ServerIdentity {
    pub const BYTES: usize = 64;

    /// Generate a fresh identity from OS randomness.
    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        Self {
            signing: SigningKey::generate(&mut rng),
            exchange: StaticSecret::random_from_rng(&mut rng),
        }
    }

    /// Restore an identity from its 64-byte stored form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != Self::BYTES {
            return Err(CryptoError::BadKey);
        }
        let mut signing = [0u8; 32];
        let mut exchange = [0u8; 32];
        signing.copy_from_slice(&bytes[..32]);
        exchange.copy_from_slice(&bytes[32..]);
        Ok(Self {
            signing: SigningKey::from_bytes(&signing),
            exchange: StaticSecret::from(exchange),
        })
    }

    /// The 64-byte stored form. Secret material; keep it off the wire.
    pub fn to_bytes(&self) -> [u8; Self::BYTES] {
        let mut out = [0u8; Self::BYTES];
        out[..32].copy_from_slice(&self.signing.to_bytes());
        out[32..].copy_from_slice(self.exchange.as_bytes());
        out
    }

    /// Public signing key, as carried in envelopes.
    pub fn verifying_key_bytes(&self) -> [u8; 32] {
        self.signing.verifying_key().to_bytes()
    }

    /// Public exchange key, published for per-recipient encryption.
    pub fn exchange_public_bytes(&self) -> [u8; 32] {
        PublicKey::from(&self.exchange).to_bytes()
    }

    fn exchange_secret(&self) -> &StaticSecret {
        &self.exchange
    }
}

/// A signed event carrier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub kind: EventKind,
    pub game_id: String,
    pub turn: u32,
    /// Author's ed25519 verifying key.
    pub author: [u8; 32],
    pub payload: Vec<u8>,
    /// ed25519 signature over the canonical signing bytes.
    pub signature: Vec<u8>,
}

impl Envelope {
    /// Sign a payload into an envelope.
    pub fn seal(
        identity: &ServerIdentity,
        kind: EventKind,
        game_id: impl Into<String>,
        turn: u32,
        payload: Vec<u8>,
    ) -> Self {
        let game_id = game_id.into();
        let author = identity.verifying_key_bytes();
        let msg = signing_bytes(kind, &game_id, turn, &payload);
        let signature = identity.signing.sign(&msg).to_bytes().to_vec();
        Self {
            kind,
            game_id,
            turn,
            author,
            payload,
            signature,
        }
    }

    /// Verify the signature against the embedded author key.
    pub fn verify(&self) -> Result<(), CryptoError> {
        let key = VerifyingKey::from_bytes(&self.author).map_err(|_| CryptoError::BadKey)?;
        let sig_bytes: [u8; 64] = self
            .signature
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::BadSignatureBytes)?;
        let signature = Signature::from_bytes(&sig_bytes);
        let msg = signing_bytes(self.kind, &self.game_id, self.turn, &self.payload);
        key.verify(&msg, &signature)
            .map_err(|_| CryptoError::BadSignature)
    }

    /// Short hex id for log lines about dropped envelopes.
    pub fn short_id(&self) -> String {
        let digest = Sha256::digest(&self.payload);
        hex::encode(&digest[..4])
    }
}

/// Canonical byte string covered by the signature.
fn signing_bytes(kind: EventKind, game_id: &str, turn: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(10 + game_id.len() + payload.len());
    out.extend_from_slice(&kind.as_u16().to_le_bytes());
    out.extend_from_slice(&turn.to_le_bytes());
    out.extend_from_slice(&(game_id.len() as u32).to_le_bytes());
    out.extend_from_slice(game_id.as_bytes());
    out.extend_from_slice(payload);
    out
}

/// Encrypt a payload to a recipient's x25519 public key.
///
/// Sealed-box construction: an ephemeral keypair per message, the shared
/// secret hashed with both public keys into the cipher key. Output is
/// `ephemeral_public(32) || ciphertext`.
pub fn encrypt_for(recipient_public: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let recipient = PublicKey::from(*recipient_public);
    let ephemeral = EphemeralSecret::random_from_rng(rand::rngs::OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(&recipient);

    let key = derive_key(shared.as_bytes(), ephemeral_public.as_bytes(), recipient_public);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
    // A fresh key per message: the zero nonce is never reused
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&[0u8; 12]), plaintext)
        .map_err(|_| CryptoError::DecryptFailed)?;

    let mut out = Vec::with_capacity(32 + ciphertext.len());
    out.extend_from_slice(ephemeral_public.as_bytes());
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a payload encrypted to this identity's exchange key.
pub fn decrypt_from(identity: &ServerIdentity, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < 32 + 16 {
        return Err(CryptoError::Truncated(sealed.len()));
    }
    let mut ephemeral_public = [0u8; 32];
    ephemeral_public.copy_from_slice(&sealed[..32]);
    let shared = identity
        .exchange_secret()
        .diffie_hellman(&PublicKey::from(ephemeral_public));

    let key = derive_key(
        shared.as_bytes(),
        &ephemeral_public,
        &identity.exchange_public_bytes(),
    );
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
    cipher
        .decrypt(Nonce::from_slice(&[0u8; 12]), &sealed[32..])
        .map_err(|_| CryptoError::DecryptFailed)
}

fn derive_key(shared: &[u8; 32], ephemeral_public: &[u8; 32], recipient: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"ec4x-sealed-v1");
    hasher.update(shared);
    hasher.update(ephemeral_public);
    hasher.update(recipient);
    hasher.finalize().into()
}

/// Normalize an invite code before lookup: case-folded, whitespace and
/// separators stripped.
pub fn normalize_invite_code(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_codes_round_trip() {
        for kind in [
            EventKind::GameDefinition,
            EventKind::SlotClaim,
            EventKind::TurnCommands,
            EventKind::TurnResults,
            EventKind::FullState,
        ] {
            assert_eq!(EventKind::from_u16(kind.as_u16()).unwrap(), kind);
        }
        assert!(matches!(
            EventKind::from_u16(30403),
            Err(CryptoError::UnknownKind(30403))
        ));
        assert_eq!(EventKind::GameDefinition.as_u16(), 30400);
        assert_eq!(EventKind::FullState.as_u16(), 30405);
    }

    #[test]
    fn sealed_envelope_verifies() {
        let identity = ServerIdentity::generate();
        let envelope = Envelope::seal(
            &identity,
            EventKind::TurnResults,
            "game-1",
            7,
            b"delta bytes".to_vec(),
        );
        assert!(envelope.verify().is_ok());
    }

    #[test]
    fn tampered_envelope_fails_verification() {
        let identity = ServerIdentity::generate();
        let mut envelope = Envelope::seal(
            &identity,
            EventKind::TurnResults,
            "game-1",
            7,
            b"delta bytes".to_vec(),
        );

        envelope.payload.push(0xff);
        assert!(matches!(envelope.verify(), Err(CryptoError::BadSignature)));

        envelope.payload.pop();
        envelope.turn = 8;
        assert!(matches!(envelope.verify(), Err(CryptoError::BadSignature)));
    }

    #[test]
    fn identity_round_trips_through_storage() {
        let identity = ServerIdentity::generate();
        let restored = ServerIdentity::from_bytes(&identity.to_bytes()).unwrap();
        assert_eq!(identity.verifying_key_bytes(), restored.verifying_key_bytes());
        assert_eq!(
            identity.exchange_public_bytes(),
            restored.exchange_public_bytes()
        );

        // A restored identity produces verifiable signatures
        let envelope = Envelope::seal(&restored, EventKind::SlotClaim, "g", 1, vec![1, 2, 3]);
        assert!(envelope.verify().is_ok());
    }

    #[test]
    fn encryption_round_trips_per_recipient() {
        let server = ServerIdentity::generate();
        let plaintext = b"the fleet sails at dawn".to_vec();

        let sealed = encrypt_for(&server.exchange_public_bytes(), &plaintext).unwrap();
        assert_ne!(sealed, plaintext);
        let opened = decrypt_from(&server, &sealed).unwrap();
        assert_eq!(opened, plaintext);

        // The wrong recipient cannot open it
        let other = ServerIdentity::generate();
        assert!(matches!(
            decrypt_from(&other, &sealed),
            Err(CryptoError::DecryptFailed)
        ));
    }

    #[test]
    fn truncated_ciphertext_is_rejected() {
        let server = ServerIdentity::generate();
        assert!(matches!(
            decrypt_from(&server, &[0u8; 10]),
            Err(CryptoError::Truncated(10))
        ));
    }

    #[test]
    fn invite_codes_normalize() {
        assert_eq!(normalize_invite_code("  AB-cd 12 "), "abcd12");
        assert_eq!(normalize_invite_code("XYZZY"), "xyzzy");
        assert_eq!(
            normalize_invite_code("a b c"),
            normalize_invite_code("ABC")
        );
    }

    #[test]
    fn short_id_is_stable_per_payload() {
        let identity = ServerIdentity::generate();
        let a = Envelope::seal(&identity, EventKind::SlotClaim, "g", 1, vec![9, 9]);
        let b = Envelope::seal(&identity, EventKind::SlotClaim, "g", 2, vec![9, 9]);
        assert_eq!(a.short_id(), b.short_id());
        assert_eq!(a.short_id().len(), 8);
    }
}
