//! Ed25519 commit signing and BLAKE3 content hashing

use chronicle_domain::Signer;
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier, VerifyingKey};

/// Key-derivation context; changing it invalidates every stored signature
const KEY_CONTEXT: &str = "chronicle 2024 commit signing key v1";

/// [`Signer`] backed by an Ed25519 key derived from a shared secret
///
/// Signatures and hashes are hex encoded.
#[derive(Clone)]
pub struct Ed25519Signer {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl Ed25519Signer {
    /// Derive the signing key from a secret string
    ///
    /// The same secret always yields the same key, so every process sharing
    /// the secret can verify every other process's commits.
    pub fn from_secret(secret: &str) -> Self {
        let seed = blake3::derive_key(KEY_CONTEXT, secret.as_bytes());
        let signing_key = SigningKey::from_bytes(&seed);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Hex-encoded public key, for publishing alongside audit exports
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.verifying_key.as_bytes())
    }
}

impl std::fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("public_key", &self.public_key_hex())
            .finish()
    }
}

impl Signer for Ed25519Signer {
    fn sign(&self, payload: &str) -> String {
        let signature = self.signing_key.sign(payload.as_bytes());
        hex::encode(signature.to_bytes())
    }

    fn verify(&self, payload: &str, signature: &str) -> bool {
        let Ok(bytes) = hex::decode(signature) else {
            return false;
        };
        let Ok(bytes) = <[u8; 64]>::try_from(bytes.as_slice()) else {
            return false;
        };
        let signature = Signature::from_bytes(&bytes);
        self.verifying_key.verify(payload.as_bytes(), &signature).is_ok()
    }

    fn hash(&self, data: &str) -> String {
        blake3::hash(data.as_bytes()).to_hex().to_string()
    }
}
