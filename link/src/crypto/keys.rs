//! # Key Management
//!
//! Ed25519 keypairs for signing envelopes, addressed through strkeys
//! (`G...` public, `S...` secret).
//!
//! Key bytes are never logged. `Keypair` does not implement `Serialize`:
//! exporting a secret should be a deliberate call to [`Keypair::secret`].

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use std::fmt;
use thiserror::Error;

use super::strkey::{self, Version};
use crate::xdr::DecoratedSignature;

/// Errors that can occur during key operations.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret seed")]
    InvalidSecret,

    #[error("invalid public key")]
    InvalidPublicKey,
}

/// An ed25519 keypair able to sign transaction hashes.
///
/// # Examples
///
/// ```
/// use txlink::crypto::Keypair;
///
/// let kp = Keypair::random();
/// let sig = kp.sign(b"payload");
/// assert!(txlink::crypto::verify_signature(&kp.public_key_bytes(), b"payload", &sig));
/// ```
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generates a fresh keypair from the OS RNG.
    pub fn random() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Constructs a keypair from a raw 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Constructs a keypair from an `S...` secret strkey.
    pub fn from_secret(secret: &str) -> Result<Self, KeyError> {
        let seed = strkey::decode(Version::Seed, secret).map_err(|_| KeyError::InvalidSecret)?;
        Ok(Self::from_seed(&seed))
    }

    /// Raw public key bytes.
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// The `G...` account id of this keypair.
    pub fn account_id(&self) -> String {
        strkey::encode(Version::AccountId, &self.public_key_bytes())
    }

    /// The `S...` secret seed. Handle with care.
    pub fn secret(&self) -> String {
        strkey::encode(Version::Seed, &self.signing_key.to_bytes())
    }

    /// Signature hint: the last four bytes of the public key.
    pub fn hint(&self) -> [u8; 4] {
        let public = self.public_key_bytes();
        let mut hint = [0u8; 4];
        hint.copy_from_slice(&public[28..]);
        hint
    }

    /// Signs raw bytes.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Signs a transaction hash and wraps the result with its hint.
    pub fn sign_decorated(&self, hash: &[u8; 32]) -> DecoratedSignature {
        DecoratedSignature {
            hint: self.hint(),
            signature: self.sign(hash).to_vec(),
        }
    }
}

impl Clone for Keypair {
    fn clone(&self) -> Self {
        Self::from_seed(&self.signing_key.to_bytes())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("account_id", &self.account_id())
            .finish_non_exhaustive()
    }
}

/// Verifies an ed25519 signature. Malformed keys or signatures verify as
/// `false`.
pub fn verify_signature(public_key: &[u8; 32], message: &[u8], signature: &[u8]) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    key.verify(message, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_roundtrip_preserves_identity() {
        let kp = Keypair::random();
        let restored = Keypair::from_secret(&kp.secret()).unwrap();
        assert_eq!(kp.account_id(), restored.account_id());
    }

    #[test]
    fn account_id_is_a_g_key() {
        let kp = Keypair::from_seed(&[42u8; 32]);
        let id = kp.account_id();
        assert!(id.starts_with('G'));
        assert!(strkey::is_account_id(&id));
    }

    #[test]
    fn signatures_verify_only_for_their_key() {
        let kp = Keypair::random();
        let other = Keypair::random();
        let sig = kp.sign(b"hello");
        assert!(verify_signature(&kp.public_key_bytes(), b"hello", &sig));
        assert!(!verify_signature(&other.public_key_bytes(), b"hello", &sig));
        assert!(!verify_signature(&kp.public_key_bytes(), b"other", &sig));
        assert!(!verify_signature(&kp.public_key_bytes(), b"hello", &sig[..10]));
    }

    #[test]
    fn decorated_signature_carries_hint() {
        let kp = Keypair::random();
        let decorated = kp.sign_decorated(&[1u8; 32]);
        assert_eq!(decorated.hint, kp.hint());
        assert_eq!(decorated.signature.len(), 64);
    }

    #[test]
    fn invalid_secret_is_rejected() {
        assert!(Keypair::from_secret("SNOTAKEY").is_err());
        let account = Keypair::random().account_id();
        assert!(Keypair::from_secret(&account).is_err());
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let kp = Keypair::random();
        let debug = format!("{:?}", kp);
        assert!(!debug.contains(&kp.secret()));
    }
}
