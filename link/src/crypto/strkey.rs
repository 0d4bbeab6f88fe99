//! # StrKey Encoding
//!
//! Stellar's textual key format: `base32(version || payload || crc16)`, where
//! the version byte selects the leading letter (`G` account, `S` seed, `T`
//! pre-authorized transaction, `X` hash preimage) and the checksum is
//! CRC16-XModem over version and payload.
//!
//! The codec itself is `stellar-strkey`; this module pins the four 32-byte
//! key kinds the crate handles and reports which check a key failed.

use stellar_strkey::{ed25519, Strkey};
use thiserror::Error;

/// Length of an encoded 32-byte key.
pub const STRKEY_LENGTH: usize = 56;

/// Errors from decoding a strkey.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrKeyError {
    #[error("invalid length: expected {STRKEY_LENGTH} characters, got {0}")]
    InvalidLength(usize),

    #[error("invalid base32 character {0:?}")]
    InvalidCharacter(char),

    #[error("unexpected version byte: expected {expected:?}")]
    WrongVersion { expected: Version },

    /// Base32 decoding or the checksum failed.
    #[error("malformed key: {0}")]
    Malformed(#[from] stellar_strkey::DecodeError),
}

/// StrKey version byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    /// `G...` ed25519 public key.
    AccountId,
    /// `S...` ed25519 secret seed.
    Seed,
    /// `T...` pre-authorized transaction hash.
    PreAuthTx,
    /// `X...` sha256 hash preimage signer.
    HashX,
}

/// Encodes a 32-byte payload under the given version.
pub fn encode(version: Version, payload: &[u8; 32]) -> String {
    match version {
        Version::AccountId => ed25519::PublicKey(*payload).to_string(),
        Version::Seed => ed25519::PrivateKey(*payload).to_string(),
        Version::PreAuthTx => stellar_strkey::PreAuthTx(*payload).to_string(),
        Version::HashX => stellar_strkey::HashX(*payload).to_string(),
    }
}

/// Decodes a strkey, checking its version and checksum.
pub fn decode(version: Version, key: &str) -> Result<[u8; 32], StrKeyError> {
    if key.len() != STRKEY_LENGTH {
        return Err(StrKeyError::InvalidLength(key.len()));
    }
    // Only the canonical upper-case alphabet is accepted.
    if let Some(c) = key.chars().find(|c| !matches!(c, 'A'..='Z' | '2'..='7')) {
        return Err(StrKeyError::InvalidCharacter(c));
    }
    match (version, Strkey::from_string(key)?) {
        (Version::AccountId, Strkey::PublicKeyEd25519(k)) => Ok(k.0),
        (Version::Seed, Strkey::PrivateKeyEd25519(k)) => Ok(k.0),
        (Version::PreAuthTx, Strkey::PreAuthTx(k)) => Ok(k.0),
        (Version::HashX, Strkey::HashX(k)) => Ok(k.0),
        _ => Err(StrKeyError::WrongVersion { expected: version }),
    }
}

/// Returns `true` for a well-formed `G...` account id.
pub fn is_account_id(key: &str) -> bool {
    decode(Version::AccountId, key).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NEUTRAL_ACCOUNT;

    /// Seed `00 01 .. 1f` and its ed25519 public key
    /// `03a107bff3ce10be1d70dd18e74bc09967e4d6309ba50d5f1ddc8664125531b8`.
    const KNOWN_SEED: &str = "SAAACAQDAQCQMBYIBEFAWDANBYHRAEISCMKBKFQXDAMRUGY4DUPB6NKI";
    const KNOWN_ACCOUNT: &str = "GAB2CB576PHBBPQ5ODORRZ2LYCMWPZGWGCN2KDK7DXOIMZASKUY3QZ6Q";

    fn counting_seed() -> [u8; 32] {
        let mut seed = [0u8; 32];
        for (i, byte) in seed.iter_mut().enumerate() {
            *byte = i as u8;
        }
        seed
    }

    #[test]
    fn zero_key_is_the_neutral_account() {
        assert_eq!(encode(Version::AccountId, &[0u8; 32]), NEUTRAL_ACCOUNT);
    }

    #[test]
    fn known_seed_and_account() {
        assert_eq!(encode(Version::Seed, &counting_seed()), KNOWN_SEED);
        assert_eq!(decode(Version::Seed, KNOWN_SEED).unwrap(), counting_seed());

        let public = hex::decode("03a107bff3ce10be1d70dd18e74bc09967e4d6309ba50d5f1ddc8664125531b8").unwrap();
        let mut key = [0u8; 32];
        key.copy_from_slice(&public);
        assert_eq!(encode(Version::AccountId, &key), KNOWN_ACCOUNT);
        assert_eq!(decode(Version::AccountId, KNOWN_ACCOUNT).unwrap(), key);
    }

    #[test]
    fn encode_decode_preserves_payload() {
        let payload = [7u8; 32];
        for version in [Version::AccountId, Version::Seed, Version::PreAuthTx, Version::HashX] {
            let key = encode(version, &payload);
            assert_eq!(key.len(), STRKEY_LENGTH);
            assert_eq!(decode(version, &key).unwrap(), payload);
        }
    }

    #[test]
    fn leading_letters_follow_version() {
        let payload = [1u8; 32];
        assert!(encode(Version::AccountId, &payload).starts_with('G'));
        assert!(encode(Version::Seed, &payload).starts_with('S'));
        assert!(encode(Version::PreAuthTx, &payload).starts_with('T'));
        assert!(encode(Version::HashX, &payload).starts_with('X'));
    }

    #[test]
    fn corrupted_key_fails_checksum() {
        let mut key = KNOWN_ACCOUNT.to_string().into_bytes();
        key[10] = if key[10] == b'A' { b'B' } else { b'A' };
        let key = String::from_utf8(key).unwrap();
        assert!(matches!(
            decode(Version::AccountId, &key),
            Err(StrKeyError::Malformed(_))
        ));
    }

    #[test]
    fn wrong_version_is_rejected() {
        assert!(matches!(
            decode(Version::AccountId, KNOWN_SEED),
            Err(StrKeyError::WrongVersion { .. })
        ));
        assert!(!is_account_id(KNOWN_SEED));
        assert!(is_account_id(KNOWN_ACCOUNT));
    }

    #[test]
    fn bad_length_and_alphabet() {
        assert_eq!(decode(Version::AccountId, "GABC"), Err(StrKeyError::InvalidLength(4)));
        let bad = "g".repeat(STRKEY_LENGTH);
        assert!(matches!(
            decode(Version::AccountId, &bad),
            Err(StrKeyError::InvalidCharacter('g'))
        ));
    }
}
