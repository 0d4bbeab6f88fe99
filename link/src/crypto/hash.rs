//! Hashing utilities.
//!
//! The ledger uses SHA-256 everywhere that matters here: network ids,
//! transaction hashes, and hash-preimage signers.

use sha2::{Digest, Sha256};

/// SHA-256 of `data` as a fixed-size array.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Network id: the SHA-256 of the network passphrase.
pub fn network_id(passphrase: &str) -> [u8; 32] {
    sha256(passphrase.as_bytes())
}
