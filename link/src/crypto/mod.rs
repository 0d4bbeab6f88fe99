//! # Cryptographic Primitives
//!
//! Thin wrappers over audited implementations: `sha2` for hashing,
//! `ed25519-dalek` for signatures. The strkey codec is the only format
//! implemented here, because it is specific to the ledger.

pub mod hash;
pub mod keys;
pub mod strkey;

pub use hash::{network_id, sha256};
pub use keys::{verify_signature, KeyError, Keypair};
pub use strkey::{is_account_id, StrKeyError, Version};
