//! # Native Transactions & XDR
//!
//! The native transaction model ([`types`]) and its canonical binary
//! encoding ([`codec`]). The wire form of an envelope is the base64 of its
//! XDR bytes.

pub mod codec;
pub mod types;

use base64::{engine::general_purpose, Engine as _};

pub use codec::{XdrError, XdrReader, XdrResult, XdrWriter};
pub use types::{
    AccountId, Asset, DecoratedSignature, Memo, Operation, OperationBody, Price, SetOptions,
    Signer, SignerKey, TimeBounds, Transaction, TransactionEnvelope, XdrCodec,
};

use crate::crypto::{network_id, sha256};
use crate::error::LinkError;

impl From<XdrError> for LinkError {
    fn from(err: XdrError) -> Self {
        LinkError::InvalidEnvelope(err.to_string())
    }
}

impl Transaction {
    /// Hash signed by every signer: `sha256(network_id || ENVELOPE_TYPE_TX || tx)`.
    pub fn hash(&self, passphrase: &str) -> [u8; 32] {
        let mut w = XdrWriter::new();
        w.write_fixed(&network_id(passphrase));
        w.write_i32(types::ENVELOPE_TYPE_TX);
        self.write_xdr(&mut w);
        sha256(&w.into_bytes())
    }
}

impl TransactionEnvelope {
    /// Wraps an unsigned transaction.
    pub fn unsigned(tx: Transaction) -> Self {
        Self {
            tx,
            signatures: Vec::new(),
        }
    }

    /// Base64 of the XDR encoding.
    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(self.to_xdr())
    }

    /// Decodes the base64 wire form.
    pub fn from_base64(text: &str) -> Result<Self, LinkError> {
        let bytes = general_purpose::STANDARD
            .decode(text.trim())
            .map_err(|e| LinkError::InvalidEnvelope(format!("base64: {}", e)))?;
        Ok(Self::from_xdr(&bytes)?)
    }

    /// Hex transaction hash on `passphrase`.
    pub fn hash_hex(&self, passphrase: &str) -> String {
        hex::encode(self.tx.hash(passphrase))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PUBLIC_PASSPHRASE, TESTNET_PASSPHRASE};

    fn sample() -> TransactionEnvelope {
        TransactionEnvelope::unsigned(Transaction {
            source_account: AccountId([3; 32]),
            fee: 100,
            seq_num: 42,
            time_bounds: Some(TimeBounds {
                min_time: 0,
                max_time: 1_600_000_000,
            }),
            memo: Memo::Text("hello".into()),
            operations: vec![Operation {
                source_account: None,
                body: OperationBody::Payment {
                    destination: AccountId([4; 32]),
                    asset: Asset::Native,
                    amount: 10_000_000,
                },
            }],
        })
    }

    #[test]
    fn base64_wire_form_roundtrips() {
        let env = sample();
        let text = env.to_base64();
        assert!(text.starts_with("AAAAAg"));
        assert_eq!(TransactionEnvelope::from_base64(&text).unwrap(), env);
    }

    #[test]
    fn hash_depends_on_network() {
        let env = sample();
        assert_ne!(env.tx.hash(PUBLIC_PASSPHRASE), env.tx.hash(TESTNET_PASSPHRASE));
        assert_eq!(env.hash_hex(PUBLIC_PASSPHRASE).len(), 64);
    }

    #[test]
    fn garbage_is_an_invalid_envelope() {
        assert!(matches!(
            TransactionEnvelope::from_base64("not base64!"),
            Err(LinkError::InvalidEnvelope(_))
        ));
        assert!(matches!(
            TransactionEnvelope::from_base64("AAAA"),
            Err(LinkError::InvalidEnvelope(_))
        ));
    }
}
