//! # Signer Engine
//!
//! Which keys can sign a transaction, and which of them already did.
//!
//! The signer set is the union of the signers of every source account the
//! transaction touches, deduplicated by key and ordered by descending
//! weight.

use std::collections::HashMap;

use futures::future::try_join_all;
use serde::Serialize;
use tracing::debug;

use super::cache::Resolver;
use super::network::SignerRecord;
use crate::config::{SessionConfig, NEUTRAL_ACCOUNT};
use crate::crypto::{strkey, verify_signature, Version};
use crate::descriptor::TransactionDescriptor;
use crate::error::LinkError;
use crate::fields::{FieldValue, SignerType};
use crate::xdr::TransactionEnvelope;

/// A signer together with whether its signature is already in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignerStatus {
    pub weight: u32,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub value: String,
    pub signed: bool,
}

/// Distinct source accounts referenced by `desc`, transaction source first.
///
/// The neutral placeholder is skipped: it has no signers.
pub fn source_addresses(desc: &TransactionDescriptor, config: &SessionConfig) -> Vec<String> {
    let tx_source = desc
        .text("source")
        .map(str::to_string)
        .or_else(|| config.source.clone());
    let op_sources = desc
        .operations
        .iter()
        .filter_map(|op| op.get("source").and_then(FieldValue::as_text))
        .map(str::to_string);

    let mut sources: Vec<String> = Vec::new();
    for source in tx_source.into_iter().chain(op_sources) {
        if source != NEUTRAL_ACCOUNT && !sources.contains(&source) {
            sources.push(source);
        }
    }
    sources
}

/// Computes the signer set of `desc`.
pub async fn compute_signers(
    desc: &TransactionDescriptor,
    config: &SessionConfig,
    resolver: &Resolver,
) -> Result<Vec<SignerRecord>, LinkError> {
    let addresses = source_addresses(desc, config);
    let accounts = try_join_all(addresses.iter().map(|address| async move {
        let resolved = resolver.resolve_address(address).await?;
        resolver.load_account(&resolved.account_id).await
    }))
    .await?;

    // Same key on several accounts: keep the heaviest entry, in first-seen
    // position.
    let mut signers: Vec<SignerRecord> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for signer in accounts.iter().flat_map(|account| account.signers.iter()) {
        match positions.get(&signer.value) {
            Some(&index) => {
                if signer.weight > signers[index].weight {
                    signers[index].weight = signer.weight;
                }
            }
            None => {
                positions.insert(signer.value.clone(), signers.len());
                signers.push(signer.clone());
            }
        }
    }
    signers.sort_by(|a, b| b.weight.cmp(&a.weight));

    debug!(
        accounts = accounts.len(),
        signers = signers.len(),
        "computed signer set"
    );
    Ok(signers)
}

/// Returns `true` when `signer` has signed `envelope`.
///
/// Key signers are checked against the attached signatures, pre-authorized
/// transactions against the ledger. Hash signers always report `false`.
pub async fn has_signed(
    signer: &SignerRecord,
    envelope: &TransactionEnvelope,
    resolver: &Resolver,
) -> Result<bool, LinkError> {
    match signer.kind {
        SignerType::Key => {
            let Ok(public_key) = strkey::decode(Version::AccountId, &signer.value) else {
                return Ok(false);
            };
            let hash = envelope.tx.hash(resolver.network().passphrase());
            let hint = &public_key[28..];
            Ok(envelope
                .signatures
                .iter()
                .filter(|sig| sig.hint[..] == *hint)
                .any(|sig| verify_signature(&public_key, &hash, &sig.signature)))
        }
        SignerType::Tx => resolver.network().transaction_exists(&signer.value).await,
        SignerType::Hash => Ok(false),
    }
}

/// Pairs every signer with its [`has_signed`] outcome.
pub async fn signer_statuses(
    signers: &[SignerRecord],
    envelope: &TransactionEnvelope,
    resolver: &Resolver,
) -> Result<Vec<SignerStatus>, LinkError> {
    try_join_all(signers.iter().map(|signer| async move {
        Ok(SignerStatus {
            weight: signer.weight,
            kind: signer.kind.name(),
            value: signer.value.clone(),
            signed: has_signed(signer, envelope, resolver).await?,
        })
    }))
    .await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::TESTNET_PASSPHRASE;
    use crate::crypto::Keypair;
    use crate::descriptor::OperationDescriptor;
    use crate::fields::OperationType;
    use crate::resolve::network::{AccountSnapshot, Thresholds};
    use crate::resolve::MemoryNetwork;
    use crate::xdr::{AccountId, Memo, Operation, OperationBody, Transaction};

    fn account(id: &str, signers: &[(&str, u32)]) -> AccountSnapshot {
        AccountSnapshot {
            id: id.to_string(),
            sequence: 10,
            signers: signers
                .iter()
                .map(|(value, weight)| SignerRecord {
                    weight: *weight,
                    kind: SignerType::Key,
                    value: value.to_string(),
                })
                .collect(),
            thresholds: Thresholds::default(),
        }
    }

    fn key(byte: u8) -> String {
        strkey::encode(Version::AccountId, &[byte; 32])
    }

    #[tokio::test]
    async fn union_of_sources_is_deduplicated_and_sorted() {
        let (a, b, shared) = (key(1), key(2), key(3));
        let network = MemoryNetwork::new(TESTNET_PASSPHRASE)
            .with_account(account(&a, &[(&a, 1), (&shared, 5)]))
            .with_account(account(&b, &[(&b, 10), (&shared, 2)]));
        let resolver = Resolver::new(Arc::new(network));

        let desc = TransactionDescriptor::new()
            .push(
                OperationDescriptor::new(OperationType::Inflation)
                    .with("source", FieldValue::Address(a.clone())),
            )
            .push(
                OperationDescriptor::new(OperationType::Inflation)
                    .with("source", FieldValue::Address(b.clone())),
            );
        let signers = compute_signers(&desc, &SessionConfig::testnet(), &resolver)
            .await
            .unwrap();

        let values: Vec<(&str, u32)> = signers
            .iter()
            .map(|s| (s.value.as_str(), s.weight))
            .collect();
        assert_eq!(values, vec![(b.as_str(), 10), (shared.as_str(), 5), (a.as_str(), 1)]);
    }

    #[test]
    fn neutral_source_is_skipped() {
        let desc = TransactionDescriptor::new()
            .with("source", FieldValue::Address(NEUTRAL_ACCOUNT.to_string()));
        assert!(source_addresses(&desc, &SessionConfig::default()).is_empty());

        let config = SessionConfig::default().with_source(&key(4));
        assert_eq!(source_addresses(&TransactionDescriptor::new(), &config), vec![key(4)]);
    }

    #[tokio::test]
    async fn key_signatures_are_verified() {
        let keypair = Keypair::from_seed(&[7; 32]);
        let other = Keypair::from_seed(&[8; 32]);
        let tx = Transaction {
            source_account: AccountId::from_strkey(&keypair.account_id()).unwrap(),
            fee: 100,
            seq_num: 1,
            time_bounds: None,
            memo: Memo::None,
            operations: vec![Operation {
                source_account: None,
                body: OperationBody::Inflation,
            }],
        };
        let mut envelope = TransactionEnvelope::unsigned(tx);
        envelope
            .signatures
            .push(keypair.sign_decorated(&envelope.tx.hash(TESTNET_PASSPHRASE)));

        let hash = hex::encode([9u8; 32]);
        let resolver = Resolver::new(Arc::new(
            MemoryNetwork::new(TESTNET_PASSPHRASE).with_accepted(&hash),
        ));
        let signers = vec![
            SignerRecord {
                weight: 1,
                kind: SignerType::Key,
                value: keypair.account_id(),
            },
            SignerRecord {
                weight: 1,
                kind: SignerType::Key,
                value: other.account_id(),
            },
            SignerRecord {
                weight: 1,
                kind: SignerType::Tx,
                value: hash,
            },
            SignerRecord {
                weight: 1,
                kind: SignerType::Hash,
                value: hex::encode([1u8; 32]),
            },
        ];
        let statuses = signer_statuses(&signers, &envelope, &resolver).await.unwrap();
        let signed: Vec<bool> = statuses.iter().map(|s| s.signed).collect();
        assert_eq!(signed, vec![true, false, true, false]);
    }
}
