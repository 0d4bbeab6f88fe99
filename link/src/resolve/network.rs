//! The network seam.
//!
//! Everything the codec needs from the outside world goes through
//! [`LedgerNetwork`]: federation lookups, account snapshots, the base fee,
//! transaction lookups and submission. [`super::HorizonClient`] implements it
//! over HTTP; tests substitute an in-memory implementation.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::LinkError;
use crate::fields::{MemoValue, SignerType};

/// Result of resolving an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAccount {
    /// `G...` account id.
    pub account_id: String,
    /// The federated address it was resolved from, if any.
    pub address: Option<String>,
    /// Memo the destination requires on incoming payments.
    pub memo: Option<MemoValue>,
}

impl ResolvedAccount {
    /// An account id that needs no lookup.
    pub fn direct(account_id: &str) -> Self {
        Self {
            account_id: account_id.to_string(),
            address: None,
            memo: None,
        }
    }
}

/// One signer of an account, or of a transaction's signer set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignerRecord {
    pub weight: u32,
    pub kind: SignerType,
    /// `G...` key for key signers, lowercase hex for hash and tx signers.
    pub value: String,
}

/// Account thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct Thresholds {
    #[serde(rename = "low_threshold")]
    pub low: u8,
    #[serde(rename = "med_threshold")]
    pub med: u8,
    #[serde(rename = "high_threshold")]
    pub high: u8,
}

/// Ledger state of one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub id: String,
    /// Current sequence number. The next transaction uses `sequence + 1`.
    pub sequence: i64,
    pub signers: Vec<SignerRecord>,
    pub thresholds: Thresholds,
}

/// Outcome of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubmitResult {
    pub hash: String,
    #[serde(default)]
    pub ledger: Option<u64>,
}

/// Network services a conversion session depends on.
#[async_trait]
pub trait LedgerNetwork: Send + Sync {
    /// Passphrase of the network this service talks to.
    fn passphrase(&self) -> &str;

    /// Resolves a `name*domain` address.
    async fn resolve_federation(&self, address: &str) -> Result<ResolvedAccount, LinkError>;

    /// Loads the current state of an account.
    async fn load_account(&self, account_id: &str) -> Result<AccountSnapshot, LinkError>;

    /// Current base fee per operation, in stroops.
    async fn base_fee(&self) -> Result<u32, LinkError>;

    /// Returns `true` when a transaction with this hex hash was accepted.
    async fn transaction_exists(&self, hash: &str) -> Result<bool, LinkError>;

    /// Submits a base64 envelope.
    async fn submit(&self, envelope: &str) -> Result<SubmitResult, LinkError>;
}
