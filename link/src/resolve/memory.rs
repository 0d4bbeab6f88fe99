//! In-memory [`LedgerNetwork`].
//!
//! Serves accounts, federation records and accepted transactions from
//! maps filled up front. Used for offline conversion and in tests, where
//! its counters show how many lookups actually reached the network.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::network::{AccountSnapshot, LedgerNetwork, ResolvedAccount, SubmitResult};
use crate::config::BASE_FEE;
use crate::error::LinkError;
use crate::xdr::TransactionEnvelope;

#[derive(Debug, Default)]
pub struct MemoryNetwork {
    passphrase: String,
    base_fee: u32,
    accounts: RwLock<HashMap<String, AccountSnapshot>>,
    federation: RwLock<HashMap<String, ResolvedAccount>>,
    accepted: RwLock<HashSet<String>>,
    submitted: Mutex<Vec<String>>,
    federation_lookups: AtomicUsize,
    account_loads: AtomicUsize,
}

impl MemoryNetwork {
    /// Empty network with the default base fee.
    pub fn new(passphrase: &str) -> Self {
        Self {
            passphrase: passphrase.to_string(),
            base_fee: BASE_FEE,
            ..Self::default()
        }
    }

    pub fn with_base_fee(mut self, fee: u32) -> Self {
        self.base_fee = fee;
        self
    }

    pub fn with_account(self, account: AccountSnapshot) -> Self {
        self.accounts.write().insert(account.id.clone(), account);
        self
    }

    /// Registers a federation record for `address`.
    pub fn with_federation(self, address: &str, account: ResolvedAccount) -> Self {
        self.federation.write().insert(address.to_string(), account);
        self
    }

    /// Marks a transaction hash as accepted by the ledger.
    pub fn with_accepted(self, hash: &str) -> Self {
        self.accepted.write().insert(hash.to_lowercase());
        self
    }

    /// Number of federation requests served so far.
    pub fn federation_lookups(&self) -> usize {
        self.federation_lookups.load(Ordering::SeqCst)
    }

    /// Number of account loads served so far.
    pub fn account_loads(&self) -> usize {
        self.account_loads.load(Ordering::SeqCst)
    }

    /// Envelopes submitted so far, base64-encoded.
    pub fn submitted(&self) -> Vec<String> {
        self.submitted.lock().clone()
    }
}

#[async_trait]
impl LedgerNetwork for MemoryNetwork {
    fn passphrase(&self) -> &str {
        &self.passphrase
    }

    async fn resolve_federation(&self, address: &str) -> Result<ResolvedAccount, LinkError> {
        self.federation_lookups.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.federation
            .read()
            .get(address)
            .cloned()
            .ok_or_else(|| LinkError::UnresolvedAddress {
                address: address.to_string(),
                reason: "no federation record".to_string(),
            })
    }

    async fn load_account(&self, account_id: &str) -> Result<AccountSnapshot, LinkError> {
        self.account_loads.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.accounts
            .read()
            .get(account_id)
            .cloned()
            .ok_or_else(|| LinkError::UnresolvedAddress {
                address: account_id.to_string(),
                reason: "account does not exist".to_string(),
            })
    }

    async fn base_fee(&self) -> Result<u32, LinkError> {
        Ok(self.base_fee)
    }

    async fn transaction_exists(&self, hash: &str) -> Result<bool, LinkError> {
        Ok(self.accepted.read().contains(&hash.to_lowercase()))
    }

    async fn submit(&self, envelope: &str) -> Result<SubmitResult, LinkError> {
        let hash = TransactionEnvelope::from_base64(envelope)?.hash_hex(&self.passphrase);
        debug!(%hash, "accepting submitted transaction");
        self.submitted.lock().push(envelope.to_string());
        self.accepted.write().insert(hash.clone());
        let ledger = self.submitted.lock().len() as u64;
        Ok(SubmitResult {
            hash,
            ledger: Some(ledger),
        })
    }
}
