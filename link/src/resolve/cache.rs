//! Session-scoped resolution caches.
//!
//! Every lookup is stored as a shared future the moment it starts, so
//! concurrent callers asking for the same key await one network request.
//! Entries are only ever inserted; a failed lookup stays failed for the
//! rest of the session.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::OnceCell;
use tracing::debug;

use super::network::{AccountSnapshot, LedgerNetwork, ResolvedAccount};
use crate::crypto::strkey;
use crate::error::LinkError;

type Lookup<T> = Shared<BoxFuture<'static, Result<Arc<T>, LinkError>>>;

/// Memoizing front of a [`LedgerNetwork`].
pub struct Resolver {
    network: Arc<dyn LedgerNetwork>,
    addresses: DashMap<String, Lookup<ResolvedAccount>>,
    accounts: DashMap<String, Lookup<AccountSnapshot>>,
    base_fee: OnceCell<Result<u32, LinkError>>,
}

impl Resolver {
    pub fn new(network: Arc<dyn LedgerNetwork>) -> Self {
        Self {
            network,
            addresses: DashMap::new(),
            accounts: DashMap::new(),
            base_fee: OnceCell::new(),
        }
    }

    /// The wrapped network.
    pub fn network(&self) -> &Arc<dyn LedgerNetwork> {
        &self.network
    }

    /// Resolves an account id or a `name*domain` address.
    ///
    /// Account ids resolve immediately without touching the cache.
    pub async fn resolve_address(&self, address: &str) -> Result<Arc<ResolvedAccount>, LinkError> {
        if strkey::is_account_id(address) {
            return Ok(Arc::new(ResolvedAccount::direct(address)));
        }
        if !address.contains('*') {
            return Err(LinkError::UnresolvedAddress {
                address: address.to_string(),
                reason: "neither an account id nor a federated address".to_string(),
            });
        }

        // The map guard is dropped at the end of this statement, before the
        // lookup is awaited.
        let lookup = self
            .addresses
            .entry(address.to_string())
            .or_insert_with(|| {
                let network = Arc::clone(&self.network);
                let address = address.to_string();
                async move {
                    debug!(%address, "resolving federated address");
                    network.resolve_federation(&address).await.map(Arc::new)
                }
                .boxed()
                .shared()
            })
            .value()
            .clone();
        lookup.await
    }

    /// Loads an account snapshot, once per account id.
    pub async fn load_account(&self, account_id: &str) -> Result<Arc<AccountSnapshot>, LinkError> {
        let lookup = self
            .accounts
            .entry(account_id.to_string())
            .or_insert_with(|| {
                let network = Arc::clone(&self.network);
                let account_id = account_id.to_string();
                async move { network.load_account(&account_id).await.map(Arc::new) }
                    .boxed()
                    .shared()
            })
            .value()
            .clone();
        lookup.await
    }

    /// Network base fee, fetched once per session.
    pub async fn base_fee(&self) -> Result<u32, LinkError> {
        self.base_fee
            .get_or_init(|| async {
                let fee = self.network.base_fee().await;
                debug!(?fee, "fetched base fee");
                fee
            })
            .await
            .clone()
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("passphrase", &self.network.passphrase())
            .field("addresses", &self.addresses.len())
            .field("accounts", &self.accounts.len())
            .finish()
    }
}
