//! # Horizon Client
//!
//! [`LedgerNetwork`] over a Horizon HTTP server, with SEP-2 federation
//! through the domain's `stellar.toml`.
//!
//! No retries and no timeouts beyond what the `reqwest` client is built
//! with; a failure surfaces once, as [`LinkError::Network`] or
//! [`LinkError::UnresolvedAddress`].

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::network::{
    AccountSnapshot, LedgerNetwork, ResolvedAccount, SignerRecord, SubmitResult, Thresholds,
};
use crate::config::SessionConfig;
use crate::crypto::strkey::{self, Version};
use crate::error::LinkError;
use crate::fields::{MemoType, MemoValue, SignerType};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct HorizonAccount {
    id: String,
    sequence: String,
    #[serde(default)]
    signers: Vec<HorizonSigner>,
    #[serde(default)]
    thresholds: Thresholds,
}

#[derive(Debug, Deserialize)]
struct HorizonSigner {
    key: String,
    weight: u32,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct FeeStats {
    last_ledger_base_fee: String,
}

#[derive(Debug, Deserialize)]
struct FederationRecord {
    account_id: String,
    #[serde(default)]
    memo_type: Option<String>,
    #[serde(default)]
    memo: Option<serde_json::Value>,
}

impl HorizonSigner {
    /// Converts to a signer record. Signer types the codec cannot express
    /// are dropped.
    fn into_record(self) -> Option<SignerRecord> {
        let (kind, value) = match self.kind.as_str() {
            "ed25519_public_key" => (SignerType::Key, self.key),
            "preauth_tx" => (
                SignerType::Tx,
                hex::encode(strkey::decode(Version::PreAuthTx, &self.key).ok()?),
            ),
            "sha256_hash" => (
                SignerType::Hash,
                hex::encode(strkey::decode(Version::HashX, &self.key).ok()?),
            ),
            other => {
                warn!(signer_type = other, "ignoring unsupported signer type");
                return None;
            }
        };
        Some(SignerRecord {
            weight: self.weight,
            kind,
            value,
        })
    }
}

impl FederationRecord {
    fn memo(&self) -> Option<MemoValue> {
        let kind = MemoType::from_name(self.memo_type.as_deref()?)?;
        let value = match self.memo.as_ref()? {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Some(MemoValue::from_wire(kind, &value))
    }
}

/// The part of a domain's `stellar.toml` federation needs.
#[derive(Debug, Deserialize)]
struct StellarToml {
    #[serde(rename = "FEDERATION_SERVER")]
    federation_server: Option<String>,
}

/// Extracts `FEDERATION_SERVER` from a `stellar.toml` document.
fn federation_server(document: &str) -> Result<Option<String>, toml::de::Error> {
    Ok(toml::from_str::<StellarToml>(document)?.federation_server)
}

// ---------------------------------------------------------------------------
// HorizonClient
// ---------------------------------------------------------------------------

/// HTTP implementation of [`LedgerNetwork`].
#[derive(Debug, Clone)]
pub struct HorizonClient {
    http: reqwest::Client,
    horizon: String,
    passphrase: String,
}

impl HorizonClient {
    /// Client for the network and Horizon endpoint of `config`.
    pub fn new(config: &SessionConfig) -> Result<Self, LinkError> {
        Ok(Self::with_client(
            reqwest::Client::new(),
            &config.horizon_url()?,
            config.passphrase(),
        ))
    }

    /// Client over an existing `reqwest` client.
    pub fn with_client(http: reqwest::Client, horizon: &str, passphrase: &str) -> Self {
        Self {
            http,
            horizon: horizon.trim_end_matches('/').to_string(),
            passphrase: passphrase.to_string(),
        }
    }

    /// Horizon base URL.
    pub fn horizon(&self) -> &str {
        &self.horizon
    }

    fn unresolved(address: &str, reason: impl ToString) -> LinkError {
        LinkError::UnresolvedAddress {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl LedgerNetwork for HorizonClient {
    fn passphrase(&self) -> &str {
        &self.passphrase
    }

    async fn resolve_federation(&self, address: &str) -> Result<ResolvedAccount, LinkError> {
        let domain = address
            .split_once('*')
            .map(|(_, domain)| domain)
            .ok_or_else(|| Self::unresolved(address, "not a federated address"))?;

        let toml_url = format!("https://{}/.well-known/stellar.toml", domain);
        let toml = self
            .http
            .get(&toml_url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Self::unresolved(address, e))?
            .text()
            .await?;
        let server = federation_server(&toml)
            .map_err(|e| Self::unresolved(address, format!("bad stellar.toml: {}", e)))?
            .ok_or_else(|| Self::unresolved(address, "no FEDERATION_SERVER in stellar.toml"))?;

        debug!(address, %server, "federation lookup");
        let response = self
            .http
            .get(&server)
            .query(&[("q", address), ("type", "name")])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::unresolved(
                address,
                format!("federation server answered {}", response.status()),
            ));
        }
        let record: FederationRecord = response.json().await?;
        if !strkey::is_account_id(&record.account_id) {
            return Err(Self::unresolved(address, "federation returned an invalid account id"));
        }

        Ok(ResolvedAccount {
            memo: record.memo(),
            account_id: record.account_id,
            address: Some(address.to_string()),
        })
    }

    async fn load_account(&self, account_id: &str) -> Result<AccountSnapshot, LinkError> {
        let url = format!("{}/accounts/{}", self.horizon, account_id);
        debug!(account_id, "loading account");
        let response = self.http.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Self::unresolved(account_id, "account does not exist"));
        }
        let account: HorizonAccount = response.error_for_status()?.json().await?;
        let sequence = account
            .sequence
            .parse()
            .map_err(|_| LinkError::Network(format!("bad sequence '{}'", account.sequence)))?;

        Ok(AccountSnapshot {
            id: account.id,
            sequence,
            signers: account
                .signers
                .into_iter()
                .filter_map(HorizonSigner::into_record)
                .collect(),
            thresholds: account.thresholds,
        })
    }

    async fn base_fee(&self) -> Result<u32, LinkError> {
        let url = format!("{}/fee_stats", self.horizon);
        let stats: FeeStats = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        stats
            .last_ledger_base_fee
            .parse()
            .map_err(|_| LinkError::Network(format!("bad base fee '{}'", stats.last_ledger_base_fee)))
    }

    async fn transaction_exists(&self, hash: &str) -> Result<bool, LinkError> {
        let url = format!("{}/transactions/{}", self.horizon, hash);
        let response = self.http.get(&url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(LinkError::Network(format!(
                "transaction lookup answered {}",
                status
            ))),
        }
    }

    async fn submit(&self, envelope: &str) -> Result<SubmitResult, LinkError> {
        let url = format!("{}/transactions", self.horizon);
        let response = self
            .http
            .post(&url)
            .form(&[("tx", envelope)])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "submission rejected");
            return Err(LinkError::Network(format!(
                "submission rejected ({}): {}",
                status, body
            )));
        }
        let result: SubmitResult = response.json().await?;
        info!(hash = %result.hash, ledger = ?result.ledger, "transaction submitted");
        Ok(result)
    }
}
