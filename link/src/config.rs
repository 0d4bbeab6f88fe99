//! # Protocol Constants & Session Configuration
//!
//! Every magic number the codec relies on lives here: network passphrases,
//! default Horizon endpoints, the stroop scale, protocol field limits and the
//! neutral placeholder account. Changing any of them changes what a given
//! query or envelope means, so treat them as part of the wire format.
//!
//! [`SessionConfig`] is the explicit per-session configuration passed into
//! every entry point. There is no global default object: a caller that wants
//! different defaults builds a different config.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorPolicy, LinkError};

// ---------------------------------------------------------------------------
// Network Identifiers
// ---------------------------------------------------------------------------

/// Passphrase of the public Stellar network.
pub const PUBLIC_PASSPHRASE: &str = "Public Global Stellar Network ; September 2015";

/// Passphrase of the SDF test network.
pub const TESTNET_PASSPHRASE: &str = "Test SDF Network ; September 2015";

/// Default Horizon endpoint for the public network.
pub const PUBLIC_HORIZON: &str = "https://horizon.stellar.org";

/// Default Horizon endpoint for the test network.
pub const TESTNET_HORIZON: &str = "https://horizon-testnet.stellar.org";

/// Short network name accepted in the `network` field for the public network.
pub const PUBLIC_NETWORK: &str = "public";

/// Short network name accepted in the `network` field for the test network.
pub const TESTNET_NETWORK: &str = "test";

// ---------------------------------------------------------------------------
// Amounts & Fees
// ---------------------------------------------------------------------------

/// Number of stroops in one unit of any asset.
pub const STROOPS_PER_UNIT: i64 = 10_000_000;

/// Decimal places of an amount.
pub const AMOUNT_DECIMALS: usize = 7;

/// Base fee per operation, in stroops. Also the implicit default used when
/// a descriptor omits `fee`.
pub const BASE_FEE: u32 = 100;

/// Largest representable amount (`i64::MAX` stroops). This is the implicit
/// trustline limit.
pub const MAX_AMOUNT: &str = "922337203685.4775807";

// ---------------------------------------------------------------------------
// Protocol Limits
// ---------------------------------------------------------------------------

/// Maximum number of operations in one transaction.
pub const MAX_OPERATIONS: usize = 100;

/// Maximum number of decorated signatures on an envelope.
pub const MAX_SIGNATURES: usize = 20;

/// Maximum length of a text memo, in bytes.
pub const MEMO_TEXT_MAX: usize = 28;

/// Maximum length of a data entry name, in bytes.
pub const DATA_NAME_MAX: usize = 64;

/// Maximum length of a data entry value, in bytes.
pub const DATA_VALUE_MAX: usize = 64;

/// Maximum length of a home domain, in bytes.
pub const HOME_DOMAIN_MAX: usize = 32;

/// Maximum number of hops in a path payment path.
pub const MAX_PATH_LENGTH: usize = 5;

/// Largest value of `setFlags` / `clearFlags` (all three account flags).
pub const MAX_FLAGS: u64 = 7;

/// Largest signer weight or threshold.
pub const MAX_WEIGHT: u64 = 255;

// ---------------------------------------------------------------------------
// Neutral Account
// ---------------------------------------------------------------------------

/// Placeholder source used for source-agnostic templates: the all-zero
/// ed25519 key.
pub const NEUTRAL_ACCOUNT: &str = "GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWHF";

/// Sequence number paired with [`NEUTRAL_ACCOUNT`].
pub const NEUTRAL_SEQUENCE: i64 = 0;

// ---------------------------------------------------------------------------
// Link Formats
// ---------------------------------------------------------------------------

/// SEP-7 URI scheme, including the colon.
pub const SEP7_SCHEME: &str = "web+stellar:";

/// Default page prepended to a query to form a full URI.
pub const DEFAULT_BASE_URL: &str = "https://cosmic.link/";

/// Marker used as the first query token of a multi-operation query.
pub const MULTI_OPERATION_MARKER: &str = "transaction";

// ---------------------------------------------------------------------------
// Utility
// ---------------------------------------------------------------------------

/// Returns the passphrase for a `network` field value. Short names map to
/// their passphrases, anything else is taken to be a passphrase already.
pub fn passphrase_for(network: &str) -> &str {
    match network {
        PUBLIC_NETWORK => PUBLIC_PASSPHRASE,
        TESTNET_NETWORK => TESTNET_PASSPHRASE,
        other => other,
    }
}

/// Returns the short name for a passphrase, if it has one.
pub fn network_name(passphrase: &str) -> Option<&'static str> {
    match passphrase {
        PUBLIC_PASSPHRASE => Some(PUBLIC_NETWORK),
        TESTNET_PASSPHRASE => Some(TESTNET_NETWORK),
        _ => None,
    }
}

/// Returns the default Horizon endpoint for a network. Custom networks have
/// none and must be given one explicitly.
pub fn horizon_for(network: &str) -> Option<&'static str> {
    match passphrase_for(network) {
        PUBLIC_PASSPHRASE => Some(PUBLIC_HORIZON),
        TESTNET_PASSPHRASE => Some(TESTNET_HORIZON),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration of one conversion session.
///
/// Passed explicitly to [`crate::link::TxLink`] and through it to the
/// builder, flattener and parser. Fields not set in a descriptor fall back
/// to these values, never to process-wide state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    /// Network name (`public`, `test`) or passphrase.
    pub network: String,

    /// Horizon endpoint override. `None` uses the network default.
    pub horizon: Option<String>,

    /// Default transaction source when a descriptor has none.
    pub source: Option<String>,

    /// Page prefixed to the query to form the `uri` format.
    pub base_url: String,

    /// Drop signatures when flattening an envelope into a descriptor.
    pub strip_signatures: bool,

    /// Whether soft problems accumulate or abort parsing.
    pub error_policy: ErrorPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            network: PUBLIC_NETWORK.to_string(),
            horizon: None,
            source: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            strip_signatures: false,
            error_policy: ErrorPolicy::Accumulate,
        }
    }
}

impl SessionConfig {
    /// Config targeting the test network.
    pub fn testnet() -> Self {
        Self {
            network: TESTNET_NETWORK.to_string(),
            ..Self::default()
        }
    }

    /// Builds a config from `TXLINK_NETWORK`, `TXLINK_HORIZON` and
    /// `TXLINK_SOURCE`, falling back to [`Default`] for unset variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(network) = std::env::var("TXLINK_NETWORK") {
            config.network = network;
        }
        config.horizon = std::env::var("TXLINK_HORIZON").ok().or(config.horizon);
        config.source = std::env::var("TXLINK_SOURCE").ok().or(config.source);
        config
    }

    /// Sets the network.
    pub fn with_network(mut self, network: &str) -> Self {
        self.network = network.to_string();
        self
    }

    /// Sets the default source account.
    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    /// Sets the error policy.
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// Passphrase of the configured network.
    pub fn passphrase(&self) -> &str {
        passphrase_for(&self.network)
    }

    /// Horizon endpoint for the configured network.
    ///
    /// Fails with [`LinkError::InvalidNetwork`] for a custom passphrase
    /// without an explicit endpoint.
    pub fn horizon_url(&self) -> Result<String, LinkError> {
        if let Some(horizon) = &self.horizon {
            return Ok(horizon.trim_end_matches('/').to_string());
        }
        horizon_for(&self.network)
            .map(str::to_string)
            .ok_or_else(|| {
                LinkError::InvalidNetwork(format!("no horizon node defined for network '{}'", self.network))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_names_map_to_passphrases() {
        assert_eq!(passphrase_for("public"), PUBLIC_PASSPHRASE);
        assert_eq!(passphrase_for("test"), TESTNET_PASSPHRASE);
        assert_eq!(passphrase_for("My Network"), "My Network");
    }

    #[test]
    fn test_network_name_roundtrip() {
        assert_eq!(network_name(PUBLIC_PASSPHRASE), Some("public"));
        assert_eq!(network_name(TESTNET_PASSPHRASE), Some("test"));
        assert_eq!(network_name("private"), None);
    }

    #[test]
    fn test_custom_network_requires_horizon() {
        let config = SessionConfig::default().with_network("Private Net");
        assert!(matches!(config.horizon_url(), Err(LinkError::InvalidNetwork(_))));

        let config = SessionConfig {
            horizon: Some("https://horizon.example.org/".into()),
            ..config
        };
        assert_eq!(config.horizon_url().unwrap(), "https://horizon.example.org");
    }

    #[test]
    fn test_default_config_targets_public() {
        let config = SessionConfig::default();
        assert_eq!(config.passphrase(), PUBLIC_PASSPHRASE);
        assert_eq!(config.horizon_url().unwrap(), PUBLIC_HORIZON);
        assert_eq!(SessionConfig::testnet().horizon_url().unwrap(), TESTNET_HORIZON);
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: SessionConfig = serde_json::from_str(r#"{"network":"test"}"#).unwrap();
        assert_eq!(config.network, "test");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.error_policy, ErrorPolicy::Accumulate);
    }

    #[test]
    fn test_max_amount_matches_i64() {
        let (whole, frac) = MAX_AMOUNT.split_once('.').unwrap();
        let stroops: i64 = format!("{}{}", whole, frac).parse().unwrap();
        assert_eq!(stroops, i64::MAX);
    }
}
