//! # SEP-7 Deep Links
//!
//! `web+stellar:` URIs in their two flavours:
//!
//! ```text
//! web+stellar:tx?xdr=<envelope>&callback=url:<url>&network_passphrase=<passphrase>
//! web+stellar:pay?destination=<address>&amount=<amount>&asset_code=USD&asset_issuer=G...&memo=42&memo_type=MEMO_ID
//! ```
//!
//! `msg`, `origin_domain`, `signature`, `pubkey` and `chain` are accepted
//! and ignored. Any other unknown parameter rejects the link.

use std::fmt;

use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};

use crate::config::{PUBLIC_PASSPHRASE, SEP7_SCHEME};
use crate::descriptor::TransactionDescriptor;
use crate::error::{ErrorPolicy, LinkError, Parsed};
use crate::fields::{MemoType, MemoValue};
use crate::query::parse_query;
use crate::xdr::TransactionEnvelope;

/// Parameters carried for display or verification only.
const IGNORED: &[&str] = &["msg", "origin_domain", "signature", "pubkey", "chain"];

const CALLBACK_PREFIX: &str = "url:";

fn invalid(reason: impl Into<String>) -> LinkError {
    LinkError::InvalidDeepLink(reason.into())
}

fn escape(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

/// Splits `a=1&b=2` into decoded pairs.
fn parameters(query: &str) -> Result<Vec<(String, String)>, LinkError> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = percent_decode_str(value)
                .decode_utf8()
                .map_err(|_| invalid(format!("parameter '{}' is not valid UTF-8", key)))?;
            Ok((key.to_string(), value.into_owned()))
        })
        .collect()
}

fn memo_type(name: &str) -> Result<MemoType, LinkError> {
    match name {
        "MEMO_TEXT" => Ok(MemoType::Text),
        "MEMO_ID" => Ok(MemoType::Id),
        "MEMO_HASH" => Ok(MemoType::Hash),
        "MEMO_RETURN" => Ok(MemoType::Return),
        other => Err(invalid(format!("unknown memo_type '{}'", other))),
    }
}

fn memo_type_name(kind: MemoType) -> &'static str {
    match kind {
        MemoType::Text => "MEMO_TEXT",
        MemoType::Id => "MEMO_ID",
        MemoType::Hash => "MEMO_HASH",
        MemoType::Return => "MEMO_RETURN",
    }
}

// ---------------------------------------------------------------------------
// tx
// ---------------------------------------------------------------------------

/// A `tx` link: an envelope to sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub envelope: TransactionEnvelope,
    /// Where to post the signed envelope, without the `url:` prefix.
    pub callback: Option<String>,
    /// Absent means the public network.
    pub network_passphrase: Option<String>,
}

impl TxRequest {
    /// Passphrase the envelope is meant for.
    pub fn passphrase(&self) -> &str {
        self.network_passphrase.as_deref().unwrap_or(PUBLIC_PASSPHRASE)
    }

    fn parse(params: Vec<(String, String)>) -> Result<Self, LinkError> {
        let mut envelope = None;
        let mut callback = None;
        let mut network_passphrase = None;
        for (key, value) in params {
            match key.as_str() {
                "xdr" => envelope = Some(TransactionEnvelope::from_base64(&value)?),
                "callback" => {
                    let url = value
                        .strip_prefix(CALLBACK_PREFIX)
                        .ok_or_else(|| invalid("callback must start with 'url:'"))?;
                    callback = Some(url.to_string());
                }
                "network_passphrase" => network_passphrase = Some(value),
                _ if IGNORED.contains(&key.as_str()) => {}
                other => return Err(invalid(format!("unknown tx parameter '{}'", other))),
            }
        }
        Ok(Self {
            envelope: envelope.ok_or_else(|| invalid("tx link without xdr"))?,
            callback,
            network_passphrase,
        })
    }
}

impl fmt::Display for TxRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}tx?xdr={}", SEP7_SCHEME, escape(&self.envelope.to_base64()))?;
        if let Some(callback) = &self.callback {
            write!(f, "&callback={}", escape(&format!("{}{}", CALLBACK_PREFIX, callback)))?;
        }
        if let Some(passphrase) = &self.network_passphrase {
            write!(f, "&network_passphrase={}", escape(passphrase))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// pay
// ---------------------------------------------------------------------------

/// A `pay` link: a payment request without an envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentRequest {
    pub destination: String,
    pub amount: Option<String>,
    pub asset_code: Option<String>,
    pub asset_issuer: Option<String>,
    pub memo: Option<String>,
    pub memo_type: Option<MemoType>,
    pub callback: Option<String>,
    pub network_passphrase: Option<String>,
}

impl PaymentRequest {
    fn parse(params: Vec<(String, String)>) -> Result<Self, LinkError> {
        let mut request = Self::default();
        let mut destination = None;
        for (key, value) in params {
            match key.as_str() {
                "destination" => destination = Some(value),
                "amount" => request.amount = Some(value),
                "asset_code" => request.asset_code = Some(value),
                "asset_issuer" => request.asset_issuer = Some(value),
                "memo" => request.memo = Some(value),
                "memo_type" => request.memo_type = Some(memo_type(&value)?),
                "callback" => {
                    let url = value
                        .strip_prefix(CALLBACK_PREFIX)
                        .ok_or_else(|| invalid("callback must start with 'url:'"))?;
                    request.callback = Some(url.to_string());
                }
                "network_passphrase" => request.network_passphrase = Some(value),
                _ if IGNORED.contains(&key.as_str()) => {}
                other => return Err(invalid(format!("unknown pay parameter '{}'", other))),
            }
        }
        request.destination = destination.ok_or_else(|| invalid("pay link without destination"))?;
        Ok(request)
    }

    /// The equivalent single-payment query.
    pub fn to_query(&self) -> String {
        let mut query = format!("?payment&destination={}", escape(&self.destination));
        if let Some(amount) = &self.amount {
            query.push_str(&format!("&amount={}", escape(amount)));
        }
        match (&self.asset_code, &self.asset_issuer) {
            (Some(code), Some(issuer)) => {
                query.push_str(&format!("&asset={}", escape(&format!("{}:{}", code, issuer))));
            }
            (Some(code), None) => query.push_str(&format!("&asset={}", escape(code))),
            _ => {}
        }
        if let Some(memo) = &self.memo {
            let memo = MemoValue::from_wire(self.memo_type.unwrap_or(MemoType::Text), memo);
            query.push_str(&format!("&memo={}", escape(&memo.to_string())));
        }
        if let Some(callback) = &self.callback {
            query.push_str(&format!("&callback={}", escape(callback)));
        }
        if let Some(passphrase) = &self.network_passphrase {
            query.push_str(&format!("&network={}", escape(passphrase)));
        }
        query
    }

    /// Decodes the request into a descriptor, reporting bad values as
    /// diagnostics like any parsed query.
    pub fn to_descriptor(&self, policy: ErrorPolicy) -> Result<Parsed<TransactionDescriptor>, LinkError> {
        parse_query(&self.to_query(), policy)
    }
}

impl fmt::Display for PaymentRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}pay?destination={}", SEP7_SCHEME, escape(&self.destination))?;
        let optional = [
            ("amount", self.amount.clone()),
            ("asset_code", self.asset_code.clone()),
            ("asset_issuer", self.asset_issuer.clone()),
            ("memo", self.memo.clone()),
            ("memo_type", self.memo_type.map(|kind| memo_type_name(kind).to_string())),
            ("callback", self.callback.as_ref().map(|url| format!("{}{}", CALLBACK_PREFIX, url))),
            ("network_passphrase", self.network_passphrase.clone()),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                write!(f, "&{}={}", key, escape(&value))?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DeepLink
// ---------------------------------------------------------------------------

/// A parsed `web+stellar:` link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeepLink {
    Tx(TxRequest),
    Pay(PaymentRequest),
}

impl DeepLink {
    /// Parses a `web+stellar:` URI.
    pub fn parse(link: &str) -> Result<Self, LinkError> {
        let rest = link
            .trim()
            .strip_prefix(SEP7_SCHEME)
            .ok_or_else(|| invalid(format!("missing '{}' scheme", SEP7_SCHEME)))?;
        let (operation, query) = rest.split_once('?').unwrap_or((rest, ""));
        let params = parameters(query)?;
        match operation {
            "tx" => TxRequest::parse(params).map(Self::Tx),
            "pay" => PaymentRequest::parse(params).map(Self::Pay),
            other => Err(invalid(format!("unknown operation '{}'", other))),
        }
    }
}

impl fmt::Display for DeepLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tx(request) => fmt::Display::fmt(request, f),
            Self::Pay(request) => fmt::Display::fmt(request, f),
        }
    }
}
