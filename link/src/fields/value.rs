//! Field values.
//!
//! A [`FieldValue`] is the decoded, network-agnostic form of one descriptor
//! field. Values are plain data: resolving addresses or converting amounts to
//! stroops happens only at construction time.

use std::fmt;

use base64::{engine::general_purpose, Engine as _};

/// Code of the native asset.
pub const NATIVE_CODE: &str = "XLM";

/// An asset as written in a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetValue {
    pub code: String,
    /// Issuer address. `None` only for the native asset.
    pub issuer: Option<String>,
}

impl AssetValue {
    /// The native asset.
    pub fn native() -> Self {
        Self {
            code: NATIVE_CODE.to_string(),
            issuer: None,
        }
    }

    /// A credit asset.
    pub fn credit(code: &str, issuer: &str) -> Self {
        Self {
            code: code.to_string(),
            issuer: Some(issuer.to_string()),
        }
    }

    pub fn is_native(&self) -> bool {
        self.issuer.is_none()
    }
}

/// Memo variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoType {
    Text,
    Id,
    Hash,
    Return,
}

impl MemoType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Id => "id",
            Self::Hash => "hash",
            Self::Return => "return",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "text" => Some(Self::Text),
            "id" => Some(Self::Id),
            "hash" => Some(Self::Hash),
            "return" => Some(Self::Return),
            _ => None,
        }
    }
}

/// A memo. `value` is the text, the decimal id, or 64 hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemoValue {
    pub kind: MemoType,
    pub value: String,
}

impl MemoValue {
    pub fn new(kind: MemoType, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    /// A memo as federation records and `pay` links carry it: hash and
    /// return values are base64 there. A value that is not 32 base64 bytes
    /// is kept as given, so hex still works and anything else fails the
    /// memo check.
    pub fn from_wire(kind: MemoType, value: &str) -> Self {
        let value = match kind {
            MemoType::Hash | MemoType::Return => general_purpose::STANDARD
                .decode(value)
                .ok()
                .filter(|bytes| bytes.len() == 32)
                .map(hex::encode)
                .unwrap_or_else(|| value.to_string()),
            MemoType::Text | MemoType::Id => value.to_string(),
        };
        Self::new(kind, value)
    }
}

impl fmt::Display for MemoValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.name(), self.value)
    }
}

/// Signer variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SignerType {
    /// Ed25519 public key, written as a `G...` strkey.
    Key,
    /// Hash preimage signer, written as hex.
    Hash,
    /// Pre-authorized transaction, written as the hex transaction hash.
    Tx,
}

impl SignerType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Key => "key",
            Self::Hash => "hash",
            Self::Tx => "tx",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "key" => Some(Self::Key),
            "hash" => Some(Self::Hash),
            "tx" => Some(Self::Tx),
            _ => None,
        }
    }
}

/// A signer as written in a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignerValue {
    pub weight: u64,
    pub kind: SignerType,
    pub value: String,
}

/// Representation of a buffer's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Text,
    Base64,
}

impl BufferKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Base64 => "base64",
        }
    }
}

/// Data entry contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BufferValue {
    pub kind: BufferKind,
    pub value: String,
}

/// A price: an exact fraction, or a decimal kept verbatim until it is
/// approximated at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PriceValue {
    Fraction { n: i64, d: i64 },
    Decimal(String),
}

/// Decoded value of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Address(String),
    /// Canonical decimal string.
    Amount(String),
    Asset(AssetValue),
    AssetPath(Vec<AssetValue>),
    Boolean(bool),
    Buffer(BufferValue),
    /// Unix timestamp in seconds.
    Date(i64),
    /// Weights, thresholds, flags, fee, sequence numbers and ids.
    Integer(u64),
    Memo(MemoValue),
    Price(PriceValue),
    Signer(SignerValue),
    /// Strings, URLs, network names and asset codes.
    Text(String),
    /// Explicitly empty: deletes a data entry.
    Null,
    /// A field that failed to decode, kept with its raw form.
    Invalid { raw: String, error: String },
}

impl FieldValue {
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid { .. })
    }

    pub fn as_asset(&self) -> Option<&AssetValue> {
        match self {
            Self::Asset(asset) => Some(asset),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Address(s) | Self::Amount(s) | Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_memo(&self) -> Option<&MemoValue> {
        match self {
            Self::Memo(memo) => Some(memo),
            _ => None,
        }
    }
}
