//! # Type Registry
//!
//! Maps every transaction and operation field name to exactly one semantic
//! [`FieldType`], and every operation type to its mandatory and optional
//! field sets. All codec families dispatch on these tables.

use std::fmt;

use crate::error::CodecError;

// ---------------------------------------------------------------------------
// FieldType
// ---------------------------------------------------------------------------

/// Semantic type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Account strkey or federated `name*domain` address.
    Address,
    /// Decimal amount with at most seven decimals.
    Amount,
    /// Native or credit asset.
    Asset,
    /// Bare asset code (1-12 alphanumerics).
    AssetCode,
    /// Ordered list of intermediate assets.
    AssetPath,
    Boolean,
    /// Data entry value: text or binary.
    Buffer,
    /// Unix timestamp, written as ISO-8601.
    Date,
    /// Total fee in stroops.
    Fee,
    /// Account flags bitmask.
    Flags,
    /// Offer id.
    Id,
    Memo,
    /// Network name or passphrase.
    Network,
    Price,
    Sequence,
    Signer,
    /// UTF-8 string bounded to the given number of bytes.
    String(usize),
    Threshold,
    Url,
    Weight,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Address => "address",
            Self::Amount => "amount",
            Self::Asset => "asset",
            Self::AssetCode => "asset code",
            Self::AssetPath => "asset path",
            Self::Boolean => "boolean",
            Self::Buffer => "buffer",
            Self::Date => "date",
            Self::Fee => "fee",
            Self::Flags => "flags",
            Self::Id => "id",
            Self::Memo => "memo",
            Self::Network => "network",
            Self::Price => "price",
            Self::Sequence => "sequence",
            Self::Signer => "signer",
            Self::String(_) => "string",
            Self::Threshold => "threshold",
            Self::Url => "url",
            Self::Weight => "weight",
        };
        f.write_str(name)
    }
}

/// Looks up the type of a field by name.
pub fn field_type(name: &str) -> Result<FieldType, CodecError> {
    let ty = match name {
        "network" => FieldType::Network,
        "horizon" | "callback" => FieldType::Url,
        "memo" => FieldType::Memo,
        "source" | "destination" | "trustor" | "inflationDest" => FieldType::Address,
        "sequence" | "bumpTo" => FieldType::Sequence,
        "minTime" | "maxTime" => FieldType::Date,
        "fee" => FieldType::Fee,
        "amount" | "buyAmount" | "destAmount" | "destMin" | "limit" | "sendAmount"
        | "sendMax" | "startingBalance" => FieldType::Amount,
        "asset" | "buying" | "selling" | "sendAsset" | "destAsset" => FieldType::Asset,
        "path" => FieldType::AssetPath,
        "assetCode" => FieldType::AssetCode,
        "authorize" => FieldType::Boolean,
        "clearFlags" | "setFlags" => FieldType::Flags,
        "masterWeight" => FieldType::Weight,
        "lowThreshold" | "medThreshold" | "highThreshold" => FieldType::Threshold,
        "homeDomain" => FieldType::String(crate::config::HOME_DOMAIN_MAX),
        "name" => FieldType::String(crate::config::DATA_NAME_MAX),
        "offerId" => FieldType::Id,
        "price" => FieldType::Price,
        "signer" => FieldType::Signer,
        "value" => FieldType::Buffer,
        other => return Err(CodecError::UnknownField(other.to_string())),
    };
    Ok(ty)
}

// ---------------------------------------------------------------------------
// Transaction fields
// ---------------------------------------------------------------------------

/// Transaction-level fields in canonical order.
pub const TRANSACTION_FIELDS: &[&str] = &[
    "network", "horizon", "callback", "memo", "source", "sequence", "minTime", "maxTime", "fee",
];

/// Returns `true` for a transaction-level field name.
pub fn is_transaction_field(name: &str) -> bool {
    TRANSACTION_FIELDS.contains(&name)
}

// ---------------------------------------------------------------------------
// OperationType
// ---------------------------------------------------------------------------

/// The closed set of supported operation types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationType {
    AccountMerge,
    AllowTrust,
    BumpSequence,
    ChangeTrust,
    CreateAccount,
    CreatePassiveSellOffer,
    Inflation,
    ManageBuyOffer,
    ManageData,
    ManageSellOffer,
    PathPaymentStrictReceive,
    PathPaymentStrictSend,
    Payment,
    SetOptions,
}

impl OperationType {
    /// Every supported type, alphabetically.
    pub const ALL: [OperationType; 14] = [
        Self::AccountMerge,
        Self::AllowTrust,
        Self::BumpSequence,
        Self::ChangeTrust,
        Self::CreateAccount,
        Self::CreatePassiveSellOffer,
        Self::Inflation,
        Self::ManageBuyOffer,
        Self::ManageData,
        Self::ManageSellOffer,
        Self::PathPaymentStrictReceive,
        Self::PathPaymentStrictSend,
        Self::Payment,
        Self::SetOptions,
    ];

    /// Canonical name as used in queries and JSON.
    pub fn name(self) -> &'static str {
        match self {
            Self::AccountMerge => "accountMerge",
            Self::AllowTrust => "allowTrust",
            Self::BumpSequence => "bumpSequence",
            Self::ChangeTrust => "changeTrust",
            Self::CreateAccount => "createAccount",
            Self::CreatePassiveSellOffer => "createPassiveSellOffer",
            Self::Inflation => "inflation",
            Self::ManageBuyOffer => "manageBuyOffer",
            Self::ManageData => "manageData",
            Self::ManageSellOffer => "manageSellOffer",
            Self::PathPaymentStrictReceive => "pathPaymentStrictReceive",
            Self::PathPaymentStrictSend => "pathPaymentStrictSend",
            Self::Payment => "payment",
            Self::SetOptions => "setOptions",
        }
    }

    /// Parses a canonical name or a legacy alias.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "manageOffer" => return Some(Self::ManageSellOffer),
            "createPassiveOffer" => return Some(Self::CreatePassiveSellOffer),
            "pathPayment" => return Some(Self::PathPaymentStrictReceive),
            _ => {}
        }
        Self::ALL.iter().copied().find(|t| t.name() == name)
    }

    /// Fields that must be present, in canonical order.
    pub fn mandatory_fields(self) -> &'static [&'static str] {
        match self {
            Self::AccountMerge => &["destination"],
            Self::AllowTrust => &["trustor", "assetCode"],
            Self::BumpSequence => &["bumpTo"],
            Self::ChangeTrust => &["asset"],
            Self::CreateAccount => &["destination", "startingBalance"],
            Self::CreatePassiveSellOffer => &["selling", "buying", "amount", "price"],
            Self::Inflation => &[],
            Self::ManageBuyOffer => &["selling", "buying", "buyAmount", "price"],
            Self::ManageData => &["name", "value"],
            Self::ManageSellOffer => &["selling", "buying", "amount", "price"],
            Self::PathPaymentStrictReceive => {
                &["sendAsset", "sendMax", "destination", "destAsset", "destAmount"]
            }
            Self::PathPaymentStrictSend => {
                &["sendAsset", "sendAmount", "destination", "destAsset", "destMin"]
            }
            Self::Payment => &["destination", "amount", "asset"],
            Self::SetOptions => &[],
        }
    }

    /// Fields that may be present, in canonical order. `source` is accepted
    /// on every operation and comes last.
    pub fn optional_fields(self) -> &'static [&'static str] {
        match self {
            Self::AllowTrust => &["authorize", "source"],
            Self::ChangeTrust => &["limit", "source"],
            Self::ManageBuyOffer | Self::ManageSellOffer => &["offerId", "source"],
            Self::PathPaymentStrictReceive | Self::PathPaymentStrictSend => &["path", "source"],
            Self::SetOptions => &[
                "inflationDest",
                "clearFlags",
                "setFlags",
                "masterWeight",
                "lowThreshold",
                "medThreshold",
                "highThreshold",
                "signer",
                "homeDomain",
                "source",
            ],
            _ => &["source"],
        }
    }

    /// Returns `true` when `field` belongs to this operation type.
    pub fn accepts(self, field: &str) -> bool {
        self.mandatory_fields().contains(&field) || self.optional_fields().contains(&field)
    }

    /// Mandatory then optional fields: the canonical emission order.
    pub fn canonical_fields(self) -> impl Iterator<Item = &'static str> {
        self.mandatory_fields()
            .iter()
            .chain(self.optional_fields().iter())
            .copied()
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
