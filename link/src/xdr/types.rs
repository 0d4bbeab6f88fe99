//! Native transaction model.
//!
//! These types mirror the ledger's XDR definitions closely enough that each
//! one encodes to exactly the bytes the network expects. Only the shapes the
//! builder and flattener need are modeled; muxed accounts and protocol
//! extensions are rejected on decode.

use std::fmt;

use super::codec::{XdrError, XdrReader, XdrResult, XdrWriter};
use crate::config::{
    DATA_NAME_MAX, DATA_VALUE_MAX, HOME_DOMAIN_MAX, MAX_OPERATIONS, MAX_PATH_LENGTH,
    MAX_SIGNATURES, MEMO_TEXT_MAX,
};
use crate::crypto::strkey::{self, StrKeyError, Version};

/// Values with a canonical XDR encoding.
pub trait XdrCodec: Sized {
    fn write_xdr(&self, w: &mut XdrWriter);
    fn read_xdr(r: &mut XdrReader<'_>) -> XdrResult<Self>;

    /// Encodes `self` into a fresh buffer.
    fn to_xdr(&self) -> Vec<u8> {
        let mut w = XdrWriter::new();
        self.write_xdr(&mut w);
        w.into_bytes()
    }

    /// Decodes a value that must span all of `bytes`.
    fn from_xdr(bytes: &[u8]) -> XdrResult<Self> {
        let mut r = XdrReader::new(bytes);
        let value = Self::read_xdr(&mut r)?;
        r.ensure_consumed()?;
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// An ed25519 account public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    /// Parses a `G...` strkey.
    pub fn from_strkey(key: &str) -> Result<Self, StrKeyError> {
        strkey::decode(Version::AccountId, key).map(Self)
    }

    /// The `G...` strkey.
    pub fn to_strkey(&self) -> String {
        strkey::encode(Version::AccountId, &self.0)
    }

    /// Signature hint for this key.
    pub fn hint(&self) -> [u8; 4] {
        let mut hint = [0u8; 4];
        hint.copy_from_slice(&self.0[28..]);
        hint
    }

    /// Writes as a `MuxedAccount` with the plain ed25519 arm.
    fn write_muxed(&self, w: &mut XdrWriter) {
        w.write_i32(KEY_TYPE_ED25519);
        w.write_fixed(&self.0);
    }

    fn read_muxed(r: &mut XdrReader<'_>) -> XdrResult<Self> {
        match r.read_i32("muxed account type")? {
            KEY_TYPE_ED25519 => Ok(Self(r.read_fixed("muxed account")?)),
            KEY_TYPE_MUXED_ED25519 => Err(XdrError::Unsupported("muxed accounts")),
            other => Err(XdrError::InvalidDiscriminant {
                field: "muxed account type",
                value: other as i64,
            }),
        }
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.to_strkey())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_strkey())
    }
}

const KEY_TYPE_ED25519: i32 = 0;
const KEY_TYPE_MUXED_ED25519: i32 = 0x100;

impl XdrCodec for AccountId {
    fn write_xdr(&self, w: &mut XdrWriter) {
        w.write_i32(KEY_TYPE_ED25519);
        w.write_fixed(&self.0);
    }

    fn read_xdr(r: &mut XdrReader<'_>) -> XdrResult<Self> {
        match r.read_i32("public key type")? {
            KEY_TYPE_ED25519 => Ok(Self(r.read_fixed("public key")?)),
            other => Err(XdrError::InvalidDiscriminant {
                field: "public key type",
                value: other as i64,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Asset & Price
// ---------------------------------------------------------------------------

/// A ledger asset. Credit codes of 1-4 characters use the alphanum4 arm,
/// 5-12 characters the alphanum12 arm.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Asset {
    Native,
    Credit { code: String, issuer: AccountId },
}

fn write_asset_code(w: &mut XdrWriter, code: &str) {
    let bytes = code.as_bytes();
    if bytes.len() <= 4 {
        let mut raw = [0u8; 4];
        raw[..bytes.len()].copy_from_slice(bytes);
        w.write_fixed(&raw);
    } else {
        let mut raw = [0u8; 12];
        let len = bytes.len().min(12);
        raw[..len].copy_from_slice(&bytes[..len]);
        w.write_fixed(&raw);
    }
}

fn trim_asset_code(raw: &[u8]) -> XdrResult<String> {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8(raw[..end].to_vec()).map_err(|_| XdrError::InvalidUtf8 {
        field: "asset code",
    })
}

fn asset_code_type(code: &str) -> i32 {
    if code.len() <= 4 {
        1
    } else {
        2
    }
}

impl XdrCodec for Asset {
    fn write_xdr(&self, w: &mut XdrWriter) {
        match self {
            Asset::Native => w.write_i32(0),
            Asset::Credit { code, issuer } => {
                w.write_i32(asset_code_type(code));
                write_asset_code(w, code);
                issuer.write_xdr(w);
            }
        }
    }

    fn read_xdr(r: &mut XdrReader<'_>) -> XdrResult<Self> {
        match r.read_i32("asset type")? {
            0 => Ok(Asset::Native),
            1 => {
                let code = trim_asset_code(&r.read_fixed::<4>("asset code")?)?;
                let issuer = AccountId::read_xdr(r)?;
                Ok(Asset::Credit { code, issuer })
            }
            2 => {
                let code = trim_asset_code(&r.read_fixed::<12>("asset code")?)?;
                let issuer = AccountId::read_xdr(r)?;
                Ok(Asset::Credit { code, issuer })
            }
            other => Err(XdrError::InvalidDiscriminant {
                field: "asset type",
                value: other as i64,
            }),
        }
    }
}

/// Exchange rate `n / d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Price {
    pub n: i32,
    pub d: i32,
}

impl XdrCodec for Price {
    fn write_xdr(&self, w: &mut XdrWriter) {
        w.write_i32(self.n);
        w.write_i32(self.d);
    }

    fn read_xdr(r: &mut XdrReader<'_>) -> XdrResult<Self> {
        Ok(Price {
            n: r.read_i32("price numerator")?,
            d: r.read_i32("price denominator")?,
        })
    }
}

// ---------------------------------------------------------------------------
// Memo & TimeBounds
// ---------------------------------------------------------------------------

/// Transaction memo.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Memo {
    #[default]
    None,
    Text(String),
    Id(u64),
    Hash([u8; 32]),
    Return([u8; 32]),
}

impl XdrCodec for Memo {
    fn write_xdr(&self, w: &mut XdrWriter) {
        match self {
            Memo::None => w.write_i32(0),
            Memo::Text(text) => {
                w.write_i32(1);
                w.write_string(text);
            }
            Memo::Id(id) => {
                w.write_i32(2);
                w.write_u64(*id);
            }
            Memo::Hash(hash) => {
                w.write_i32(3);
                w.write_fixed(hash);
            }
            Memo::Return(hash) => {
                w.write_i32(4);
                w.write_fixed(hash);
            }
        }
    }

    fn read_xdr(r: &mut XdrReader<'_>) -> XdrResult<Self> {
        match r.read_i32("memo type")? {
            0 => Ok(Memo::None),
            1 => Ok(Memo::Text(r.read_string(MEMO_TEXT_MAX, "memo text")?)),
            2 => Ok(Memo::Id(r.read_u64("memo id")?)),
            3 => Ok(Memo::Hash(r.read_fixed("memo hash")?)),
            4 => Ok(Memo::Return(r.read_fixed("memo return")?)),
            other => Err(XdrError::InvalidDiscriminant {
                field: "memo type",
                value: other as i64,
            }),
        }
    }
}

/// Validity window, in Unix seconds. `0` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TimeBounds {
    pub min_time: u64,
    pub max_time: u64,
}

impl XdrCodec for TimeBounds {
    fn write_xdr(&self, w: &mut XdrWriter) {
        w.write_u64(self.min_time);
        w.write_u64(self.max_time);
    }

    fn read_xdr(r: &mut XdrReader<'_>) -> XdrResult<Self> {
        Ok(TimeBounds {
            min_time: r.read_u64("min time")?,
            max_time: r.read_u64("max time")?,
        })
    }
}

// ---------------------------------------------------------------------------
// Signers
// ---------------------------------------------------------------------------

/// Key of an account signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignerKey {
    Ed25519([u8; 32]),
    PreAuthTx([u8; 32]),
    HashX([u8; 32]),
}

impl XdrCodec for SignerKey {
    fn write_xdr(&self, w: &mut XdrWriter) {
        let (kind, key) = match self {
            SignerKey::Ed25519(key) => (0, key),
            SignerKey::PreAuthTx(key) => (1, key),
            SignerKey::HashX(key) => (2, key),
        };
        w.write_i32(kind);
        w.write_fixed(key);
    }

    fn read_xdr(r: &mut XdrReader<'_>) -> XdrResult<Self> {
        let kind = r.read_i32("signer key type")?;
        let key = r.read_fixed("signer key")?;
        match kind {
            0 => Ok(SignerKey::Ed25519(key)),
            1 => Ok(SignerKey::PreAuthTx(key)),
            2 => Ok(SignerKey::HashX(key)),
            other => Err(XdrError::InvalidDiscriminant {
                field: "signer key type",
                value: other as i64,
            }),
        }
    }
}

/// Signer added, changed or removed (weight 0) by `setOptions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signer {
    pub key: SignerKey,
    pub weight: u32,
}

impl XdrCodec for Signer {
    fn write_xdr(&self, w: &mut XdrWriter) {
        self.key.write_xdr(w);
        w.write_u32(self.weight);
    }

    fn read_xdr(r: &mut XdrReader<'_>) -> XdrResult<Self> {
        Ok(Signer {
            key: SignerKey::read_xdr(r)?,
            weight: r.read_u32("signer weight")?,
        })
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Body of `setOptions`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SetOptions {
    pub inflation_dest: Option<AccountId>,
    pub clear_flags: Option<u32>,
    pub set_flags: Option<u32>,
    pub master_weight: Option<u32>,
    pub low_threshold: Option<u32>,
    pub med_threshold: Option<u32>,
    pub high_threshold: Option<u32>,
    pub home_domain: Option<String>,
    pub signer: Option<Signer>,
}

/// Operation payload, one arm per operation type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationBody {
    CreateAccount {
        destination: AccountId,
        starting_balance: i64,
    },
    Payment {
        destination: AccountId,
        asset: Asset,
        amount: i64,
    },
    PathPaymentStrictReceive {
        send_asset: Asset,
        send_max: i64,
        destination: AccountId,
        dest_asset: Asset,
        dest_amount: i64,
        path: Vec<Asset>,
    },
    ManageSellOffer {
        selling: Asset,
        buying: Asset,
        amount: i64,
        price: Price,
        offer_id: i64,
    },
    CreatePassiveSellOffer {
        selling: Asset,
        buying: Asset,
        amount: i64,
        price: Price,
    },
    SetOptions(SetOptions),
    ChangeTrust {
        line: Asset,
        limit: i64,
    },
    AllowTrust {
        trustor: AccountId,
        asset_code: String,
        authorize: u32,
    },
    AccountMerge {
        destination: AccountId,
    },
    Inflation,
    ManageData {
        name: String,
        value: Option<Vec<u8>>,
    },
    BumpSequence {
        bump_to: i64,
    },
    ManageBuyOffer {
        selling: Asset,
        buying: Asset,
        buy_amount: i64,
        price: Price,
        offer_id: i64,
    },
    PathPaymentStrictSend {
        send_asset: Asset,
        send_amount: i64,
        destination: AccountId,
        dest_asset: Asset,
        dest_min: i64,
        path: Vec<Asset>,
    },
}

impl OperationBody {
    /// Union discriminant on the wire.
    pub fn discriminant(&self) -> i32 {
        match self {
            Self::CreateAccount { .. } => 0,
            Self::Payment { .. } => 1,
            Self::PathPaymentStrictReceive { .. } => 2,
            Self::ManageSellOffer { .. } => 3,
            Self::CreatePassiveSellOffer { .. } => 4,
            Self::SetOptions(_) => 5,
            Self::ChangeTrust { .. } => 6,
            Self::AllowTrust { .. } => 7,
            Self::AccountMerge { .. } => 8,
            Self::Inflation => 9,
            Self::ManageData { .. } => 10,
            Self::BumpSequence { .. } => 11,
            Self::ManageBuyOffer { .. } => 12,
            Self::PathPaymentStrictSend { .. } => 13,
        }
    }
}

fn write_path(w: &mut XdrWriter, path: &[Asset]) {
    w.write_u32(path.len() as u32);
    for asset in path {
        asset.write_xdr(w);
    }
}

fn read_path(r: &mut XdrReader<'_>) -> XdrResult<Vec<Asset>> {
    let len = r.read_len(MAX_PATH_LENGTH, "path")?;
    (0..len).map(|_| Asset::read_xdr(r)).collect()
}

fn read_opt_u32(r: &mut XdrReader<'_>, field: &'static str) -> XdrResult<Option<u32>> {
    r.read_option(field, |r| r.read_u32(field))
}

impl XdrCodec for OperationBody {
    fn write_xdr(&self, w: &mut XdrWriter) {
        w.write_i32(self.discriminant());
        match self {
            Self::CreateAccount {
                destination,
                starting_balance,
            } => {
                destination.write_xdr(w);
                w.write_i64(*starting_balance);
            }
            Self::Payment {
                destination,
                asset,
                amount,
            } => {
                destination.write_muxed(w);
                asset.write_xdr(w);
                w.write_i64(*amount);
            }
            Self::PathPaymentStrictReceive {
                send_asset,
                send_max,
                destination,
                dest_asset,
                dest_amount,
                path,
            } => {
                send_asset.write_xdr(w);
                w.write_i64(*send_max);
                destination.write_muxed(w);
                dest_asset.write_xdr(w);
                w.write_i64(*dest_amount);
                write_path(w, path);
            }
            Self::ManageSellOffer {
                selling,
                buying,
                amount,
                price,
                offer_id,
            } => {
                selling.write_xdr(w);
                buying.write_xdr(w);
                w.write_i64(*amount);
                price.write_xdr(w);
                w.write_i64(*offer_id);
            }
            Self::CreatePassiveSellOffer {
                selling,
                buying,
                amount,
                price,
            } => {
                selling.write_xdr(w);
                buying.write_xdr(w);
                w.write_i64(*amount);
                price.write_xdr(w);
            }
            Self::SetOptions(options) => {
                w.write_option(options.inflation_dest.as_ref(), |w, v| v.write_xdr(w));
                w.write_option(options.clear_flags.as_ref(), |w, v| w.write_u32(*v));
                w.write_option(options.set_flags.as_ref(), |w, v| w.write_u32(*v));
                w.write_option(options.master_weight.as_ref(), |w, v| w.write_u32(*v));
                w.write_option(options.low_threshold.as_ref(), |w, v| w.write_u32(*v));
                w.write_option(options.med_threshold.as_ref(), |w, v| w.write_u32(*v));
                w.write_option(options.high_threshold.as_ref(), |w, v| w.write_u32(*v));
                w.write_option(options.home_domain.as_ref(), |w, v| w.write_string(v));
                w.write_option(options.signer.as_ref(), |w, v| v.write_xdr(w));
            }
            Self::ChangeTrust { line, limit } => {
                line.write_xdr(w);
                w.write_i64(*limit);
            }
            Self::AllowTrust {
                trustor,
                asset_code,
                authorize,
            } => {
                trustor.write_xdr(w);
                w.write_i32(asset_code_type(asset_code));
                write_asset_code(w, asset_code);
                w.write_u32(*authorize);
            }
            Self::AccountMerge { destination } => destination.write_muxed(w),
            Self::Inflation => {}
            Self::ManageData { name, value } => {
                w.write_string(name);
                w.write_option(value.as_ref(), |w, v| w.write_var(v));
            }
            Self::BumpSequence { bump_to } => w.write_i64(*bump_to),
            Self::ManageBuyOffer {
                selling,
                buying,
                buy_amount,
                price,
                offer_id,
            } => {
                selling.write_xdr(w);
                buying.write_xdr(w);
                w.write_i64(*buy_amount);
                price.write_xdr(w);
                w.write_i64(*offer_id);
            }
            Self::PathPaymentStrictSend {
                send_asset,
                send_amount,
                destination,
                dest_asset,
                dest_min,
                path,
            } => {
                send_asset.write_xdr(w);
                w.write_i64(*send_amount);
                destination.write_muxed(w);
                dest_asset.write_xdr(w);
                w.write_i64(*dest_min);
                write_path(w, path);
            }
        }
    }

    fn read_xdr(r: &mut XdrReader<'_>) -> XdrResult<Self> {
        let body = match r.read_i32("operation type")? {
            0 => Self::CreateAccount {
                destination: AccountId::read_xdr(r)?,
                starting_balance: r.read_i64("starting balance")?,
            },
            1 => Self::Payment {
                destination: AccountId::read_muxed(r)?,
                asset: Asset::read_xdr(r)?,
                amount: r.read_i64("amount")?,
            },
            2 => Self::PathPaymentStrictReceive {
                send_asset: Asset::read_xdr(r)?,
                send_max: r.read_i64("send max")?,
                destination: AccountId::read_muxed(r)?,
                dest_asset: Asset::read_xdr(r)?,
                dest_amount: r.read_i64("dest amount")?,
                path: read_path(r)?,
            },
            3 => Self::ManageSellOffer {
                selling: Asset::read_xdr(r)?,
                buying: Asset::read_xdr(r)?,
                amount: r.read_i64("amount")?,
                price: Price::read_xdr(r)?,
                offer_id: r.read_i64("offer id")?,
            },
            4 => Self::CreatePassiveSellOffer {
                selling: Asset::read_xdr(r)?,
                buying: Asset::read_xdr(r)?,
                amount: r.read_i64("amount")?,
                price: Price::read_xdr(r)?,
            },
            5 => Self::SetOptions(SetOptions {
                inflation_dest: r.read_option("inflation dest", AccountId::read_xdr)?,
                clear_flags: read_opt_u32(r, "clear flags")?,
                set_flags: read_opt_u32(r, "set flags")?,
                master_weight: read_opt_u32(r, "master weight")?,
                low_threshold: read_opt_u32(r, "low threshold")?,
                med_threshold: read_opt_u32(r, "med threshold")?,
                high_threshold: read_opt_u32(r, "high threshold")?,
                home_domain: r.read_option("home domain", |r| {
                    r.read_string(HOME_DOMAIN_MAX, "home domain")
                })?,
                signer: r.read_option("signer", Signer::read_xdr)?,
            }),
            6 => Self::ChangeTrust {
                line: Asset::read_xdr(r)?,
                limit: r.read_i64("limit")?,
            },
            7 => {
                let trustor = AccountId::read_xdr(r)?;
                let asset_code = match r.read_i32("allow trust asset type")? {
                    1 => trim_asset_code(&r.read_fixed::<4>("asset code")?)?,
                    2 => trim_asset_code(&r.read_fixed::<12>("asset code")?)?,
                    other => {
                        return Err(XdrError::InvalidDiscriminant {
                            field: "allow trust asset type",
                            value: other as i64,
                        })
                    }
                };
                Self::AllowTrust {
                    trustor,
                    asset_code,
                    authorize: r.read_u32("authorize")?,
                }
            }
            8 => Self::AccountMerge {
                destination: AccountId::read_muxed(r)?,
            },
            9 => Self::Inflation,
            10 => Self::ManageData {
                name: r.read_string(DATA_NAME_MAX, "data name")?,
                value: r.read_option("data value", |r| r.read_var(DATA_VALUE_MAX, "data value"))?,
            },
            11 => Self::BumpSequence {
                bump_to: r.read_i64("bump to")?,
            },
            12 => Self::ManageBuyOffer {
                selling: Asset::read_xdr(r)?,
                buying: Asset::read_xdr(r)?,
                buy_amount: r.read_i64("buy amount")?,
                price: Price::read_xdr(r)?,
                offer_id: r.read_i64("offer id")?,
            },
            13 => Self::PathPaymentStrictSend {
                send_asset: Asset::read_xdr(r)?,
                send_amount: r.read_i64("send amount")?,
                destination: AccountId::read_muxed(r)?,
                dest_asset: Asset::read_xdr(r)?,
                dest_min: r.read_i64("dest min")?,
                path: read_path(r)?,
            },
            other => {
                return Err(XdrError::InvalidDiscriminant {
                    field: "operation type",
                    value: other as i64,
                })
            }
        };
        Ok(body)
    }
}

/// One operation with its optional source override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub source_account: Option<AccountId>,
    pub body: OperationBody,
}

impl XdrCodec for Operation {
    fn write_xdr(&self, w: &mut XdrWriter) {
        w.write_option(self.source_account.as_ref(), |w, v| v.write_muxed(w));
        self.body.write_xdr(w);
    }

    fn read_xdr(r: &mut XdrReader<'_>) -> XdrResult<Self> {
        Ok(Operation {
            source_account: r.read_option("operation source", AccountId::read_muxed)?,
            body: OperationBody::read_xdr(r)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Transaction & Envelope
// ---------------------------------------------------------------------------

/// A native transaction, without signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub source_account: AccountId,
    pub fee: u32,
    pub seq_num: i64,
    pub time_bounds: Option<TimeBounds>,
    pub memo: Memo,
    pub operations: Vec<Operation>,
}

fn write_operations(w: &mut XdrWriter, operations: &[Operation]) {
    w.write_u32(operations.len() as u32);
    for op in operations {
        op.write_xdr(w);
    }
}

fn read_operations(r: &mut XdrReader<'_>) -> XdrResult<Vec<Operation>> {
    let len = r.read_len(MAX_OPERATIONS, "operations")?;
    (0..len).map(|_| Operation::read_xdr(r)).collect()
}

fn read_ext(r: &mut XdrReader<'_>) -> XdrResult<()> {
    match r.read_i32("transaction ext")? {
        0 => Ok(()),
        _ => Err(XdrError::Unsupported("transaction extensions")),
    }
}

impl XdrCodec for Transaction {
    fn write_xdr(&self, w: &mut XdrWriter) {
        self.source_account.write_muxed(w);
        w.write_u32(self.fee);
        w.write_i64(self.seq_num);
        w.write_option(self.time_bounds.as_ref(), |w, v| v.write_xdr(w));
        self.memo.write_xdr(w);
        write_operations(w, &self.operations);
        w.write_i32(0);
    }

    fn read_xdr(r: &mut XdrReader<'_>) -> XdrResult<Self> {
        let tx = Transaction {
            source_account: AccountId::read_muxed(r)?,
            fee: r.read_u32("fee")?,
            seq_num: r.read_i64("sequence")?,
            time_bounds: r.read_option("time bounds", TimeBounds::read_xdr)?,
            memo: Memo::read_xdr(r)?,
            operations: read_operations(r)?,
        };
        read_ext(r)?;
        Ok(tx)
    }
}

/// Signature with the hint of the key that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecoratedSignature {
    pub hint: [u8; 4],
    pub signature: Vec<u8>,
}

impl XdrCodec for DecoratedSignature {
    fn write_xdr(&self, w: &mut XdrWriter) {
        w.write_fixed(&self.hint);
        w.write_var(&self.signature);
    }

    fn read_xdr(r: &mut XdrReader<'_>) -> XdrResult<Self> {
        Ok(DecoratedSignature {
            hint: r.read_fixed("signature hint")?,
            signature: r.read_var(64, "signature")?,
        })
    }
}

pub(crate) const ENVELOPE_TYPE_TX_V0: i32 = 0;
pub(crate) const ENVELOPE_TYPE_TX: i32 = 2;

/// A transaction with its signatures: the unit submitted to the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionEnvelope {
    pub tx: Transaction,
    pub signatures: Vec<DecoratedSignature>,
}

fn read_signatures(r: &mut XdrReader<'_>) -> XdrResult<Vec<DecoratedSignature>> {
    let len = r.read_len(MAX_SIGNATURES, "signatures")?;
    (0..len).map(|_| DecoratedSignature::read_xdr(r)).collect()
}

impl XdrCodec for TransactionEnvelope {
    fn write_xdr(&self, w: &mut XdrWriter) {
        w.write_i32(ENVELOPE_TYPE_TX);
        self.tx.write_xdr(w);
        w.write_u32(self.signatures.len() as u32);
        for sig in &self.signatures {
            sig.write_xdr(w);
        }
    }

    fn read_xdr(r: &mut XdrReader<'_>) -> XdrResult<Self> {
        let tx = match r.read_i32("envelope type")? {
            ENVELOPE_TYPE_TX => Transaction::read_xdr(r)?,
            ENVELOPE_TYPE_TX_V0 => {
                // v0 stores the bare source key instead of a muxed account.
                let tx = Transaction {
                    source_account: AccountId(r.read_fixed("source account")?),
                    fee: r.read_u32("fee")?,
                    seq_num: r.read_i64("sequence")?,
                    time_bounds: r.read_option("time bounds", TimeBounds::read_xdr)?,
                    memo: Memo::read_xdr(r)?,
                    operations: read_operations(r)?,
                };
                read_ext(r)?;
                tx
            }
            other => {
                return Err(XdrError::InvalidDiscriminant {
                    field: "envelope type",
                    value: other as i64,
                })
            }
        };
        Ok(TransactionEnvelope {
            tx,
            signatures: read_signatures(r)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(byte: u8) -> AccountId {
        AccountId([byte; 32])
    }

    fn usd() -> Asset {
        Asset::Credit {
            code: "USD".into(),
            issuer: account(2),
        }
    }

    #[test]
    fn asset_code_width_follows_length() {
        let short = usd().to_xdr();
        assert_eq!(&short[..4], &[0, 0, 0, 1]);
        assert_eq!(short.len(), 4 + 4 + 36);

        let long = Asset::Credit {
            code: "LONGTOKEN".into(),
            issuer: account(2),
        }
        .to_xdr();
        assert_eq!(&long[..4], &[0, 0, 0, 2]);
        assert_eq!(long.len(), 4 + 12 + 36);
        assert_eq!(
            Asset::from_xdr(&long).unwrap(),
            Asset::Credit {
                code: "LONGTOKEN".into(),
                issuer: account(2)
            }
        );
    }

    #[test]
    fn memo_text_is_bounded() {
        let mut w = XdrWriter::new();
        w.write_i32(1);
        w.write_string(&"x".repeat(29));
        assert!(matches!(
            Memo::from_xdr(&w.into_bytes()),
            Err(XdrError::LengthExceeded { .. })
        ));
    }

    #[test]
    fn every_operation_survives_encoding() {
        let bodies = vec![
            OperationBody::CreateAccount {
                destination: account(1),
                starting_balance: 10_000_000,
            },
            OperationBody::Payment {
                destination: account(1),
                asset: Asset::Native,
                amount: 5,
            },
            OperationBody::PathPaymentStrictReceive {
                send_asset: Asset::Native,
                send_max: 10,
                destination: account(3),
                dest_asset: usd(),
                dest_amount: 7,
                path: vec![usd(), Asset::Native],
            },
            OperationBody::ManageSellOffer {
                selling: usd(),
                buying: Asset::Native,
                amount: 1,
                price: Price { n: 3, d: 2 },
                offer_id: 9,
            },
            OperationBody::SetOptions(SetOptions {
                home_domain: Some("example.com".into()),
                signer: Some(Signer {
                    key: SignerKey::PreAuthTx([5; 32]),
                    weight: 1,
                }),
                master_weight: Some(0),
                ..SetOptions::default()
            }),
            OperationBody::AllowTrust {
                trustor: account(4),
                asset_code: "EURT".into(),
                authorize: 1,
            },
            OperationBody::AccountMerge {
                destination: account(6),
            },
            OperationBody::Inflation,
            OperationBody::ManageData {
                name: "key".into(),
                value: None,
            },
            OperationBody::BumpSequence { bump_to: 1234 },
        ];
        for body in bodies {
            let op = Operation {
                source_account: Some(account(8)),
                body,
            };
            assert_eq!(Operation::from_xdr(&op.to_xdr()).unwrap(), op);
        }
    }

    #[test]
    fn envelope_type_is_tx() {
        let env = TransactionEnvelope {
            tx: Transaction {
                source_account: account(1),
                fee: 100,
                seq_num: 1,
                time_bounds: None,
                memo: Memo::Id(4),
                operations: vec![Operation {
                    source_account: None,
                    body: OperationBody::Inflation,
                }],
            },
            signatures: vec![DecoratedSignature {
                hint: [1, 2, 3, 4],
                signature: vec![9; 64],
            }],
        };
        let bytes = env.to_xdr();
        assert_eq!(&bytes[..4], &[0, 0, 0, 2]);
        assert_eq!(TransactionEnvelope::from_xdr(&bytes).unwrap(), env);
    }

    #[test]
    fn v0_envelope_decodes() {
        let mut w = XdrWriter::new();
        w.write_i32(ENVELOPE_TYPE_TX_V0);
        w.write_fixed(&[1u8; 32]);
        w.write_u32(100);
        w.write_i64(7);
        w.write_bool(false);
        Memo::None.write_xdr(&mut w);
        w.write_u32(1);
        Operation {
            source_account: None,
            body: OperationBody::BumpSequence { bump_to: 8 },
        }
        .write_xdr(&mut w);
        w.write_i32(0);
        w.write_u32(0);

        let env = TransactionEnvelope::from_xdr(&w.into_bytes()).unwrap();
        assert_eq!(env.tx.source_account, account(1));
        assert_eq!(env.tx.seq_num, 7);
        assert!(env.signatures.is_empty());
    }

    #[test]
    fn muxed_accounts_are_unsupported() {
        let mut w = XdrWriter::new();
        w.write_i32(KEY_TYPE_MUXED_ED25519);
        w.write_u64(1);
        w.write_fixed(&[0u8; 32]);
        let bytes = w.into_bytes();
        let mut r = XdrReader::new(&bytes);
        assert_eq!(
            AccountId::read_muxed(&mut r),
            Err(XdrError::Unsupported("muxed accounts"))
        );
    }
}
