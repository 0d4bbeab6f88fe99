//! # Transaction Builder
//!
//! [`build`] turns a descriptor into an envelope, resolving every address
//! through the session [`Resolver`]. [`flatten`] goes the other way and
//! yields the canonical descriptor of an envelope.
//!
//! The two are inverse on canonical input: flattening strips exactly the
//! values that building fills back in (neutral source and sequence, the
//! per-operation fee, implicit operation defaults), so
//! `build(flatten(e))` re-encodes to the bytes of `e` when the network
//! charges the standard base fee.
//!
//! Building is all-or-nothing. Any failure aborts with a single error;
//! resolution failures are wrapped in [`LinkError::BuildFailed`] with the
//! underlying error as `cause`.

use futures::future::try_join_all;
use tracing::{debug, info};

use crate::config::{network_name, passphrase_for, SessionConfig, MAX_OPERATIONS, NEUTRAL_ACCOUNT, NEUTRAL_SEQUENCE};
use crate::descriptor::{OperationDescriptor, TransactionDescriptor};
use crate::error::{CodecError, LinkError};
use crate::fields::defaults::{fill_defaults, strip_defaults};
use crate::fields::{native, FieldType, FieldValue, MemoValue, OperationType};
use crate::resolve::Resolver;
use crate::xdr::{
    AccountId, Asset, Memo, Operation, OperationBody, Price, SetOptions, TimeBounds, Transaction,
    TransactionEnvelope,
};

// ---------------------------------------------------------------------------
// Field access
// ---------------------------------------------------------------------------

fn invalid_shape(name: &str, operation: Option<usize>) -> LinkError {
    let reason = match operation {
        Some(index) => format!("operation {}: unexpected value for '{}'", index + 1, name),
        None => format!("unexpected value for '{}'", name),
    };
    LinkError::BuildFailed {
        reason,
        cause: None,
    }
}

fn unresolved(what: String, err: LinkError) -> LinkError {
    LinkError::build_failed(format!("cannot resolve {}", what), err)
}

/// Typed, resolver-aware view of one operation's fields.
struct OpFields<'a> {
    op: &'a OperationDescriptor,
    index: usize,
    resolver: &'a Resolver,
}

impl<'a> OpFields<'a> {
    fn value(&self, name: &str) -> Result<&'a FieldValue, LinkError> {
        self.op.get(name).ok_or_else(|| LinkError::BuildFailed {
            reason: format!("operation {}: missing field '{}'", self.index + 1, name),
            cause: None,
        })
    }

    fn shape(&self, name: &str) -> LinkError {
        invalid_shape(name, Some(self.index))
    }

    async fn address(&self, name: &str) -> Result<AccountId, LinkError> {
        match self.value(name)? {
            FieldValue::Address(address) => native::address(self.resolver, address)
                .await
                .map_err(|e| unresolved(format!("{} '{}'", name, address), e)),
            _ => Err(self.shape(name)),
        }
    }

    async fn optional_address(&self, name: &str) -> Result<Option<AccountId>, LinkError> {
        if self.op.get(name).is_none() {
            return Ok(None);
        }
        self.address(name).await.map(Some)
    }

    async fn asset(&self, name: &str) -> Result<Asset, LinkError> {
        match self.value(name)? {
            FieldValue::Asset(asset) => native::asset(self.resolver, asset)
                .await
                .map_err(|e| unresolved(format!("issuer of {}", name), e)),
            _ => Err(self.shape(name)),
        }
    }

    async fn path(&self) -> Result<Vec<Asset>, LinkError> {
        match self.op.get("path") {
            None => Ok(Vec::new()),
            Some(FieldValue::AssetPath(path)) => native::asset_path(self.resolver, path)
                .await
                .map_err(|e| unresolved("path issuer".to_string(), e)),
            Some(_) => Err(self.shape("path")),
        }
    }

    fn amount(&self, name: &str) -> Result<i64, LinkError> {
        match self.value(name)? {
            FieldValue::Amount(amount) => Ok(native::to_stroops(amount)?),
            _ => Err(self.shape(name)),
        }
    }

    fn price(&self) -> Result<Price, LinkError> {
        match self.value("price")? {
            FieldValue::Price(price) => Ok(native::price(price)?),
            _ => Err(self.shape("price")),
        }
    }

    fn text(&self, name: &str) -> Result<&'a str, LinkError> {
        match self.value(name)? {
            FieldValue::Text(text) => Ok(text),
            _ => Err(self.shape(name)),
        }
    }

    fn integer(&self, name: &str) -> Result<Option<u64>, LinkError> {
        match self.op.get(name) {
            None => Ok(None),
            Some(FieldValue::Integer(n)) => Ok(Some(*n)),
            Some(_) => Err(self.shape(name)),
        }
    }

    /// An integer that must fit the 32-bit fields of `setOptions`.
    fn small(&self, name: &str, ty: FieldType) -> Result<Option<u32>, LinkError> {
        self.integer(name)?
            .map(|n| {
                u32::try_from(n).map_err(|_| LinkError::from(CodecError::invalid(ty, "out of range")))
            })
            .transpose()
    }

    fn offer_id(&self) -> Result<i64, LinkError> {
        let id = self.integer("offerId")?.unwrap_or(0);
        i64::try_from(id).map_err(|_| CodecError::invalid(FieldType::Id, "out of range").into())
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

async fn construct(f: OpFields<'_>) -> Result<Operation, LinkError> {
    let body = match f.op.op_type {
        OperationType::CreateAccount => OperationBody::CreateAccount {
            destination: f.address("destination").await?,
            starting_balance: f.amount("startingBalance")?,
        },
        OperationType::Payment => OperationBody::Payment {
            destination: f.address("destination").await?,
            asset: f.asset("asset").await?,
            amount: f.amount("amount")?,
        },
        OperationType::PathPaymentStrictReceive => OperationBody::PathPaymentStrictReceive {
            send_asset: f.asset("sendAsset").await?,
            send_max: f.amount("sendMax")?,
            destination: f.address("destination").await?,
            dest_asset: f.asset("destAsset").await?,
            dest_amount: f.amount("destAmount")?,
            path: f.path().await?,
        },
        OperationType::PathPaymentStrictSend => OperationBody::PathPaymentStrictSend {
            send_asset: f.asset("sendAsset").await?,
            send_amount: f.amount("sendAmount")?,
            destination: f.address("destination").await?,
            dest_asset: f.asset("destAsset").await?,
            dest_min: f.amount("destMin")?,
            path: f.path().await?,
        },
        OperationType::ManageSellOffer => OperationBody::ManageSellOffer {
            selling: f.asset("selling").await?,
            buying: f.asset("buying").await?,
            amount: f.amount("amount")?,
            price: f.price()?,
            offer_id: f.offer_id()?,
        },
        OperationType::ManageBuyOffer => OperationBody::ManageBuyOffer {
            selling: f.asset("selling").await?,
            buying: f.asset("buying").await?,
            buy_amount: f.amount("buyAmount")?,
            price: f.price()?,
            offer_id: f.offer_id()?,
        },
        OperationType::CreatePassiveSellOffer => OperationBody::CreatePassiveSellOffer {
            selling: f.asset("selling").await?,
            buying: f.asset("buying").await?,
            amount: f.amount("amount")?,
            price: f.price()?,
        },
        OperationType::SetOptions => OperationBody::SetOptions(SetOptions {
            inflation_dest: f.optional_address("inflationDest").await?,
            clear_flags: f.small("clearFlags", FieldType::Flags)?,
            set_flags: f.small("setFlags", FieldType::Flags)?,
            master_weight: f.small("masterWeight", FieldType::Weight)?,
            low_threshold: f.small("lowThreshold", FieldType::Threshold)?,
            med_threshold: f.small("medThreshold", FieldType::Threshold)?,
            high_threshold: f.small("highThreshold", FieldType::Threshold)?,
            home_domain: match f.op.get("homeDomain") {
                Some(_) => Some(f.text("homeDomain")?.to_string()),
                None => None,
            },
            signer: match f.op.get("signer") {
                Some(FieldValue::Signer(signer)) => Some(native::signer(signer)?),
                Some(_) => return Err(f.shape("signer")),
                None => None,
            },
        }),
        OperationType::ChangeTrust => OperationBody::ChangeTrust {
            line: f.asset("asset").await?,
            limit: match f.op.get("limit") {
                Some(_) => f.amount("limit")?,
                None => i64::MAX,
            },
        },
        OperationType::AllowTrust => OperationBody::AllowTrust {
            trustor: f.address("trustor").await?,
            asset_code: f.text("assetCode")?.to_string(),
            authorize: match f.op.get("authorize") {
                Some(FieldValue::Boolean(false)) => 0,
                Some(FieldValue::Boolean(true)) | None => 1,
                Some(_) => return Err(f.shape("authorize")),
            },
        },
        OperationType::AccountMerge => OperationBody::AccountMerge {
            destination: f.address("destination").await?,
        },
        OperationType::Inflation => OperationBody::Inflation,
        OperationType::ManageData => OperationBody::ManageData {
            name: f.text("name")?.to_string(),
            value: native::buffer(f.value("value")?)?,
        },
        OperationType::BumpSequence => OperationBody::BumpSequence {
            bump_to: i64::try_from(f.integer("bumpTo")?.unwrap_or(0)).map_err(|_| {
                LinkError::from(CodecError::invalid(FieldType::Sequence, "out of range"))
            })?,
        },
    };

    Ok(Operation {
        source_account: f.optional_address("source").await?,
        body,
    })
}

fn destruct(op: &Operation) -> OperationDescriptor {
    let address = |id: &AccountId| FieldValue::Address(id.to_strkey());
    let amount = |stroops: i64| FieldValue::Amount(native::from_stroops(stroops));
    let asset = |asset: &Asset| FieldValue::Asset(native::destruct_asset(asset));
    let path = |path: &[Asset]| FieldValue::AssetPath(path.iter().map(native::destruct_asset).collect());
    let integer = |n: i64| FieldValue::Integer(n.max(0) as u64);

    let mut out = match &op.body {
        OperationBody::CreateAccount {
            destination,
            starting_balance,
        } => OperationDescriptor::new(OperationType::CreateAccount)
            .with("destination", address(destination))
            .with("startingBalance", amount(*starting_balance)),
        OperationBody::Payment {
            destination,
            asset: a,
            amount: n,
        } => OperationDescriptor::new(OperationType::Payment)
            .with("destination", address(destination))
            .with("asset", asset(a))
            .with("amount", amount(*n)),
        OperationBody::PathPaymentStrictReceive {
            send_asset,
            send_max,
            destination,
            dest_asset,
            dest_amount,
            path: p,
        } => OperationDescriptor::new(OperationType::PathPaymentStrictReceive)
            .with("sendAsset", asset(send_asset))
            .with("sendMax", amount(*send_max))
            .with("destination", address(destination))
            .with("destAsset", asset(dest_asset))
            .with("destAmount", amount(*dest_amount))
            .with("path", path(p)),
        OperationBody::PathPaymentStrictSend {
            send_asset,
            send_amount,
            destination,
            dest_asset,
            dest_min,
            path: p,
        } => OperationDescriptor::new(OperationType::PathPaymentStrictSend)
            .with("sendAsset", asset(send_asset))
            .with("sendAmount", amount(*send_amount))
            .with("destination", address(destination))
            .with("destAsset", asset(dest_asset))
            .with("destMin", amount(*dest_min))
            .with("path", path(p)),
        OperationBody::ManageSellOffer {
            selling,
            buying,
            amount: n,
            price,
            offer_id,
        } => OperationDescriptor::new(OperationType::ManageSellOffer)
            .with("selling", asset(selling))
            .with("buying", asset(buying))
            .with("amount", amount(*n))
            .with("price", native::destruct_price(price))
            .with("offerId", integer(*offer_id)),
        OperationBody::ManageBuyOffer {
            selling,
            buying,
            buy_amount,
            price,
            offer_id,
        } => OperationDescriptor::new(OperationType::ManageBuyOffer)
            .with("selling", asset(selling))
            .with("buying", asset(buying))
            .with("buyAmount", amount(*buy_amount))
            .with("price", native::destruct_price(price))
            .with("offerId", integer(*offer_id)),
        OperationBody::CreatePassiveSellOffer {
            selling,
            buying,
            amount: n,
            price,
        } => OperationDescriptor::new(OperationType::CreatePassiveSellOffer)
            .with("selling", asset(selling))
            .with("buying", asset(buying))
            .with("amount", amount(*n))
            .with("price", native::destruct_price(price)),
        OperationBody::SetOptions(options) => {
            let mut op = OperationDescriptor::new(OperationType::SetOptions);
            if let Some(dest) = &options.inflation_dest {
                op.set("inflationDest", address(dest));
            }
            let small = [
                ("clearFlags", options.clear_flags),
                ("setFlags", options.set_flags),
                ("masterWeight", options.master_weight),
                ("lowThreshold", options.low_threshold),
                ("medThreshold", options.med_threshold),
                ("highThreshold", options.high_threshold),
            ];
            for (name, value) in small {
                if let Some(n) = value {
                    op.set(name, FieldValue::Integer(u64::from(n)));
                }
            }
            if let Some(domain) = &options.home_domain {
                op.set("homeDomain", FieldValue::Text(domain.clone()));
            }
            if let Some(signer) = &options.signer {
                op.set("signer", FieldValue::Signer(native::destruct_signer(signer)));
            }
            op
        }
        OperationBody::ChangeTrust { line, limit } => {
            OperationDescriptor::new(OperationType::ChangeTrust)
                .with("asset", asset(line))
                .with("limit", amount(*limit))
        }
        OperationBody::AllowTrust {
            trustor,
            asset_code,
            authorize,
        } => OperationDescriptor::new(OperationType::AllowTrust)
            .with("trustor", address(trustor))
            .with("assetCode", FieldValue::Text(asset_code.clone()))
            .with("authorize", FieldValue::Boolean(*authorize != 0)),
        OperationBody::AccountMerge { destination } => {
            OperationDescriptor::new(OperationType::AccountMerge)
                .with("destination", address(destination))
        }
        OperationBody::Inflation => OperationDescriptor::new(OperationType::Inflation),
        OperationBody::ManageData { name, value } => {
            OperationDescriptor::new(OperationType::ManageData)
                .with("name", FieldValue::Text(name.clone()))
                .with("value", native::destruct_buffer(value.as_deref()))
        }
        OperationBody::BumpSequence { bump_to } => {
            OperationDescriptor::new(OperationType::BumpSequence).with("bumpTo", integer(*bump_to))
        }
    };

    if let Some(source) = &op.source_account {
        out.set("source", address(source));
    }
    out
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

/// Fails when the descriptor carries a problem found while parsing.
fn ensure_buildable(desc: &TransactionDescriptor) -> Result<(), LinkError> {
    let failed = |reason: String| {
        Err(LinkError::BuildFailed {
            reason,
            cause: None,
        })
    };
    if desc.operations.is_empty() {
        return failed("transaction has no operations".to_string());
    }
    if desc.operations.len() > MAX_OPERATIONS {
        return failed(format!(
            "{} operations exceed the limit of {}",
            desc.operations.len(),
            MAX_OPERATIONS
        ));
    }
    for (name, value) in &desc.fields {
        if let FieldValue::Invalid { error, .. } = value {
            return failed(format!("invalid field '{}': {}", name, error));
        }
    }
    for (index, op) in desc.operations.iter().enumerate() {
        if let Some(error) = &op.error {
            return failed(format!("operation {}: {}", index + 1, error));
        }
        for (name, value) in &op.fields {
            if let FieldValue::Invalid { error, .. } = value {
                return failed(format!("operation {}: invalid field '{}': {}", index + 1, name, error));
            }
        }
    }
    Ok(())
}

fn date(desc: &TransactionDescriptor, name: &str) -> Result<Option<u64>, LinkError> {
    match desc.get(name) {
        None => Ok(None),
        Some(FieldValue::Date(timestamp)) => u64::try_from(*timestamp)
            .map(Some)
            .map_err(|_| CodecError::invalid(FieldType::Date, "before 1970").into()),
        Some(_) => Err(invalid_shape(name, None)),
    }
}

/// Applies memos required by destinations.
///
/// A required memo is injected when the descriptor has none. Memos are
/// compared in native form, so `id:01234` matches a required `id:1234`. Any
/// disagreement, with the descriptor memo or between destinations, fails
/// with [`LinkError::MemoConflict`].
async fn reconcile_memo(
    desc: &TransactionDescriptor,
    resolver: &Resolver,
    memo: Option<MemoValue>,
) -> Result<Option<MemoValue>, LinkError> {
    let destinations: Vec<&str> = desc
        .operations
        .iter()
        .filter_map(|op| op.get("destination").and_then(FieldValue::as_text))
        .collect();
    let accounts = try_join_all(destinations.iter().map(|d| resolver.resolve_address(d)))
        .await
        .map_err(|e| unresolved("destination".to_string(), e))?;

    let mut memo = memo;
    for (destination, account) in destinations.iter().zip(&accounts) {
        let Some(required) = &account.memo else {
            continue;
        };
        match &memo {
            Some(found) if native::memo(found)? != native::memo(required)? => {
                return Err(LinkError::MemoConflict {
                    destination: destination.to_string(),
                    required: required.to_string(),
                    found: found.to_string(),
                });
            }
            Some(_) => {}
            None => {
                debug!(destination, memo = %required, "injecting required memo");
                memo = Some(required.clone());
            }
        }
    }
    Ok(memo)
}

/// Builds the envelope described by `desc`.
///
/// Missing transaction fields fall back to `config`, then to the neutral
/// account with sequence zero. The sequence of a real source is loaded from
/// the network and the fee defaults to the network base fee per operation.
/// Signatures carried by the descriptor are attached.
pub async fn build(
    desc: &TransactionDescriptor,
    config: &SessionConfig,
    resolver: &Resolver,
) -> Result<TransactionEnvelope, LinkError> {
    ensure_buildable(desc)?;
    let mut desc = desc.clone();
    desc.operations.iter_mut().for_each(fill_defaults);

    let source = desc
        .text("source")
        .or(config.source.as_deref())
        .unwrap_or(NEUTRAL_ACCOUNT);
    let source_account = native::address(resolver, source)
        .await
        .map_err(|e| unresolved(format!("source '{}'", source), e))?;
    let source_id = source_account.to_strkey();

    let seq_num = match desc.get("sequence") {
        Some(FieldValue::Integer(n)) => i64::try_from(*n)
            .map_err(|_| LinkError::from(CodecError::invalid(FieldType::Sequence, "out of range")))?,
        Some(_) => return Err(invalid_shape("sequence", None)),
        None if source_id == NEUTRAL_ACCOUNT => NEUTRAL_SEQUENCE,
        None => {
            let account = resolver
                .load_account(&source_id)
                .await
                .map_err(|e| LinkError::build_failed("cannot load source account", e))?;
            account.sequence + 1
        }
    };

    let fee = match desc.get("fee") {
        Some(FieldValue::Integer(n)) => u32::try_from(*n)
            .map_err(|_| LinkError::from(CodecError::invalid(FieldType::Fee, "out of range")))?,
        Some(_) => return Err(invalid_shape("fee", None)),
        None => {
            let base_fee = resolver
                .base_fee()
                .await
                .map_err(|e| LinkError::build_failed("cannot fetch base fee", e))?;
            base_fee
                .checked_mul(desc.operations.len() as u32)
                .ok_or_else(|| LinkError::from(CodecError::invalid(FieldType::Fee, "out of range")))?
        }
    };

    let (min_time, max_time) = (date(&desc, "minTime")?, date(&desc, "maxTime")?);
    let time_bounds = (min_time.is_some() || max_time.is_some()).then(|| TimeBounds {
        min_time: min_time.unwrap_or(0),
        max_time: max_time.unwrap_or(0),
    });

    let memo = match desc.get("memo") {
        None => None,
        Some(FieldValue::Memo(memo)) => Some(memo.clone()),
        Some(_) => return Err(invalid_shape("memo", None)),
    };
    let memo = match reconcile_memo(&desc, resolver, memo).await? {
        Some(memo) => native::memo(&memo)?,
        None => Memo::None,
    };

    let operations = try_join_all(desc.operations.iter().enumerate().map(|(index, op)| {
        construct(OpFields {
            op,
            index,
            resolver,
        })
    }))
    .await?;

    info!(
        source = %source_id,
        seq_num,
        fee,
        operations = operations.len(),
        "built transaction"
    );

    Ok(TransactionEnvelope {
        tx: Transaction {
            source_account,
            fee,
            seq_num,
            time_bounds,
            memo,
            operations,
        },
        signatures: desc.signatures.clone(),
    })
}

// ---------------------------------------------------------------------------
// Flatten
// ---------------------------------------------------------------------------

/// How [`flatten`] shapes its output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlattenOptions {
    /// Leave signatures out of the descriptor.
    pub strip_signatures: bool,
    /// Network name or passphrase to record in the descriptor.
    pub network: Option<String>,
    /// Callback URL to record in the descriptor.
    pub callback: Option<String>,
}

/// Returns the canonical descriptor of `envelope`.
///
/// Time bounds of `(0, 0)` flatten to no time bounds.
pub fn flatten(envelope: &TransactionEnvelope, options: &FlattenOptions) -> TransactionDescriptor {
    let tx = &envelope.tx;
    let mut desc = TransactionDescriptor::new();

    if let Some(network) = &options.network {
        let name = network_name(passphrase_for(network)).unwrap_or(network);
        desc.set("network", FieldValue::Text(name.to_string()));
    }
    if let Some(callback) = &options.callback {
        desc.set("callback", FieldValue::Text(callback.clone()));
    }
    if let Some(memo) = native::destruct_memo(&tx.memo) {
        desc.set("memo", FieldValue::Memo(memo));
    }

    let source = tx.source_account.to_strkey();
    let neutral = source == NEUTRAL_ACCOUNT;
    if !neutral {
        desc.set("source", FieldValue::Address(source));
    }
    if !(neutral && tx.seq_num == NEUTRAL_SEQUENCE) {
        desc.set("sequence", FieldValue::Integer(tx.seq_num.max(0) as u64));
    }

    if let Some(bounds) = &tx.time_bounds {
        let timestamp = |t: u64| FieldValue::Date(i64::try_from(t).unwrap_or(i64::MAX));
        if bounds.min_time != 0 {
            desc.set("minTime", timestamp(bounds.min_time));
        }
        if bounds.max_time != 0 {
            desc.set("maxTime", timestamp(bounds.max_time));
        }
    }
    desc.set("fee", FieldValue::Integer(u64::from(tx.fee)));

    desc.operations = tx.operations.iter().map(destruct).collect();
    if !options.strip_signatures {
        desc.signatures = envelope.signatures.clone();
    }

    strip_defaults(&mut desc);
    desc
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
