//! Bounds checking.
//!
//! [`check`] validates the structure and numeric range of a decoded value
//! against its [`FieldType`]. Decoding calls it on every value, so anything
//! that reaches the builder has already passed.

use base64::{engine::general_purpose, Engine as _};

use super::native;
use super::registry::FieldType;
use super::value::{AssetValue, FieldValue, MemoType, MemoValue, SignerType, SignerValue};
use crate::config::{DATA_VALUE_MAX, MAX_FLAGS, MAX_PATH_LENGTH, MAX_WEIGHT, MEMO_TEXT_MAX};
use crate::crypto::strkey;
use crate::error::CodecError;

/// Validates `value` as a `ty`.
pub fn check(ty: FieldType, value: &FieldValue) -> Result<(), CodecError> {
    let invalid = |reason: &str| Err(CodecError::invalid(ty, reason));
    match (ty, value) {
        (_, FieldValue::Invalid { error, .. }) => invalid(error.as_str()),
        (FieldType::Address, FieldValue::Address(address)) => check_address(address),
        (FieldType::Amount, FieldValue::Amount(amount)) => native::to_stroops(amount).map(|_| ()),
        (FieldType::Asset, FieldValue::Asset(asset)) => check_asset(asset),
        (FieldType::AssetCode, FieldValue::Text(code)) => check_asset_code(code),
        (FieldType::AssetPath, FieldValue::AssetPath(path)) => {
            if path.len() > MAX_PATH_LENGTH {
                return invalid(&format!("at most {} assets", MAX_PATH_LENGTH));
            }
            path.iter().try_for_each(check_asset)
        }
        (FieldType::Boolean, FieldValue::Boolean(_)) => Ok(()),
        (FieldType::Buffer, FieldValue::Null) => Ok(()),
        (FieldType::Buffer, FieldValue::Buffer(_)) => {
            let len = native::buffer(value)?.map_or(0, |bytes| bytes.len());
            if len > DATA_VALUE_MAX {
                return invalid(&format!("longer than {} bytes", DATA_VALUE_MAX));
            }
            Ok(())
        }
        (FieldType::Date, FieldValue::Date(timestamp)) => {
            if *timestamp < 0 {
                return invalid("before 1970");
            }
            Ok(())
        }
        (FieldType::Fee, FieldValue::Integer(n)) => check_max(ty, *n, u32::MAX as u64),
        (FieldType::Flags, FieldValue::Integer(n)) => check_max(ty, *n, MAX_FLAGS),
        (FieldType::Id | FieldType::Sequence, FieldValue::Integer(n)) => {
            check_max(ty, *n, i64::MAX as u64)
        }
        (FieldType::Threshold | FieldType::Weight, FieldValue::Integer(n)) => {
            check_max(ty, *n, MAX_WEIGHT)
        }
        (FieldType::Memo, FieldValue::Memo(memo)) => check_memo(memo),
        (FieldType::Network, FieldValue::Text(network)) => {
            if network.is_empty() {
                return invalid("empty network");
            }
            Ok(())
        }
        (FieldType::Price, FieldValue::Price(price)) => native::price(price).map(|_| ()),
        (FieldType::Signer, FieldValue::Signer(signer)) => check_signer(signer),
        (FieldType::String(max), FieldValue::Text(text)) => {
            if text.len() > max {
                return invalid(&format!("longer than {} bytes", max));
            }
            Ok(())
        }
        (FieldType::Url, FieldValue::Text(url)) => {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return invalid("not an http(s) url");
            }
            Ok(())
        }
        _ => invalid("unexpected value shape"),
    }
}

fn check_max(ty: FieldType, n: u64, max: u64) -> Result<(), CodecError> {
    if n > max {
        return Err(CodecError::invalid(ty, format!("{} is greater than {}", n, max)));
    }
    Ok(())
}

/// Account strkey or `name*domain` federated address.
pub fn check_address(address: &str) -> Result<(), CodecError> {
    if strkey::is_account_id(address) {
        return Ok(());
    }
    match address.split_once('*') {
        Some((name, domain))
            if !name.is_empty() && domain.contains('.') && !domain.contains('*') =>
        {
            Ok(())
        }
        _ => Err(CodecError::invalid(
            FieldType::Address,
            format!("'{}' is neither an account id nor a federated address", address),
        )),
    }
}

fn check_asset_code(code: &str) -> Result<(), CodecError> {
    if code.is_empty() || code.len() > 12 || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(CodecError::invalid(
            FieldType::AssetCode,
            format!("'{}' is not 1-12 alphanumeric characters", code),
        ));
    }
    Ok(())
}

fn check_asset(asset: &AssetValue) -> Result<(), CodecError> {
    match &asset.issuer {
        None if asset.code == super::value::NATIVE_CODE => Ok(()),
        None => Err(CodecError::invalid(FieldType::Asset, "missing issuer")),
        Some(issuer) => {
            check_asset_code(&asset.code)?;
            check_address(issuer)
        }
    }
}

/// 64 hex characters.
pub fn check_hash(hash: &str) -> bool {
    hash.len() == 64 && hash.chars().all(|c| c.is_ascii_hexdigit())
}

fn check_memo(memo: &MemoValue) -> Result<(), CodecError> {
    let ok = match memo.kind {
        MemoType::Text => memo.value.len() <= MEMO_TEXT_MAX,
        MemoType::Id => memo.value.parse::<u64>().is_ok(),
        MemoType::Hash | MemoType::Return => check_hash(&memo.value),
    };
    if !ok {
        let reason = match memo.kind {
            MemoType::Text => format!("text longer than {} bytes", MEMO_TEXT_MAX),
            MemoType::Id => format!("'{}' is not a 64-bit id", memo.value),
            MemoType::Hash | MemoType::Return => "expected 64 hex characters".to_string(),
        };
        return Err(CodecError::invalid(FieldType::Memo, reason));
    }
    Ok(())
}

fn check_signer(signer: &SignerValue) -> Result<(), CodecError> {
    check_max(FieldType::Signer, signer.weight, MAX_WEIGHT)?;
    let ok = match signer.kind {
        SignerType::Key => strkey::is_account_id(&signer.value),
        SignerType::Hash | SignerType::Tx => check_hash(&signer.value),
    };
    if !ok {
        return Err(CodecError::invalid(
            FieldType::Signer,
            format!("'{}' is not a valid {} signer", signer.value, signer.kind.name()),
        ));
    }
    Ok(())
}

/// Decodes a base64 buffer body, reporting failures against the buffer type.
pub(crate) fn decode_base64(text: &str) -> Result<Vec<u8>, CodecError> {
    general_purpose::STANDARD
        .decode(text)
        .map_err(|e| CodecError::invalid(FieldType::Buffer, format!("bad base64: {}", e)))
}
