//! Construct / destruct.
//!
//! Conversions between descriptor values and native ledger objects. Address
//! fields may name federated accounts, so anything that carries an address
//! is constructed asynchronously through the session [`Resolver`].

use base64::{engine::general_purpose, Engine as _};

use super::check::decode_base64;
use super::registry::FieldType;
use super::value::{
    AssetValue, BufferKind, BufferValue, FieldValue, MemoType, MemoValue, PriceValue, SignerType,
    SignerValue,
};
use crate::config::{AMOUNT_DECIMALS, STROOPS_PER_UNIT};
use crate::crypto::strkey::{self, Version};
use crate::error::{CodecError, LinkError};
use crate::resolve::Resolver;
use crate::xdr;

// ---------------------------------------------------------------------------
// Amounts
// ---------------------------------------------------------------------------

/// Parses a decimal amount into stroops.
pub fn to_stroops(amount: &str) -> Result<i64, CodecError> {
    let invalid =
        |reason: &str| CodecError::invalid(FieldType::Amount, format!("'{}': {}", amount, reason));
    let (whole, frac) = amount.split_once('.').unwrap_or((amount, ""));
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid("empty amount"));
    }
    if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
        return Err(invalid("not a non-negative decimal"));
    }
    if frac.len() > AMOUNT_DECIMALS {
        return Err(invalid("more than 7 decimals"));
    }
    let whole: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid("too large"))?
    };
    let frac: i64 = format!("{:0<width$}", frac, width = AMOUNT_DECIMALS)
        .parse()
        .map_err(|_| invalid("bad decimals"))?;
    whole
        .checked_mul(STROOPS_PER_UNIT)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(|| invalid("too large"))
}

/// Formats stroops as a canonical decimal: no trailing zeros, no trailing dot.
pub fn from_stroops(stroops: i64) -> String {
    let sign = if stroops < 0 { "-" } else { "" };
    let abs = stroops.unsigned_abs();
    let unit = STROOPS_PER_UNIT as u64;
    let (whole, frac) = (abs / unit, abs % unit);
    if frac == 0 {
        return format!("{}{}", sign, whole);
    }
    let frac = format!("{:07}", frac);
    format!("{}{}.{}", sign, whole, frac.trim_end_matches('0'))
}

// ---------------------------------------------------------------------------
// Prices
// ---------------------------------------------------------------------------

/// Converts a price to the ledger's `n/d` form. Decimals are approximated
/// by the last continued-fraction convergent whose terms fit in an `i32`.
pub fn price(value: &PriceValue) -> Result<xdr::Price, CodecError> {
    match value {
        PriceValue::Fraction { n, d } => {
            let max = i32::MAX as i64;
            if *n <= 0 || *d <= 0 || *n > max || *d > max {
                return Err(CodecError::invalid(
                    FieldType::Price,
                    format!("terms of {}:{} must be in 1..={}", n, d, max),
                ));
            }
            Ok(xdr::Price {
                n: *n as i32,
                d: *d as i32,
            })
        }
        PriceValue::Decimal(decimal) => {
            let (num, den) = parse_decimal(decimal).ok_or_else(|| {
                CodecError::invalid(FieldType::Price, format!("'{}' is not a decimal", decimal))
            })?;
            if num == 0 {
                return Err(CodecError::invalid(FieldType::Price, "price must be positive"));
            }
            approximate(num, den).ok_or_else(|| {
                CodecError::invalid(FieldType::Price, format!("'{}' is out of range", decimal))
            })
        }
    }
}

/// Splits a decimal into an exact `num / 10^k`.
fn parse_decimal(decimal: &str) -> Option<(u128, u128)> {
    let (whole, frac) = decimal.split_once('.').unwrap_or((decimal, ""));
    let digits = format!("{}{}", whole, frac);
    if digits.is_empty() || digits.len() > 30 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let num = digits.parse().ok()?;
    let den = 10u128.checked_pow(frac.len() as u32)?;
    Some((num, den))
}

fn approximate(mut num: u128, mut den: u128) -> Option<xdr::Price> {
    let max = i32::MAX as u128;
    let (mut h_prev, mut h) = (0u128, 1u128);
    let (mut k_prev, mut k) = (1u128, 0u128);
    loop {
        let a = num / den;
        let h_next = a.checked_mul(h)?.checked_add(h_prev)?;
        let k_next = a.checked_mul(k)?.checked_add(k_prev)?;
        if h_next > max || k_next > max {
            break;
        }
        (h_prev, h) = (h, h_next);
        (k_prev, k) = (k, k_next);
        let rem = num % den;
        if rem == 0 {
            break;
        }
        (num, den) = (den, rem);
    }
    if h == 0 || k == 0 {
        return None;
    }
    Some(xdr::Price {
        n: h as i32,
        d: k as i32,
    })
}

/// Native price back to a fraction value.
pub fn destruct_price(price: &xdr::Price) -> FieldValue {
    FieldValue::Price(PriceValue::Fraction {
        n: price.n as i64,
        d: price.d as i64,
    })
}

// ---------------------------------------------------------------------------
// Memos & signers
// ---------------------------------------------------------------------------

fn hash32(hex_text: &str, ty: FieldType) -> Result<[u8; 32], CodecError> {
    let mut out = [0u8; 32];
    hex::decode_to_slice(hex_text, &mut out)
        .map_err(|_| CodecError::invalid(ty, format!("'{}' is not 32 hex bytes", hex_text)))?;
    Ok(out)
}

pub fn memo(value: &MemoValue) -> Result<xdr::Memo, CodecError> {
    Ok(match value.kind {
        MemoType::Text => xdr::Memo::Text(value.value.clone()),
        MemoType::Id => xdr::Memo::Id(value.value.parse().map_err(|_| {
            CodecError::invalid(FieldType::Memo, format!("'{}' is not a 64-bit id", value.value))
        })?),
        MemoType::Hash => xdr::Memo::Hash(hash32(&value.value, FieldType::Memo)?),
        MemoType::Return => xdr::Memo::Return(hash32(&value.value, FieldType::Memo)?),
    })
}

pub fn destruct_memo(memo: &xdr::Memo) -> Option<MemoValue> {
    match memo {
        xdr::Memo::None => None,
        xdr::Memo::Text(text) => Some(MemoValue::new(MemoType::Text, text.clone())),
        xdr::Memo::Id(id) => Some(MemoValue::new(MemoType::Id, id.to_string())),
        xdr::Memo::Hash(hash) => Some(MemoValue::new(MemoType::Hash, hex::encode(hash))),
        xdr::Memo::Return(hash) => Some(MemoValue::new(MemoType::Return, hex::encode(hash))),
    }
}

pub fn signer(value: &SignerValue) -> Result<xdr::Signer, CodecError> {
    let key = match value.kind {
        SignerType::Key => xdr::SignerKey::Ed25519(
            strkey::decode(Version::AccountId, &value.value)
                .map_err(|e| CodecError::invalid(FieldType::Signer, e.to_string()))?,
        ),
        SignerType::Hash => xdr::SignerKey::HashX(hash32(&value.value, FieldType::Signer)?),
        SignerType::Tx => xdr::SignerKey::PreAuthTx(hash32(&value.value, FieldType::Signer)?),
    };
    let weight = u32::try_from(value.weight)
        .map_err(|_| CodecError::invalid(FieldType::Signer, "weight out of range"))?;
    Ok(xdr::Signer { key, weight })
}

pub fn destruct_signer(signer: &xdr::Signer) -> SignerValue {
    let (kind, value) = match &signer.key {
        xdr::SignerKey::Ed25519(key) => (SignerType::Key, strkey::encode(Version::AccountId, key)),
        xdr::SignerKey::HashX(hash) => (SignerType::Hash, hex::encode(hash)),
        xdr::SignerKey::PreAuthTx(hash) => (SignerType::Tx, hex::encode(hash)),
    };
    SignerValue {
        weight: signer.weight as u64,
        kind,
        value,
    }
}

// ---------------------------------------------------------------------------
// Buffers
// ---------------------------------------------------------------------------

/// Bytes of a buffer value. `Null` is `None`.
pub fn buffer(value: &FieldValue) -> Result<Option<Vec<u8>>, CodecError> {
    match value {
        FieldValue::Null => Ok(None),
        FieldValue::Buffer(BufferValue {
            kind: BufferKind::Text,
            value,
        }) => Ok(Some(value.as_bytes().to_vec())),
        FieldValue::Buffer(BufferValue {
            kind: BufferKind::Base64,
            value,
        }) => decode_base64(value).map(Some),
        _ => Err(CodecError::invalid(FieldType::Buffer, "unexpected value shape")),
    }
}

/// Classifies bytes as text when they are valid UTF-8, binary otherwise.
pub fn destruct_buffer(bytes: Option<&[u8]>) -> FieldValue {
    match bytes {
        None => FieldValue::Null,
        Some(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => FieldValue::Buffer(BufferValue {
                kind: BufferKind::Text,
                value: text.to_string(),
            }),
            Err(_) => FieldValue::Buffer(BufferValue {
                kind: BufferKind::Base64,
                value: general_purpose::STANDARD.encode(bytes),
            }),
        },
    }
}

// ---------------------------------------------------------------------------
// Addresses & assets
// ---------------------------------------------------------------------------

/// Resolves an address to its account.
pub async fn address(resolver: &Resolver, address: &str) -> Result<xdr::AccountId, LinkError> {
    let resolved = resolver.resolve_address(address).await?;
    xdr::AccountId::from_strkey(&resolved.account_id).map_err(|e| LinkError::UnresolvedAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

pub async fn asset(resolver: &Resolver, value: &AssetValue) -> Result<xdr::Asset, LinkError> {
    match &value.issuer {
        None => Ok(xdr::Asset::Native),
        Some(issuer) => Ok(xdr::Asset::Credit {
            code: value.code.clone(),
            issuer: address(resolver, issuer).await?,
        }),
    }
}

pub async fn asset_path(
    resolver: &Resolver,
    path: &[AssetValue],
) -> Result<Vec<xdr::Asset>, LinkError> {
    futures::future::try_join_all(path.iter().map(|a| asset(resolver, a))).await
}

pub fn destruct_asset(asset: &xdr::Asset) -> AssetValue {
    match asset {
        xdr::Asset::Native => AssetValue::native(),
        xdr::Asset::Credit { code, issuer } => AssetValue::credit(code, &issuer.to_strkey()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_convert_exactly() {
        assert_eq!(to_stroops("1").unwrap(), 10_000_000);
        assert_eq!(to_stroops("0.0000001").unwrap(), 1);
        assert_eq!(to_stroops(".5").unwrap(), 5_000_000);
        assert_eq!(to_stroops(crate::config::MAX_AMOUNT).unwrap(), i64::MAX);
        assert!(to_stroops("922337203685.4775808").is_err());
        assert!(to_stroops("1.00000001").is_err());
        assert!(to_stroops("-1").is_err());
        assert!(to_stroops("1e5").is_err());
        assert!(to_stroops("").is_err());
    }

    #[test]
    fn amounts_format_canonically() {
        assert_eq!(from_stroops(10_000_000), "1");
        assert_eq!(from_stroops(15_000_000), "1.5");
        assert_eq!(from_stroops(1), "0.0000001");
        assert_eq!(from_stroops(i64::MAX), crate::config::MAX_AMOUNT);
    }

    #[test]
    fn decimal_prices_become_exact_fractions() {
        let p = |s: &str| price(&PriceValue::Decimal(s.into())).unwrap();
        assert_eq!(p("1.5"), xdr::Price { n: 3, d: 2 });
        assert_eq!(p("0.25"), xdr::Price { n: 1, d: 4 });
        assert_eq!(p("50"), xdr::Price { n: 50, d: 1 });
        assert_eq!(p("0.3333333333"), xdr::Price { n: 1, d: 3 });
        assert!(price(&PriceValue::Decimal("0".into())).is_err());
        assert!(price(&PriceValue::Decimal("abc".into())).is_err());
        assert!(price(&PriceValue::Decimal("3000000000".into())).is_err());
    }

    #[test]
    fn buffers_classify_by_utf8() {
        assert_eq!(
            destruct_buffer(Some(b"hello")),
            FieldValue::Buffer(BufferValue {
                kind: BufferKind::Text,
                value: "hello".into()
            })
        );
        assert_eq!(
            destruct_buffer(Some(&[0xff, 0x00])),
            FieldValue::Buffer(BufferValue {
                kind: BufferKind::Base64,
                value: "/wA=".into()
            })
        );
        assert_eq!(destruct_buffer(None), FieldValue::Null);
        assert_eq!(buffer(&destruct_buffer(Some(&[0xff, 0x00]))).unwrap(), Some(vec![0xff, 0]));
    }

    #[test]
    fn memo_and_signer_survive_native_form() {
        let hash = "ab".repeat(32);
        let m = MemoValue::new(MemoType::Return, hash.clone());
        assert_eq!(destruct_memo(&memo(&m).unwrap()), Some(m));

        let s = SignerValue {
            weight: 3,
            kind: SignerType::Tx,
            value: hash,
        };
        assert_eq!(destruct_signer(&signer(&s).unwrap()), s);
    }
}
