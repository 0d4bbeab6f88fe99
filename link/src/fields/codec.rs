//! Decode / encode.
//!
//! Conversions between percent-decoded query scalars and [`FieldValue`]s.
//! Every decoded value is checked, and every canonical value re-encodes to
//! the text it was decoded from.

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use super::check::check;
use super::registry::{field_type, FieldType};
use super::value::{
    AssetValue, BufferKind, BufferValue, FieldValue, MemoType, MemoValue, PriceValue, SignerType,
    SignerValue,
};
use super::native;
use crate::error::CodecError;

/// Decodes the raw value of a named field.
pub fn decode_field(name: &str, raw: &str) -> Result<FieldValue, CodecError> {
    decode(field_type(name)?, raw)
}

/// Decodes a raw query value as `ty`, then checks it.
pub fn decode(ty: FieldType, raw: &str) -> Result<FieldValue, CodecError> {
    let value = decode_unchecked(ty, raw)?;
    check(ty, &value)?;
    Ok(value)
}

fn decode_unchecked(ty: FieldType, raw: &str) -> Result<FieldValue, CodecError> {
    let value = match ty {
        FieldType::Buffer => decode_buffer(raw),
        FieldType::String(_) => FieldValue::Text(raw.to_string()),
        _ if raw.is_empty() => return Err(CodecError::invalid(ty, "empty value")),
        FieldType::Address => FieldValue::Address(raw.to_string()),
        FieldType::Amount => FieldValue::Amount(native::from_stroops(native::to_stroops(raw)?)),
        FieldType::Asset => FieldValue::Asset(decode_asset(raw)?),
        FieldType::AssetPath => FieldValue::AssetPath(
            raw.split(',')
                .map(decode_asset)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        FieldType::Boolean => match raw {
            "true" => FieldValue::Boolean(true),
            "false" => FieldValue::Boolean(false),
            _ => return Err(CodecError::invalid(ty, format!("'{}' is not true/false", raw))),
        },
        FieldType::Date => FieldValue::Date(decode_date(raw)?),
        FieldType::Fee
        | FieldType::Flags
        | FieldType::Id
        | FieldType::Sequence
        | FieldType::Threshold
        | FieldType::Weight => FieldValue::Integer(decode_integer(ty, raw)?),
        FieldType::Memo => FieldValue::Memo(decode_memo(raw)),
        FieldType::Price => FieldValue::Price(decode_price(raw)?),
        FieldType::Signer => FieldValue::Signer(decode_signer(raw)?),
        FieldType::AssetCode | FieldType::Network | FieldType::Url => {
            FieldValue::Text(raw.to_string())
        }
    };
    Ok(value)
}

/// Encodes a value to its canonical query text.
pub fn encode(value: &FieldValue) -> String {
    match value {
        FieldValue::Address(s) | FieldValue::Amount(s) | FieldValue::Text(s) => s.clone(),
        FieldValue::Asset(asset) => encode_asset(asset),
        FieldValue::AssetPath(path) => path.iter().map(encode_asset).collect::<Vec<_>>().join(","),
        FieldValue::Boolean(b) => b.to_string(),
        FieldValue::Buffer(buffer) => encode_buffer(buffer),
        FieldValue::Date(timestamp) => encode_date(*timestamp),
        FieldValue::Integer(n) => n.to_string(),
        FieldValue::Memo(memo) => encode_memo(memo),
        FieldValue::Price(PriceValue::Fraction { n, d: 1 }) => n.to_string(),
        FieldValue::Price(PriceValue::Fraction { n, d }) => format!("{}:{}", n, d),
        FieldValue::Price(PriceValue::Decimal(decimal)) => decimal.clone(),
        FieldValue::Signer(signer) => {
            format!("{}:{}:{}", signer.weight, signer.kind.name(), signer.value)
        }
        FieldValue::Null => String::new(),
        FieldValue::Invalid { raw, .. } => raw.clone(),
    }
}

// ---------------------------------------------------------------------------
// Per-type syntax
// ---------------------------------------------------------------------------

fn decode_integer(ty: FieldType, raw: &str) -> Result<u64, CodecError> {
    if !raw.chars().all(|c| c.is_ascii_digit()) {
        return Err(CodecError::invalid(ty, format!("'{}' is not a non-negative integer", raw)));
    }
    raw.parse()
        .map_err(|_| CodecError::invalid(ty, format!("'{}' is too large", raw)))
}

/// `XLM` or `native` in any case, else `CODE:ISSUER`.
pub fn decode_asset(raw: &str) -> Result<AssetValue, CodecError> {
    if raw.eq_ignore_ascii_case("xlm") || raw.eq_ignore_ascii_case("native") {
        return Ok(AssetValue::native());
    }
    match raw.split_once(':') {
        Some((code, issuer)) if !issuer.is_empty() => Ok(AssetValue::credit(code, issuer)),
        _ => Err(CodecError::invalid(
            FieldType::Asset,
            format!("'{}' has no issuer", raw),
        )),
    }
}

pub fn encode_asset(asset: &AssetValue) -> String {
    match &asset.issuer {
        None => asset.code.clone(),
        Some(issuer) => format!("{}:{}", asset.code, issuer),
    }
}

fn decode_memo(raw: &str) -> MemoValue {
    if let Some((prefix, value)) = raw.split_once(':') {
        if let Some(kind) = MemoType::from_name(prefix) {
            return MemoValue::new(kind, value);
        }
    }
    MemoValue::new(MemoType::Text, raw)
}

fn encode_memo(memo: &MemoValue) -> String {
    match memo.kind {
        MemoType::Text => {
            let ambiguous = memo
                .value
                .split_once(':')
                .is_some_and(|(prefix, _)| MemoType::from_name(prefix).is_some());
            if ambiguous {
                format!("text:{}", memo.value)
            } else {
                memo.value.clone()
            }
        }
        _ => memo.to_string(),
    }
}

fn decode_price(raw: &str) -> Result<PriceValue, CodecError> {
    if let Some((n, d)) = raw.split_once(':') {
        let term = |s: &str| {
            s.parse::<i64>()
                .map_err(|_| CodecError::invalid(FieldType::Price, format!("'{}' is not a fraction", raw)))
        };
        return Ok(PriceValue::Fraction {
            n: term(n)?,
            d: term(d)?,
        });
    }
    if raw.chars().all(|c| c.is_ascii_digit()) {
        let n = raw
            .parse()
            .map_err(|_| CodecError::invalid(FieldType::Price, format!("'{}' is too large", raw)))?;
        return Ok(PriceValue::Fraction { n, d: 1 });
    }
    Ok(PriceValue::Decimal(raw.to_string()))
}

fn decode_signer(raw: &str) -> Result<SignerValue, CodecError> {
    let parts: Vec<&str> = raw.split(':').collect();
    let (weight, kind, value) = match parts.as_slice() {
        [weight, value] => (*weight, SignerType::Key, *value),
        [weight, kind, value] => {
            let kind = SignerType::from_name(kind).ok_or_else(|| {
                CodecError::invalid(FieldType::Signer, format!("unknown signer type '{}'", kind))
            })?;
            (*weight, kind, *value)
        }
        _ => {
            return Err(CodecError::invalid(
                FieldType::Signer,
                format!("'{}' is not weight:type:value", raw),
            ))
        }
    };
    Ok(SignerValue {
        weight: decode_integer(FieldType::Weight, weight)?,
        kind,
        value: value.to_string(),
    })
}

fn decode_buffer(raw: &str) -> FieldValue {
    if raw.is_empty() {
        return FieldValue::Null;
    }
    let (kind, value) = if let Some(body) = raw.strip_prefix("base64:") {
        (BufferKind::Base64, body)
    } else if let Some(body) = raw.strip_prefix("text:") {
        (BufferKind::Text, body)
    } else {
        (BufferKind::Text, raw)
    };
    FieldValue::Buffer(BufferValue {
        kind,
        value: value.to_string(),
    })
}

fn encode_buffer(buffer: &BufferValue) -> String {
    match buffer.kind {
        BufferKind::Base64 => format!("base64:{}", buffer.value),
        BufferKind::Text
            if buffer.value.starts_with("base64:") || buffer.value.starts_with("text:") =>
        {
            format!("text:{}", buffer.value)
        }
        BufferKind::Text => buffer.value.clone(),
    }
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// Parses `YYYY-MM-DD[THH:MM[:SS[.fff]]][Z|±HH:MM]` to a Unix timestamp.
/// Without a zone the time is UTC; fractions of a second are dropped.
pub fn decode_date(raw: &str) -> Result<i64, CodecError> {
    let invalid =
        || CodecError::invalid(FieldType::Date, format!("'{}' is not an ISO-8601 date", raw));
    let (date, time) = raw.split_once('T').unwrap_or((raw, ""));
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| invalid())?;

    let (time, offset) = split_zone(time).ok_or_else(invalid)?;
    let time = if time.is_empty() {
        NaiveTime::from_hms_opt(0, 0, 0).ok_or_else(invalid)?
    } else {
        NaiveTime::parse_from_str(time, "%H:%M:%S%.f")
            .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M"))
            .map_err(|_| invalid())?
    };
    let offset = FixedOffset::east_opt(offset).ok_or_else(invalid)?;
    let local = NaiveDateTime::new(date, time);
    offset
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.timestamp())
        .ok_or_else(invalid)
}

/// Splits a trailing `Z` or `±HH:MM` zone off a time, returning the offset
/// in seconds east of UTC.
fn split_zone(time: &str) -> Option<(&str, i32)> {
    if let Some(rest) = time.strip_suffix('Z') {
        return Some((rest, 0));
    }
    match time.rfind(|c| c == '+' || c == '-') {
        None => Some((time, 0)),
        Some(at) => {
            let (rest, zone) = time.split_at(at);
            let sign = if zone.starts_with('-') { -1 } else { 1 };
            let digits: String = zone[1..].chars().filter(|c| *c != ':').collect();
            if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            let hours: i32 = digits[..2].parse().ok()?;
            let minutes: i32 = digits[2..].parse().ok()?;
            Some((rest, sign * (hours * 3600 + minutes * 60)))
        }
    }
}

/// Formats a timestamp with the shortest suffix that parses back to it.
pub fn encode_date(timestamp: i64) -> String {
    let Some(dt) = Utc.timestamp_opt(timestamp, 0).single() else {
        return timestamp.to_string();
    };
    let full = dt.format("%Y-%m-%dT%H:%M:%S").to_string();
    let trimmed = full.strip_suffix(":00").unwrap_or(&full);
    trimmed.strip_suffix("T00:00").unwrap_or(trimmed).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NEUTRAL_ACCOUNT;

    fn roundtrip(name: &str, raw: &str) {
        let value = decode_field(name, raw).unwrap_or_else(|e| panic!("{}={}: {}", name, raw, e));
        assert_eq!(encode(&value), raw, "{} did not round-trip", name);
    }

    #[test]
    fn native_asset_spellings() {
        for raw in ["XLM", "xlm", "native", "NATIVE", "Native"] {
            assert_eq!(
                decode(FieldType::Asset, raw).unwrap(),
                FieldValue::Asset(AssetValue::native())
            );
        }
        assert!(decode(FieldType::Asset, "USD").is_err());
        assert!(decode(FieldType::Asset, "USD:").is_err());
    }

    #[test]
    fn integer_price_canonicalizes() {
        let bare = decode(FieldType::Price, "50").unwrap();
        let fraction = decode(FieldType::Price, "50:1").unwrap();
        assert_eq!(bare, fraction);
        assert_eq!(encode(&bare), "50");
        assert_eq!(encode(&fraction), "50");
        roundtrip("price", "3:2");
        roundtrip("price", "1.5");
    }

    #[test]
    fn signer_syntax() {
        let key = decode(FieldType::Signer, &format!("1:{}", NEUTRAL_ACCOUNT)).unwrap();
        assert!(matches!(key, FieldValue::Signer(SignerValue { kind: SignerType::Key, weight: 1, .. })));
        roundtrip("signer", &format!("5:hash:{}", "a".repeat(64)));
        assert!(decode(FieldType::Signer, "1:key:G:extra").is_err());
        assert!(decode(FieldType::Signer, "1:foo:bar").is_err());
    }

    #[test]
    fn memo_syntax() {
        assert_eq!(
            decode(FieldType::Memo, "hello").unwrap(),
            FieldValue::Memo(MemoValue::new(MemoType::Text, "hello"))
        );
        assert_eq!(
            decode(FieldType::Memo, "id:42").unwrap(),
            FieldValue::Memo(MemoValue::new(MemoType::Id, "42"))
        );
        roundtrip("memo", "hello");
        roundtrip("memo", "id:42");
        roundtrip("memo", "note:with colon");
        roundtrip("memo", "text:id:not an id");
        assert!(decode(FieldType::Memo, "id:abc").is_err());
    }

    #[test]
    fn dates_use_minimal_suffix() {
        roundtrip("minTime", "2020-01-01");
        roundtrip("minTime", "2020-01-01T12:30");
        roundtrip("minTime", "2020-01-01T12:30:15");
        assert_eq!(decode_date("2020-01-01").unwrap(), 1_577_836_800);
        assert_eq!(decode_date("2020-01-01T00:00:00Z").unwrap(), 1_577_836_800);
        assert_eq!(decode_date("2020-01-01T01:00+01:00").unwrap(), 1_577_836_800);
        assert_eq!(decode_date("2020-01-01T00:00:00.750").unwrap(), 1_577_836_800);
        assert!(decode_date("yesterday").is_err());
    }

    #[test]
    fn buffers_and_empties() {
        assert_eq!(decode(FieldType::Buffer, "").unwrap(), FieldValue::Null);
        roundtrip("value", "hello");
        roundtrip("value", "base64:/wA=");
        roundtrip("value", "text:base64:literal");
        assert!(decode(FieldType::Buffer, "base64:!!!").is_err());
        assert_eq!(
            decode_field("homeDomain", "").unwrap(),
            FieldValue::Text(String::new())
        );
        assert!(decode(FieldType::Amount, "").is_err());
    }

    #[test]
    fn amounts_are_canonical() {
        assert_eq!(encode(&decode(FieldType::Amount, "1.50").unwrap()), "1.5");
        roundtrip("amount", "0.0000001");
        roundtrip("amount", "100");
    }

    #[test]
    fn paths_and_scalars() {
        let usd = format!("USD:{}", NEUTRAL_ACCOUNT);
        roundtrip("path", &format!("XLM,{}", usd));
        roundtrip("authorize", "false");
        roundtrip("setFlags", "3");
        assert!(decode_field("setFlags", "8").is_err());
        assert!(decode_field("masterWeight", "-1").is_err());
        assert!(decode_field("horizon", "ftp://x").is_err());
        assert!(matches!(decode_field("colour", "red"), Err(CodecError::UnknownField(_))));
    }
}
