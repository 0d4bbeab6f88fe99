//! # Transaction Descriptors
//!
//! The canonical structured form of a transaction, and its JSON rendering.
//!
//! A descriptor is produced by parsing (a query or JSON) or by flattening a
//! native transaction. It may carry invalid fields: parsing keeps going after
//! a bad value so that one pass reports every problem, and the bad value is
//! stored as [`FieldValue::Invalid`] next to the good ones.
//!
//! ## JSON form
//!
//! Keys are field names; the operation list lives under `operations`, each
//! entry tagged with `type`. Structured values use objects (`asset`
//! `{code, issuer}`, `memo` `{type, value}`, `signer` `{weight, type, value}`,
//! `price` `{n, d}`). Any value may also be given as its query string form.
//! Sequence numbers and ids are strings so they survive 53-bit JSON readers.

use std::collections::BTreeMap;

use base64::{engine::general_purpose, Engine as _};
use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

use crate::error::{
    CodecError, Diagnostic, DiagnosticKind, Diagnostics, ErrorPolicy, LinkError, Parsed,
};
use crate::fields::codec::{decode, decode_asset, encode};
use crate::fields::defaults::{check_mandatory, fill_defaults};
use crate::fields::{
    check, field_type, is_transaction_field, AssetValue, BufferKind, BufferValue, FieldType,
    FieldValue, MemoType, MemoValue, OperationType, PriceValue, SignerType, SignerValue,
};
use crate::xdr::DecoratedSignature;

/// Field name → value.
pub type FieldMap = BTreeMap<String, FieldValue>;

// ---------------------------------------------------------------------------
// OperationDescriptor
// ---------------------------------------------------------------------------

/// One operation of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDescriptor {
    pub op_type: OperationType,
    pub fields: FieldMap,
    /// Why the operation is unusable, if it is. Invalid operations are kept.
    pub error: Option<String>,
}

impl OperationDescriptor {
    pub fn new(op_type: OperationType) -> Self {
        Self {
            op_type,
            fields: FieldMap::new(),
            error: None,
        }
    }

    /// Builder-style `set`.
    pub fn with(mut self, name: &str, value: FieldValue) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn set(&mut self, name: &str, value: FieldValue) {
        self.fields.insert(name.to_string(), value);
    }

    /// Returns `true` when the operation has no error and no invalid field.
    pub fn is_valid(&self) -> bool {
        self.error.is_none() && !self.fields.values().any(FieldValue::is_invalid)
    }
}

// ---------------------------------------------------------------------------
// TransactionDescriptor
// ---------------------------------------------------------------------------

/// A whole transaction in canonical structured form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactionDescriptor {
    /// Transaction-level fields.
    pub fields: FieldMap,
    pub operations: Vec<OperationDescriptor>,
    /// Signatures kept from an envelope. Never part of the query format.
    pub signatures: Vec<DecoratedSignature>,
}

impl TransactionDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style `set`.
    pub fn with(mut self, name: &str, value: FieldValue) -> Self {
        self.set(name, value);
        self
    }

    /// Builder-style operation append.
    pub fn push(mut self, op: OperationDescriptor) -> Self {
        self.operations.push(op);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn set(&mut self, name: &str, value: FieldValue) {
        self.fields.insert(name.to_string(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.remove(name)
    }

    /// Returns `true` when every field and operation is usable.
    pub fn is_valid(&self) -> bool {
        !self.operations.is_empty()
            && !self.fields.values().any(FieldValue::is_invalid)
            && self.operations.iter().all(OperationDescriptor::is_valid)
    }

    /// Text of an address-like field, e.g. `source`.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }

    // -- JSON -------------------------------------------------------------

    /// The JSON form as a value.
    pub fn to_json_value(&self) -> Value {
        let mut root = Map::new();
        for (name, value) in &self.fields {
            root.insert(name.clone(), value_to_json(name, value));
        }
        let operations = self
            .operations
            .iter()
            .map(|op| {
                let mut entry = Map::new();
                entry.insert("type".into(), Value::String(op.op_type.name().into()));
                for (name, value) in &op.fields {
                    entry.insert(name.clone(), value_to_json(name, value));
                }
                Value::Object(entry)
            })
            .collect();
        root.insert("operations".into(), Value::Array(operations));
        if !self.signatures.is_empty() {
            let signatures = self
                .signatures
                .iter()
                .map(|sig| {
                    json!({
                        "hint": hex::encode(sig.hint),
                        "signature": general_purpose::STANDARD.encode(&sig.signature),
                    })
                })
                .collect();
            root.insert("signatures".into(), Value::Array(signatures));
        }
        Value::Object(root)
    }

    /// The JSON form as compact text with stable key order.
    pub fn to_json(&self) -> String {
        self.to_json_value().to_string()
    }

    /// Parses the JSON form. Malformed JSON is a terminal error; problems
    /// with individual fields are reported as diagnostics.
    pub fn from_json(text: &str, policy: ErrorPolicy) -> Result<Parsed<Self>, LinkError> {
        let root: Value = serde_json::from_str(text)?;
        let Value::Object(root) = root else {
            return Err(LinkError::InvalidJson("expected an object".into()));
        };
        let mut sink = Diagnostics::new(policy);
        let mut desc = TransactionDescriptor::new();

        for (name, value) in &root {
            match name.as_str() {
                "operations" | "signatures" => continue,
                _ if !is_transaction_field(name) => {
                    sink.report(
                        Diagnostic::new(DiagnosticKind::InvalidField, "not a transaction field")
                            .on_field(name),
                    )?;
                }
                _ => {
                    let value = json_field(name, value, None, &mut sink)?;
                    desc.set(name, value);
                }
            }
        }

        let operations = match root.get("operations") {
            None => &[][..],
            Some(Value::Array(ops)) => ops.as_slice(),
            Some(_) => return Err(LinkError::InvalidJson("operations must be an array".into())),
        };
        for (index, entry) in operations.iter().enumerate() {
            let Some(op) = json_operation(entry, index, &mut sink)? else {
                continue;
            };
            desc.operations.push(op);
        }

        if let Some(signatures) = root.get("signatures") {
            desc.signatures = json_signatures(signatures)?;
        }

        Ok(Parsed {
            value: desc,
            diagnostics: sink.into_vec(),
        })
    }
}

impl Serialize for TransactionDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json_value().serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// JSON helpers
// ---------------------------------------------------------------------------

fn json_operation(
    entry: &Value,
    index: usize,
    sink: &mut Diagnostics,
) -> Result<Option<OperationDescriptor>, LinkError> {
    let Value::Object(entry) = entry else {
        return Err(LinkError::InvalidJson(format!("operation {} is not an object", index + 1)));
    };
    let type_name = entry.get("type").and_then(Value::as_str).unwrap_or_default();
    let Some(op_type) = OperationType::from_name(type_name) else {
        sink.report(
            Diagnostic::new(
                DiagnosticKind::UnknownOperation,
                format!("unknown operation type '{}'", type_name),
            )
            .in_operation(Some(index)),
        )?;
        return Ok(None);
    };

    let mut op = OperationDescriptor::new(op_type);
    for (name, value) in entry {
        if name == "type" {
            continue;
        }
        if !op_type.accepts(name) {
            let message = format!("'{}' is not a field of {}", name, op_type);
            op.error.get_or_insert_with(|| message.clone());
            sink.report(
                Diagnostic::new(DiagnosticKind::InvalidField, message)
                    .on_field(name)
                    .in_operation(Some(index)),
            )?;
            continue;
        }
        let value = json_field(name, value, Some(index), sink)?;
        op.set(name, value);
    }
    fill_defaults(&mut op);
    check_mandatory(&mut op, index, sink)?;
    Ok(Some(op))
}

fn json_field(
    name: &str,
    value: &Value,
    operation: Option<usize>,
    sink: &mut Diagnostics,
) -> Result<FieldValue, LinkError> {
    let decoded = field_type(name).and_then(|ty| value_from_json(ty, value));
    match decoded {
        Ok(value) => Ok(value),
        Err(err) => {
            sink.report(
                Diagnostic::new(DiagnosticKind::InvalidValue, err.to_string())
                    .on_field(name)
                    .in_operation(operation),
            )?;
            Ok(FieldValue::Invalid {
                raw: value.to_string(),
                error: err.to_string(),
            })
        }
    }
}

fn json_signatures(value: &Value) -> Result<Vec<DecoratedSignature>, LinkError> {
    let bad = || LinkError::InvalidJson("signatures must be [{hint, signature}]".into());
    let Value::Array(entries) = value else {
        return Err(bad());
    };
    entries
        .iter()
        .map(|entry| {
            let hint = entry.get("hint").and_then(Value::as_str).ok_or_else(bad)?;
            let signature = entry.get("signature").and_then(Value::as_str).ok_or_else(bad)?;
            let mut hint_bytes = [0u8; 4];
            hex::decode_to_slice(hint, &mut hint_bytes).map_err(|_| bad())?;
            Ok(DecoratedSignature {
                hint: hint_bytes,
                signature: general_purpose::STANDARD.decode(signature).map_err(|_| bad())?,
            })
        })
        .collect()
}

fn asset_to_json(asset: &AssetValue) -> Value {
    match &asset.issuer {
        None => json!({ "code": asset.code }),
        Some(issuer) => json!({ "code": asset.code, "issuer": issuer }),
    }
}

/// JSON rendering of one field.
pub fn value_to_json(name: &str, value: &FieldValue) -> Value {
    match value {
        FieldValue::Asset(asset) => asset_to_json(asset),
        FieldValue::AssetPath(path) => Value::Array(path.iter().map(asset_to_json).collect()),
        FieldValue::Boolean(b) => Value::Bool(*b),
        FieldValue::Buffer(buffer) => json!({ "type": buffer.kind.name(), "value": buffer.value }),
        FieldValue::Integer(n) => match field_type(name) {
            Ok(FieldType::Sequence | FieldType::Id) => Value::String(n.to_string()),
            _ => json!(n),
        },
        FieldValue::Memo(memo) => json!({ "type": memo.kind.name(), "value": memo.value }),
        FieldValue::Price(PriceValue::Fraction { n, d }) => json!({ "n": n, "d": d }),
        FieldValue::Signer(signer) => json!({
            "weight": signer.weight,
            "type": signer.kind.name(),
            "value": signer.value,
        }),
        FieldValue::Null => Value::Null,
        FieldValue::Date(_)
        | FieldValue::Address(_)
        | FieldValue::Amount(_)
        | FieldValue::Text(_)
        | FieldValue::Price(PriceValue::Decimal(_))
        | FieldValue::Invalid { .. } => Value::String(encode(value)),
    }
}

fn shape_error(ty: FieldType) -> CodecError {
    CodecError::invalid(ty, "unexpected json shape")
}

fn str_member<'a>(value: &'a Value, key: &str, ty: FieldType) -> Result<&'a str, CodecError> {
    value.get(key).and_then(Value::as_str).ok_or_else(|| shape_error(ty))
}

fn asset_from_json(value: &Value) -> Result<AssetValue, CodecError> {
    match value {
        Value::String(raw) => decode_asset(raw),
        Value::Object(_) => {
            let code = str_member(value, "code", FieldType::Asset)?;
            match value.get("issuer").and_then(Value::as_str) {
                Some(issuer) => Ok(AssetValue::credit(code, issuer)),
                None if code.eq_ignore_ascii_case("xlm") || code.eq_ignore_ascii_case("native") => {
                    Ok(AssetValue::native())
                }
                None => Err(CodecError::invalid(FieldType::Asset, "missing issuer")),
            }
        }
        _ => Err(shape_error(FieldType::Asset)),
    }
}

/// Decodes one field from its JSON rendering, then checks it.
pub fn value_from_json(ty: FieldType, value: &Value) -> Result<FieldValue, CodecError> {
    if let Value::String(raw) = value {
        if !matches!(ty, FieldType::AssetPath) {
            return decode(ty, raw);
        }
    }
    let decoded = match (ty, value) {
        (FieldType::Asset, _) => FieldValue::Asset(asset_from_json(value)?),
        (FieldType::AssetPath, Value::Array(items)) => FieldValue::AssetPath(
            items
                .iter()
                .map(asset_from_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        (FieldType::AssetPath, Value::String(raw)) => decode(ty, raw)?,
        (FieldType::Boolean, Value::Bool(b)) => FieldValue::Boolean(*b),
        (FieldType::Buffer, Value::Null) => FieldValue::Null,
        (FieldType::Buffer, Value::Object(_)) => {
            let kind = match str_member(value, "type", ty)? {
                "text" => BufferKind::Text,
                "base64" => BufferKind::Base64,
                _ => return Err(shape_error(ty)),
            };
            FieldValue::Buffer(BufferValue {
                kind,
                value: str_member(value, "value", ty)?.to_string(),
            })
        }
        (FieldType::Date, Value::Number(n)) => {
            FieldValue::Date(n.as_i64().ok_or_else(|| shape_error(ty))?)
        }
        (
            FieldType::Fee
            | FieldType::Flags
            | FieldType::Id
            | FieldType::Sequence
            | FieldType::Threshold
            | FieldType::Weight,
            Value::Number(n),
        ) => FieldValue::Integer(n.as_u64().ok_or_else(|| shape_error(ty))?),
        (FieldType::Memo, Value::Object(_)) => {
            let kind = MemoType::from_name(str_member(value, "type", ty)?)
                .ok_or_else(|| shape_error(ty))?;
            let memo_value = match value.get("value") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => return Err(shape_error(ty)),
            };
            FieldValue::Memo(MemoValue::new(kind, memo_value))
        }
        (FieldType::Price, Value::Object(_)) => {
            let term = |key: &str| {
                value
                    .get(key)
                    .and_then(Value::as_i64)
                    .ok_or_else(|| shape_error(ty))
            };
            FieldValue::Price(PriceValue::Fraction {
                n: term("n")?,
                d: term("d")?,
            })
        }
        (FieldType::Price, Value::Number(n)) => decode(ty, &n.to_string())?,
        (FieldType::Signer, Value::Object(_)) => {
            let kind = SignerType::from_name(str_member(value, "type", ty)?)
                .ok_or_else(|| shape_error(ty))?;
            FieldValue::Signer(SignerValue {
                weight: value
                    .get("weight")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| shape_error(ty))?,
                kind,
                value: str_member(value, "value", ty)?.to_string(),
            })
        }
        _ => return Err(shape_error(ty)),
    };
    check(ty, &decoded)?;
    Ok(decoded)
}
