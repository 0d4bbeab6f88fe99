//! # Query Format
//!
//! The compact, human-editable form of a transaction:
//!
//! ```text
//! ?payment&memo=hello&destination=alice*example.com&amount=20
//! ?transaction&memo=hello&operation=payment&destination=...&operation=setOptions&...
//! ```
//!
//! The first token names the sole operation, or is the literal
//! `transaction` marker, in which case each operation starts with
//! `operation=<type>` (or `type=<type>`). Every other `key=value` pair goes
//! to the transaction when `key` is a transaction field, otherwise to the
//! current operation. `source` is the exception: once an operation has been
//! opened in the multi-operation form it belongs to that operation.
//!
//! Parsing never stops at a bad field. The value is kept as
//! [`FieldValue::Invalid`] and a diagnostic is reported, so a single pass
//! surfaces every problem in the input.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::debug;

use crate::config::MULTI_OPERATION_MARKER;
use crate::descriptor::{OperationDescriptor, TransactionDescriptor};
use crate::error::{Diagnostic, DiagnosticKind, Diagnostics, ErrorPolicy, LinkError, Parsed};
use crate::fields::defaults::{check_mandatory, fill_defaults, is_default_fee, is_implicit_default};
use crate::fields::{decode_field, encode, is_transaction_field, FieldValue, OperationType, TRANSACTION_FIELDS};

/// Characters escaped in query values. Address, asset and memo separators
/// stay readable.
const VALUE_ESCAPES: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b':')
    .remove(b'*')
    .remove(b'/')
    .remove(b',');

/// Fields emitted even when their encoded value is empty, because absent and
/// empty mean different things.
const KEEP_EMPTY: &[&str] = &["homeDomain", "value"];

/// Operation parameter names of the multi-operation form.
const OPERATION_KEYS: &[&str] = &["operation", "type"];

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

fn unescape(text: &str) -> Result<String, String> {
    percent_decode_str(text)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| format!("'{}' is not valid UTF-8 once decoded", text))
}

/// Parser state while walking the tokens.
struct QueryParser {
    desc: TransactionDescriptor,
    sink: Diagnostics,
    multi: bool,
    current: Option<usize>,
    /// Inside an operation of unknown type: its fields are dropped silently.
    skipping: bool,
}

impl QueryParser {
    fn open_operation(&mut self, name: &str) -> Result<(), LinkError> {
        match OperationType::from_name(name) {
            Some(op_type) => {
                self.desc.operations.push(OperationDescriptor::new(op_type));
                self.current = Some(self.desc.operations.len() - 1);
                self.skipping = false;
            }
            None => {
                self.current = None;
                self.skipping = true;
                self.sink.report(
                    Diagnostic::new(
                        DiagnosticKind::UnknownOperation,
                        format!("unknown operation type '{}'", name),
                    )
                    .in_operation(Some(self.desc.operations.len())),
                )?;
            }
        }
        Ok(())
    }

    fn decode(&mut self, key: &str, raw: &str) -> Result<FieldValue, LinkError> {
        let decoded = unescape(raw).and_then(|text| {
            decode_field(key, &text).map_err(|e| e.to_string())
        });
        match decoded {
            Ok(value) => Ok(value),
            Err(error) => {
                self.sink.report(
                    Diagnostic::new(DiagnosticKind::InvalidValue, error.clone())
                        .on_field(key)
                        .in_operation(self.current),
                )?;
                Ok(FieldValue::Invalid {
                    raw: unescape(raw).unwrap_or_else(|_| raw.to_string()),
                    error,
                })
            }
        }
    }

    fn assign(&mut self, key: &str, raw: &str) -> Result<(), LinkError> {
        if self.multi && OPERATION_KEYS.contains(&key) {
            let name = unescape(raw).unwrap_or_default();
            return self.open_operation(&name);
        }

        let to_operation = key == "source" && self.multi && self.current.is_some();
        if is_transaction_field(key) && !to_operation {
            let value = self.decode(key, raw)?;
            self.desc.set(key, value);
            return Ok(());
        }

        if let Some(index) = self.current {
            let op_type = self.desc.operations[index].op_type;
            if op_type.accepts(key) {
                let value = self.decode(key, raw)?;
                self.desc.operations[index].set(key, value);
                return Ok(());
            }
            let message = format!("'{}' is not a field of {}", key, op_type);
            self.desc.operations[index]
                .error
                .get_or_insert_with(|| message.clone());
            return self.sink.report(
                Diagnostic::new(DiagnosticKind::InvalidField, message)
                    .on_field(key)
                    .in_operation(Some(index)),
            );
        }

        if self.skipping {
            return Ok(());
        }
        self.sink.report(
            Diagnostic::new(DiagnosticKind::InvalidField, "field outside any operation")
                .on_field(key),
        )
    }

    fn finish(mut self) -> Result<Parsed<TransactionDescriptor>, LinkError> {
        for (index, op) in self.desc.operations.iter_mut().enumerate() {
            fill_defaults(op);
            check_mandatory(op, index, &mut self.sink)?;
        }
        Ok(Parsed {
            value: self.desc,
            diagnostics: self.sink.into_vec(),
        })
    }
}

/// Parses a query into a descriptor and the problems found in it.
///
/// Under [`ErrorPolicy::Raise`] the first problem aborts with
/// [`LinkError::Escalated`].
pub fn parse_query(query: &str, policy: ErrorPolicy) -> Result<Parsed<TransactionDescriptor>, LinkError> {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut tokens = query.split('&').filter(|t| !t.is_empty());

    let mut parser = QueryParser {
        desc: TransactionDescriptor::new(),
        sink: Diagnostics::new(policy),
        multi: false,
        current: None,
        skipping: false,
    };

    let head = tokens.next().unwrap_or_default();
    let head = head.split_once('=').map_or(head, |(name, _)| name);
    if head == MULTI_OPERATION_MARKER {
        parser.multi = true;
    } else {
        parser.open_operation(head)?;
    }

    for token in tokens {
        let (key, raw) = token.split_once('=').unwrap_or((token, ""));
        let key = unescape(key).unwrap_or_else(|_| key.to_string());
        parser.assign(&key, raw)?;
    }

    let parsed = parser.finish()?;
    debug!(
        operations = parsed.value.operations.len(),
        diagnostics = parsed.diagnostics.len(),
        "parsed query"
    );
    Ok(parsed)
}

// ---------------------------------------------------------------------------
// Serializer
// ---------------------------------------------------------------------------

fn push_field(out: &mut Vec<String>, key: &str, value: &FieldValue) {
    let encoded = encode(value);
    if encoded.is_empty() && !KEEP_EMPTY.contains(&key) {
        return;
    }
    out.push(format!("{}={}", key, utf8_percent_encode(&encoded, VALUE_ESCAPES)));
}

/// Serializes a descriptor to its canonical query.
///
/// The single-operation form is used for exactly one operation without its
/// own `source`. Implicit defaults and signatures are left out.
pub fn serialize_query(desc: &TransactionDescriptor) -> String {
    let single = match desc.operations.as_slice() {
        [op] => !op.fields.contains_key("source"),
        _ => false,
    };

    let mut tokens = Vec::new();
    if single {
        tokens.push(desc.operations[0].op_type.name().to_string());
    } else {
        tokens.push(MULTI_OPERATION_MARKER.to_string());
    }

    for name in TRANSACTION_FIELDS {
        if *name == "fee" && is_default_fee(desc) {
            continue;
        }
        if let Some(value) = desc.get(name) {
            push_field(&mut tokens, name, value);
        }
    }

    for op in &desc.operations {
        if !single {
            tokens.push(format!("operation={}", op.op_type.name()));
        }
        for name in op.op_type.canonical_fields() {
            if is_implicit_default(op, name) {
                continue;
            }
            if let Some(value) = op.get(name) {
                push_field(&mut tokens, name, value);
            }
        }
    }

    format!("?{}", tokens.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NEUTRAL_ACCOUNT;
    use crate::fields::{AssetValue, MemoType, MemoValue};

    fn parse(query: &str) -> Parsed<TransactionDescriptor> {
        parse_query(query, ErrorPolicy::Accumulate).unwrap()
    }

    fn roundtrip(query: &str) {
        let parsed = parse(query);
        assert!(parsed.is_clean(), "{}: {:?}", query, parsed.diagnostics);
        assert_eq!(serialize_query(&parsed.value), query);
    }

    #[test]
    fn canonical_queries_roundtrip() {
        let g = NEUTRAL_ACCOUNT;
        roundtrip(&format!("?payment&destination={}&amount=1", g));
        roundtrip(&format!("?payment&memo=hello%20world&destination={}&amount=1.5&asset=USD:{}", g, g));
        roundtrip(&format!("?changeTrust&asset=USD:{}&limit=100", g));
        roundtrip(&format!("?manageSellOffer&selling=USD:{}&amount=10&price=3:2", g));
        roundtrip("?setOptions&homeDomain=");
        roundtrip("?manageData&name=x&value=");
        roundtrip(&format!("?allowTrust&trustor={}&assetCode=USD&authorize=false", g));
        roundtrip("?inflation&minTime=2020-01-01&maxTime=2020-02-01T12:30");
        roundtrip(&format!(
            "?transaction&memo=id:7&operation=bumpSequence&bumpTo=10&operation=payment&destination={}&amount=2&source={}",
            g, g
        ));
    }

    #[test]
    fn payment_asset_defaults_to_native() {
        let parsed = parse(&format!("?payment&destination={}&amount=1", NEUTRAL_ACCOUNT));
        assert!(parsed.is_clean());
        assert_eq!(
            parsed.value.operations[0].get("asset"),
            Some(&FieldValue::Asset(AssetValue::native()))
        );
    }

    #[test]
    fn empty_and_absent_values_differ() {
        let deleted = parse("?manageData&name=x&value=");
        assert!(deleted.is_clean());
        assert_eq!(deleted.value.operations[0].get("value"), Some(&FieldValue::Null));

        let missing = parse("?manageData&name=x");
        assert_eq!(missing.diagnostics.len(), 1);
        assert_eq!(missing.diagnostics[0].kind, DiagnosticKind::InvalidField);
        assert_eq!(missing.diagnostics[0].field.as_deref(), Some("value"));
        assert!(missing.value.operations[0].error.is_some());
    }

    #[test]
    fn one_pass_reports_every_problem() {
        let parsed = parse("?payment&destination=nobody&amount=abc&colour=red&fee=x");
        assert_eq!(parsed.diagnostics.len(), 4);
        let op = &parsed.value.operations[0];
        assert!(op.get("destination").unwrap().is_invalid());
        assert!(op.get("amount").unwrap().is_invalid());
        assert!(op.error.is_some());
        assert!(parsed.value.get("fee").unwrap().is_invalid());
    }

    #[test]
    fn raise_policy_stops_at_first_problem() {
        let err = parse_query("?payment&amount=abc", ErrorPolicy::Raise).unwrap_err();
        assert!(matches!(err, LinkError::Escalated(d) if d.kind == DiagnosticKind::InvalidValue));
    }

    #[test]
    fn unknown_operations_are_reported() {
        let parsed = parse("?teleport&destination=x");
        assert_eq!(parsed.diagnostics.len(), 1);
        assert_eq!(parsed.diagnostics[0].kind, DiagnosticKind::UnknownOperation);
        assert!(parsed.value.operations.is_empty());

        let parsed = parse("?transaction&type=inflation&operation=teleport&x=1&operation=inflation");
        assert_eq!(parsed.value.operations.len(), 2);
        assert_eq!(parsed.diagnostics.len(), 1);
    }

    #[test]
    fn source_routing_in_multi_form() {
        let g = NEUTRAL_ACCOUNT;
        let parsed = parse(&format!(
            "?transaction&source={}&operation=inflation&source={}",
            g, g
        ));
        assert!(parsed.value.get("source").is_some());
        assert!(parsed.value.operations[0].get("source").is_some());
    }

    #[test]
    fn legacy_aliases_parse_to_current_names() {
        let parsed = parse(&format!(
            "?manageOffer&selling=USD:{}&amount=1&price=1",
            NEUTRAL_ACCOUNT
        ));
        assert_eq!(parsed.value.operations[0].op_type, OperationType::ManageSellOffer);
        assert!(serialize_query(&parsed.value).starts_with("?manageSellOffer&"));
    }

    #[test]
    fn memo_text_is_escaped() {
        let parsed = parse("?inflation&memo=a%26b%3Dc");
        assert_eq!(
            parsed.value.get("memo"),
            Some(&FieldValue::Memo(MemoValue::new(MemoType::Text, "a&b=c")))
        );
        assert_eq!(serialize_query(&parsed.value), "?inflation&memo=a%26b%3Dc");
    }

    #[test]
    fn default_fee_is_omitted() {
        let parsed = parse("?inflation&fee=100");
        assert_eq!(serialize_query(&parsed.value), "?inflation");
        let parsed = parse("?inflation&fee=200");
        assert_eq!(serialize_query(&parsed.value), "?inflation&fee=200");
    }
}
