//! Normalizer.
//!
//! Protocol-implicit defaults in both directions: filling them into a freshly
//! parsed operation, and recognizing them so the serializer and flattener can
//! leave them out of the canonical form.

use super::registry::OperationType;
use super::value::{AssetValue, FieldValue};
use crate::config::{BASE_FEE, MAX_AMOUNT};
use crate::descriptor::{OperationDescriptor, TransactionDescriptor};
use crate::error::{Diagnostic, DiagnosticKind, Diagnostics, LinkError};

/// Asset pairs where a missing side means native.
const ASSET_PAIRS: &[(&str, &str)] = &[("selling", "buying"), ("sendAsset", "destAsset")];

fn is_native(value: Option<&FieldValue>) -> bool {
    value
        .and_then(FieldValue::as_asset)
        .is_some_and(AssetValue::is_native)
}

/// Fills defaults a parser leaves implicit: the native payment asset, the
/// native side of a half-specified pair, and `authorize=true`.
pub fn fill_defaults(op: &mut OperationDescriptor) {
    let native = || FieldValue::Asset(AssetValue::native());
    match op.op_type {
        OperationType::Payment => {
            op.fields.entry("asset".into()).or_insert_with(native);
        }
        OperationType::AllowTrust => {
            op.fields
                .entry("authorize".into())
                .or_insert(FieldValue::Boolean(true));
        }
        _ => {}
    }
    for (a, b) in ASSET_PAIRS {
        if !op.op_type.accepts(a) {
            continue;
        }
        match (op.fields.contains_key(*a), op.fields.contains_key(*b)) {
            (true, false) => {
                op.fields.insert(b.to_string(), native());
            }
            (false, true) => {
                op.fields.insert(a.to_string(), native());
            }
            _ => {}
        }
    }
}

/// Reports and tags missing mandatory fields. The operation is kept either
/// way.
pub fn check_mandatory(
    op: &mut OperationDescriptor,
    index: usize,
    sink: &mut Diagnostics,
) -> Result<(), LinkError> {
    for field in op.op_type.mandatory_fields() {
        if op.fields.contains_key(*field) {
            continue;
        }
        let message = format!("missing mandatory field '{}' in {}", field, op.op_type);
        op.error.get_or_insert_with(|| message.clone());
        sink.report(
            Diagnostic::new(DiagnosticKind::InvalidField, message)
                .on_field(field)
                .in_operation(Some(index)),
        )?;
    }
    Ok(())
}

/// Returns `true` when `field` of `op` holds its implicit default.
pub fn is_implicit_default(op: &OperationDescriptor, field: &str) -> bool {
    let Some(value) = op.fields.get(field) else {
        return false;
    };
    match (op.op_type, field) {
        (OperationType::ChangeTrust, "limit") => {
            matches!(value, FieldValue::Amount(a) if a == MAX_AMOUNT)
        }
        (_, "offerId") => matches!(value, FieldValue::Integer(0)),
        (_, "path") => matches!(value, FieldValue::AssetPath(p) if p.is_empty()),
        (OperationType::Payment, "asset") => is_native(Some(value)),
        (OperationType::AllowTrust, "authorize") => matches!(value, FieldValue::Boolean(true)),
        _ => ASSET_PAIRS.iter().any(|(a, b)| {
            let other = if field == *a {
                b
            } else if field == *b {
                a
            } else {
                return false;
            };
            is_native(Some(value)) && op.fields.get(*other).is_some_and(|v| !is_native(Some(v)))
        }),
    }
}

/// Fee charged when a descriptor names none: the base fee per operation.
pub fn default_fee(operations: usize) -> u64 {
    BASE_FEE as u64 * operations.max(1) as u64
}

/// Returns `true` when the descriptor's `fee` equals [`default_fee`].
pub fn is_default_fee(desc: &TransactionDescriptor) -> bool {
    matches!(
        desc.fields.get("fee"),
        Some(FieldValue::Integer(fee)) if *fee == default_fee(desc.operations.len())
    )
}

/// Removes every implicit default from `desc`.
pub fn strip_defaults(desc: &mut TransactionDescriptor) {
    if is_default_fee(desc) {
        desc.fields.remove("fee");
    }
    for op in &mut desc.operations {
        let implicit: Vec<String> = op
            .fields
            .keys()
            .filter(|field| is_implicit_default(op, field))
            .cloned()
            .collect();
        for field in implicit {
            op.fields.remove(&field);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NEUTRAL_ACCOUNT;
    use crate::error::ErrorPolicy;

    fn usd() -> FieldValue {
        FieldValue::Asset(AssetValue::credit("USD", NEUTRAL_ACCOUNT))
    }

    #[test]
    fn payment_defaults_to_native() {
        let mut op = OperationDescriptor::new(OperationType::Payment);
        fill_defaults(&mut op);
        assert_eq!(op.get("asset"), Some(&FieldValue::Asset(AssetValue::native())));
        assert!(is_implicit_default(&op, "asset"));
    }

    #[test]
    fn half_pairs_get_native_side() {
        let mut op = OperationDescriptor::new(OperationType::ManageSellOffer).with("buying", usd());
        fill_defaults(&mut op);
        assert_eq!(op.get("selling"), Some(&FieldValue::Asset(AssetValue::native())));
        assert!(is_implicit_default(&op, "selling"));
        assert!(!is_implicit_default(&op, "buying"));
    }

    #[test]
    fn both_native_sides_are_kept() {
        let native = FieldValue::Asset(AssetValue::native());
        let op = OperationDescriptor::new(OperationType::ManageSellOffer)
            .with("selling", native.clone())
            .with("buying", native);
        assert!(!is_implicit_default(&op, "selling"));
        assert!(!is_implicit_default(&op, "buying"));
    }

    #[test]
    fn allow_trust_authorizes_by_default() {
        let mut op = OperationDescriptor::new(OperationType::AllowTrust);
        fill_defaults(&mut op);
        assert_eq!(op.get("authorize"), Some(&FieldValue::Boolean(true)));
    }

    #[test]
    fn missing_mandatory_fields_tag_the_operation() {
        let mut op = OperationDescriptor::new(OperationType::ManageData)
            .with("name", FieldValue::Text("x".into()));
        let mut sink = Diagnostics::new(ErrorPolicy::Accumulate);
        check_mandatory(&mut op, 0, &mut sink).unwrap();
        assert!(op.error.is_some());
        assert_eq!(sink.entries()[0].field.as_deref(), Some("value"));
        assert_eq!(sink.entries()[0].kind, DiagnosticKind::InvalidField);
    }

    #[test]
    fn strip_removes_fee_and_limits() {
        let mut desc = TransactionDescriptor::new()
            .with("fee", FieldValue::Integer(100))
            .push(
                OperationDescriptor::new(OperationType::ChangeTrust)
                    .with("asset", usd())
                    .with("limit", FieldValue::Amount(MAX_AMOUNT.into())),
            );
        strip_defaults(&mut desc);
        assert!(desc.fields.get("fee").is_none());
        assert!(desc.operations[0].get("limit").is_none());
        assert!(desc.operations[0].get("asset").is_some());
    }
}
