//! # Fields
//!
//! The per-field type system shared by every format: the registry that types
//! each field name, the decoded [`FieldValue`]s, and the codec families that
//! move a value between query text, descriptor and native form.
//!
//! | Direction | Module |
//! |---|---|
//! | name → type | [`registry`] |
//! | validation | [`check`] |
//! | query text ⇄ value | [`codec`] |
//! | value ⇄ native | [`native`] |
//! | implicit defaults | [`defaults`] |

pub mod check;
pub mod codec;
pub mod defaults;
pub mod native;
pub mod registry;
pub mod value;

pub use check::check;
pub use codec::{decode, decode_field, encode};
pub use registry::{field_type, is_transaction_field, FieldType, OperationType, TRANSACTION_FIELDS};
pub use value::{
    AssetValue, BufferKind, BufferValue, FieldValue, MemoType, MemoValue, PriceValue, SignerType,
    SignerValue,
};
