// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # txlink
//!
//! One Stellar transaction, many shapes. A payment request typed into a
//! browser bar, a JSON document, a signed XDR blob and a `web+stellar:` link
//! are the same transaction; this crate converts between them without
//! losing anything on the way.
//!
//! ## Architecture
//!
//! - **fields**: The per-field type system (registry, checks, codecs).
//! - **query**: The compact `?payment&destination=...` form.
//! - **descriptor**: The canonical structured form, and its JSON.
//! - **builder**: Descriptor to envelope and back.
//! - **xdr**: The binary envelope.
//! - **sep7**: `web+stellar:` deep links.
//! - **resolve**: Federation, accounts, fees and signers, memoized per
//!   session.
//! - **link**: [`TxLink`], the lazy graph tying every format together.
//! - **config**: Protocol constants and the per-session configuration.
//!
//! ## Quick start
//!
//! ```no_run
//! # async fn demo() -> Result<(), txlink::LinkError> {
//! use txlink::{SessionConfig, TxLink};
//!
//! let link = TxLink::connect("?inflation", SessionConfig::testnet())?;
//! link.lock().await?;
//! println!("{}", link.sep7().await?);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod crypto;
pub mod descriptor;
pub mod error;
pub mod fields;
pub mod link;
pub mod logging;
pub mod query;
pub mod resolve;
pub mod sep7;
pub mod xdr;

pub use builder::{build, flatten, FlattenOptions};
pub use config::SessionConfig;
pub use descriptor::{OperationDescriptor, TransactionDescriptor};
pub use error::{CodecError, Diagnostic, DiagnosticKind, ErrorPolicy, LinkError, Parsed};
pub use fields::{FieldType, FieldValue, OperationType};
pub use link::{Format, TxLink};
pub use query::{parse_query, serialize_query};
pub use resolve::{HorizonClient, LedgerNetwork, MemoryNetwork, Resolver};
pub use sep7::DeepLink;
pub use xdr::TransactionEnvelope;
