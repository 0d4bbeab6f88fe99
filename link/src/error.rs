//! Diagnostics and terminal errors.
//!
//! Two severities exist. Soft problems ([`Diagnostic`]) are collected while
//! parsing so that one pass over a malformed input reports everything wrong
//! with it. Terminal problems ([`LinkError`]) end a conversion; a
//! [`crate::link::TxLink`] keeps the first one as its status.
//!
//! Whether a soft problem stays soft is the caller's choice, expressed per
//! call through [`ErrorPolicy`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// ErrorPolicy
// ---------------------------------------------------------------------------

/// What to do with a soft problem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorPolicy {
    /// Record it and keep going.
    #[default]
    Accumulate,
    /// Abort with [`LinkError::Escalated`].
    Raise,
}

// ---------------------------------------------------------------------------
// Diagnostic
// ---------------------------------------------------------------------------

/// Category of a soft problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// A field is unknown in its context, or a mandatory one is missing.
    InvalidField,
    /// A field is known but its value does not decode or check.
    InvalidValue,
    /// An operation type is not part of the supported set.
    UnknownOperation,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidField => write!(f, "InvalidField"),
            Self::InvalidValue => write!(f, "InvalidValue"),
            Self::UnknownOperation => write!(f, "UnknownOperation"),
        }
    }
}

/// One soft problem found in an input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Problem category.
    pub kind: DiagnosticKind,
    /// Field name, when the problem is tied to one.
    pub field: Option<String>,
    /// Operation index, when the problem is inside an operation.
    pub operation: Option<usize>,
    /// Human-readable explanation.
    pub message: String,
}

impl Diagnostic {
    /// Creates a diagnostic.
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            field: None,
            operation: None,
            message: message.into(),
        }
    }

    /// Attaches a field name.
    pub fn on_field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }

    /// Attaches an operation index.
    pub fn in_operation(mut self, index: Option<usize>) -> Self {
        self.operation = index;
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(index) = self.operation {
            write!(f, " (operation {})", index + 1)?;
        }
        if let Some(field) = &self.field {
            write!(f, " [{}]", field)?;
        }
        write!(f, ": {}", self.message)
    }
}

// ---------------------------------------------------------------------------
// Diagnostics sink
// ---------------------------------------------------------------------------

/// Caller-supplied sink that soft problems are reported into.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    policy: ErrorPolicy,
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Creates an empty sink with the given policy.
    pub fn new(policy: ErrorPolicy) -> Self {
        Self {
            policy,
            entries: Vec::new(),
        }
    }

    /// Reports a problem. Under [`ErrorPolicy::Raise`] this returns the
    /// problem as an error instead of recording it.
    pub fn report(&mut self, diagnostic: Diagnostic) -> Result<(), LinkError> {
        tracing::debug!(%diagnostic, "soft error");
        match self.policy {
            ErrorPolicy::Accumulate => {
                self.entries.push(diagnostic);
                Ok(())
            }
            ErrorPolicy::Raise => Err(LinkError::Escalated(diagnostic)),
        }
    }

    /// Returns `true` when nothing has been reported.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reported problems, in order.
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Consumes the sink.
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

/// A best-effort value together with the soft problems found producing it.
#[derive(Debug, Clone)]
pub struct Parsed<T> {
    /// The value, possibly carrying `Invalid` fields.
    pub value: T,
    /// Everything reported while producing `value`.
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Parsed<T> {
    /// Returns `true` when no problem was reported.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Escalates the first problem, if any, into an error.
    pub fn into_result(self) -> Result<T, LinkError> {
        match self.diagnostics.into_iter().next() {
            Some(first) => Err(LinkError::Escalated(first)),
            None => Ok(self.value),
        }
    }
}

// ---------------------------------------------------------------------------
// CodecError
// ---------------------------------------------------------------------------

/// Failure of a single field codec call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The field name is not in the type registry.
    #[error("unknown field: {0}")]
    UnknownField(String),

    /// The value is malformed or out of range for its type.
    #[error("invalid {field_type}: {reason}")]
    InvalidValue { field_type: String, reason: String },
}

impl CodecError {
    /// Shorthand for [`CodecError::InvalidValue`].
    pub fn invalid(field_type: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field_type: field_type.to_string(),
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// LinkError
// ---------------------------------------------------------------------------

/// Terminal failure of a conversion.
///
/// `Clone` so that memoized getters can hand the same failure to every
/// awaiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// Building the native transaction failed. `cause` is the underlying
    /// failure when there is one.
    #[error("build failed: {reason}")]
    BuildFailed {
        reason: String,
        cause: Option<Box<LinkError>>,
    },

    /// The descriptor memo disagrees with a memo required by a destination.
    #[error("memo conflict for {destination}: required {required}, found {found}")]
    MemoConflict {
        destination: String,
        required: String,
        found: String,
    },

    /// The network is unknown or inconsistent with the session.
    #[error("invalid network: {0}")]
    InvalidNetwork(String),

    /// An address could not be resolved to an account.
    #[error("unresolved address {address}: {reason}")]
    UnresolvedAddress { address: String, reason: String },

    /// The binary envelope could not be decoded or encoded.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// A SEP-7 link is malformed.
    #[error("invalid deep link: {0}")]
    InvalidDeepLink(String),

    /// A JSON descriptor is not well-formed.
    #[error("invalid json: {0}")]
    InvalidJson(String),

    /// The network transport failed.
    #[error("network error: {0}")]
    Network(String),

    /// The input matches none of the supported formats.
    #[error("unknown input format")]
    UnknownFormat,

    /// The requested format needs `lock()` first.
    #[error("transaction is not locked")]
    NotLocked,

    /// In-place edits are rejected after `lock()`.
    #[error("transaction is locked; create a new link to edit it")]
    Locked,

    /// A soft problem escalated by [`ErrorPolicy::Raise`].
    #[error("{0}")]
    Escalated(Diagnostic),
}

impl LinkError {
    /// Wraps `cause` into [`LinkError::BuildFailed`].
    pub fn build_failed(reason: impl Into<String>, cause: LinkError) -> Self {
        Self::BuildFailed {
            reason: reason.into(),
            cause: Some(Box::new(cause)),
        }
    }

    /// Follows `BuildFailed` causes down to the innermost error.
    pub fn root_cause(&self) -> &LinkError {
        match self {
            Self::BuildFailed {
                cause: Some(cause), ..
            } => cause.root_cause(),
            other => other,
        }
    }
}

impl From<CodecError> for LinkError {
    fn from(err: CodecError) -> Self {
        Self::BuildFailed {
            reason: err.to_string(),
            cause: None,
        }
    }
}

impl From<serde_json::Error> for LinkError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidJson(err.to_string())
    }
}

impl From<reqwest::Error> for LinkError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
