//! # Format Graph
//!
//! [`TxLink`] holds one transaction and hands it out in every format:
//!
//! ```text
//!   uri ─ query ─ json ─ descriptor ──lock()──> transaction ─ xdr ─ sep7
//! ```
//!
//! The input format is sniffed on construction. Each getter is memoized:
//! the first call converts from the entry format, later calls return the
//! same outcome, failures included.
//!
//! Links made from a query, URI, JSON or descriptor are network-agnostic
//! until [`TxLink::lock`] resolves addresses, sequence and fee. Links made
//! from an envelope, an `xdr` string or a `tx` deep link start out locked.
//! A locked link rejects edits; [`TxLink::fork`] starts a new draft from its
//! descriptor.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::builder::{build, flatten, FlattenOptions};
use crate::config::{network_name, passphrase_for, SessionConfig, MAX_SIGNATURES, PUBLIC_PASSPHRASE, SEP7_SCHEME};
use crate::crypto::{verify_signature, Keypair};
use crate::descriptor::TransactionDescriptor;
use crate::error::{Diagnostic, DiagnosticKind, Diagnostics, LinkError, Parsed};
use crate::fields::{decode_field, field_type, is_transaction_field, FieldType, FieldValue};
use crate::query::{parse_query, serialize_query};
use crate::resolve::{
    compute_signers, signer_statuses, HorizonClient, LedgerNetwork, Resolver, SignerRecord,
    SignerStatus, SubmitResult,
};
use crate::sep7::{DeepLink, TxRequest};
use crate::xdr::TransactionEnvelope;

// ---------------------------------------------------------------------------
// Format
// ---------------------------------------------------------------------------

/// The representations a [`TxLink`] converts between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Uri,
    Query,
    Json,
    Descriptor,
    Transaction,
    Xdr,
    Sep7,
}

impl Format {
    pub fn name(self) -> &'static str {
        match self {
            Self::Uri => "uri",
            Self::Query => "query",
            Self::Json => "json",
            Self::Descriptor => "descriptor",
            Self::Transaction => "transaction",
            Self::Xdr => "xdr",
            Self::Sep7 => "sep7",
        }
    }

    /// Guesses the format of a textual input.
    pub fn sniff(input: &str) -> Self {
        let input = input.trim_start();
        if input.starts_with('?') {
            Self::Query
        } else if input.starts_with(SEP7_SCHEME) {
            Self::Sep7
        } else if input.starts_with("https://") || input.starts_with("http://") {
            Self::Uri
        } else if input.starts_with('{') {
            Self::Json
        } else {
            Self::Xdr
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// TxLink
// ---------------------------------------------------------------------------

type Cell<T> = OnceCell<Result<T, LinkError>>;

/// One transaction, convertible to every format.
pub struct TxLink {
    config: SessionConfig,
    resolver: Arc<Resolver>,
    entry: Format,
    /// The draft descriptor. `None` for links made from an envelope.
    origin: Option<TransactionDescriptor>,
    /// Callback carried by a `tx` deep link.
    callback: Option<String>,
    diagnostics: Vec<Diagnostic>,
    status: Mutex<Option<LinkError>>,

    /// Outcome of `lock()`, or the entry envelope.
    envelope: Cell<TransactionEnvelope>,
    descriptor: Cell<TransactionDescriptor>,
    query: Cell<String>,
    json: Cell<String>,
    uri: Cell<String>,
    xdr: Cell<String>,
    sep7: Cell<String>,
    signers: Cell<Vec<SignerRecord>>,
}

impl TxLink {
    // -- construction -----------------------------------------------------

    /// Parses `input` in any textual format, talking to the network through
    /// `network`.
    pub fn parse(
        input: &str,
        config: SessionConfig,
        network: Arc<dyn LedgerNetwork>,
    ) -> Result<Self, LinkError> {
        Self::parse_with(input, config, Arc::new(Resolver::new(network)))
    }

    /// Parses `input` against the Horizon node of `config`.
    pub fn connect(input: &str, config: SessionConfig) -> Result<Self, LinkError> {
        let network = HorizonClient::new(&config)?;
        Self::parse(input, config, Arc::new(network))
    }

    /// Wraps a descriptor.
    pub fn from_descriptor(
        desc: TransactionDescriptor,
        config: SessionConfig,
        network: Arc<dyn LedgerNetwork>,
    ) -> Result<Self, LinkError> {
        let parsed = Parsed {
            value: desc,
            diagnostics: Vec::new(),
        };
        Self::draft(Format::Descriptor, parsed, config, Arc::new(Resolver::new(network)))
    }

    /// Wraps an envelope. The link starts out locked.
    pub fn from_envelope(
        envelope: TransactionEnvelope,
        config: SessionConfig,
        network: Arc<dyn LedgerNetwork>,
    ) -> Result<Self, LinkError> {
        let resolver = Arc::new(Resolver::new(network));
        Self::signed(Format::Transaction, envelope, None, config, resolver)
    }

    fn parse_with(input: &str, mut config: SessionConfig, resolver: Arc<Resolver>) -> Result<Self, LinkError> {
        let entry = Format::sniff(input);
        let input = input.trim();
        debug!(%entry, "parsing transaction link");
        match entry {
            Format::Query => {
                let parsed = parse_query(input, config.error_policy)?;
                Self::draft(entry, parsed, config, resolver)
            }
            Format::Uri => {
                let (base, query) = input.split_once('?').ok_or(LinkError::UnknownFormat)?;
                let parsed = parse_query(query, config.error_policy)?;
                config.base_url = base.to_string();
                Self::draft(entry, parsed, config, resolver)
            }
            Format::Json => {
                let parsed = TransactionDescriptor::from_json(input, config.error_policy)?;
                Self::draft(entry, parsed, config, resolver)
            }
            Format::Xdr => {
                let envelope = TransactionEnvelope::from_base64(input)?;
                Self::signed(entry, envelope, None, config, resolver)
            }
            Format::Sep7 => match DeepLink::parse(input)? {
                DeepLink::Tx(request) => {
                    check_network(&config, &resolver, Some(request.passphrase()))?;
                    Self::signed(entry, request.envelope, request.callback, config, resolver)
                }
                DeepLink::Pay(request) => {
                    let parsed = request.to_descriptor(config.error_policy)?;
                    Self::draft(entry, parsed, config, resolver)
                }
            },
            Format::Descriptor | Format::Transaction => Err(LinkError::UnknownFormat),
        }
    }

    fn assemble(
        entry: Format,
        origin: Option<TransactionDescriptor>,
        envelope: Cell<TransactionEnvelope>,
        callback: Option<String>,
        diagnostics: Vec<Diagnostic>,
        config: SessionConfig,
        resolver: Arc<Resolver>,
    ) -> Self {
        Self {
            config,
            resolver,
            entry,
            origin,
            callback,
            diagnostics,
            status: Mutex::new(None),
            envelope,
            descriptor: OnceCell::new(),
            query: OnceCell::new(),
            json: OnceCell::new(),
            uri: OnceCell::new(),
            xdr: OnceCell::new(),
            sep7: OnceCell::new(),
            signers: OnceCell::new(),
        }
    }

    fn draft(
        entry: Format,
        parsed: Parsed<TransactionDescriptor>,
        config: SessionConfig,
        resolver: Arc<Resolver>,
    ) -> Result<Self, LinkError> {
        let declared = parsed.value.text("network").map(passphrase_for);
        check_network(&config, &resolver, declared)?;
        Ok(Self::assemble(
            entry,
            Some(parsed.value),
            OnceCell::new(),
            None,
            parsed.diagnostics,
            config,
            resolver,
        ))
    }

    fn signed(
        entry: Format,
        envelope: TransactionEnvelope,
        callback: Option<String>,
        config: SessionConfig,
        resolver: Arc<Resolver>,
    ) -> Result<Self, LinkError> {
        check_network(&config, &resolver, None)?;
        Ok(Self::assemble(
            entry,
            None,
            OnceCell::new_with(Some(Ok(envelope))),
            callback,
            Vec::new(),
            config,
            resolver,
        ))
    }

    /// A new, unlocked link over the current descriptor, sharing this
    /// link's resolution caches.
    pub async fn fork(&self) -> Result<TxLink, LinkError> {
        let desc = self.descriptor().await?;
        let parsed = Parsed {
            value: desc,
            diagnostics: Vec::new(),
        };
        Self::draft(Format::Descriptor, parsed, self.config.clone(), Arc::clone(&self.resolver))
    }

    // -- state ------------------------------------------------------------

    /// Format the link was created from.
    pub fn entry(&self) -> Format {
        self.entry
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    /// Soft problems found while parsing the input.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// First terminal error met by any conversion, if any.
    pub fn status(&self) -> Option<LinkError> {
        self.status.lock().clone()
    }

    /// Returns `true` once the transaction is bound to the network.
    pub fn is_locked(&self) -> bool {
        matches!(self.envelope.get(), Some(Ok(_)))
    }

    /// Clones a memoized outcome, recording a failure as the link status.
    fn settle<T: Clone>(&self, outcome: &Result<T, LinkError>) -> Result<T, LinkError> {
        if let Err(err) = outcome {
            let mut status = self.status.lock();
            if status.is_none() {
                warn!(entry = %self.entry, error = %err, "conversion failed");
                *status = Some(err.clone());
            }
        }
        outcome.clone()
    }

    fn passphrase(&self) -> &str {
        self.config.passphrase()
    }

    fn flatten_options(&self) -> FlattenOptions {
        let passphrase = self.passphrase();
        FlattenOptions {
            strip_signatures: self.config.strip_signatures,
            network: (passphrase != PUBLIC_PASSPHRASE)
                .then(|| network_name(passphrase).unwrap_or(passphrase).to_string()),
            callback: self.callback.clone(),
        }
    }

    // -- lock -------------------------------------------------------------

    /// Resolves the descriptor into a transaction.
    ///
    /// Runs at most once; concurrent callers share the build and every later
    /// call returns its outcome.
    pub async fn lock(&self) -> Result<(), LinkError> {
        let outcome = self
            .envelope
            .get_or_init(|| async {
                let desc = self
                    .origin
                    .as_ref()
                    .ok_or_else(|| LinkError::InvalidEnvelope("no descriptor to build".into()))?;
                info!(entry = %self.entry, operations = desc.operations.len(), "locking transaction");
                build(desc, &self.config, &self.resolver).await
            })
            .await;
        self.settle(outcome).map(|_| ())
    }

    // -- getters ----------------------------------------------------------

    /// The descriptor: the draft itself, or the flattened envelope.
    pub async fn descriptor(&self) -> Result<TransactionDescriptor, LinkError> {
        let outcome = self
            .descriptor
            .get_or_init(|| async {
                match &self.origin {
                    Some(desc) => Ok(desc.clone()),
                    None => Ok(flatten(&self.transaction().await?, &self.flatten_options())),
                }
            })
            .await;
        self.settle(outcome)
    }

    pub async fn query(&self) -> Result<String, LinkError> {
        let outcome = self
            .query
            .get_or_init(|| async { Ok(serialize_query(&self.descriptor().await?)) })
            .await;
        self.settle(outcome)
    }

    pub async fn json(&self) -> Result<String, LinkError> {
        let outcome = self
            .json
            .get_or_init(|| async { Ok(self.descriptor().await?.to_json()) })
            .await;
        self.settle(outcome)
    }

    /// `base_url` followed by the query.
    pub async fn uri(&self) -> Result<String, LinkError> {
        let outcome = self
            .uri
            .get_or_init(|| async { Ok(format!("{}{}", self.config.base_url, self.query().await?)) })
            .await;
        self.settle(outcome)
    }

    /// The native transaction with its signatures. Needs `lock()` for
    /// draft links.
    pub async fn transaction(&self) -> Result<TransactionEnvelope, LinkError> {
        match self.envelope.get() {
            Some(outcome) => self.settle(outcome),
            None => Err(LinkError::NotLocked),
        }
    }

    /// Base64 XDR envelope.
    pub async fn xdr(&self) -> Result<String, LinkError> {
        let envelope = self.transaction().await?;
        let outcome = self
            .xdr
            .get_or_init(|| async move { Ok(envelope.to_base64()) })
            .await;
        self.settle(outcome)
    }

    /// `web+stellar:tx` deep link.
    pub async fn sep7(&self) -> Result<String, LinkError> {
        let envelope = self.transaction().await?;
        let outcome = self
            .sep7
            .get_or_init(|| async move {
                let callback = match &self.origin {
                    Some(desc) => desc.text("callback").map(str::to_string),
                    None => self.callback.clone(),
                };
                let passphrase = self.passphrase();
                let request = TxRequest {
                    envelope,
                    callback,
                    network_passphrase: (passphrase != PUBLIC_PASSPHRASE).then(|| passphrase.to_string()),
                };
                Ok(request.to_string())
            })
            .await;
        self.settle(outcome)
    }

    // -- editing ----------------------------------------------------------

    fn reset_drafts(&mut self) {
        self.descriptor = OnceCell::new();
        self.query = OnceCell::new();
        self.json = OnceCell::new();
        self.uri = OnceCell::new();
        self.signers = OnceCell::new();
    }

    /// Decodes `raw` into a field, reporting a bad value the way the query
    /// parser does.
    fn decode_into(
        &mut self,
        name: &str,
        raw: &str,
        operation: Option<usize>,
    ) -> Result<Option<FieldValue>, LinkError> {
        let mut sink = Diagnostics::new(self.config.error_policy);
        let clears = raw.is_empty()
            && !matches!(field_type(name), Ok(FieldType::Buffer | FieldType::String(_)));
        let value = if clears {
            None
        } else {
            Some(decode_field(name, raw).or_else(|e| {
                sink.report(
                    Diagnostic::new(DiagnosticKind::InvalidValue, e.to_string())
                        .on_field(name)
                        .in_operation(operation),
                )?;
                Ok::<_, LinkError>(FieldValue::Invalid {
                    raw: raw.to_string(),
                    error: e.to_string(),
                })
            })?)
        };
        self.diagnostics.extend(sink.into_vec());
        Ok(value)
    }

    /// Drafts are editable until `lock()` has run.
    fn ensure_editable(&self) -> Result<(), LinkError> {
        match self.envelope.get() {
            Some(Ok(_)) => Err(LinkError::Locked),
            Some(Err(err)) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Sets (or, with an empty value, clears) a transaction field of the
    /// draft.
    pub fn set_field(&mut self, name: &str, raw: &str) -> Result<(), LinkError> {
        self.ensure_editable()?;
        if !is_transaction_field(name) {
            let mut sink = Diagnostics::new(self.config.error_policy);
            sink.report(Diagnostic::new(DiagnosticKind::InvalidField, "not a transaction field").on_field(name))?;
            self.diagnostics.extend(sink.into_vec());
            return Ok(());
        }
        let value = self.decode_into(name, raw, None)?;
        if let (true, Some(FieldValue::Text(network))) = (name == "network", &value) {
            check_network(&self.config, &self.resolver, Some(passphrase_for(network)))?;
        }
        if let Some(desc) = self.origin.as_mut() {
            match value {
                Some(value) => desc.set(name, value),
                None => {
                    desc.remove(name);
                }
            }
        }
        self.reset_drafts();
        Ok(())
    }

    /// Sets (or clears) a field of the operation at `index`.
    pub fn set_operation_field(&mut self, index: usize, name: &str, raw: &str) -> Result<(), LinkError> {
        self.ensure_editable()?;
        let accepts = self
            .origin
            .as_ref()
            .and_then(|desc| desc.operations.get(index))
            .map(|op| op.op_type.accepts(name));
        match accepts {
            None => {
                return Err(LinkError::Escalated(
                    Diagnostic::new(DiagnosticKind::InvalidField, format!("no operation {}", index + 1))
                        .in_operation(Some(index)),
                ))
            }
            Some(false) => {
                let mut sink = Diagnostics::new(self.config.error_policy);
                sink.report(
                    Diagnostic::new(DiagnosticKind::InvalidField, "not a field of this operation")
                        .on_field(name)
                        .in_operation(Some(index)),
                )?;
                self.diagnostics.extend(sink.into_vec());
                return Ok(());
            }
            Some(true) => {}
        }
        let value = self.decode_into(name, raw, Some(index))?;
        if let Some(op) = self.origin.as_mut().and_then(|d| d.operations.get_mut(index)) {
            match value {
                Some(value) => op.set(name, value),
                None => {
                    op.fields.remove(name);
                }
            }
        }
        self.reset_drafts();
        Ok(())
    }

    // -- signing ----------------------------------------------------------

    /// Signs the locked transaction with `keypair`.
    pub fn sign(&mut self, keypair: &Keypair) -> Result<(), LinkError> {
        let passphrase = self.config.passphrase().to_string();
        let envelope = match self.envelope.get_mut() {
            Some(Ok(envelope)) => envelope,
            Some(Err(err)) => return Err(err.clone()),
            None => return Err(LinkError::NotLocked),
        };
        let hash = envelope.tx.hash(&passphrase);
        let public_key = keypair.public_key_bytes();
        let hint = keypair.hint();
        // Hints are four bytes; only a verifying signature counts as ours.
        let signed = envelope
            .signatures
            .iter()
            .any(|sig| sig.hint == hint && verify_signature(&public_key, &hash, &sig.signature));
        if signed {
            debug!(signer = %keypair.account_id(), "already signed");
            return Ok(());
        }
        if envelope.signatures.len() >= MAX_SIGNATURES {
            return Err(LinkError::InvalidEnvelope(format!(
                "at most {} signatures fit an envelope",
                MAX_SIGNATURES
            )));
        }
        envelope.signatures.push(keypair.sign_decorated(&hash));
        info!(signer = %keypair.account_id(), signatures = envelope.signatures.len(), "signed transaction");

        self.xdr = OnceCell::new();
        self.sep7 = OnceCell::new();
        if self.origin.is_none() {
            self.reset_drafts();
        }
        Ok(())
    }

    /// Accounts able to sign, across every source account.
    pub async fn signers(&self) -> Result<Vec<SignerRecord>, LinkError> {
        let outcome = self
            .signers
            .get_or_init(|| async {
                let desc = self.descriptor().await?;
                compute_signers(&desc, &self.config, &self.resolver).await
            })
            .await;
        self.settle(outcome)
    }

    /// Every signer with whether it has signed yet.
    pub async fn signer_statuses(&self) -> Result<Vec<SignerStatus>, LinkError> {
        let envelope = self.transaction().await?;
        let signers = self.signers().await?;
        signer_statuses(&signers, &envelope, &self.resolver).await
    }

    /// Posts the envelope to the network.
    pub async fn submit(&self) -> Result<SubmitResult, LinkError> {
        let xdr = self.xdr().await?;
        let result = self.resolver.network().submit(&xdr).await;
        if let Err(err) = &result {
            warn!(error = %err, "submission failed");
        }
        result
    }
}

impl fmt::Debug for TxLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxLink")
            .field("entry", &self.entry)
            .field("network", &self.config.network)
            .field("locked", &self.is_locked())
            .field("diagnostics", &self.diagnostics.len())
            .field("status", &self.status())
            .finish()
    }
}

/// The session, the network service and the input must agree on the
/// network.
fn check_network(
    config: &SessionConfig,
    resolver: &Resolver,
    declared: Option<&str>,
) -> Result<(), LinkError> {
    let expected = config.passphrase();
    let served = resolver.network().passphrase();
    if served != expected {
        return Err(LinkError::InvalidNetwork(format!(
            "session targets '{}' but the network service serves '{}'",
            expected, served
        )));
    }
    match declared {
        Some(declared) if declared != expected => Err(LinkError::InvalidNetwork(format!(
            "transaction is for '{}' but the session targets '{}'",
            declared, expected
        ))),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
