//! End-to-end tests for the format graph.
//!
//! Every test runs against its own in-memory network: accounts, federation
//! records and the base fee are seeded up front, and the network's counters
//! show how many lookups a conversion really made.

use std::sync::Arc;

use txlink::config::{PUBLIC_PASSPHRASE, TESTNET_PASSPHRASE};
use txlink::crypto::{verify_signature, Keypair};
use txlink::fields::{AssetValue, MemoType, MemoValue, SignerType};
use txlink::resolve::{AccountSnapshot, ResolvedAccount, SignerRecord, Thresholds};
use txlink::xdr::{AccountId, Memo, OperationBody, XdrCodec};
use txlink::{
    build, flatten, parse_query, serialize_query, DiagnosticKind, ErrorPolicy, FieldValue,
    FlattenOptions, Format, LinkError, MemoryNetwork, Resolver, SessionConfig, TransactionEnvelope,
    TxLink,
};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn keypair(seed: u8) -> Keypair {
    Keypair::from_seed(&[seed; 32])
}

fn account(seed: u8, sequence: i64, signers: &[(String, u32)]) -> AccountSnapshot {
    AccountSnapshot {
        id: keypair(seed).account_id(),
        sequence,
        signers: signers
            .iter()
            .map(|(value, weight)| SignerRecord {
                weight: *weight,
                kind: SignerType::Key,
                value: value.clone(),
            })
            .collect(),
        thresholds: Thresholds::default(),
    }
}

/// Testnet with a funded source account (seed 1) signed by its own key.
fn network() -> Arc<MemoryNetwork> {
    let source = keypair(1).account_id();
    Arc::new(
        MemoryNetwork::new(TESTNET_PASSPHRASE)
            .with_account(account(1, 100, &[(source, 1)]))
            .with_federation(
                "bob*example.com",
                ResolvedAccount {
                    account_id: keypair(2).account_id(),
                    address: Some("bob*example.com".into()),
                    memo: None,
                },
            )
            .with_federation(
                "shop*example.com",
                ResolvedAccount {
                    account_id: keypair(3).account_id(),
                    address: Some("shop*example.com".into()),
                    memo: Some(MemoValue::new(MemoType::Id, "5150")),
                },
            ),
    )
}

fn config() -> SessionConfig {
    SessionConfig::testnet().with_source(&keypair(1).account_id())
}

fn link(input: &str, network: &Arc<MemoryNetwork>) -> TxLink {
    TxLink::parse(input, config(), network.clone()).expect("link")
}

// ---------------------------------------------------------------------------
// Query canonical form
// ---------------------------------------------------------------------------

#[test]
fn single_operation_queries_roundtrip() {
    let g = keypair(2).account_id();
    let queries = [
        format!("?payment&destination={}&amount=20", g),
        format!("?payment&memo=id:42&destination={}&amount=0.5&asset=EUR:{}", g, g),
        format!("?createAccount&destination={}&startingBalance=2", g),
        format!("?pathPaymentStrictSend&sendAmount=1&destination={}&destAsset=EUR:{}&destMin=0.9", g, g),
        format!("?setOptions&signer=1:key:{}&homeDomain=example.com", g),
        "?manageData&name=greeting&value=hello".to_string(),
        "?bumpSequence&fee=1000&bumpTo=500".to_string(),
    ];
    for query in &queries {
        let parsed = parse_query(query, ErrorPolicy::Accumulate).unwrap();
        assert!(parsed.is_clean(), "{}: {:?}", query, parsed.diagnostics);
        assert_eq!(&serialize_query(&parsed.value), query);
    }
}

#[test]
fn native_asset_spellings_agree() {
    let g = keypair(2).account_id();
    let native = FieldValue::Asset(AssetValue::native());
    for spelling in ["XLM", "xlm", "native", "NATIVE"] {
        let query = format!("?payment&destination={}&amount=1&asset={}", g, spelling);
        let parsed = parse_query(&query, ErrorPolicy::Accumulate).unwrap();
        assert_eq!(parsed.value.operations[0].get("asset"), Some(&native));
        assert_eq!(serialize_query(&parsed.value), format!("?payment&destination={}&amount=1", g));
    }
}

#[test]
fn prices_canonicalize() {
    let g = keypair(2).account_id();
    let a = parse_query(&format!("?manageSellOffer&selling=EUR:{}&amount=1&price=50", g), ErrorPolicy::Raise)
        .unwrap()
        .value;
    let b = parse_query(&format!("?manageSellOffer&selling=EUR:{}&amount=1&price=50:1", g), ErrorPolicy::Raise)
        .unwrap()
        .value;
    assert_eq!(a, b);
    assert!(serialize_query(&b).ends_with("&price=50"));
}

#[test]
fn manage_data_empty_and_absent_values_differ() {
    let deleted = parse_query("?manageData&name=x&value=", ErrorPolicy::Accumulate).unwrap();
    assert!(deleted.is_clean());
    assert_eq!(deleted.value.operations[0].get("value"), Some(&FieldValue::Null));

    let missing = parse_query("?manageData&name=x", ErrorPolicy::Accumulate).unwrap();
    assert_eq!(missing.diagnostics.len(), 1);
    assert_eq!(missing.diagnostics[0].kind, DiagnosticKind::InvalidField);
    assert_eq!(missing.diagnostics[0].field.as_deref(), Some("value"));
}

// ---------------------------------------------------------------------------
// Lock and the envelope side
// ---------------------------------------------------------------------------

#[tokio::test]
async fn envelope_needs_lock() {
    let network = network();
    let link = link(&format!("?payment&destination={}&amount=1", keypair(2).account_id()), &network);

    assert_eq!(link.entry(), Format::Query);
    assert!(!link.is_locked());
    assert_eq!(link.xdr().await, Err(LinkError::NotLocked));
    assert_eq!(link.sep7().await, Err(LinkError::NotLocked));
    assert!(link.status().is_none());

    link.lock().await.unwrap();
    let tx = link.transaction().await.unwrap().tx;
    assert_eq!(tx.seq_num, 101);
    assert_eq!(tx.fee, 100);
    assert_eq!(tx.source_account.to_strkey(), keypair(1).account_id());
}

#[tokio::test]
async fn concurrent_locks_build_once() {
    let network = network();
    let link = link(&format!("?payment&destination={}&amount=1", keypair(2).account_id()), &network);
    let (a, b) = tokio::join!(link.lock(), link.lock());
    a.unwrap();
    b.unwrap();
    assert_eq!(network.account_loads(), 1);
    assert_eq!(link.xdr().await.unwrap(), link.xdr().await.unwrap());
}

#[tokio::test]
async fn locked_links_reject_edits() {
    let network = network();
    let mut link = link("?inflation", &network);
    link.set_field("memo", "draft").unwrap();
    assert!(link.query().await.unwrap().contains("memo=draft"));

    link.lock().await.unwrap();
    assert_eq!(link.set_field("memo", "late"), Err(LinkError::Locked));

    let mut draft = link.fork().await.unwrap();
    assert!(!draft.is_locked());
    draft.set_field("memo", "late").unwrap();
    assert!(draft.query().await.unwrap().contains("memo=late"));
}

#[tokio::test]
async fn xdr_roundtrips_through_the_descriptor() {
    let network = network();
    let query = format!(
        "?transaction&memo=order%2042&maxTime=2030-01-01&operation=payment&destination={}&amount=3&asset=EUR:{}&operation=manageData&name=k&value=",
        keypair(2).account_id(),
        keypair(4).account_id(),
    );
    let drafted = link(&query, &network);
    drafted.lock().await.unwrap();
    let xdr = drafted.xdr().await.unwrap();

    let decoded = link(&xdr, &network);
    assert_eq!(decoded.entry(), Format::Xdr);
    assert!(decoded.is_locked());
    let desc = decoded.descriptor().await.unwrap();
    assert_eq!(desc.text("source"), Some(keypair(1).account_id().as_str()));
    assert_eq!(desc.get("sequence"), Some(&FieldValue::Integer(101)));
    assert!(desc.get("fee").is_none());

    let rebuilt = TxLink::from_descriptor(desc, config(), network.clone()).unwrap();
    rebuilt.lock().await.unwrap();
    assert_eq!(rebuilt.xdr().await.unwrap(), xdr);
}

#[tokio::test]
async fn build_of_flatten_is_byte_identical() {
    let network = network();
    let drafted = link(
        &format!(
            "?transaction&operation=createAccount&destination={}&startingBalance=5&operation=changeTrust&asset=EUR:{}&source={}",
            keypair(5).account_id(),
            keypair(4).account_id(),
            keypair(6).account_id(),
        ),
        &network,
    );
    drafted.lock().await.unwrap();
    let envelope = drafted.transaction().await.unwrap();

    let resolver = Resolver::new(network.clone());
    let desc = flatten(&envelope, &FlattenOptions::default());
    let rebuilt = build(&desc, &config(), &resolver).await.unwrap();
    assert_eq!(rebuilt.to_xdr(), envelope.to_xdr());
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn repeated_federated_destination_is_looked_up_once() {
    let network = network();
    let link = link(
        "?transaction&operation=payment&destination=bob*example.com&amount=1&operation=payment&destination=bob*example.com&amount=2",
        &network,
    );
    link.lock().await.unwrap();
    assert_eq!(network.federation_lookups(), 1);

    let tx = link.transaction().await.unwrap().tx;
    for op in &tx.operations {
        let OperationBody::Payment { destination, .. } = &op.body else {
            panic!("expected a payment");
        };
        assert_eq!(destination.to_strkey(), keypair(2).account_id());
    }
}

#[tokio::test]
async fn required_memo_is_injected() {
    let network = network();
    let link = link("?payment&destination=shop*example.com&amount=1", &network);
    link.lock().await.unwrap();
    assert_eq!(link.transaction().await.unwrap().tx.memo, Memo::Id(5150));
}

#[tokio::test]
async fn conflicting_memo_becomes_the_status() {
    let network = network();
    let link = link("?payment&memo=hello&destination=shop*example.com&amount=1", &network);

    let err = link.lock().await.unwrap_err();
    assert!(matches!(err, LinkError::MemoConflict { .. }));
    assert_eq!(link.status(), Some(err.clone()));
    assert_eq!(link.xdr().await, Err(err));
    assert!(link.query().await.is_ok());
}

#[tokio::test]
async fn unknown_federated_address_fails_the_build() {
    let network = network();
    let link = link("?payment&destination=nobody*example.com&amount=1", &network);
    let err = link.lock().await.unwrap_err();
    assert!(matches!(err.root_cause(), LinkError::UnresolvedAddress { .. }));
}

#[tokio::test]
async fn signers_span_every_source() {
    let (a, b, shared) = (keypair(7), keypair(8), keypair(9));
    let network = Arc::new(
        MemoryNetwork::new(TESTNET_PASSPHRASE)
            .with_account(account(7, 1, &[(a.account_id(), 1), (shared.account_id(), 20)]))
            .with_account(account(8, 1, &[(b.account_id(), 5), (shared.account_id(), 20)])),
    );
    let query = format!(
        "?transaction&source={}&operation=inflation&operation=inflation&source={}",
        a.account_id(),
        b.account_id()
    );
    let link = TxLink::parse(&query, SessionConfig::testnet(), network).unwrap();

    let signers: Vec<(String, u32)> = link
        .signers()
        .await
        .unwrap()
        .into_iter()
        .map(|s| (s.value, s.weight))
        .collect();
    assert_eq!(
        signers,
        vec![
            (shared.account_id(), 20),
            (b.account_id(), 5),
            (a.account_id(), 1),
        ]
    );
}

// ---------------------------------------------------------------------------
// Signing, links, submission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn signed_envelope_strips_back_to_unsigned() {
    let network = network();
    let mut link = link(&format!("?payment&destination={}&amount=1", keypair(2).account_id()), &network);
    link.lock().await.unwrap();
    link.sign(&keypair(1)).unwrap();

    let statuses = link.signer_statuses().await.unwrap();
    assert_eq!(statuses.len(), 1);
    assert!(statuses[0].signed);

    let signed = link.transaction().await.unwrap();
    assert_eq!(signed.signatures.len(), 1);

    let mut stripping = config();
    stripping.strip_signatures = true;
    let decoded = TxLink::parse(&link.xdr().await.unwrap(), stripping, network.clone()).unwrap();
    let desc = decoded.descriptor().await.unwrap();
    assert!(desc.signatures.is_empty());
    assert!(!decoded.json().await.unwrap().contains("signatures"));

    let rebuilt = decoded.fork().await.unwrap();
    rebuilt.lock().await.unwrap();
    let unsigned = rebuilt.transaction().await.unwrap();
    assert!(unsigned.signatures.is_empty());
    assert_eq!(unsigned.tx, signed.tx);
}

#[tokio::test]
async fn uri_keeps_its_base() {
    let network = network();
    let uri = format!("https://example.org/?payment&destination={}&amount=7", keypair(2).account_id());
    let drafted = link(&uri, &network);
    assert_eq!(drafted.entry(), Format::Uri);
    assert_eq!(drafted.uri().await.unwrap(), uri);
}

#[tokio::test]
async fn deep_link_roundtrips_with_callback() {
    let network = network();
    let drafted = link(
        &format!("?payment&callback=https://example.com/cb&destination={}&amount=7", keypair(2).account_id()),
        &network,
    );
    drafted.lock().await.unwrap();
    let sep7 = drafted.sep7().await.unwrap();
    assert!(sep7.starts_with("web+stellar:tx?xdr="));

    let decoded = link(&sep7, &network);
    assert_eq!(decoded.entry(), Format::Sep7);
    assert_eq!(decoded.transaction().await, drafted.transaction().await);
    assert_eq!(decoded.sep7().await.unwrap(), sep7);
}

#[tokio::test]
async fn submission_reaches_the_network() {
    let network = network();
    let mut link = link("?inflation", &network);
    link.lock().await.unwrap();
    link.sign(&keypair(1)).unwrap();

    let result = link.submit().await.unwrap();
    let envelope = link.transaction().await.unwrap();
    assert_eq!(result.hash, envelope.hash_hex(TESTNET_PASSPHRASE));
    assert_eq!(network.submitted(), vec![link.xdr().await.unwrap()]);
}

// ---------------------------------------------------------------------------
// Network consistency
// ---------------------------------------------------------------------------

#[test]
fn mismatched_networks_are_rejected() {
    let public = Arc::new(MemoryNetwork::new(PUBLIC_PASSPHRASE));
    let err = TxLink::parse("?inflation", SessionConfig::testnet(), public).unwrap_err();
    assert!(matches!(err, LinkError::InvalidNetwork(_)));

    let err = TxLink::parse("?inflation&network=public", config(), network()).unwrap_err();
    assert!(matches!(err, LinkError::InvalidNetwork(_)));

    assert!(TxLink::parse("?inflation&network=test", config(), network()).is_ok());
}

#[test]
fn garbage_input_is_an_invalid_envelope() {
    let err = TxLink::parse("not a transaction", config(), network()).unwrap_err();
    assert!(matches!(err, LinkError::InvalidEnvelope(_)));
}

// ---------------------------------------------------------------------------
// Known envelope
// ---------------------------------------------------------------------------

/// Public-network payment of 12.5 USD from the account of seed `00 01 .. 1f`,
/// signed by that account.
const KNOWN_ENVELOPE: &str = "AAAAAgAAAAADoQe/884Qvh1w3RjnS8CZZ+TWMJulDV8d3IZkElUxuAAAAGQAAAABAAAAAQAAAAEAAAAAAAAAAAAAAABw29iAAAAAAQAAAAdpbnRlcm9wAAAAAAEAAAAAAAAAAQAAAAAREREREREREREREREREREREREREREREREREREREREREQAAAAFVU0QAAAAAAAOhB7/zzhC+HXDdGOdLwJln5NYwm6UNXx3chmQSVTG4AAAAAAdzWUAAAAAAAAAAARJVMbgAAABAQipktV6YYgtOmnEAZzPln0KR3JXiRpYDDOc2aEjVm3EcaeO9XQZDkhaICnFE83QOuMgYHlnJg/i4pmhwAn3TBg==";
const KNOWN_ENVELOPE_HASH: &str = "e28b29695995ad718923f0faf6dcc90e9a54863bce33b59d6c86ec711e19ec49";
const KNOWN_SOURCE: &str = "GAB2CB576PHBBPQ5ODORRZ2LYCMWPZGWGCN2KDK7DXOIMZASKUY3QZ6Q";

#[test]
fn known_envelope_decodes_and_reencodes() {
    let env = TransactionEnvelope::from_base64(KNOWN_ENVELOPE).unwrap();
    assert_eq!(env.to_base64(), KNOWN_ENVELOPE);
    assert_eq!(env.hash_hex(PUBLIC_PASSPHRASE), KNOWN_ENVELOPE_HASH);

    assert_eq!(env.tx.source_account.to_strkey(), KNOWN_SOURCE);
    assert_eq!(env.tx.seq_num, 4_294_967_297);
    assert_eq!(env.tx.fee, 100);
    assert_eq!(env.tx.memo, Memo::Text("interop".into()));

    let signature = &env.signatures[0];
    let source = Keypair::from_seed(&std::array::from_fn(|i| i as u8));
    assert_eq!(source.account_id(), KNOWN_SOURCE);
    assert_eq!(signature.hint, source.hint());
    assert!(verify_signature(
        &source.public_key_bytes(),
        &env.tx.hash(PUBLIC_PASSPHRASE),
        &signature.signature
    ));
}

#[test]
fn known_envelope_flattens_to_descriptor() {
    let env = TransactionEnvelope::from_base64(KNOWN_ENVELOPE).unwrap();
    let desc = flatten(&env, &FlattenOptions::default());

    assert_eq!(desc.get("source"), Some(&FieldValue::Address(KNOWN_SOURCE.into())));
    assert_eq!(desc.get("sequence"), Some(&FieldValue::Integer(4_294_967_297)));
    assert_eq!(desc.get("memo"), Some(&FieldValue::Memo(MemoValue::new(MemoType::Text, "interop"))));
    assert_eq!(desc.get("minTime"), None);
    assert_eq!(desc.get("maxTime"), Some(&FieldValue::Date(1_893_456_000)));
    // 100 stroops for one operation is the default fee.
    assert_eq!(desc.get("fee"), None);
    assert_eq!(desc.signatures, env.signatures);

    let payment = &desc.operations[0];
    assert_eq!(
        payment.get("destination"),
        Some(&FieldValue::Address(AccountId([0x11; 32]).to_strkey()))
    );
    assert_eq!(payment.get("amount"), Some(&FieldValue::Amount("12.5".into())));
    assert_eq!(
        payment.get("asset"),
        Some(&FieldValue::Asset(AssetValue::credit("USD", KNOWN_SOURCE)))
    );
}
