//! Filters, log queries and receipt decoding through a session task.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chaincontract_core::{BlockRef, SessionError};
use chaincontract_evm::{fingerprint, EventQuery};
use chaincontract_session::{ConfigError, FilterParams, SessionConfig, SessionHandle, Sessions};
use common::{bytes32_text, fixture, spawn, word, MockTransport, DEPLOYED, SENDER};
use serde_json::{json, Value};

fn simple_topic() -> String {
    fingerprint::event_topic("Simple(uint256,bytes32)")
}

fn tagged_topic() -> String {
    fingerprint::event_topic("Tagged(address,bytes32,uint256)")
}

fn simple_log() -> Value {
    json!({
        "address": DEPLOYED,
        "topics": [simple_topic()],
        "data": format!("0x{}{}", word(42), bytes32_text("Hello").trim_start_matches("0x")),
        "blockNumber": "0x10",
        "logIndex": "0x3",
        "transactionIndex": "0x1",
        "transactionHash": "0xfeed"
    })
}

fn stranger_log() -> Value {
    json!({
        "address": "0x0000000000000000000000000000000000000001",
        "topics": [format!("0x{}", "ee".repeat(32))],
        "data": "0x1234",
        "logIndex": "0x0"
    })
}

async fn bound(transport: &Arc<MockTransport>) -> SessionHandle {
    let session = spawn(transport);
    session.register_artifact("simple", &fixture("simple.json")).await.unwrap();
    session.bind_address("simple", DEPLOYED).await.unwrap();
    session
}

#[tokio::test]
async fn simple_event_end_to_end() {
    let t = MockTransport::new();
    t.answer("eth_newFilter", json!("0xf1"));
    t.answer("eth_getFilterChanges", json!([simple_log()]));
    let session = bound(&t).await;

    let id = session.filter("simple", "Simple", FilterParams::new()).await.unwrap();
    assert_eq!(id, "0xf1");
    let payload = &t.requests("eth_newFilter")[0].params[0];
    assert_eq!(payload, &json!({"address": DEPLOYED, "topics": [simple_topic()]}));

    let changes = session.get_filter_changes("0xf1").await.unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0]["data"], json!({"num": 42, "data": "Hello"}));
    assert_eq!(changes[0]["blockNumber"], json!(16));
    assert_eq!(changes[0]["logIndex"], json!(3));
    assert_eq!(changes[0]["transactionIndex"], json!(1));
    assert_eq!(changes[0]["transactionHash"], json!("0xfeed"));
}

#[tokio::test]
async fn or_set_query_and_named_query_agree() {
    let t = MockTransport::new();
    t.always("eth_newFilter", json!("0xf2"));
    let session = bound(&t).await;

    let positional = FilterParams::new().topics(EventQuery::from_value(&json!([null, ["A", "B"]])));
    let named = FilterParams::new().topics(EventQuery::from_value(&json!({"tag": ["A", "B"]})));
    session.filter("simple", "Tagged", positional).await.unwrap();
    session.filter("simple", "Tagged", named).await.unwrap();

    let sent = t.requests("eth_newFilter");
    let expected = json!([tagged_topic(), null, [bytes32_text("A"), bytes32_text("B")]]);
    assert_eq!(sent[0].params[0]["topics"], expected);
    assert_eq!(sent[1].params[0]["topics"], expected);
}

#[tokio::test]
async fn block_bounds_are_encoded() {
    let t = MockTransport::new();
    t.answer("eth_newFilter", json!("0xf3"));
    let session = bound(&t).await;
    let params = FilterParams::new()
        .from_block(BlockRef::Number(100))
        .to_block(BlockRef::Pending);
    session.filter("simple", "Simple", params).await.unwrap();
    let payload = &t.requests("eth_newFilter")[0].params[0];
    assert_eq!(payload["fromBlock"], json!("0x64"));
    assert_eq!(payload["toBlock"], json!("pending"));
}

#[tokio::test]
async fn unknown_event_filter_matches_everything_and_decodes_empty() {
    let t = MockTransport::new();
    t.answer("eth_newFilter", json!("0xf4"));
    t.answer("eth_getFilterChanges", json!([simple_log()]));
    let session = bound(&t).await;

    session.filter("simple", "Nope", FilterParams::new()).await.unwrap();
    let payload = &t.requests("eth_newFilter")[0].params[0];
    assert!(payload.get("topics").is_none());

    let changes = session.get_filter_changes("0xf4").await.unwrap();
    assert_eq!(changes[0]["data"], json!({}));
}

#[tokio::test]
async fn uninstall_drops_the_decode_context() {
    let t = MockTransport::new();
    t.answer("eth_newFilter", json!("0xf5"));
    t.always("eth_uninstallFilter", json!(true));
    t.always("eth_getFilterChanges", json!([simple_log()]));
    let session = bound(&t).await;

    session.filter("simple", "Simple", FilterParams::new()).await.unwrap();
    assert_eq!(session.get_filter_changes("0xf5").await.unwrap()[0]["data"]["num"], json!(42));

    assert!(session.uninstall_filter("0xf5").await.unwrap());
    assert_eq!(t.requests("eth_uninstallFilter")[0].params, vec![json!("0xf5")]);
    assert_eq!(session.get_filter_changes("0xf5").await.unwrap()[0]["data"], json!({}));
}

#[tokio::test]
async fn unknown_filter_id_goes_to_the_node() {
    let t = MockTransport::new();
    t.fail("eth_getFilterChanges", -32000, "filter not found");
    let session = bound(&t).await;
    let err = session.get_filter_changes("0xdead").await.unwrap_err();
    assert_eq!(err.tag(), "transport");
}

#[tokio::test]
async fn get_logs_replaces_known_and_empties_unknown() {
    let t = MockTransport::new();
    t.answer("eth_getLogs", json!([simple_log(), stranger_log()]));
    let session = bound(&t).await;

    let filter = json!({"address": DEPLOYED, "fromBlock": "earliest"});
    let logs = session.get_logs("simple", filter.clone()).await.unwrap();
    assert_eq!(t.requests("eth_getLogs")[0].params, vec![filter]);
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0]["data"]["num"], json!(42));
    assert_eq!(logs[1]["data"], json!({}));
}

#[tokio::test]
async fn receipt_logs_are_augmented_in_place() {
    let t = MockTransport::new();
    let receipt = json!({
        "transactionHash": "0xfeed",
        "status": "0x1",
        "logs": [stranger_log(), simple_log(), stranger_log()]
    });
    t.answer("eth_getTransactionReceipt", receipt);
    let session = bound(&t).await;

    let out = session.tx_receipt("0xfeed").await.unwrap().unwrap();
    let logs = out["logs"].as_array().unwrap();
    assert_eq!(logs.len(), 3);
    assert_eq!(logs[0], stranger_log());
    assert_eq!(logs[2], stranger_log());
    assert_eq!(logs[1]["decoded"]["signature"], json!("Simple(uint256,bytes32)"));
    assert_eq!(logs[1]["decoded"]["args"], json!({"num": 42, "data": "Hello"}));
    assert_eq!(logs[1]["topics"], simple_log()["topics"]);
    // receipt logs keep their hex quantities
    assert_eq!(logs[1]["logIndex"], json!("0x3"));
    assert_eq!(logs[1]["blockNumber"], json!("0x10"));
}

#[tokio::test]
async fn pending_receipt_is_none() {
    let t = MockTransport::new();
    t.answer("eth_getTransactionReceipt", Value::Null);
    let session = bound(&t).await;
    assert!(session.tx_receipt("0x01").await.unwrap().is_none());
}

#[tokio::test]
async fn decode_tx_logs_without_rpc() {
    let t = MockTransport::new();
    let session = bound(&t).await;
    let out = session.decode_tx_logs(vec![simple_log()]).await.unwrap();
    assert_eq!(out[0]["decoded"]["event"], json!("Simple"));
    assert_eq!(t.request_count(), 0);
}

#[tokio::test]
async fn abandoned_filter_install_is_not_recorded() {
    let t = MockTransport::new();
    t.answer("eth_newFilter", json!("0xf6"));
    t.delay("eth_newFilter", Duration::from_millis(150));
    t.always("eth_uninstallFilter", json!(true));
    t.always("eth_getFilterChanges", json!([simple_log()]));
    let session = bound(&t).await;

    let err = session
        .with_timeout(Duration::from_millis(20))
        .filter("simple", "Simple", FilterParams::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Timeout { .. }));

    // queued behind the slow install; by the time it answers the install is settled
    let changes = session.get_filter_changes("0xf6").await.unwrap();
    assert_eq!(changes[0]["data"], json!({}));
    assert_eq!(t.requests("eth_uninstallFilter").len(), 1);
}

#[tokio::test]
async fn sessions_directory() {
    let t = MockTransport::new();
    let sessions = Sessions::new();
    let default = sessions.start(SessionConfig::default(), t.clone());
    sessions.start(SessionConfig::named("signer").with_default_from(SENDER), t.clone());
    assert_eq!(sessions.names(), vec!["default", "signer"]);

    default.register_artifact("simple", &fixture("simple.json")).await.unwrap();
    let again = sessions.default_session().unwrap();
    assert_eq!(again.contracts().await.unwrap(), vec!["simple"]);

    // sessions are independent
    let signer = sessions.get("signer").unwrap();
    assert!(signer.contracts().await.unwrap().is_empty());

    assert!(sessions.stop("signer").await.unwrap());
    assert!(!sessions.stop("signer").await.unwrap());
    tokio::time::sleep(Duration::from_millis(20)).await;
    let err = signer.contracts().await.unwrap_err();
    assert!(matches!(err, SessionError::Closed { session } if session == "signer"));
}

#[tokio::test]
async fn sessions_connect_from_config() {
    let sessions = Sessions::new();
    let err = sessions.connect(SessionConfig::named("mainnet")).unwrap_err();
    assert!(matches!(err, ConfigError::MissingRpcUrl { .. }));
    assert!(sessions.names().is_empty());

    let config = SessionConfig::from_yaml_str("name: devnet\nrpc_url: http://127.0.0.1:8545\n").unwrap();
    let devnet = sessions.connect(config).unwrap();
    assert_eq!(devnet.name(), "devnet");
    devnet.register_artifact("simple", &fixture("simple.json")).await.unwrap();
    assert_eq!(sessions.get("devnet").unwrap().contracts().await.unwrap(), vec!["simple"]);
}
