use std::sync::Arc;

use qtumd_hub::{
    Node,
    config::Config,
    events::EventBus,
    rpc::{Backend, Error},
    test_utils::MockTransport,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn node_with(mock: &MockTransport) -> Node<MockTransport> {
    Node::new(
        Config::new_test(),
        vec![Arc::new(Backend::new(mock.clone(), None))],
        CancellationToken::new(),
        EventBus::new(),
    )
}

/// Answers the startup sequence so `run()` initialises chain state.
fn respond_startup(mock: &MockTransport, height: u64) {
    mock.respond("getbestblockhash", json!("aa".repeat(32)));
    mock.respond(
        "getblockheader",
        json!({
            "hash": "aa".repeat(32),
            "confirmations": 1,
            "height": height,
            "version": 536870912,
            "merkleroot": "bb",
            "time": 1600000000,
            "mediantime": 1600000000,
            "nonce": 0,
            "bits": "1d00ffff",
            "difficulty": 1.0,
            "chainwork": "00",
        }),
    );
    mock.respond("getblockhash", json!("cc".repeat(32)));
    mock.respond("getblock", json!("00"));
    mock.respond(
        "getblockchaininfo",
        json!({
            "chain": "regtest",
            "blocks": height,
            "bestblockhash": "aa".repeat(32),
            "verificationprogress": 1.0,
        }),
    );
}

fn verbose_tx(txid: &str, coinbase: bool) -> serde_json::Value {
    let vin = if coinbase {
        json!([{ "coinbase": "04ffff001d", "sequence": 4294967295u32 }])
    } else {
        json!([
            { "txid": "p1", "vout": 1, "scriptSig": {"asm": "a", "hex": "ab"},
              "sequence": 4294967295u32, "address": "A", "valueSat": 6000 },
            { "txid": "p2", "vout": 0, "scriptSig": {"asm": "b", "hex": "cd"},
              "sequence": 4294967295u32, "address": "B", "valueSat": 4000 },
        ])
    };
    json!({
        "hex": "00",
        "txid": txid,
        "version": 2,
        "locktime": 0,
        "vin": vin,
        "vout": [
            { "value": 0.00008, "valueSat": 8000, "n": 0,
              "scriptPubKey": {"asm": "", "hex": "76a9", "addresses": ["C"]},
              "spentTxId": "s1", "spentIndex": 2, "spentHeight": 99 },
            { "value": 0.00001, "valueSat": 1000, "n": 1,
              "scriptPubKey": {"asm": "", "hex": "76a9"} },
        ],
        "blockhash": "bh",
        "height": 90,
        "confirmations": 11,
        "time": 100,
        "blocktime": 100,
    })
}

#[tokio::test]
async fn detailed_transaction_derives_the_fee() {
    let mock = MockTransport::new();
    mock.respond("getrawtransaction", verbose_tx("t1", false));
    let node = node_with(&mock);

    let tx = node.get_detailed_transaction("t1").await.unwrap();
    assert!(!tx.is_coinbase);
    assert_eq!(tx.input_satoshis, 10000);
    assert_eq!(tx.output_satoshis, 9000);
    assert_eq!(tx.fee_satoshis, 1000);
    assert_eq!(tx.inputs.len(), 2);
    assert_eq!(tx.inputs[0].prev_tx_id.as_deref(), Some("p1"));
    assert_eq!(tx.inputs[0].address.as_deref(), Some("A"));
    assert_eq!(tx.outputs[0].spent_tx_id.as_deref(), Some("s1"));
    assert_eq!(tx.outputs[0].address.as_deref(), Some("C"));
    assert_eq!(tx.outputs[1].address, None);
    assert_eq!(tx.height, 90);
}

#[tokio::test]
async fn coinbase_transaction_has_zero_fee() {
    let mock = MockTransport::new();
    mock.respond("getrawtransaction", verbose_tx("t2", true));
    let node = node_with(&mock);

    let tx = node.get_detailed_transaction("t2").await.unwrap();
    assert!(tx.is_coinbase);
    assert_eq!(tx.input_satoshis, 0);
    assert_eq!(tx.fee_satoshis, 0);
    assert_eq!(tx.output_satoshis, 9000);
}

#[tokio::test]
async fn detailed_transaction_is_cached() {
    let mock = MockTransport::new();
    mock.respond("getrawtransaction", verbose_tx("t1", false));
    let node = node_with(&mock);

    node.get_detailed_transaction("t1").await.unwrap();
    node.get_detailed_transaction("t1").await.unwrap();
    assert_eq!(mock.calls("getrawtransaction"), 1);
}

#[tokio::test]
async fn numeric_block_argument_resolves_through_the_height_index() {
    let mock = MockTransport::new();
    mock.respond("getblockhash", json!("dd".repeat(32)));
    mock.respond("getblock", json!("00ff"));
    let node = node_with(&mock);

    let raw = node.get_raw_block("12345").await.unwrap();
    assert_eq!(raw, "00ff");
    assert_eq!(mock.calls("getblockhash"), 1);
    assert_eq!(mock.last_params("getblockhash").unwrap()[0], 12345);
}

#[tokio::test]
async fn hash_block_argument_passes_through() {
    let mock = MockTransport::new();
    mock.respond("getblock", json!("00ff"));
    let node = node_with(&mock);

    let hash = "e".repeat(64);
    node.get_raw_block(&hash).await.unwrap();
    assert_eq!(mock.calls("getblockhash"), 0);
    assert_eq!(mock.last_params("getblock").unwrap()[0], hash.as_str());
}

#[tokio::test]
async fn long_digit_string_is_treated_as_a_hash() {
    let mock = MockTransport::new();
    mock.respond("getblock", json!("00"));
    let node = node_with(&mock);

    // 45 digits: longer than the numeric cutoff
    let digits = "1".repeat(45);
    node.get_raw_block(&digits).await.unwrap();
    assert_eq!(mock.calls("getblockhash"), 0);
}

#[tokio::test]
async fn block_overview_reshapes_the_daemon_fields() {
    let mock = MockTransport::new();
    mock.respond(
        "getblock",
        json!({
            "hash": "h1",
            "confirmations": 2,
            "height": 55,
            "version": 536870912,
            "merkleroot": "mr",
            "tx": ["t1", "t2"],
            "time": 1234,
            "mediantime": 1230,
            "nonce": 42,
            "bits": "1d00ffff",
            "difficulty": 3.5,
            "chainwork": "0011",
            "previousblockhash": "h0",
            "nextblockhash": "h2",
        }),
    );
    let node = node_with(&mock);

    let overview = node.get_block_overview("h1").await.unwrap();
    assert_eq!(overview.height, 55);
    assert_eq!(overview.chain_work, "0011");
    assert_eq!(overview.prev_hash.as_deref(), Some("h0"));
    assert_eq!(overview.next_hash.as_deref(), Some("h2"));
    assert_eq!(overview.merkle_root, "mr");
    assert_eq!(overview.txids, vec!["t1", "t2"]);
}

#[tokio::test]
async fn spent_info_not_found_maps_to_none() {
    let mock = MockTransport::new();
    mock.fail_once("getspentinfo", -5, "Unable to get spent info");
    mock.respond("getspentinfo", json!({ "txid": "s1", "index": 3, "height": 12 }));
    let node = node_with(&mock);

    assert_eq!(node.get_spent_info("t1", 0).await.unwrap(), None);
    let found = node.get_spent_info("t1", 0).await.unwrap().unwrap();
    assert_eq!(found.txid, "s1");
    assert_eq!(found.index, 3);
}

#[tokio::test]
async fn confirmations_require_an_initialised_height() {
    let mock = MockTransport::new();
    let node = node_with(&mock);
    assert!(node.confirmations(5).is_err());

    respond_startup(&mock, 100);
    node.run().await.unwrap();
    assert_eq!(node.confirmations(100).unwrap(), 1);
    assert_eq!(node.confirmations(91).unwrap(), 10);
    // a transaction above the current tip clamps to zero
    assert_eq!(node.confirmations(200).unwrap(), 0);
    node.stop().await.unwrap();
}

#[tokio::test]
async fn startup_loads_tip_and_genesis() {
    let mock = MockTransport::new();
    respond_startup(&mock, 700);
    let node = node_with(&mock);
    node.run().await.unwrap();

    assert_eq!(node.height(), 700);
    assert_eq!(node.tiphash(), "aa".repeat(32));
    assert_eq!(node.genesis_raw(), vec![0u8]);
    node.stop().await.unwrap();
}

#[tokio::test]
async fn singleton_info_caches_hold_one_value() {
    let mock = MockTransport::new();
    mock.respond("getdgpinfo", json!({ "maxBlockSize": 2000000 }));
    mock.respond("getstakinginfo", json!({ "staking": true }));
    let node = node_with(&mock);

    node.get_dgp_info().await.unwrap();
    node.get_dgp_info().await.unwrap();
    assert_eq!(mock.calls("getdgpinfo"), 1);

    node.get_staking_info().await.unwrap();
    node.get_staking_info().await.unwrap();
    assert_eq!(mock.calls("getstakinginfo"), 1);
}

#[tokio::test]
async fn raw_transaction_errors_keep_the_daemon_code() {
    let mock = MockTransport::new();
    mock.fail_once("getrawtransaction", -5, "No such mempool or blockchain transaction");
    let node = node_with(&mock);

    let err = node.get_raw_transaction("missing").await.unwrap_err();
    assert_eq!(err.code(), Some(-5));
    assert!(matches!(err, Error::Rpc { .. }));
}
