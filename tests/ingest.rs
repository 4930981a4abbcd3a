use std::sync::Arc;

use bitcoin::{
    Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness,
    absolute::LockTime,
    hashes::{Hash, hash160, sha256d},
    transaction::Version,
};
use qtumd_hub::{
    Node,
    address::{Network, p2pkh_from_pubkey},
    config::Config,
    events::{EventBus, Event, Notification},
    rpc::Backend,
    subscriptions::Topic,
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

fn payment_to(pubkey: &[u8; 33]) -> (String, Vec<u8>) {
    let pkh = bitcoin::PubkeyHash::from_raw_hash(hash160::Hash::hash(pubkey));
    let tx = Transaction {
        version: Version(2),
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::null(),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::default(),
        }],
        output: vec![TxOut {
            value: Amount::from_sat(1000),
            script_pubkey: ScriptBuf::new_p2pkh(&pkh),
        }],
    };
    let address = p2pkh_from_pubkey(pubkey, Network::Regtest);
    (address, bitcoin::consensus::serialize(&tx))
}

fn respond_summary(mock: &MockTransport) {
    mock.respond("getaddresstxids", json!(["c1"]));
    mock.respond("getaddressbalance", json!({ "balance": 1000, "received": 1500 }));
    mock.respond("getaddressmempool", json!([]));
}

#[tokio::test]
async fn raw_tx_fans_out_to_topic_address_and_balance_subscribers() {
    let mock = MockTransport::new();
    respond_summary(&mock);
    let node = node_with(&mock);
    let (address, payload) = payment_to(&[2u8; 33]);
    let expected_txid = sha256d::Hash::hash(&payload).to_string();

    let (raw_sub, mut raw_rx) = qtumd_hub::events::Emitter::channel();
    let (txid_sub, mut txid_rx) = qtumd_hub::events::Emitter::channel();
    let (balance_one, mut balance_rx1) = qtumd_hub::events::Emitter::channel();
    let (balance_two, mut balance_rx2) = qtumd_hub::events::Emitter::channel();
    node.subscribe(Topic::RawTransaction, raw_sub);
    node.subscribe_address(&txid_sub, &[address.clone()]);
    node.subscribe_balance(&balance_one, &[address.clone()]);
    node.subscribe_balance(&balance_two, &[address.clone()]);

    node.ingest_raw_transaction(&payload).await;

    assert_eq!(
        raw_rx.try_recv().unwrap(),
        Notification::RawTransaction {
            raw: hex::encode(&payload)
        }
    );
    assert_eq!(
        txid_rx.try_recv().unwrap(),
        Notification::AddressTxid {
            address: address.clone(),
            txid: expected_txid.clone(),
        }
    );
    for rx in [&mut balance_rx1, &mut balance_rx2] {
        let notification = rx.try_recv().unwrap();
        assert_eq!(
            notification,
            Notification::AddressBalance {
                address: address.clone(),
                txid: expected_txid.clone(),
                total_received: 1500,
                total_spent: 500,
                balance: 1000,
                unconfirmed_balance: 0,
            }
        );
        // exactly one event per subscriber
        assert!(rx.try_recv().is_err());
    }
    assert!(txid_rx.try_recv().is_err());
}

#[tokio::test]
async fn duplicate_raw_tx_is_dropped() {
    let mock = MockTransport::new();
    respond_summary(&mock);
    let node = node_with(&mock);
    let (_, payload) = payment_to(&[3u8; 33]);

    let (raw_sub, mut raw_rx) = qtumd_hub::events::Emitter::channel();
    node.subscribe(Topic::RawTransaction, raw_sub);

    node.ingest_raw_transaction(&payload).await;
    node.ingest_raw_transaction(&payload).await;

    assert!(raw_rx.try_recv().is_ok());
    assert!(raw_rx.try_recv().is_err());
}

#[tokio::test]
async fn block_hash_is_deduped_for_subscribers() {
    let mock = MockTransport::new();
    let node = node_with(&mock);
    let mut events = node.events();
    let (block_sub, mut block_rx) = qtumd_hub::events::Emitter::channel();
    node.subscribe(Topic::HashBlock, block_sub);

    let hash = "ab".repeat(32);
    node.ingest_block_hash(hash.clone());
    node.ingest_block_hash(hash.clone());

    assert_eq!(
        block_rx.try_recv().unwrap(),
        Notification::HashBlock { hash: hash.clone() }
    );
    assert!(block_rx.try_recv().is_err());
    assert_eq!(events.try_recv().unwrap(), Event::Block { hash });
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn undecodable_payload_still_notifies_topic_subscribers() {
    let mock = MockTransport::new();
    let node = node_with(&mock);
    let mut events = node.events();
    let (raw_sub, mut raw_rx) = qtumd_hub::events::Emitter::channel();
    node.subscribe(Topic::RawTransaction, raw_sub);

    node.ingest_raw_transaction(&[0xde, 0xad, 0xbe, 0xef]).await;

    assert!(raw_rx.try_recv().is_ok());
    // decode failure is reported as an error event, ingest continues
    assert_eq!(events.try_recv().unwrap(), Event::Tx { raw: "deadbeef".into() });
    assert!(matches!(events.try_recv(), Ok(Event::Error { .. })));
}
