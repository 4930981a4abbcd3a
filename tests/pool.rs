use std::{sync::Arc, time::Duration};

use qtumd_hub::{
    rpc::{Backend, Error, Pool, QtumRpc},
    test_utils::MockTransport,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn pool_of(mocks: &[MockTransport], interval: Duration) -> (Pool<MockTransport>, CancellationToken) {
    let cancel_token = CancellationToken::new();
    let backends = mocks
        .iter()
        .map(|m| Arc::new(Backend::new(m.clone(), None)))
        .collect();
    (Pool::new(backends, interval, cancel_token.clone()), cancel_token)
}

#[tokio::test]
async fn round_robin_advances_on_every_access() {
    let mocks = [MockTransport::new(), MockTransport::new(), MockTransport::new()];
    for (i, mock) in mocks.iter().enumerate() {
        mock.respond("getinfo", json!({ "node": i }));
    }
    let (pool, _) = pool_of(&mocks, Duration::from_millis(10));

    for expected in [0, 1, 2, 0] {
        let info = pool
            .try_all(|client| async move { client.get_info().await })
            .await
            .unwrap();
        assert_eq!(info["node"], expected);
    }
}

#[tokio::test]
async fn try_all_moves_past_transient_failures() {
    let mocks = [MockTransport::new(), MockTransport::new(), MockTransport::new()];
    mocks[0].fail_once_transient("getrawtransaction");
    mocks[1].fail_once_transient("getrawtransaction");
    mocks[2].respond("getrawtransaction", json!("beef"));
    let (pool, _) = pool_of(&mocks, Duration::from_millis(10));

    let started = std::time::Instant::now();
    let hex = pool
        .try_all(|client| async move { client.get_raw_transaction("txid").await })
        .await
        .unwrap();
    assert_eq!(hex, "beef");
    // one inter-attempt gap per failure
    assert!(started.elapsed() >= Duration::from_millis(20));
    assert_eq!(mocks[0].calls("getrawtransaction"), 1);
    assert_eq!(mocks[1].calls("getrawtransaction"), 1);
    assert_eq!(mocks[2].calls("getrawtransaction"), 1);
}

#[tokio::test]
async fn semantic_errors_surface_immediately() {
    let mocks = [MockTransport::new(), MockTransport::new()];
    mocks[0].fail_once("getrawtransaction", -8, "parameter out of range");
    let (pool, _) = pool_of(&mocks, Duration::from_millis(10));

    let err = pool
        .try_all(|client| async move { client.get_raw_transaction("txid").await })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(-8));
    assert_eq!(mocks[1].total_calls(), 0);
}

#[tokio::test]
async fn exhausted_pool_returns_the_last_transient_error() {
    let mocks = [MockTransport::new(), MockTransport::new()];
    mocks[0].fail_once_transient("getbestblockhash");
    mocks[1].fail_once_transient("getbestblockhash");
    let (pool, _) = pool_of(&mocks, Duration::from_millis(10));

    let err = pool
        .try_all(|client| async move { client.get_best_block_hash().await })
        .await
        .unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn cancellation_aborts_with_stopping() {
    let mocks = [MockTransport::new()];
    let (pool, cancel_token) = pool_of(&mocks, Duration::from_millis(10));
    cancel_token.cancel();

    let err = pool
        .try_all(|client| async move { client.get_best_block_hash().await })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Stopping));
    assert_eq!(mocks[0].total_calls(), 0);
}
