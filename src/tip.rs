use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::{
    select,
    sync::mpsc::{self, UnboundedSender},
    task::JoinHandle,
    time::{Instant, sleep_until},
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    cache::CacheSet,
    events::{Event, EventBus},
    rpc::{Error, Pool, QtumRpc},
};

/// Tip messages arriving within this window of the previous one are
/// coalesced; only the last is applied.
pub const QUIET_WINDOW: Duration = Duration::from_secs(1);

/// Process-wide view of the daemon's chain. `tiphash` and `height` move
/// together under the lock.
#[derive(Debug, Clone, Default)]
pub struct ChainState {
    pub height: u64,
    pub tiphash: String,
    pub genesis: Vec<u8>,
}

pub fn sync_percentage(verification_progress: f64) -> f64 {
    (verification_progress * 100.0).round()
}

/// Handle for feeding new tip hashes into the coalescing loop.
#[derive(Debug, Clone)]
pub struct TipTracker {
    tx: UnboundedSender<String>,
}

impl TipTracker {
    pub fn update(&self, hash: String) {
        let _ = self.tx.send(hash);
    }
}

/// Runs the single apply path for tip updates. The first hash is applied
/// immediately; anything arriving inside the quiet window defers and
/// re-arms, so a burst of tips costs one cache flush.
pub fn run<C: QtumRpc>(
    chain: Arc<Mutex<ChainState>>,
    caches: Arc<CacheSet>,
    pool: Pool<C>,
    bus: EventBus,
    cancel_token: CancellationToken,
) -> (TipTracker, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let handle = tokio::spawn(async move {
        let mut pending: Option<String> = None;
        let mut deadline: Option<Instant> = None;

        loop {
            select! {
                _ = cancel_token.cancelled() => {
                    info!("Cancelled");
                    break;
                }
                option_hash = rx.recv() => {
                    match option_hash {
                        Some(hash) => {
                            let now = Instant::now();
                            if deadline.is_some_and(|d| now < d) {
                                pending = Some(hash);
                                deadline = Some(now + QUIET_WINDOW);
                            } else {
                                apply(&hash, &chain, &caches, &pool, &bus).await;
                                deadline = Some(Instant::now() + QUIET_WINDOW);
                            }
                        }
                        None => {
                            info!("Tip channel closed, exiting");
                            break;
                        }
                    }
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    match pending.take() {
                        Some(hash) => {
                            apply(&hash, &chain, &caches, &pool, &bus).await;
                            deadline = Some(Instant::now() + QUIET_WINDOW);
                        }
                        None => deadline = None,
                    }
                }
            }
        }

        info!("Exited");
    });

    (TipTracker { tx }, handle)
}

async fn apply<C: QtumRpc>(
    hash: &str,
    chain: &Arc<Mutex<ChainState>>,
    caches: &Arc<CacheSet>,
    pool: &Pool<C>,
    bus: &EventBus,
) {
    let changed = {
        let mut state = chain.lock().expect("chain lock poisoned");
        if state.tiphash != hash {
            state.tiphash = hash.to_string();
            true
        } else {
            false
        }
    };
    if !changed {
        return;
    }

    caches.reset_tip_scoped();

    let header = pool
        .try_all(|client| {
            let hash = hash.to_string();
            async move { client.get_block_header(&hash).await }
        })
        .await;
    let height = match header {
        Ok(header) => {
            let mut state = chain.lock().expect("chain lock poisoned");
            if state.height != header.height {
                state.height = header.height;
                drop(state);
                bus.emit(Event::Tip {
                    height: header.height,
                });
            }
            header.height
        }
        Err(Error::Stopping) => return,
        Err(e) => {
            warn!("Failed to fetch height for tip {}: {}", hash, e);
            bus.emit(Event::Error {
                message: e.to_string(),
            });
            return;
        }
    };

    match pool
        .try_all(|client| async move { client.get_blockchain_info().await })
        .await
    {
        Ok(info) => {
            if sync_percentage(info.verificationprogress) >= 100.0 {
                bus.emit(Event::Synced { height });
            }
        }
        Err(Error::Stopping) => {}
        Err(e) => {
            warn!("Failed to poll sync progress: {}", e);
        }
    }
}
