use std::{
    hash::Hash,
    num::NonZeroUsize,
    sync::Mutex,
};

use lru::LruCache;
use serde_json::Value;

use crate::rpc::types::{
    AddressSummary, AddressUtxo, BlockHeader, BlockOverview, DetailedTransaction,
};

/// A fixed-capacity LRU map behind a lock. Values are cloned out so the lock
/// is never held across a suspension point.
#[derive(Debug)]
pub struct Cache<K: Hash + Eq, V: Clone> {
    inner: Mutex<LruCache<K, V>>,
}

impl<K: Hash + Eq, V: Clone> Cache<K, V> {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity is at least one");
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.lock().expect("cache lock poisoned").get(key).cloned()
    }

    pub fn insert(&self, key: K, value: V) {
        self.inner.lock().expect("cache lock poisoned").put(key, value);
    }

    pub fn reset(&self) {
        self.inner.lock().expect("cache lock poisoned").clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Membership-only LRU, for the recently-seen ZMQ hashes.
#[derive(Debug)]
pub struct DedupSet {
    inner: Mutex<LruCache<String, ()>>,
}

impl DedupSet {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity is at least one");
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Inserts the key, reporting whether it was previously absent.
    pub fn insert(&self, key: String) -> bool {
        self.inner
            .lock()
            .expect("dedup lock poisoned")
            .put(key, ())
            .is_none()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner
            .lock()
            .expect("dedup lock poisoned")
            .contains(key)
    }
}

const KNOWN_BLOCKS_CAPACITY: usize = 50;

/// Every cache the hub keeps, grouped by how it is invalidated. The
/// tip-scoped group is flushed whenever the chain tip advances; the immutable
/// group is bounded only by capacity.
#[derive(Debug)]
pub struct CacheSet {
    // tip-scoped
    pub utxos: Cache<String, Vec<AddressUtxo>>,
    pub txids: Cache<String, Vec<String>>,
    pub balance: Cache<String, (u64, u64)>,
    pub summary: Cache<String, AddressSummary>,
    pub block_overview: Cache<String, BlockOverview>,
    pub block_json: Cache<String, Value>,
    pub detailed_transaction: Cache<String, DetailedTransaction>,
    pub account_info: Cache<String, Value>,
    pub dgp_info: Cache<(), Value>,
    pub mining_info: Cache<(), Value>,
    pub staking_info: Cache<(), Value>,

    // immutable
    pub transaction: Cache<String, bitcoin::Transaction>,
    pub raw_transaction: Cache<String, String>,
    pub raw_json_transaction: Cache<String, Value>,
    pub transaction_receipt: Cache<String, Value>,
    pub block: Cache<String, Vec<u8>>,
    pub raw_block: Cache<String, String>,
    pub block_header: Cache<String, BlockHeader>,
    pub block_subsidy: Cache<u64, u64>,

    // recently-seen ZMQ hashes
    pub recent_txs: DedupSet,
    pub recent_blocks: DedupSet,
}

impl CacheSet {
    pub fn new(large: usize, blocks: usize) -> Self {
        Self {
            utxos: Cache::new(large),
            txids: Cache::new(large),
            balance: Cache::new(large),
            summary: Cache::new(large),
            block_overview: Cache::new(blocks),
            block_json: Cache::new(blocks),
            detailed_transaction: Cache::new(large),
            account_info: Cache::new(large),
            dgp_info: Cache::new(1),
            mining_info: Cache::new(1),
            staking_info: Cache::new(1),
            transaction: Cache::new(large),
            raw_transaction: Cache::new(large),
            raw_json_transaction: Cache::new(large),
            transaction_receipt: Cache::new(large),
            block: Cache::new(blocks),
            raw_block: Cache::new(blocks),
            block_header: Cache::new(blocks),
            block_subsidy: Cache::new(blocks),
            recent_txs: DedupSet::new(large),
            recent_blocks: DedupSet::new(KNOWN_BLOCKS_CAPACITY),
        }
    }

    /// Flushes everything whose validity ended with the previous tip.
    pub fn reset_tip_scoped(&self) {
        self.utxos.reset();
        self.txids.reset();
        self.balance.reset();
        self.summary.reset();
        self.block_overview.reset();
        self.block_json.reset();
        self.detailed_transaction.reset();
        self.account_info.reset();
        self.dgp_info.reset();
        self.mining_info.reset();
        self.staking_info.reset();
    }
}
