use std::collections::HashSet;

use futures_util::{StreamExt, TryStreamExt, stream};
use indexmap::{IndexMap, IndexSet};
use serde_json::{Value, json};

use crate::{
    node::Node,
    rpc::{
        Error, QtumRpc,
        types::{
            AddressHistory, AddressIndexes, AddressSummary, AddressUtxo, BlockHeader,
            BlockOverview, BlockchainInfo, DetailedInput, DetailedOutput, DetailedTransaction,
            HistoryItem, RpcBlockJson, RpcMempoolDelta, RpcRawTransaction, SpentInfo,
        },
    },
};

#[derive(Debug, Clone)]
pub struct UtxoOptions {
    pub query_mempool: bool,
}

impl Default for UtxoOptions {
    fn default() -> Self {
        Self {
            query_mempool: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TxidOptions {
    pub query_mempool: bool,
    pub query_mempool_only: bool,
    /// Height range, most-recent-first: `start` is the higher bound.
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl Default for TxidOptions {
    fn default() -> Self {
        Self {
            query_mempool: true,
            query_mempool_only: false,
            start: None,
            end: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HistoryOptions {
    pub from: usize,
    pub to: usize,
    pub query_mempool: bool,
}

impl Default for HistoryOptions {
    fn default() -> Self {
        Self {
            from: 0,
            to: 50,
            query_mempool: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SummaryOptions {
    pub no_tx_list: bool,
}

fn address_key(addresses: &[String]) -> String {
    addresses.join(",")
}

fn satoshis_of(value_sat: Option<i64>, value: f64) -> i64 {
    value_sat.unwrap_or_else(|| (value * 100_000_000.0).round() as i64)
}

/// Overlays mempool deltas onto the confirmed UTXO set: spends recorded in
/// the mempool hide their outpoints, new mempool outputs are prepended
/// (most recent first) unless already confirmed.
fn overlay_mempool(confirmed: Vec<AddressUtxo>, deltas: Vec<RpcMempoolDelta>) -> Vec<AddressUtxo> {
    let mut spent: HashSet<(String, u32)> = HashSet::new();
    let mut from_mempool: Vec<AddressUtxo> = vec![];
    for delta in deltas {
        match delta.prevtxid {
            Some(prevtxid) if delta.satoshis <= 0 => {
                spent.insert((prevtxid, delta.prevout.unwrap_or(0)));
            }
            _ => from_mempool.push(AddressUtxo {
                address: delta.address,
                txid: delta.txid,
                output_index: delta.index,
                script: delta.script,
                satoshis: delta.satoshis,
                height: None,
                timestamp: Some(delta.timestamp),
            }),
        }
    }

    let confirmed_outpoints: HashSet<(String, u32)> = confirmed
        .iter()
        .map(|u| (u.txid.clone(), u.output_index))
        .collect();
    from_mempool.retain(|u| !confirmed_outpoints.contains(&(u.txid.clone(), u.output_index)));
    from_mempool.reverse();

    let mut all = from_mempool;
    all.extend(confirmed);
    all.retain(|u| !spent.contains(&(u.txid.clone(), u.output_index)));
    all
}

fn mempool_txids(deltas: &[RpcMempoolDelta]) -> Vec<String> {
    let mut txids: IndexSet<String> = IndexSet::new();
    for delta in deltas {
        txids.insert(delta.txid.clone());
    }
    let mut txids: Vec<String> = txids.into_iter().collect();
    txids.reverse();
    txids
}

impl<C: QtumRpc> Node<C> {
    fn check_addresses(&self, addresses: &[String]) -> Result<(), Error> {
        if addresses.is_empty() {
            return Err(Error::Range("at least one address is required".to_string()));
        }
        if addresses.len() > self.inner.config.max_addresses_query {
            return Err(Error::Range(format!(
                "{} addresses given, maximum is {}",
                addresses.len(),
                self.inner.config.max_addresses_query
            )));
        }
        Ok(())
    }

    /// `max(0, height - tx_height + 1)`; fails until the chain height is
    /// known.
    pub fn confirmations(&self, tx_height: i64) -> Result<u64, Error> {
        let height = self.height();
        if height == 0 {
            return Err(Error::Unexpected(
                "chain height is not initialised".to_string(),
            ));
        }
        Ok((height as i64 - tx_height + 1).max(0) as u64)
    }

    // ---- chain ----

    pub async fn get_best_block_hash(&self) -> Result<String, Error> {
        self.inner
            .pool
            .try_all(|client| async move { client.get_best_block_hash().await })
            .await
    }

    pub async fn get_blockchain_info(&self) -> Result<BlockchainInfo, Error> {
        self.inner
            .pool
            .try_all(|client| async move { client.get_blockchain_info().await })
            .await
    }

    /// Integer-looking arguments shorter than a hash resolve through the
    /// daemon's height index; anything else is taken as a block hash.
    pub(crate) async fn maybe_block_hash(&self, block_arg: &str) -> Result<String, Error> {
        let numeric = !block_arg.is_empty()
            && block_arg.len() < 40
            && block_arg.chars().all(|c| c.is_ascii_digit());
        if !numeric {
            return Ok(block_arg.to_string());
        }
        let height: u64 = block_arg
            .parse()
            .map_err(|_| Error::Range(format!("invalid block height {}", block_arg)))?;
        self.inner
            .pool
            .try_all(|client| async move { client.get_block_hash(height).await })
            .await
    }

    pub async fn get_block_hash(&self, height: u64) -> Result<String, Error> {
        self.inner
            .pool
            .try_all(|client| async move { client.get_block_hash(height).await })
            .await
    }

    pub async fn get_raw_block(&self, block_arg: &str) -> Result<String, Error> {
        let hash = self.maybe_block_hash(block_arg).await?;
        if let Some(hex) = self.inner.caches.raw_block.get(&hash) {
            return Ok(hex);
        }
        let hex = self
            .inner
            .pool
            .try_all(|client| {
                let hash = hash.clone();
                async move { client.get_block_raw(&hash).await }
            })
            .await?;
        self.inner.caches.raw_block.insert(hash, hex.clone());
        Ok(hex)
    }

    pub async fn get_block(&self, block_arg: &str) -> Result<Vec<u8>, Error> {
        let hash = self.maybe_block_hash(block_arg).await?;
        if let Some(bytes) = self.inner.caches.block.get(&hash) {
            return Ok(bytes);
        }
        let hex = self
            .inner
            .pool
            .try_all(|client| {
                let hash = hash.clone();
                async move { client.get_block_raw(&hash).await }
            })
            .await?;
        let bytes = hex::decode(hex.trim())?;
        self.inner.caches.block.insert(hash, bytes.clone());
        Ok(bytes)
    }

    pub async fn get_block_json(&self, block_arg: &str) -> Result<Value, Error> {
        let hash = self.maybe_block_hash(block_arg).await?;
        if let Some(json) = self.inner.caches.block_json.get(&hash) {
            return Ok(json);
        }
        let json = self
            .inner
            .pool
            .try_all(|client| {
                let hash = hash.clone();
                async move { client.get_block_json(&hash).await }
            })
            .await?;
        self.inner.caches.block_json.insert(hash, json.clone());
        Ok(json)
    }

    pub async fn get_block_overview(&self, block_arg: &str) -> Result<BlockOverview, Error> {
        let hash = self.maybe_block_hash(block_arg).await?;
        if let Some(overview) = self.inner.caches.block_overview.get(&hash) {
            return Ok(overview);
        }
        let json = self.get_block_json(&hash).await?;
        let block: RpcBlockJson = serde_json::from_value(json)?;
        let overview = BlockOverview {
            hash: block.hash,
            height: block.height,
            confirmations: block.confirmations,
            version: block.version,
            merkle_root: block.merkleroot,
            time: block.time,
            median_time: block.mediantime,
            nonce: block.nonce,
            bits: block.bits,
            difficulty: block.difficulty,
            chain_work: block.chainwork,
            prev_hash: block.previousblockhash,
            next_hash: block.nextblockhash,
            txids: block.tx,
        };
        self.inner
            .caches
            .block_overview
            .insert(hash, overview.clone());
        Ok(overview)
    }

    pub async fn get_block_header(&self, block_arg: &str) -> Result<BlockHeader, Error> {
        let hash = self.maybe_block_hash(block_arg).await?;
        if let Some(header) = self.inner.caches.block_header.get(&hash) {
            return Ok(header);
        }
        let header: BlockHeader = self
            .inner
            .pool
            .try_all(|client| {
                let hash = hash.clone();
                async move { client.get_block_header(&hash).await }
            })
            .await?
            .into();
        self.inner
            .caches
            .block_header
            .insert(hash, header.clone());
        Ok(header)
    }

    pub async fn get_block_hashes(&self, high: u64, low: u64) -> Result<Value, Error> {
        self.inner
            .pool
            .try_all(|client| async move { client.get_block_hashes(high, low, json!({})).await })
            .await
    }

    pub async fn get_block_subsidy(&self, height: u64) -> Result<u64, Error> {
        if let Some(subsidy) = self.inner.caches.block_subsidy.get(&height) {
            return Ok(subsidy);
        }
        let subsidy = self
            .inner
            .pool
            .try_all(|client| async move { client.get_subsidy(height).await })
            .await?;
        self.inner.caches.block_subsidy.insert(height, subsidy);
        Ok(subsidy)
    }

    // ---- transactions ----

    pub async fn get_raw_transaction(&self, txid: &str) -> Result<String, Error> {
        let key = txid.to_string();
        if let Some(hex) = self.inner.caches.raw_transaction.get(&key) {
            return Ok(hex);
        }
        let hex = self
            .inner
            .pool
            .try_all(|client| {
                let txid = key.clone();
                async move { client.get_raw_transaction(&txid).await }
            })
            .await?;
        self.inner.caches.raw_transaction.insert(key, hex.clone());
        Ok(hex)
    }

    pub async fn get_transaction(&self, txid: &str) -> Result<bitcoin::Transaction, Error> {
        let key = txid.to_string();
        if let Some(tx) = self.inner.caches.transaction.get(&key) {
            return Ok(tx);
        }
        let hex = self.get_raw_transaction(txid).await?;
        let bytes = hex::decode(hex.trim())?;
        let tx: bitcoin::Transaction = bitcoin::consensus::deserialize(&bytes)?;
        self.inner.caches.transaction.insert(key, tx.clone());
        Ok(tx)
    }

    pub async fn get_raw_json_transaction(&self, txid: &str) -> Result<Value, Error> {
        let key = txid.to_string();
        if let Some(json) = self.inner.caches.raw_json_transaction.get(&key) {
            return Ok(json);
        }
        let json = self
            .inner
            .pool
            .try_all(|client| {
                let txid = key.clone();
                async move { client.call_value("getrawtransaction", vec![txid.into(), 1.into()]).await }
            })
            .await?;
        self.inner
            .caches
            .raw_json_transaction
            .insert(key, json.clone());
        Ok(json)
    }

    pub async fn get_detailed_transaction(&self, txid: &str) -> Result<DetailedTransaction, Error> {
        let key = txid.to_string();
        if let Some(tx) = self.inner.caches.detailed_transaction.get(&key) {
            return Ok(tx);
        }
        let raw: RpcRawTransaction = self
            .inner
            .pool
            .try_all(|client| {
                let txid = key.clone();
                async move { client.get_raw_transaction_verbose(&txid).await }
            })
            .await?;
        let detailed = detail_transaction(raw);
        self.inner
            .caches
            .detailed_transaction
            .insert(key, detailed.clone());
        Ok(detailed)
    }

    pub async fn send_transaction(
        &self,
        hex: &str,
        allow_absurd_fees: bool,
    ) -> Result<String, Error> {
        let hex = hex.to_string();
        self.inner
            .pool
            .try_all(|client| {
                let hex = hex.clone();
                async move { client.send_raw_transaction(&hex, allow_absurd_fees).await }
            })
            .await
    }

    pub async fn estimate_fee(&self, blocks: u64) -> Result<Value, Error> {
        self.inner
            .pool
            .try_all(|client| async move { client.estimate_fee(blocks).await })
            .await
    }

    pub async fn get_spent_info(&self, txid: &str, index: u32) -> Result<Option<SpentInfo>, Error> {
        let txid = txid.to_string();
        let result = self
            .inner
            .pool
            .try_all(|client| {
                let txid = txid.clone();
                async move { client.get_spent_info(&txid, index).await }
            })
            .await;
        match result {
            Ok(info) => Ok(Some(info)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    // ---- addresses ----

    pub async fn get_address_unspent_outputs(
        &self,
        addresses: &[String],
        options: UtxoOptions,
    ) -> Result<Vec<AddressUtxo>, Error> {
        self.check_addresses(addresses)?;
        let key = address_key(addresses);

        let confirmed = match self.inner.caches.utxos.get(&key) {
            Some(utxos) => utxos,
            None => {
                let utxos: Vec<AddressUtxo> = self
                    .inner
                    .pool
                    .try_all(|client| {
                        let addresses = addresses.to_vec();
                        async move { client.get_address_utxos(&addresses).await }
                    })
                    .await?
                    .into_iter()
                    .map(Into::into)
                    .collect();
                self.inner.caches.utxos.insert(key, utxos.clone());
                utxos
            }
        };

        if !options.query_mempool {
            return Ok(confirmed);
        }

        let deltas = self
            .inner
            .pool
            .try_all(|client| {
                let addresses = addresses.to_vec();
                async move { client.get_address_mempool(&addresses).await }
            })
            .await?;
        Ok(overlay_mempool(confirmed, deltas))
    }

    fn height_range(options: &TxidOptions) -> Result<Option<(u64, u64)>, Error> {
        match (options.start, options.end) {
            (Some(start), Some(end)) => {
                if end > start {
                    Err(Error::Range(
                        "\"end\" is expected to be less than or equal to \"start\"".to_string(),
                    ))
                } else {
                    // The daemon takes the range low-to-high.
                    Ok(Some((end, start)))
                }
            }
            _ => Ok(None),
        }
    }

    pub async fn get_address_txids(
        &self,
        addresses: &[String],
        options: TxidOptions,
    ) -> Result<Vec<String>, Error> {
        self.check_addresses(addresses)?;

        if options.query_mempool_only {
            let deltas = self.fetch_mempool_deltas(addresses).await?;
            return Ok(mempool_txids(&deltas));
        }

        let range = Self::height_range(&options)?;
        let key = address_key(addresses);

        let mut confirmed = match range {
            // Ranged queries bypass the cache; their keys would never be hit
            // again once the window moves.
            Some(range) => {
                self.inner
                    .pool
                    .try_all(|client| {
                        let addresses = addresses.to_vec();
                        async move { client.get_address_txids(&addresses, Some(range)).await }
                    })
                    .await?
            }
            None => match self.inner.caches.txids.get(&key) {
                Some(txids) => txids,
                None => {
                    let txids = self
                        .inner
                        .pool
                        .try_all(|client| {
                            let addresses = addresses.to_vec();
                            async move { client.get_address_txids(&addresses, None).await }
                        })
                        .await?;
                    self.inner.caches.txids.insert(key, txids.clone());
                    txids
                }
            },
        };
        // Daemon order is oldest-first; callers get most-recent-first.
        confirmed.reverse();

        if range.is_some() || !options.query_mempool {
            return Ok(confirmed);
        }

        let deltas = self.fetch_mempool_deltas(addresses).await?;
        let confirmed_set: HashSet<&String> = confirmed.iter().collect();
        let mut result: Vec<String> = mempool_txids(&deltas)
            .into_iter()
            .filter(|txid| !confirmed_set.contains(txid))
            .collect();
        result.extend(confirmed);
        Ok(result)
    }

    async fn fetch_mempool_deltas(
        &self,
        addresses: &[String],
    ) -> Result<Vec<RpcMempoolDelta>, Error> {
        self.inner
            .pool
            .try_all(|client| {
                let addresses = addresses.to_vec();
                async move { client.get_address_mempool(&addresses).await }
            })
            .await
    }

    /// Received/balance totals in satoshis, straight from the address index.
    async fn address_balance_totals(&self, addresses: &[String]) -> Result<(u64, u64), Error> {
        let key = address_key(addresses);
        if let Some(totals) = self.inner.caches.balance.get(&key) {
            return Ok(totals);
        }
        let result = self
            .inner
            .pool
            .try_all(|client| {
                let addresses = addresses.to_vec();
                async move { client.get_address_balance(&addresses).await }
            })
            .await?;
        let totals = (result.received.max(0) as u64, result.balance.max(0) as u64);
        self.inner.caches.balance.insert(key, totals);
        Ok(totals)
    }

    pub async fn get_address_history(
        &self,
        addresses: &[String],
        options: HistoryOptions,
    ) -> Result<AddressHistory, Error> {
        self.check_addresses(addresses)?;
        if options.to <= options.from {
            return Err(Error::Range(format!(
                "\"from\" ({}) is expected to be less than \"to\" ({})",
                options.from, options.to
            )));
        }
        let max = self.inner.config.max_transaction_history;
        if options.to - options.from > max {
            return Err(Error::Range(format!(
                "\"from\" ({}) and \"to\" ({}) range should be less than or equal to {}",
                options.from, options.to, max
            )));
        }

        let txids = self
            .get_address_txids(
                addresses,
                TxidOptions {
                    query_mempool: options.query_mempool,
                    ..Default::default()
                },
            )
            .await?;
        let total_count = txids.len();
        let page: Vec<String> = txids
            .into_iter()
            .skip(options.from)
            .take(options.to - options.from)
            .collect();

        let details: Vec<DetailedTransaction> = stream::iter(page)
            .map(|txid| {
                let node = self.clone();
                async move { node.get_detailed_transaction(&txid).await }
            })
            .buffered(self.inner.config.transaction_concurrency)
            .try_collect()
            .await?;

        let address_set: HashSet<&String> = addresses.iter().collect();
        let items = details
            .into_iter()
            .map(|tx| {
                let mut involved: IndexMap<String, AddressIndexes> = IndexMap::new();
                let mut satoshis: i64 = 0;
                for (i, input) in tx.inputs.iter().enumerate() {
                    if let Some(addr) = &input.address {
                        if address_set.contains(addr) {
                            involved.entry(addr.clone()).or_default().input_indexes.push(i);
                            satoshis -= input.satoshis;
                        }
                    }
                }
                for (i, output) in tx.outputs.iter().enumerate() {
                    if let Some(addr) = &output.address {
                        if address_set.contains(addr) {
                            involved
                                .entry(addr.clone())
                                .or_default()
                                .output_indexes
                                .push(i);
                            satoshis += output.satoshis;
                        }
                    }
                }
                HistoryItem {
                    tx,
                    addresses: involved,
                    satoshis,
                }
            })
            .collect();

        Ok(AddressHistory { total_count, items })
    }

    pub async fn get_address_summary(
        &self,
        address: &str,
        options: SummaryOptions,
    ) -> Result<AddressSummary, Error> {
        let key = address.to_string();
        if options.no_tx_list {
            if let Some(summary) = self.inner.caches.summary.get(&key) {
                return Ok(summary);
            }
        }

        let addresses = vec![address.to_string()];
        let (txids, (received, balance), deltas) = tokio::try_join!(
            self.get_address_txids(
                &addresses,
                TxidOptions {
                    query_mempool: false,
                    ..Default::default()
                },
            ),
            self.address_balance_totals(&addresses),
            self.fetch_mempool_deltas(&addresses),
        )?;

        let unconfirmed_balance: i64 = deltas.iter().map(|d| d.satoshis).sum();
        let unconfirmed = mempool_txids(&deltas);
        let mut summary = AddressSummary {
            address: address.to_string(),
            appearances: txids.len(),
            total_received: received,
            total_spent: received.saturating_sub(balance),
            balance: balance as i64,
            unconfirmed_appearances: unconfirmed.len(),
            unconfirmed_balance,
            txids: None,
        };

        if options.no_tx_list {
            self.inner.caches.summary.insert(key, summary.clone());
        } else {
            if summary.appearances + summary.unconfirmed_appearances
                > self.inner.config.max_txids
            {
                return Err(Error::Range(format!(
                    "address has more than {} transactions, use noTxList",
                    self.inner.config.max_txids
                )));
            }
            let mut all = unconfirmed;
            all.extend(txids);
            summary.txids = Some(all);
        }
        Ok(summary)
    }

    /// Aggregate wallet balance for the given addresses, resolved the way
    /// the daemon's account layer does it. Returns a single total even for
    /// multi-address input.
    pub async fn get_address_balance(&self, addresses: &[String]) -> Result<f64, Error> {
        self.check_addresses(addresses)?;
        let mut total = 0.0;
        for address in addresses {
            let account = self
                .inner
                .pool
                .try_all(|client| {
                    let address = address.clone();
                    async move { client.get_account_address(&address).await }
                })
                .await?;
            let balance = self
                .inner
                .pool
                .try_all(|client| {
                    let account = account.clone();
                    async move { client.get_balance(&account).await }
                })
                .await?;
            total += balance;
        }
        Ok(total)
    }

    // ---- contracts and node info ----

    pub async fn get_account_info(&self, address: &str) -> Result<Value, Error> {
        let key = address.to_string();
        if let Some(info) = self.inner.caches.account_info.get(&key) {
            return Ok(info);
        }
        let info = self
            .inner
            .pool
            .try_all(|client| {
                let address = key.clone();
                async move { client.get_account_info(&address).await }
            })
            .await?;
        self.inner.caches.account_info.insert(key, info.clone());
        Ok(info)
    }

    pub async fn call_contract(
        &self,
        address: &str,
        data: &str,
        from: Option<&str>,
    ) -> Result<Value, Error> {
        let address = address.to_string();
        let data = data.to_string();
        let from = from.map(str::to_string);
        self.inner
            .pool
            .try_all(|client| {
                let address = address.clone();
                let data = data.clone();
                let from = from.clone();
                async move { client.call_contract(&address, &data, from.as_deref()).await }
            })
            .await
    }

    pub async fn get_transaction_receipt(&self, txid: &str) -> Result<Value, Error> {
        let key = txid.to_string();
        if let Some(receipt) = self.inner.caches.transaction_receipt.get(&key) {
            return Ok(receipt);
        }
        let receipt = self
            .inner
            .pool
            .try_all(|client| {
                let txid = key.clone();
                async move { client.get_transaction_receipt(&txid).await }
            })
            .await?;
        self.inner
            .caches
            .transaction_receipt
            .insert(key, receipt.clone());
        Ok(receipt)
    }

    pub async fn get_dgp_info(&self) -> Result<Value, Error> {
        if let Some(info) = self.inner.caches.dgp_info.get(&()) {
            return Ok(info);
        }
        let info = self
            .inner
            .pool
            .try_all(|client| async move { client.get_dgp_info().await })
            .await?;
        self.inner.caches.dgp_info.insert((), info.clone());
        Ok(info)
    }

    pub async fn get_mining_info(&self) -> Result<Value, Error> {
        if let Some(info) = self.inner.caches.mining_info.get(&()) {
            return Ok(info);
        }
        let info = self
            .inner
            .pool
            .try_all(|client| async move { client.get_mining_info().await })
            .await?;
        self.inner.caches.mining_info.insert((), info.clone());
        Ok(info)
    }

    pub async fn get_staking_info(&self) -> Result<Value, Error> {
        if let Some(info) = self.inner.caches.staking_info.get(&()) {
            return Ok(info);
        }
        let info = self
            .inner
            .pool
            .try_all(|client| async move { client.get_staking_info().await })
            .await?;
        self.inner.caches.staking_info.insert((), info.clone());
        Ok(info)
    }

    pub async fn get_info(&self) -> Result<Value, Error> {
        self.inner
            .pool
            .try_all(|client| async move { client.get_info().await })
            .await
    }

    pub async fn get_new_address(&self) -> Result<String, Error> {
        self.inner
            .pool
            .try_all(|client| async move { client.get_new_address().await })
            .await
    }

    pub async fn list_unspent(
        &self,
        min_conf: u64,
        max_conf: u64,
        addresses: &[String],
    ) -> Result<Value, Error> {
        self.inner
            .pool
            .try_all(|client| {
                let addresses = addresses.to_vec();
                async move { client.list_unspent(min_conf, max_conf, &addresses).await }
            })
            .await
    }

    pub async fn generate(&self, blocks: u64) -> Result<Vec<String>, Error> {
        self.inner
            .pool
            .try_all(|client| async move { client.generate(blocks).await })
            .await
    }
}

/// Derives the facade transaction shape, including the satoshi arithmetic:
/// `fee = inputs - outputs`, pinned to zero for coinbase.
fn detail_transaction(raw: RpcRawTransaction) -> DetailedTransaction {
    let is_coinbase = raw.vin.first().is_some_and(|vin| vin.coinbase.is_some());

    let inputs: Vec<DetailedInput> = raw
        .vin
        .iter()
        .map(|vin| DetailedInput {
            prev_tx_id: vin.txid.clone(),
            output_index: vin.vout,
            script: vin.script_sig.as_ref().map(|s| s.hex.clone()),
            script_asm: vin.script_sig.as_ref().map(|s| s.asm.clone()),
            sequence: vin.sequence,
            address: vin.address.clone(),
            satoshis: vin.value_sat.unwrap_or(0),
        })
        .collect();

    let outputs: Vec<DetailedOutput> = raw
        .vout
        .iter()
        .map(|vout| DetailedOutput {
            satoshis: satoshis_of(vout.value_sat, vout.value),
            script: vout.script_pub_key.hex.clone(),
            script_asm: vout.script_pub_key.asm.clone(),
            spent_tx_id: vout.spent_tx_id.clone(),
            spent_index: vout.spent_index,
            spent_height: vout.spent_height,
            address: vout
                .script_pub_key
                .addresses
                .as_ref()
                .and_then(|a| a.first().cloned()),
        })
        .collect();

    let input_satoshis: i64 = if is_coinbase {
        0
    } else {
        inputs.iter().map(|i| i.satoshis).sum()
    };
    let output_satoshis: i64 = outputs.iter().map(|o| o.satoshis).sum();
    let fee_satoshis = if is_coinbase {
        0
    } else {
        input_satoshis - output_satoshis
    };

    DetailedTransaction {
        hex: raw.hex,
        txid: raw.txid,
        version: raw.version,
        lock_time: raw.locktime,
        block_hash: raw.blockhash,
        height: raw.height.unwrap_or(-1),
        confirmations: raw.confirmations,
        block_timestamp: raw.blocktime.or(raw.time),
        is_coinbase,
        input_satoshis,
        output_satoshis,
        fee_satoshis,
        inputs,
        outputs,
    }
}
