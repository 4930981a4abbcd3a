use std::sync::{Arc, Mutex, OnceLock};

use anyhow::{Context, Result, anyhow, bail};
use bitcoin::hashes::{Hash, sha256d};
use indexmap::IndexSet;
use tokio::{
    select,
    sync::{broadcast, mpsc},
    task::JoinHandle,
    time::sleep,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    address::{self, Network},
    cache::CacheSet,
    config::Config,
    events::{Emitter, Event, EventBus, Notification},
    queries::SummaryOptions,
    rpc::{Backend, Client, Error, Pool, QtumRpc},
    subscriptions::{Registry, Topic},
    supervisor,
    tip::{ChainState, TipTracker},
    zmq::{self, ZmqEvent, messages::DataMessage},
};

pub(crate) struct Inner<C: QtumRpc> {
    pub(crate) config: Config,
    pub(crate) network: Network,
    pub(crate) pool: Pool<C>,
    pub(crate) caches: Arc<CacheSet>,
    pub(crate) registry: Mutex<Registry>,
    pub(crate) chain: Arc<Mutex<ChainState>>,
    pub(crate) bus: EventBus,
    pub(crate) cancel_token: CancellationToken,
    pub(crate) tip: OnceLock<TipTracker>,
    tasks: Mutex<Vec<JoinHandle<Result<()>>>>,
}

/// The hub itself: a pool of daemon backends fronted by caches, a
/// subscription registry, and the ZMQ ingest that feeds both.
pub struct Node<C: QtumRpc> {
    pub(crate) inner: Arc<Inner<C>>,
}

impl<C: QtumRpc> Clone for Node<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

fn parse_connect_url(url: &str) -> Result<(String, String, String)> {
    let parsed = reqwest::Url::parse(url).with_context(|| format!("Invalid RPC URL {}", url))?;
    let user = parsed.username().to_string();
    let password = parsed.password().unwrap_or_default().to_string();
    let mut clean = parsed.clone();
    let _ = clean.set_username("");
    let _ = clean.set_password(None);
    Ok((clean.to_string(), user, password))
}

impl Node<Client> {
    /// Builds the backends (spawning the daemon when configured, otherwise
    /// connecting to the given URLs), loads the initial chain state, and
    /// starts the background tasks. `ready` is emitted on the event bus once
    /// sync progress allows ZMQ subscriptions to attach.
    pub async fn start(config: Config, cancel_token: CancellationToken) -> Result<Self> {
        let bus = EventBus::new();
        let mut backends = vec![];
        let mut tasks: Vec<JoinHandle<Result<()>>> = vec![];

        if config.spawn_exec.is_some() || config.spawn_datadir.is_some() {
            let supervised = supervisor::start(&config, cancel_token.clone(), bus.clone()).await?;
            let backend = Backend::new(supervised.client, supervised.zmq_endpoint);
            tasks.push(supervised.handle);
            backends.push(Arc::new(backend));
        } else {
            for (i, url) in config.connect_url.iter().enumerate() {
                let (url, user, password) = parse_connect_url(url)?;
                let client = Client::new(url, &user, &password)?;
                let zmq_endpoint = config.connect_zmq.get(i).cloned();
                backends.push(Arc::new(Backend::new(client, zmq_endpoint)));
            }
        }
        if backends.is_empty() {
            bail!("No backends: set --spawn-exec/--spawn-datadir or at least one --connect-url");
        }

        let node = Node::new(config, backends, cancel_token, bus);
        node.inner
            .tasks
            .lock()
            .expect("task lock poisoned")
            .extend(tasks);
        node.run().await?;
        Ok(node)
    }
}

impl<C: QtumRpc> Node<C> {
    pub fn new(
        config: Config,
        backends: Vec<Arc<Backend<C>>>,
        cancel_token: CancellationToken,
        bus: EventBus,
    ) -> Self {
        let network = config.network;
        let pool = Pool::new(
            backends,
            config.try_all_interval(),
            cancel_token.clone(),
        );
        let caches = Arc::new(CacheSet::new(
            config.large_cache_size,
            config.block_cache_size,
        ));
        Self {
            inner: Arc::new(Inner {
                network,
                pool,
                caches,
                registry: Mutex::new(Registry::new(network)),
                chain: Arc::new(Mutex::new(ChainState::default())),
                bus,
                cancel_token,
                tip: OnceLock::new(),
                tasks: Mutex::new(vec![]),
                config,
            }),
        }
    }

    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.inner.bus.subscribe()
    }

    pub fn network(&self) -> Network {
        self.inner.network
    }

    pub fn height(&self) -> u64 {
        self.inner.chain.lock().expect("chain lock poisoned").height
    }

    pub fn tiphash(&self) -> String {
        self.inner
            .chain
            .lock()
            .expect("chain lock poisoned")
            .tiphash
            .clone()
    }

    pub fn genesis_raw(&self) -> Vec<u8> {
        self.inner
            .chain
            .lock()
            .expect("chain lock poisoned")
            .genesis
            .clone()
    }

    // ---- subscription surface ----

    fn registry(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.inner.registry.lock().expect("registry lock poisoned")
    }

    pub fn subscribe(&self, topic: Topic, emitter: Emitter) {
        self.registry().subscribe(topic, emitter);
    }

    pub fn unsubscribe(&self, topic: Topic, emitter: &Emitter) {
        self.registry().unsubscribe(topic, emitter);
    }

    pub fn subscribe_address(&self, emitter: &Emitter, addresses: &[String]) {
        self.registry().subscribe_address(emitter, addresses);
    }

    pub fn unsubscribe_address(&self, emitter: &Emitter, addresses: Option<&[String]>) {
        self.registry().unsubscribe_address(emitter, addresses);
    }

    pub fn subscribe_balance(&self, emitter: &Emitter, addresses: &[String]) {
        self.registry().subscribe_balance(emitter, addresses);
    }

    pub fn unsubscribe_balance(&self, emitter: &Emitter, addresses: Option<&[String]>) {
        self.registry().unsubscribe_balance(emitter, addresses);
    }

    // ---- startup ----

    /// Loads the initial chain state (tips and genesis) and starts the
    /// background tasks. `start` does this automatically; call it directly
    /// when composing a node from pre-built backends.
    pub async fn run(&self) -> Result<()> {
        self.load_tips().await?;
        self.load_genesis().await?;

        let (tracker, tip_handle) = crate::tip::run(
            self.inner.chain.clone(),
            self.inner.caches.clone(),
            self.inner.pool.clone(),
            self.inner.bus.clone(),
            self.inner.cancel_token.clone(),
        );
        let _ = self.inner.tip.set(tracker);

        let gate = {
            let node = self.clone();
            tokio::spawn(async move { node.check_synced_and_subscribe().await })
        };

        let mut tasks = self.inner.tasks.lock().expect("task lock poisoned");
        tasks.push(tokio::spawn(async move {
            let _ = tip_handle.await;
            Ok(())
        }));
        tasks.push(gate);
        Ok(())
    }

    /// First tip load across the pool; marks each answering backend.
    async fn load_tips(&self) -> Result<()> {
        let hash = self
            .inner
            .pool
            .try_all(|client| async move { client.get_best_block_hash().await })
            .await
            .context("Failed to load initial tip")?;
        let header = self
            .inner
            .pool
            .try_all(|client| {
                let hash = hash.clone();
                async move { client.get_block_header(&hash).await }
            })
            .await
            .context("Failed to load initial tip header")?;
        {
            let mut chain = self.inner.chain.lock().expect("chain lock poisoned");
            chain.tiphash = hash;
            chain.height = header.height;
        }
        for backend in self.inner.pool.backends() {
            backend
                .tip_loaded
                .store(true, std::sync::atomic::Ordering::Relaxed);
        }
        info!("Loaded tip at height {}", header.height);
        Ok(())
    }

    async fn load_genesis(&self) -> Result<()> {
        let hash = self
            .inner
            .pool
            .try_all(|client| async move { client.get_block_hash(0).await })
            .await
            .context("Failed to resolve genesis hash")?;
        let raw = self
            .inner
            .pool
            .try_all(|client| {
                let hash = hash.clone();
                async move { client.get_block_raw(&hash).await }
            })
            .await
            .context("Failed to fetch genesis block")?;
        let bytes = hex::decode(raw.trim()).context("Genesis block is not valid hex")?;
        self.inner
            .chain
            .lock()
            .expect("chain lock poisoned")
            .genesis = bytes;
        Ok(())
    }

    /// Holds ZMQ subscriptions back until verification progress clears the
    /// configured threshold, so subscribers are not flooded during initial
    /// block download. Emits `ready` once attached.
    async fn check_synced_and_subscribe(&self) -> Result<()> {
        loop {
            if self.inner.cancel_token.is_cancelled() {
                return Ok(());
            }
            match self
                .inner
                .pool
                .try_all(|client| async move { client.get_blockchain_info().await })
                .await
            {
                Ok(info) if info.verificationprogress >= self.inner.config.zmq_subscribe_progress => {
                    break;
                }
                Ok(info) => {
                    info!(
                        "Sync progress {:.4}%, deferring ZMQ subscriptions",
                        info.verificationprogress * 100.0
                    );
                }
                Err(Error::Stopping) => return Ok(()),
                Err(e) => warn!("Failed to poll sync progress: {}", e),
            }
            select! {
                _ = sleep(self.inner.config.tip_update_interval()) => {}
                _ = self.inner.cancel_token.cancelled() => return Ok(()),
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut attached = 0;
        for backend in self.inner.pool.backends() {
            if let Some(endpoint) = &backend.zmq_endpoint {
                let handle = zmq::run_resilient(
                    endpoint.clone(),
                    self.inner.cancel_token.clone(),
                    tx.clone(),
                );
                self.inner
                    .tasks
                    .lock()
                    .expect("task lock poisoned")
                    .push(handle);
                attached += 1;
            }
        }
        drop(tx);
        if attached == 0 {
            warn!("No ZMQ endpoints configured, subscribers will see no push events");
        } else {
            let ingest = self.spawn_ingest(rx);
            self.inner
                .tasks
                .lock()
                .expect("task lock poisoned")
                .push(ingest);
        }

        self.inner.bus.emit(Event::Ready);
        Ok(())
    }

    fn spawn_ingest(&self, mut rx: mpsc::UnboundedReceiver<ZmqEvent>) -> JoinHandle<Result<()>> {
        let node = self.clone();
        tokio::spawn(async move {
            loop {
                select! {
                    _ = node.inner.cancel_token.cancelled() => {
                        info!("Ingest cancelled");
                        return Ok(());
                    }
                    option_event = rx.recv() => {
                        match option_event {
                            Some(ZmqEvent::Connected) => info!("ZMQ connected"),
                            Some(ZmqEvent::Disconnected(e)) => {
                                warn!("ZMQ disconnected: {}", e);
                                node.inner.bus.emit(Event::Error {
                                    message: format!("zmq disconnected: {}", e),
                                });
                            }
                            Some(ZmqEvent::Message(DataMessage::RawTx(payload))) => {
                                node.ingest_raw_transaction(&payload).await;
                            }
                            Some(ZmqEvent::Message(DataMessage::HashBlock(hash))) => {
                                node.ingest_block_hash(hash);
                            }
                            None => {
                                info!("Ingest channel closed, exiting");
                                return Ok(());
                            }
                        }
                    }
                }
            }
        })
    }

    // ---- ingest ----

    /// Handles one `rawtx` publication: dedup by double-SHA256 of the
    /// payload, notify topic subscribers, then fan out per-address events.
    /// Failures are emitted as `error` events and never stop ingest.
    pub async fn ingest_raw_transaction(&self, payload: &[u8]) {
        let txid = sha256d::Hash::hash(payload).to_string();
        if !self.inner.caches.recent_txs.insert(txid.clone()) {
            return;
        }

        let raw = hex::encode(payload);
        self.registry().notify(
            Topic::RawTransaction,
            Notification::RawTransaction { raw: raw.clone() },
        );
        self.inner.bus.emit(Event::Tx { raw });

        let transaction: bitcoin::Transaction = match bitcoin::consensus::deserialize(payload) {
            Ok(tx) => tx,
            Err(e) => {
                self.inner.bus.emit(Event::Error {
                    message: format!("failed to decode raw transaction {}: {}", txid, e),
                });
                return;
            }
        };

        let mut addresses: IndexSet<String> = IndexSet::new();
        for output in &transaction.output {
            if let Some(addr) = address::from_output_script(&output.script_pubkey, self.inner.network)
            {
                addresses.insert(addr);
            }
        }
        for input in &transaction.input {
            if let Some(addr) = address::from_input(input, self.inner.network) {
                addresses.insert(addr);
            }
        }

        let (txid_addresses, balance_addresses) = {
            let registry = self.registry();
            (
                addresses
                    .iter()
                    .filter(|a| registry.has_address(a))
                    .cloned()
                    .collect::<Vec<_>>(),
                addresses
                    .iter()
                    .filter(|a| registry.has_balance_address(a))
                    .cloned()
                    .collect::<Vec<_>>(),
            )
        };

        for addr in txid_addresses {
            self.registry().notify_address_txid(&addr, &txid);
        }

        for addr in balance_addresses {
            match self
                .get_address_summary(&addr, SummaryOptions { no_tx_list: true })
                .await
            {
                Ok(summary) => {
                    self.registry().notify_address_balance(
                        &addr,
                        Notification::AddressBalance {
                            address: addr.clone(),
                            txid: txid.clone(),
                            total_received: summary.total_received,
                            total_spent: summary.total_spent,
                            balance: summary.balance,
                            unconfirmed_balance: summary.unconfirmed_balance,
                        },
                    );
                }
                Err(e) => {
                    self.inner.bus.emit(Event::Error {
                        message: format!("failed to summarise {}: {}", addr, e),
                    });
                }
            }
        }
    }

    /// Handles one `hashblock` publication: the tip tracker always sees the
    /// hash; topic subscribers only hear about hashes not seen recently.
    pub fn ingest_block_hash(&self, hash: String) {
        if let Some(tip) = self.inner.tip.get() {
            tip.update(hash.clone());
        }
        if self.inner.caches.recent_blocks.insert(hash.clone()) {
            self.registry()
                .notify(Topic::HashBlock, Notification::HashBlock { hash: hash.clone() });
            self.inner.bus.emit(Event::Block { hash });
        }
    }

    // ---- shutdown ----

    /// Cancels every task and waits for them, surfacing the first failure
    /// (a daemon that would not die, or died badly, ends up here).
    pub async fn stop(&self) -> Result<()> {
        self.inner.cancel_token.cancel();
        let tasks = std::mem::take(&mut *self.inner.tasks.lock().expect("task lock poisoned"));
        let mut result = Ok(());
        for handle in tasks {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => result = Err(e),
                Err(e) => result = Err(anyhow!("Task panicked on join: {}", e)),
            }
        }
        info!("Exited");
        result
    }
}
