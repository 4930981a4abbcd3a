use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio::{select, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{client::QtumRpc, error::Error};

/// One configured daemon connection plus its startup flags.
#[derive(Debug)]
pub struct Backend<C> {
    pub client: C,
    pub zmq_endpoint: Option<String>,
    pub reindex_in_progress: AtomicBool,
    pub tip_loaded: AtomicBool,
}

impl<C> Backend<C> {
    pub fn new(client: C, zmq_endpoint: Option<String>) -> Self {
        Self {
            client,
            zmq_endpoint,
            reindex_in_progress: AtomicBool::new(false),
            tip_loaded: AtomicBool::new(false),
        }
    }
}

#[derive(Debug)]
struct Inner<C> {
    backends: Vec<Arc<Backend<C>>>,
    cursor: AtomicUsize,
    try_all_interval: Duration,
    cancel_token: CancellationToken,
}

/// Round-robin view over the backends. Every read advances the cursor, so
/// consecutive callers spread across the pool.
#[derive(Debug)]
pub struct Pool<C> {
    inner: Arc<Inner<C>>,
}

impl<C> Clone for Pool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: QtumRpc> Pool<C> {
    pub fn new(
        backends: Vec<Arc<Backend<C>>>,
        try_all_interval: Duration,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                backends,
                cursor: AtomicUsize::new(0),
                try_all_interval,
                cancel_token,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.backends.is_empty()
    }

    pub fn backends(&self) -> &[Arc<Backend<C>>] {
        &self.inner.backends
    }

    pub fn next(&self) -> Arc<Backend<C>> {
        let index = self.inner.cursor.fetch_add(1, Ordering::Relaxed);
        self.inner.backends[index % self.inner.backends.len()].clone()
    }

    pub fn next_client(&self) -> C {
        self.next().client.clone()
    }

    /// Runs the operation against successive backends, at most one attempt
    /// per pool member, with a fixed pause between attempts. Success
    /// short-circuits; semantic daemon errors surface immediately; only
    /// transient failures move on to the next backend. Backends are never
    /// dropped from rotation.
    pub async fn try_all<T, F, Fut>(&self, mut operation: F) -> Result<T, Error>
    where
        F: FnMut(C) -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let attempts = self.len();
        if attempts == 0 {
            return Err(Error::Unexpected("no backends configured".to_string()));
        }

        let mut last_error = None;
        for attempt in 0..attempts {
            if self.inner.cancel_token.is_cancelled() {
                return Err(Error::Stopping);
            }

            match operation(self.next_client()).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    warn!("RPC attempt {} failed: {}", attempt + 1, e);
                    if attempt + 1 < attempts {
                        select! {
                            _ = sleep(self.inner.try_all_interval) => {}
                            _ = self.inner.cancel_token.cancelled() => return Err(Error::Stopping),
                        }
                    }
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.expect("at least one attempt was made"))
    }
}
