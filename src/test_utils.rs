use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use serde_json::Value;

use crate::rpc::{Error, RpcTransport, error::RPC_IN_WARMUP};

type Canned = Result<Value, (i32, String)>;

#[derive(Default)]
struct MockInner {
    queued: HashMap<String, VecDeque<Canned>>,
    fixed: HashMap<String, Value>,
    calls: Vec<(String, Vec<Value>)>,
}

/// In-memory transport with canned responses per method. Queued responses
/// are consumed in order, then the fixed response (if any) answers every
/// further call.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockInner>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the standing response for a method.
    pub fn respond(&self, method: &str, value: Value) -> &Self {
        self.inner
            .lock()
            .unwrap()
            .fixed
            .insert(method.to_string(), value);
        self
    }

    /// Queues a one-shot response, consumed before the standing one.
    pub fn respond_once(&self, method: &str, value: Value) -> &Self {
        self.inner
            .lock()
            .unwrap()
            .queued
            .entry(method.to_string())
            .or_default()
            .push_back(Ok(value));
        self
    }

    /// Queues a one-shot daemon error with the given code.
    pub fn fail_once(&self, method: &str, code: i32, message: &str) -> &Self {
        self.inner
            .lock()
            .unwrap()
            .queued
            .entry(method.to_string())
            .or_default()
            .push_back(Err((code, message.to_string())));
        self
    }

    /// Queues a one-shot warming-up error, the transient case `try_all`
    /// moves past.
    pub fn fail_once_transient(&self, method: &str) -> &Self {
        self.fail_once(method, RPC_IN_WARMUP, "Loading block index...")
    }

    pub fn calls(&self, method: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(m, _)| m == method)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.inner.lock().unwrap().calls.len()
    }

    pub fn last_params(&self, method: &str) -> Option<Vec<Value>> {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .rev()
            .find(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
    }
}

impl RpcTransport for MockTransport {
    async fn call_value(&self, method: &str, params: Vec<Value>) -> Result<Value, Error> {
        let canned = {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.push((method.to_string(), params));
            match inner.queued.get_mut(method).and_then(|q| q.pop_front()) {
                Some(canned) => Some(canned),
                None => inner.fixed.get(method).cloned().map(Ok),
            }
        };
        match canned {
            Some(Ok(value)) => Ok(value),
            Some(Err((code, message))) => Err(Error::Rpc { code, message }),
            None => Err(Error::Unexpected(format!(
                "no canned response for {}",
                method
            ))),
        }
    }
}
