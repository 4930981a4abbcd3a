use serde::Serialize;
use tokio::sync::{broadcast, mpsc};

/// Internal lifecycle events, fanned out to anyone holding a receiver.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Event {
    Ready,
    Tip { height: u64 },
    Synced { height: u64 },
    Block { hash: String },
    Tx { raw: String },
    Error { message: String },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            sender: broadcast::Sender::new(100),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: Event) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-subscriber notifications, delivered through registry emitters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Notification {
    RawTransaction {
        raw: String,
    },
    HashBlock {
        hash: String,
    },
    #[serde(rename_all = "camelCase")]
    AddressTxid {
        address: String,
        txid: String,
    },
    #[serde(rename_all = "camelCase")]
    AddressBalance {
        address: String,
        txid: String,
        total_received: u64,
        total_spent: u64,
        balance: i64,
        unconfirmed_balance: i64,
    },
}

/// Sending half of a subscriber channel. Identity is the channel itself, so
/// one subscriber can sit under many keys and still be removed everywhere.
#[derive(Debug, Clone)]
pub struct Emitter {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Emitter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Delivers one notification; false means the receiving side is gone.
    pub fn send(&self, notification: Notification) -> bool {
        self.tx.send(notification).is_ok()
    }

    pub fn same_channel(&self, other: &Emitter) -> bool {
        self.tx.same_channel(&other.tx)
    }
}
