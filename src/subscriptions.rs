use indexmap::IndexMap;

use crate::{
    address::{self, Network},
    events::{Emitter, Notification},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    RawTransaction,
    HashBlock,
}

/// Who gets told about what: two topic lists and two address-keyed maps.
/// Emitters appear at most once per key; removing the last emitter under an
/// address removes the address entry itself.
#[derive(Debug)]
pub struct Registry {
    network: Network,
    raw_transaction: Vec<Emitter>,
    hash_block: Vec<Emitter>,
    address_txid: IndexMap<String, Vec<Emitter>>,
    address_balance: IndexMap<String, Vec<Emitter>>,
}

fn contains(emitters: &[Emitter], emitter: &Emitter) -> bool {
    emitters.iter().any(|e| e.same_channel(emitter))
}

fn remove(emitters: &mut Vec<Emitter>, emitter: &Emitter) {
    emitters.retain(|e| !e.same_channel(emitter));
}

fn remove_from_map(map: &mut IndexMap<String, Vec<Emitter>>, emitter: &Emitter, keys: Option<&[String]>) {
    match keys {
        Some(keys) => {
            for key in keys {
                if let Some(emitters) = map.get_mut(key) {
                    remove(emitters, emitter);
                    if emitters.is_empty() {
                        map.shift_remove(key);
                    }
                }
            }
        }
        None => {
            map.retain(|_, emitters| {
                remove(emitters, emitter);
                !emitters.is_empty()
            });
        }
    }
}

impl Registry {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            raw_transaction: vec![],
            hash_block: vec![],
            address_txid: IndexMap::new(),
            address_balance: IndexMap::new(),
        }
    }

    fn topic_mut(&mut self, topic: Topic) -> &mut Vec<Emitter> {
        match topic {
            Topic::RawTransaction => &mut self.raw_transaction,
            Topic::HashBlock => &mut self.hash_block,
        }
    }

    pub fn subscribe(&mut self, topic: Topic, emitter: Emitter) {
        let emitters = self.topic_mut(topic);
        if !contains(emitters, &emitter) {
            emitters.push(emitter);
        }
    }

    pub fn unsubscribe(&mut self, topic: Topic, emitter: &Emitter) {
        remove(self.topic_mut(topic), emitter);
    }

    /// Adds the emitter under each valid address; invalid addresses are
    /// skipped silently.
    pub fn subscribe_address(&mut self, emitter: &Emitter, addresses: &[String]) {
        Self::subscribe_keys(&mut self.address_txid, self.network, emitter, addresses);
    }

    pub fn subscribe_balance(&mut self, emitter: &Emitter, addresses: &[String]) {
        Self::subscribe_keys(&mut self.address_balance, self.network, emitter, addresses);
    }

    fn subscribe_keys(
        map: &mut IndexMap<String, Vec<Emitter>>,
        network: Network,
        emitter: &Emitter,
        addresses: &[String],
    ) {
        for addr in addresses {
            if !address::is_valid(addr, network) {
                continue;
            }
            let emitters = map.entry(addr.clone()).or_default();
            if !contains(emitters, emitter) {
                emitters.push(emitter.clone());
            }
        }
    }

    /// With no address list the emitter is dropped from every key.
    pub fn unsubscribe_address(&mut self, emitter: &Emitter, addresses: Option<&[String]>) {
        remove_from_map(&mut self.address_txid, emitter, addresses);
    }

    pub fn unsubscribe_balance(&mut self, emitter: &Emitter, addresses: Option<&[String]>) {
        remove_from_map(&mut self.address_balance, emitter, addresses);
    }

    /// Drops the emitter everywhere. Called when a delivery fails so a dead
    /// endpoint is never sent to twice.
    pub fn disconnect(&mut self, emitter: &Emitter) {
        remove(&mut self.raw_transaction, emitter);
        remove(&mut self.hash_block, emitter);
        remove_from_map(&mut self.address_txid, emitter, None);
        remove_from_map(&mut self.address_balance, emitter, None);
    }

    pub fn notify(&mut self, topic: Topic, notification: Notification) {
        let dead: Vec<Emitter> = self
            .topic_mut(topic)
            .iter()
            .filter(|e| !e.send(notification.clone()))
            .cloned()
            .collect();
        for emitter in dead {
            self.disconnect(&emitter);
        }
    }

    pub fn notify_address_txid(&mut self, address: &str, txid: &str) {
        let Some(emitters) = self.address_txid.get(address) else {
            return;
        };
        let notification = Notification::AddressTxid {
            address: address.to_string(),
            txid: txid.to_string(),
        };
        let dead: Vec<Emitter> = emitters
            .iter()
            .filter(|e| !e.send(notification.clone()))
            .cloned()
            .collect();
        for emitter in dead {
            self.disconnect(&emitter);
        }
    }

    pub fn notify_address_balance(&mut self, address: &str, notification: Notification) {
        let Some(emitters) = self.address_balance.get(address) else {
            return;
        };
        let dead: Vec<Emitter> = emitters
            .iter()
            .filter(|e| !e.send(notification.clone()))
            .cloned()
            .collect();
        for emitter in dead {
            self.disconnect(&emitter);
        }
    }

    pub fn txid_addresses(&self) -> Vec<String> {
        self.address_txid.keys().cloned().collect()
    }

    pub fn balance_addresses(&self) -> Vec<String> {
        self.address_balance.keys().cloned().collect()
    }

    pub fn has_address(&self, address: &str) -> bool {
        self.address_txid.contains_key(address)
    }

    pub fn has_balance_address(&self, address: &str) -> bool {
        self.address_balance.contains_key(address)
    }

    pub fn topic_len(&self, topic: Topic) -> usize {
        match topic {
            Topic::RawTransaction => self.raw_transaction.len(),
            Topic::HashBlock => self.hash_block.len(),
        }
    }
}
