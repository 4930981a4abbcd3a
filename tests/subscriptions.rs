use qtumd_hub::{
    address::{Network, p2pkh_from_pubkey},
    events::{Emitter, Notification},
    subscriptions::{Registry, Topic},
};

fn addr(n: u8) -> String {
    p2pkh_from_pubkey(&[n; 33], Network::Regtest)
}

#[test]
fn subscribe_is_idempotent_per_topic() {
    let mut registry = Registry::new(Network::Regtest);
    let (emitter, _rx) = Emitter::channel();
    registry.subscribe(Topic::HashBlock, emitter.clone());
    registry.subscribe(Topic::HashBlock, emitter.clone());
    assert_eq!(registry.topic_len(Topic::HashBlock), 1);

    registry.unsubscribe(Topic::HashBlock, &emitter);
    assert_eq!(registry.topic_len(Topic::HashBlock), 0);
    // unsubscribing again is a no-op
    registry.unsubscribe(Topic::HashBlock, &emitter);
    assert_eq!(registry.topic_len(Topic::HashBlock), 0);
}

#[test]
fn invalid_addresses_are_skipped_silently() {
    let mut registry = Registry::new(Network::Regtest);
    let (emitter, _rx) = Emitter::channel();
    let good = addr(1);
    registry.subscribe_address(
        &emitter,
        &[good.clone(), "definitely-not-an-address".to_string()],
    );
    assert!(registry.has_address(&good));
    assert_eq!(registry.txid_addresses(), vec![good]);
}

#[test]
fn unsubscribe_without_addresses_removes_every_key() {
    let mut registry = Registry::new(Network::Regtest);
    let (emitter, _rx) = Emitter::channel();
    let a = addr(1);
    let b = addr(2);
    registry.subscribe_address(&emitter, &[a.clone(), b.clone()]);
    assert_eq!(registry.txid_addresses().len(), 2);

    registry.unsubscribe_address(&emitter, None);
    assert!(registry.txid_addresses().is_empty());

    // second call is a no-op
    registry.unsubscribe_address(&emitter, None);
    assert!(registry.txid_addresses().is_empty());
}

#[test]
fn last_emitter_removal_drops_the_address_key() {
    let mut registry = Registry::new(Network::Regtest);
    let (first, _rx1) = Emitter::channel();
    let (second, _rx2) = Emitter::channel();
    let a = addr(1);
    registry.subscribe_balance(&first, &[a.clone()]);
    registry.subscribe_balance(&second, &[a.clone()]);

    registry.unsubscribe_balance(&first, Some(&[a.clone()]));
    assert!(registry.has_balance_address(&a));
    registry.unsubscribe_balance(&second, Some(&[a.clone()]));
    assert!(!registry.has_balance_address(&a));
    assert!(registry.balance_addresses().is_empty());
}

#[test]
fn delivery_follows_registration_order() {
    let mut registry = Registry::new(Network::Regtest);
    let (first, mut rx1) = Emitter::channel();
    let (second, mut rx2) = Emitter::channel();
    registry.subscribe(Topic::RawTransaction, first);
    registry.subscribe(Topic::RawTransaction, second);

    registry.notify(
        Topic::RawTransaction,
        Notification::RawTransaction { raw: "00".into() },
    );
    assert!(rx1.try_recv().is_ok());
    assert!(rx2.try_recv().is_ok());
}

#[test]
fn dead_emitter_is_pruned_everywhere_after_one_failed_send() {
    let mut registry = Registry::new(Network::Regtest);
    let (dead, rx) = Emitter::channel();
    let a = addr(1);
    registry.subscribe(Topic::HashBlock, dead.clone());
    registry.subscribe_address(&dead, &[a.clone()]);
    drop(rx);

    registry.notify(
        Topic::HashBlock,
        Notification::HashBlock { hash: "aa".into() },
    );
    assert_eq!(registry.topic_len(Topic::HashBlock), 0);
    assert!(!registry.has_address(&a));
}

#[test]
fn address_subscription_round_trip_restores_registry() {
    let mut registry = Registry::new(Network::Regtest);
    let (keeper, _rx1) = Emitter::channel();
    let (visitor, _rx2) = Emitter::channel();
    let a = addr(1);
    registry.subscribe_address(&keeper, &[a.clone()]);

    registry.subscribe_address(&visitor, &[a.clone()]);
    registry.unsubscribe_address(&visitor, None);

    // the key survives for the remaining subscriber only
    assert_eq!(registry.txid_addresses(), vec![a]);
}
