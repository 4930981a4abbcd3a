use qtumd_hub::{
    address::Network,
    daemon_conf::{self, DaemonConf, Value},
};
use tempfile::TempDir;

#[test]
fn parses_key_values_and_coerces_numbers() {
    let parsed = daemon_conf::parse(
        r#"
# a comment
server=1

rpcuser=alice
rpcport=13889
whitelist=127.0.0.1
"#,
    );
    assert_eq!(parsed.get("server"), Some(&Value::Int(1)));
    assert_eq!(parsed.get("rpcport"), Some(&Value::Int(13889)));
    assert_eq!(
        parsed.get("rpcuser"),
        Some(&Value::Str("alice".to_string()))
    );
    assert!(!parsed.contains_key("# a comment"));
    assert_eq!(parsed.len(), 4);
}

#[test]
fn network_file_overrides_main_file() {
    let datadir = TempDir::new().unwrap();
    std::fs::write(
        DaemonConf::conf_path(datadir.path()),
        "rpcuser=main\nrpcport=1000\n",
    )
    .unwrap();
    let regtest_dir = datadir.path().join("regtest");
    std::fs::create_dir_all(&regtest_dir).unwrap();
    std::fs::write(regtest_dir.join("qtum.conf"), "rpcport=2000\n").unwrap();

    let conf = DaemonConf::load(datadir.path(), Network::Regtest).unwrap();
    assert_eq!(conf.get_str("rpcuser"), Some("main"));
    assert_eq!(conf.get_int("rpcport"), Some(2000));
    // defaults survive underneath both files
    assert_eq!(conf.get_int("txindex"), Some(1));
}

#[test]
fn validation_requires_index_flags() {
    let datadir = TempDir::new().unwrap();
    std::fs::write(DaemonConf::conf_path(datadir.path()), "txindex=0\n").unwrap();
    let conf = DaemonConf::load(datadir.path(), Network::Mainnet).unwrap();
    let err = conf.validate().unwrap_err().to_string();
    assert!(err.contains("txindex"), "unexpected error: {}", err);
}

#[test]
fn validation_requires_matching_zmq_endpoints() {
    let datadir = TempDir::new().unwrap();
    std::fs::write(
        DaemonConf::conf_path(datadir.path()),
        "zmqpubrawtx=tcp://127.0.0.1:1\nzmqpubhashblock=tcp://127.0.0.1:2\n",
    )
    .unwrap();
    let conf = DaemonConf::load(datadir.path(), Network::Mainnet).unwrap();
    let err = conf.validate().unwrap_err().to_string();
    assert!(err.contains("share one endpoint"), "unexpected error: {}", err);
}

#[test]
fn validation_rejects_empty_zmq_endpoint() {
    let datadir = TempDir::new().unwrap();
    std::fs::write(DaemonConf::conf_path(datadir.path()), "zmqpubrawtx=\n").unwrap();
    let conf = DaemonConf::load(datadir.path(), Network::Mainnet).unwrap();
    assert!(conf.validate().is_err());
}

#[test]
fn reindex_flag_is_detected() {
    let datadir = TempDir::new().unwrap();
    std::fs::write(DaemonConf::conf_path(datadir.path()), "reindex=1\n").unwrap();
    let conf = DaemonConf::load(datadir.path(), Network::Mainnet).unwrap();
    assert!(conf.reindex());
    assert!(conf.validate().is_ok());
}

#[test]
fn default_conf_round_trips_and_validates() {
    let datadir = TempDir::new().unwrap();
    DaemonConf::write_default(datadir.path()).unwrap();
    let conf = DaemonConf::load(datadir.path(), Network::Mainnet).unwrap();
    conf.validate().unwrap();
    assert!(!conf.reindex());
    assert_eq!(conf.zmq_endpoint(), Some("tcp://127.0.0.1:28332"));
    assert_eq!(conf.rpc_url(Network::Mainnet), "http://127.0.0.1:3889");
}

#[test]
fn default_conf_generates_fresh_rpc_credentials() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    DaemonConf::write_default(first.path()).unwrap();
    DaemonConf::write_default(second.path()).unwrap();

    let conf_a = DaemonConf::load(first.path(), Network::Mainnet).unwrap();
    let conf_b = DaemonConf::load(second.path(), Network::Mainnet).unwrap();
    assert!(conf_a.rpc_user().starts_with("qtum-"));
    assert_ne!(conf_a.rpc_password(), "local321");
    assert_eq!(conf_a.rpc_password().len(), 32);
    assert_ne!(conf_a.rpc_password(), conf_b.rpc_password());
}

#[test]
fn rpc_port_falls_back_per_network() {
    let conf = DaemonConf::from_values(Default::default());
    assert_eq!(conf.rpc_port(Network::Mainnet), 3889);
    assert_eq!(conf.rpc_port(Network::Testnet), 13889);
}
