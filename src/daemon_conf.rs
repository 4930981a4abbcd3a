use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use bitcoin::key::rand::{Rng, thread_rng};
use indexmap::IndexMap;

use crate::address::Network;

pub const CONF_FILE: &str = "qtum.conf";
pub const PID_FILE: &str = "qtumd.pid";

/// One parsed `key=value` entry. Purely numeric values are coerced so index
/// flags can be compared as integers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Str(String),
}

impl Value {
    fn parse(raw: &str) -> Self {
        match raw.parse::<i64>() {
            Ok(n) => Value::Int(n),
            Err(_) => Value::Str(raw.to_string()),
        }
    }
}

/// Merged view of the daemon's configuration: built-in defaults, overlaid by
/// the main conf file, overlaid by the network-specific conf file.
#[derive(Debug, Clone, Default)]
pub struct DaemonConf {
    values: IndexMap<String, Value>,
}

fn defaults() -> IndexMap<String, Value> {
    IndexMap::from([
        ("server".to_string(), Value::Int(1)),
        ("whitelist".to_string(), Value::Str("127.0.0.1".into())),
        ("txindex".to_string(), Value::Int(1)),
        ("addressindex".to_string(), Value::Int(1)),
        ("timestampindex".to_string(), Value::Int(1)),
        ("spentindex".to_string(), Value::Int(1)),
        (
            "zmqpubrawtx".to_string(),
            Value::Str("tcp://127.0.0.1:28332".into()),
        ),
        (
            "zmqpubhashblock".to_string(),
            Value::Str("tcp://127.0.0.1:28332".into()),
        ),
        ("rpcallowip".to_string(), Value::Str("127.0.0.1".into())),
        ("rpcuser".to_string(), Value::Str("qtum".into())),
        ("rpcpassword".to_string(), Value::Str("local321".into())),
        ("uacomment".to_string(), Value::Str("qtumd-hub".into())),
    ])
}

/// Alphanumeric secret for conf files the hub generates itself. Always
/// contains a letter so the numeric coercion in `parse` cannot touch it.
fn random_credential(len: usize) -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = thread_rng();
    let mut secret: String = (0..len)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();
    if secret.bytes().all(|b| b.is_ascii_digit()) {
        secret.replace_range(0..1, "x");
    }
    secret
}

pub fn parse(text: &str) -> IndexMap<String, Value> {
    let mut values = IndexMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, raw)) = line.split_once('=') {
            values.insert(key.trim().to_string(), Value::parse(raw.trim()));
        }
    }
    values
}

impl DaemonConf {
    pub fn conf_path(datadir: &Path) -> PathBuf {
        datadir.join(CONF_FILE)
    }

    pub fn pid_path(datadir: &Path, network: Network) -> PathBuf {
        match network.conf_subdir() {
            Some(subdir) => datadir.join(subdir).join(PID_FILE),
            None => datadir.join(PID_FILE),
        }
    }

    /// Reads and merges the daemon configuration for a datadir. The main
    /// conf file must exist; the network-specific one is optional.
    pub fn load(datadir: &Path, network: Network) -> Result<Self> {
        let mut values = defaults();

        let main_path = Self::conf_path(datadir);
        let text = std::fs::read_to_string(&main_path)
            .with_context(|| format!("Failed to read daemon conf at {}", main_path.display()))?;
        values.extend(parse(&text));

        if let Some(subdir) = network.conf_subdir() {
            let network_path = datadir.join(subdir).join(CONF_FILE);
            if network_path.exists() {
                let text = std::fs::read_to_string(&network_path).with_context(|| {
                    format!("Failed to read daemon conf at {}", network_path.display())
                })?;
                values.extend(parse(&text));
            }
        }

        Ok(Self { values })
    }

    pub fn from_values(values: IndexMap<String, Value>) -> Self {
        let mut merged = defaults();
        merged.extend(values);
        Self { values: merged }
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.values.get(key) {
            Some(Value::Int(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(Value::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Hard requirements for the hub to function: the RPC server and all
    /// three indexes enabled, and both ZMQ topics published on one endpoint.
    pub fn validate(&self) -> Result<()> {
        for flag in ["server", "txindex", "addressindex", "spentindex"] {
            if self.get_int(flag) != Some(1) {
                bail!("Daemon conf requires {}=1", flag);
            }
        }
        let rawtx = self
            .get_str("zmqpubrawtx")
            .filter(|s| !s.is_empty())
            .context("Daemon conf requires a non-empty zmqpubrawtx endpoint")?;
        let hashblock = self
            .get_str("zmqpubhashblock")
            .filter(|s| !s.is_empty())
            .context("Daemon conf requires a non-empty zmqpubhashblock endpoint")?;
        if rawtx != hashblock {
            bail!(
                "zmqpubrawtx and zmqpubhashblock must share one endpoint, got {} and {}",
                rawtx,
                hashblock
            );
        }
        Ok(())
    }

    pub fn reindex(&self) -> bool {
        self.get_int("reindex") == Some(1)
    }

    pub fn zmq_endpoint(&self) -> Option<&str> {
        self.get_str("zmqpubrawtx").filter(|s| !s.is_empty())
    }

    pub fn rpc_port(&self, network: Network) -> u16 {
        self.get_int("rpcport")
            .and_then(|n| u16::try_from(n).ok())
            .unwrap_or_else(|| network.default_rpc_port())
    }

    pub fn rpc_url(&self, network: Network) -> String {
        format!("http://127.0.0.1:{}", self.rpc_port(network))
    }

    pub fn rpc_user(&self) -> &str {
        self.get_str("rpcuser").unwrap_or("qtum")
    }

    pub fn rpc_password(&self) -> &str {
        self.get_str("rpcpassword").unwrap_or("local321")
    }

    /// Materialises the default conf file for a fresh datadir, with freshly
    /// generated rpc credentials instead of the well-known fallbacks.
    pub fn write_default(datadir: &Path) -> Result<PathBuf> {
        let path = Self::conf_path(datadir);
        let mut values = defaults();
        values.insert(
            "rpcuser".to_string(),
            Value::Str(format!("qtum-{}", random_credential(8))),
        );
        values.insert(
            "rpcpassword".to_string(),
            Value::Str(random_credential(32)),
        );
        let mut text = String::new();
        for (key, value) in values {
            match value {
                Value::Int(n) => text.push_str(&format!("{}={}\n", key, n)),
                Value::Str(s) => text.push_str(&format!("{}={}\n", key, s)),
            }
        }
        std::fs::write(&path, text)
            .with_context(|| format!("Failed to write daemon conf at {}", path.display()))?;
        Ok(path)
    }
}
