use bitcoin::{
    TxIn,
    base58,
    hashes::{Hash, hash160},
    script::{Instruction, Script},
};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Qtum network, with the base58 version bytes the daemon uses. Testnet and
/// regtest share prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

impl Network {
    pub fn pubkey_hash_prefix(self) -> u8 {
        match self {
            Network::Mainnet => 0x3a,
            Network::Testnet | Network::Regtest => 0x78,
        }
    }

    pub fn script_hash_prefix(self) -> u8 {
        match self {
            Network::Mainnet => 0x32,
            Network::Testnet | Network::Regtest => 0x6e,
        }
    }

    /// Subdirectory of the datadir the daemon keeps network-specific files in.
    pub fn conf_subdir(self) -> Option<&'static str> {
        match self {
            Network::Mainnet => None,
            Network::Testnet => Some("testnet3"),
            Network::Regtest => Some("regtest"),
        }
    }

    pub fn daemon_flag(self) -> Option<&'static str> {
        match self {
            Network::Mainnet => None,
            Network::Testnet => Some("-testnet"),
            Network::Regtest => Some("-regtest"),
        }
    }

    pub fn default_rpc_port(self) -> u16 {
        match self {
            Network::Mainnet => 3889,
            Network::Testnet => 13889,
            Network::Regtest => 13889,
        }
    }
}

fn encode(prefix: u8, hash: &[u8; 20]) -> String {
    let mut payload = [0u8; 21];
    payload[0] = prefix;
    payload[1..].copy_from_slice(hash);
    base58::encode_check(&payload)
}

pub fn p2pkh_from_pubkey(pubkey: &[u8], network: Network) -> String {
    let hash = hash160::Hash::hash(pubkey);
    encode(network.pubkey_hash_prefix(), hash.as_byte_array())
}

pub fn p2sh_from_script(script: &[u8], network: Network) -> String {
    let hash = hash160::Hash::hash(script);
    encode(network.script_hash_prefix(), hash.as_byte_array())
}

/// Address paid by an output script. Covers the base58 forms the daemon
/// indexes (p2pkh, p2sh, bare p2pk); anything else yields None.
pub fn from_output_script(script: &Script, network: Network) -> Option<String> {
    let bytes = script.as_bytes();
    if script.is_p2pkh() {
        let hash: [u8; 20] = bytes[3..23].try_into().ok()?;
        return Some(encode(network.pubkey_hash_prefix(), &hash));
    }
    if script.is_p2sh() {
        let hash: [u8; 20] = bytes[2..22].try_into().ok()?;
        return Some(encode(network.script_hash_prefix(), &hash));
    }
    if script.is_p2pk() {
        if let Some(Ok(Instruction::PushBytes(pubkey))) = script.instructions().next() {
            return Some(p2pkh_from_pubkey(pubkey.as_bytes(), network));
        }
    }
    None
}

/// Address that funded an input, recovered from its unlocking data: the
/// trailing pubkey push of a p2pkh scriptSig, or the redeem script of a
/// p2sh spend. Witness-only spends are not recoverable without the prevout.
pub fn from_input(txin: &TxIn, network: Network) -> Option<String> {
    let pushes: Vec<&[u8]> = txin
        .script_sig
        .instructions()
        .filter_map(|i| match i {
            Ok(Instruction::PushBytes(b)) => Some(b.as_bytes()),
            _ => None,
        })
        .collect();
    match pushes.as_slice() {
        // sig + pubkey
        [_, pubkey] if looks_like_pubkey(pubkey) => Some(p2pkh_from_pubkey(pubkey, network)),
        // sigs + redeem script
        [_, .., redeem] if !redeem.is_empty() => Some(p2sh_from_script(redeem, network)),
        _ => None,
    }
}

fn looks_like_pubkey(bytes: &[u8]) -> bool {
    (bytes.len() == 33 && matches!(bytes[0], 0x02 | 0x03))
        || (bytes.len() == 65 && bytes[0] == 0x04)
}

pub fn is_valid(address: &str, network: Network) -> bool {
    match base58::decode_check(address) {
        Ok(payload) => {
            payload.len() == 21
                && (payload[0] == network.pubkey_hash_prefix()
                    || payload[0] == network.script_hash_prefix())
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn p2pkh_roundtrip() {
        let pubkey = [0x02u8; 33];
        let address = p2pkh_from_pubkey(&pubkey, Network::Mainnet);
        assert!(address.starts_with('Q'));
        assert!(is_valid(&address, Network::Mainnet));
        assert!(!is_valid(&address, Network::Testnet));
    }

    #[test]
    fn rejects_garbage() {
        assert!(!is_valid("", Network::Mainnet));
        assert!(!is_valid("not-an-address", Network::Mainnet));
    }

    #[test]
    fn output_script_p2pkh() {
        let pubkey = [0x03u8; 33];
        let hash = hash160::Hash::hash(&pubkey);
        let script = bitcoin::ScriptBuf::new_p2pkh(&bitcoin::PubkeyHash::from_raw_hash(hash));
        let address = from_output_script(&script, Network::Mainnet).unwrap();
        assert_eq!(address, p2pkh_from_pubkey(&pubkey, Network::Mainnet));
    }
}
