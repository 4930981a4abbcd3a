use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC: &str = "2.0";

#[derive(Debug, Serialize)]
pub struct Request {
    pub jsonrpc: String,
    pub id: String,
    pub method: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct Response {
    pub result: Option<Value>,
    pub error: Option<Value>,
}

// ---- daemon-side payloads ----

#[derive(Debug, Clone, Deserialize)]
pub struct BlockchainInfo {
    pub chain: String,
    pub blocks: u64,
    #[serde(default)]
    pub headers: u64,
    pub bestblockhash: String,
    #[serde(default)]
    pub difficulty: f64,
    #[serde(default)]
    pub mediantime: u64,
    pub verificationprogress: f64,
    #[serde(default)]
    pub chainwork: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcBlockHeader {
    pub hash: String,
    #[serde(default)]
    pub confirmations: i64,
    pub height: u64,
    pub version: i64,
    pub merkleroot: String,
    pub time: u64,
    #[serde(default)]
    pub mediantime: u64,
    pub nonce: u64,
    pub bits: String,
    pub difficulty: f64,
    #[serde(default)]
    pub chainwork: String,
    pub previousblockhash: Option<String>,
    pub nextblockhash: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcBlockJson {
    pub hash: String,
    #[serde(default)]
    pub confirmations: i64,
    pub height: u64,
    pub version: i64,
    pub merkleroot: String,
    pub tx: Vec<String>,
    pub time: u64,
    #[serde(default)]
    pub mediantime: u64,
    pub nonce: u64,
    pub bits: String,
    pub difficulty: f64,
    #[serde(default)]
    pub chainwork: String,
    pub previousblockhash: Option<String>,
    pub nextblockhash: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcAddressUtxo {
    pub address: String,
    pub txid: String,
    #[serde(rename = "outputIndex")]
    pub output_index: u32,
    pub script: String,
    pub satoshis: i64,
    pub height: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcMempoolDelta {
    pub address: String,
    pub txid: String,
    pub index: u32,
    pub satoshis: i64,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default)]
    pub script: Option<String>,
    pub prevtxid: Option<String>,
    pub prevout: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcAddressBalance {
    pub balance: i64,
    pub received: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpentInfo {
    pub txid: String,
    pub index: u32,
    #[serde(default)]
    pub height: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcScriptSig {
    #[serde(default)]
    pub asm: String,
    #[serde(default)]
    pub hex: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcScriptPubKey {
    #[serde(default)]
    pub asm: String,
    #[serde(default)]
    pub hex: String,
    #[serde(default)]
    pub addresses: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcVin {
    pub coinbase: Option<String>,
    pub txid: Option<String>,
    pub vout: Option<u32>,
    #[serde(rename = "scriptSig")]
    pub script_sig: Option<RpcScriptSig>,
    #[serde(default)]
    pub sequence: u64,
    pub address: Option<String>,
    #[serde(rename = "valueSat")]
    pub value_sat: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcVout {
    #[serde(default)]
    pub value: f64,
    #[serde(rename = "valueSat")]
    pub value_sat: Option<i64>,
    pub n: u32,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: RpcScriptPubKey,
    #[serde(rename = "spentTxId")]
    pub spent_tx_id: Option<String>,
    #[serde(rename = "spentIndex")]
    pub spent_index: Option<u32>,
    #[serde(rename = "spentHeight")]
    pub spent_height: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcRawTransaction {
    pub hex: String,
    pub txid: String,
    pub version: i64,
    pub locktime: u64,
    pub vin: Vec<RpcVin>,
    pub vout: Vec<RpcVout>,
    pub blockhash: Option<String>,
    pub height: Option<i64>,
    #[serde(default)]
    pub confirmations: u64,
    pub time: Option<u64>,
    pub blocktime: Option<u64>,
}

// ---- facade-side shapes ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressUtxo {
    pub address: String,
    pub txid: String,
    pub output_index: u32,
    pub script: Option<String>,
    pub satoshis: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

impl From<RpcAddressUtxo> for AddressUtxo {
    fn from(u: RpcAddressUtxo) -> Self {
        Self {
            address: u.address,
            txid: u.txid,
            output_index: u.output_index,
            script: Some(u.script),
            satoshis: u.satoshis,
            height: u.height,
            timestamp: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    pub hash: String,
    pub confirmations: i64,
    pub height: u64,
    pub version: i64,
    pub merkle_root: String,
    pub time: u64,
    pub median_time: u64,
    pub nonce: u64,
    pub bits: String,
    pub difficulty: f64,
    pub chain_work: String,
    pub prev_hash: Option<String>,
    pub next_hash: Option<String>,
}

impl From<RpcBlockHeader> for BlockHeader {
    fn from(h: RpcBlockHeader) -> Self {
        Self {
            hash: h.hash,
            confirmations: h.confirmations,
            height: h.height,
            version: h.version,
            merkle_root: h.merkleroot,
            time: h.time,
            median_time: h.mediantime,
            nonce: h.nonce,
            bits: h.bits,
            difficulty: h.difficulty,
            chain_work: h.chainwork,
            prev_hash: h.previousblockhash,
            next_hash: h.nextblockhash,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockOverview {
    pub hash: String,
    pub height: u64,
    pub confirmations: i64,
    pub version: i64,
    pub merkle_root: String,
    pub time: u64,
    pub median_time: u64,
    pub nonce: u64,
    pub bits: String,
    pub difficulty: f64,
    pub chain_work: String,
    pub prev_hash: Option<String>,
    pub next_hash: Option<String>,
    pub txids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressSummary {
    pub address: String,
    pub appearances: usize,
    pub total_received: u64,
    pub total_spent: u64,
    pub balance: i64,
    pub unconfirmed_appearances: usize,
    pub unconfirmed_balance: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txids: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedInput {
    pub prev_tx_id: Option<String>,
    pub output_index: Option<u32>,
    pub script: Option<String>,
    pub script_asm: Option<String>,
    pub sequence: u64,
    pub address: Option<String>,
    pub satoshis: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedOutput {
    pub satoshis: i64,
    pub script: String,
    pub script_asm: String,
    pub spent_tx_id: Option<String>,
    pub spent_index: Option<u32>,
    pub spent_height: Option<i64>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedTransaction {
    pub hex: String,
    pub txid: String,
    pub version: i64,
    pub lock_time: u64,
    pub block_hash: Option<String>,
    pub height: i64,
    pub confirmations: u64,
    pub block_timestamp: Option<u64>,
    pub is_coinbase: bool,
    pub input_satoshis: i64,
    pub output_satoshis: i64,
    pub fee_satoshis: i64,
    pub inputs: Vec<DetailedInput>,
    pub outputs: Vec<DetailedOutput>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressIndexes {
    pub input_indexes: Vec<usize>,
    pub output_indexes: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub tx: DetailedTransaction,
    pub addresses: indexmap::IndexMap<String, AddressIndexes>,
    pub satoshis: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressHistory {
    pub total_count: usize,
    pub items: Vec<HistoryItem>,
}
