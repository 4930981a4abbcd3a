use base64::prelude::*;
use reqwest::{Client as HttpClient, ClientBuilder, header::HeaderMap};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::{
    error::{Error, RpcErrorResponse},
    types::{
        BlockchainInfo, JSONRPC, Request, Response, RpcAddressBalance, RpcAddressUtxo,
        RpcBlockHeader, RpcMempoolDelta, RpcRawTransaction, SpentInfo,
    },
};

/// Minimal request/reply surface. The typed method set sits on top as
/// blanket default methods, so a test transport only implements this.
pub trait RpcTransport: Send + Sync + Clone + 'static {
    fn call_value(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> impl Future<Output = Result<Value, Error>> + Send;
}

#[derive(Clone, Debug)]
pub struct Client {
    client: HttpClient,
    url: String,
}

impl Client {
    pub fn new(url: String, user: &str, password: &str) -> Result<Self, Error> {
        let client = ClientBuilder::new()
            .default_headers({
                let mut headers = HeaderMap::new();
                let auth = BASE64_STANDARD.encode(format!("{}:{}", user, password));
                headers.insert("Authorization", format!("Basic {}", auth).parse()?);
                headers.insert("Content-Type", "application/json".parse()?);
                headers.insert("Accept", "application/json".parse()?);
                headers
            })
            .build()?;

        Ok(Client { client, url })
    }

    fn handle_response(response: Response) -> Result<Value, Error> {
        match (response.result, response.error) {
            (Some(result), None) => Ok(result),
            (None, Some(error)) => {
                let detail: RpcErrorResponse = serde_json::from_value(error)?;
                Err(Error::Rpc {
                    code: detail.code,
                    message: detail.message,
                })
            }
            (None, None) => Ok(Value::Null),
            (Some(_), Some(_)) => Err(Error::Unexpected(
                "Both result and error present in RPC response".to_string(),
            )),
        }
    }
}

impl RpcTransport for Client {
    async fn call_value(&self, method: &str, params: Vec<Value>) -> Result<Value, Error> {
        let request = Request {
            jsonrpc: JSONRPC.to_owned(),
            id: "0".to_string(),
            method: method.to_string(),
            params,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .json::<Response>()
            .await?;

        Self::handle_response(response)
    }
}

/// The daemon methods the hub consumes, implemented once over any
/// transport.
pub trait QtumRpc: RpcTransport {
    fn call<T: DeserializeOwned + Send>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> impl Future<Output = Result<T, Error>> + Send {
        async move { Ok(serde_json::from_value(self.call_value(method, params).await?)?) }
    }

    fn get_best_block_hash(&self) -> impl Future<Output = Result<String, Error>> + Send {
        self.call("getbestblockhash", vec![])
    }

    fn get_blockchain_info(&self) -> impl Future<Output = Result<BlockchainInfo, Error>> + Send {
        self.call("getblockchaininfo", vec![])
    }

    fn get_block_hash(&self, height: u64) -> impl Future<Output = Result<String, Error>> + Send {
        self.call("getblockhash", vec![height.into()])
    }

    /// Verbosity 0: raw hex.
    fn get_block_raw(&self, hash: &str) -> impl Future<Output = Result<String, Error>> + Send {
        self.call("getblock", vec![hash.into(), 0.into()])
    }

    /// Verbosity 1: JSON with txids.
    fn get_block_json(&self, hash: &str) -> impl Future<Output = Result<Value, Error>> + Send {
        self.call("getblock", vec![hash.into(), 1.into()])
    }

    fn get_block_header(
        &self,
        hash: &str,
    ) -> impl Future<Output = Result<RpcBlockHeader, Error>> + Send {
        self.call("getblockheader", vec![hash.into()])
    }

    fn get_block_hashes(
        &self,
        high: u64,
        low: u64,
        options: Value,
    ) -> impl Future<Output = Result<Value, Error>> + Send {
        self.call("getblockhashes", vec![high.into(), low.into(), options])
    }

    fn get_raw_transaction(
        &self,
        txid: &str,
    ) -> impl Future<Output = Result<String, Error>> + Send {
        self.call("getrawtransaction", vec![txid.into(), 0.into()])
    }

    fn get_raw_transaction_verbose(
        &self,
        txid: &str,
    ) -> impl Future<Output = Result<RpcRawTransaction, Error>> + Send {
        self.call("getrawtransaction", vec![txid.into(), 1.into()])
    }

    fn send_raw_transaction(
        &self,
        hex: &str,
        allow_absurd_fees: bool,
    ) -> impl Future<Output = Result<String, Error>> + Send {
        self.call("sendrawtransaction", vec![hex.into(), allow_absurd_fees.into()])
    }

    fn estimate_fee(&self, blocks: u64) -> impl Future<Output = Result<Value, Error>> + Send {
        self.call("estimatefee", vec![blocks.into()])
    }

    fn get_address_utxos(
        &self,
        addresses: &[String],
    ) -> impl Future<Output = Result<Vec<RpcAddressUtxo>, Error>> + Send {
        self.call("getaddressutxos", vec![json!({ "addresses": addresses })])
    }

    fn get_address_mempool(
        &self,
        addresses: &[String],
    ) -> impl Future<Output = Result<Vec<RpcMempoolDelta>, Error>> + Send {
        self.call("getaddressmempool", vec![json!({ "addresses": addresses })])
    }

    fn get_address_txids(
        &self,
        addresses: &[String],
        range: Option<(u64, u64)>,
    ) -> impl Future<Output = Result<Vec<String>, Error>> + Send {
        let params = match range {
            Some((start, end)) => {
                json!({ "addresses": addresses, "start": start, "end": end })
            }
            None => json!({ "addresses": addresses }),
        };
        self.call("getaddresstxids", vec![params])
    }

    fn get_address_balance(
        &self,
        addresses: &[String],
    ) -> impl Future<Output = Result<RpcAddressBalance, Error>> + Send {
        self.call("getaddressbalance", vec![json!({ "addresses": addresses })])
    }

    fn get_account_address(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<String, Error>> + Send {
        self.call("getaccountaddress", vec![address.into()])
    }

    fn get_balance(&self, account: &str) -> impl Future<Output = Result<f64, Error>> + Send {
        self.call("getbalance", vec![account.into()])
    }

    fn get_spent_info(
        &self,
        txid: &str,
        index: u32,
    ) -> impl Future<Output = Result<SpentInfo, Error>> + Send {
        self.call("getspentinfo", vec![json!({ "txid": txid, "index": index })])
    }

    fn list_unspent(
        &self,
        min_conf: u64,
        max_conf: u64,
        addresses: &[String],
    ) -> impl Future<Output = Result<Value, Error>> + Send {
        self.call(
            "listunspent",
            vec![min_conf.into(), max_conf.into(), json!(addresses)],
        )
    }

    fn get_new_address(&self) -> impl Future<Output = Result<String, Error>> + Send {
        self.call("getnewaddress", vec![])
    }

    fn call_contract(
        &self,
        address: &str,
        data: &str,
        from: Option<&str>,
    ) -> impl Future<Output = Result<Value, Error>> + Send {
        let mut params = vec![address.into(), data.into()];
        if let Some(from) = from {
            params.push(from.into());
        }
        self.call("callcontract", params)
    }

    fn get_account_info(&self, address: &str) -> impl Future<Output = Result<Value, Error>> + Send {
        self.call("getaccountinfo", vec![address.into()])
    }

    fn get_subsidy(&self, height: u64) -> impl Future<Output = Result<u64, Error>> + Send {
        self.call("getsubsidy", vec![height.into()])
    }

    fn get_transaction_receipt(
        &self,
        txid: &str,
    ) -> impl Future<Output = Result<Value, Error>> + Send {
        self.call("gettransactionreceipt", vec![txid.into()])
    }

    fn get_dgp_info(&self) -> impl Future<Output = Result<Value, Error>> + Send {
        self.call("getdgpinfo", vec![])
    }

    fn get_mining_info(&self) -> impl Future<Output = Result<Value, Error>> + Send {
        self.call("getmininginfo", vec![])
    }

    fn get_staking_info(&self) -> impl Future<Output = Result<Value, Error>> + Send {
        self.call("getstakinginfo", vec![])
    }

    fn get_info(&self) -> impl Future<Output = Result<Value, Error>> + Send {
        self.call("getinfo", vec![])
    }

    fn generate(&self, blocks: u64) -> impl Future<Output = Result<Vec<String>, Error>> + Send {
        self.call("generate", vec![blocks.into()])
    }
}

impl<T: RpcTransport> QtumRpc for T {}
