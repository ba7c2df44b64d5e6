//! JSON-RPC chain access.
//!
//! [`ChainClient`] is a thin typed layer over a [`Transport`]. It never
//! retries and never assigns nonces; the node's signer does that.

use crate::{
    Error,
    Result,
};
use alloy_primitives::{
    Address,
    Bytes,
    U64,
};
use serde::de::DeserializeOwned;
use serde_json::{
    Value,
    json,
};
use std::sync::Arc;
use tracing::debug;

pub use alloy_rpc_types_eth::{
    BlockNumberOrTag,
    Filter,
    Log,
    TransactionInput,
    TransactionReceipt,
    TransactionRequest,
};
pub use http::HttpTransport;
pub use types::{
    PendingTransaction,
    RpcError,
    TxHash,
    call_request,
    revert_data,
};

mod http;
mod types;

#[cfg(test)]
mod tests;

#[derive(Clone, Debug, thiserror::Error)]
pub enum TransportError {
    #[error("endpoint unreachable: {0}")]
    Unreachable(String),
    #[error("rpc error {}: {}", .0.code, .0.message)]
    Rpc(RpcError),
    #[error("malformed response: {0}")]
    Malformed(String),
}

pub trait Transport: Send + Sync + 'static {
    fn request(
        &self,
        method: &str,
        params: Value,
    ) -> impl Future<Output = Result<Value, TransportError>> + Send;
}

pub struct ChainClient<T> {
    transport: Arc<T>,
}

impl<T> Clone for ChainClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
        }
    }
}

impl<T: Transport> ChainClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn call<R: DeserializeOwned>(&self, method: &str, params: Value) -> Result<R> {
        debug!(method, "rpc request");
        let value = self.transport.request(method, params).await?;
        serde_json::from_value(value)
            .map_err(|e| Error::Decoding(format!("{method}: unexpected result shape: {e}")))
    }

    /// `eth_call` against the latest block.
    pub async fn read_call(&self, contract: Address, data: &Bytes) -> Result<Bytes> {
        self.read_call_at(&call_request(contract, data.clone()), BlockNumberOrTag::Latest)
            .await
    }

    /// `eth_call` with an explicit sender, value and block. Pinning several
    /// reads to one block number gives a consistent view; replaying a mined
    /// transaction this way surfaces its revert reason.
    pub async fn read_call_at(
        &self,
        request: &TransactionRequest,
        block: BlockNumberOrTag,
    ) -> Result<Bytes> {
        self.call("eth_call", json!([request, block])).await
    }

    /// `eth_sendTransaction`; signing and nonce assignment are the node's.
    pub async fn submit_transaction(&self, request: &TransactionRequest) -> Result<TxHash> {
        if request.from.is_none() {
            return Err(Error::Configuration(
                "eth_sendTransaction needs a sender address".to_string(),
            ));
        }
        self.call("eth_sendTransaction", json!([request])).await
    }

    pub async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<TransactionReceipt>> {
        self.call("eth_getTransactionReceipt", json!([hash])).await
    }

    pub async fn transaction_by_hash(&self, hash: TxHash) -> Result<Option<PendingTransaction>> {
        self.call("eth_getTransactionByHash", json!([hash])).await
    }

    pub async fn block_number(&self) -> Result<u64> {
        let number: U64 = self.call("eth_blockNumber", json!([])).await?;
        Ok(number.to())
    }

    pub async fn chain_id(&self) -> Result<u64> {
        let id: U64 = self.call("eth_chainId", json!([])).await?;
        Ok(id.to())
    }

    pub async fn accounts(&self) -> Result<Vec<Address>> {
        self.call("eth_accounts", json!([])).await
    }

    pub async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>> {
        self.call("eth_getLogs", json!([filter])).await
    }
}
