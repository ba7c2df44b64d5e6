use alloy_json_rpc::ErrorPayload;
use alloy_primitives::{
    Address,
    Bytes,
    U256,
};
use alloy_rpc_types_eth::{
    TransactionInput,
    TransactionRequest,
};
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;

pub use alloy_primitives::TxHash;

/// JSON-RPC error object with its `data` member left as raw JSON.
pub type RpcError = ErrorPayload<Value>;

/// Revert payload of an RPC error, either a bare hex string or nested under
/// `data` (some providers wrap it).
pub fn revert_data(error: &RpcError) -> Option<Bytes> {
    let raw = match error.data.as_ref()? {
        Value::String(raw) => raw.as_str(),
        Value::Object(map) => map.get("data")?.as_str()?,
        _ => return None,
    };
    let bytes: Bytes = raw.parse().ok()?;
    (!bytes.is_empty()).then_some(bytes)
}

/// `eth_call` request for `data` against `to`, no sender or value.
pub fn call_request(to: Address, data: Bytes) -> TransactionRequest {
    TransactionRequest::default()
        .to(to)
        .input(TransactionInput::new(data))
}

/// What `eth_getTransactionByHash` knows about a transaction that may not
/// be mined yet. Only the fields the tracker reads; signature fields are
/// ignored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTransaction {
    pub hash: TxHash,
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    pub input: Bytes,
    #[serde(default)]
    pub value: U256,
    #[serde(default, with = "alloy_serde::quantity::opt")]
    pub block_number: Option<u64>,
}
