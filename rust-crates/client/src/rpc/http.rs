use super::{
    Transport,
    TransportError,
};
use alloy_json_rpc::{
    Id,
    Request,
    Response,
    ResponsePayload,
};
use reqwest::StatusCode;
use serde_json::Value;
use std::{
    sync::atomic::{
        AtomicU64,
        Ordering,
    },
    time::Duration,
};

/// JSON-RPC over HTTP POST.
pub struct HttpTransport {
    url: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                TransportError::Unreachable(format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self {
            url: url.into(),
            http,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for HttpTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = Request::new(method.to_string(), Id::Number(id), params);
        let res = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| TransportError::Unreachable(format!("{method}: {e}")))?;
        let status = res.status();
        let bytes = res.bytes().await.map_err(|e| {
            TransportError::Unreachable(format!("{method}: failed to read response: {e}"))
        })?;
        // nodes answer JSON-RPC errors with a 200, anything else is the endpoint
        if status != StatusCode::OK {
            let body = String::from_utf8_lossy(&bytes);
            return Err(TransportError::Unreachable(format!(
                "{method}: endpoint responded with {status}: {body}"
            )));
        }
        read_response(method, id, &bytes)
    }
}

/// Unwraps the node's answer to request `id`.
fn read_response(method: &str, id: u64, bytes: &[u8]) -> Result<Value, TransportError> {
    let response: Response<Value, Value> = serde_json::from_slice(bytes).map_err(|e| {
        TransportError::Malformed(format!("{method}: invalid JSON-RPC payload: {e}"))
    })?;
    if response.id != Id::Number(id) && !matches!(response.id, Id::None) {
        return Err(TransportError::Malformed(format!(
            "{method}: response id {:?} does not match request id {id}",
            response.id
        )));
    }
    match response.payload {
        ResponsePayload::Success(result) => Ok(result),
        ResponsePayload::Failure(error) => Err(TransportError::Rpc(error)),
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn request__envelope__carries_version_id_and_params() {
        // when
        let request = Request::new("eth_blockNumber".to_string(), Id::Number(7), json!([]));
        let value = serde_json::to_value(&request).unwrap();

        // then
        assert_eq!(value["jsonrpc"], json!("2.0"));
        assert_eq!(value["id"], json!(7));
        assert_eq!(value["method"], json!("eth_blockNumber"));
        assert_eq!(value["params"], json!([]));
    }

    #[test]
    fn read_response__success__returns_result() {
        // given
        let bytes = body(json!({ "jsonrpc": "2.0", "id": 7, "result": "0x10" }));

        // when
        let result = read_response("eth_blockNumber", 7, &bytes);

        // then
        assert_eq!(result.unwrap(), json!("0x10"));
    }

    #[test]
    fn read_response__error_object__keeps_code_message_and_data() {
        // given
        let bytes = body(json!({
            "jsonrpc": "2.0",
            "id": 7,
            "error": { "code": 3, "message": "execution reverted", "data": "0x08c379a0" }
        }));

        // when
        let result = read_response("eth_call", 7, &bytes);

        // then
        let Err(TransportError::Rpc(error)) = &result else {
            panic!("expected an rpc error, got {result:?}");
        };
        assert_eq!(error.code, 3);
        assert_eq!(error.message, "execution reverted");
        assert_eq!(error.data, Some(json!("0x08c379a0")));
    }

    #[test]
    fn read_response__other_request_id__is_malformed() {
        // given
        let bytes = body(json!({ "jsonrpc": "2.0", "id": 8, "result": "0x10" }));

        // when
        let result = read_response("eth_blockNumber", 7, &bytes);

        // then
        assert!(matches!(result, Err(TransportError::Malformed(_))));
    }

    #[test]
    fn read_response__not_json_rpc__is_malformed() {
        // when
        let result = read_response("eth_blockNumber", 7, b"<html>bad gateway</html>");

        // then
        assert!(matches!(result, Err(TransportError::Malformed(_))));
    }
}
