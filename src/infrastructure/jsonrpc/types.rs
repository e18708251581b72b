//! JSON-RPC 2.0 message shapes

use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{Error, Result};

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Clone)]
pub struct Request {
    pub jsonrpc: &'static str,
    pub id: String,
    pub method: String,
    pub params: Value,
}

impl Request {
    /// Request with a fresh UUIDv4 id
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id: Uuid::new_v4().to_string(),
            method: method.into(),
            params,
        }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "jsonrpc": self.jsonrpc,
            "id": self.id,
            "method": self.method,
            "params": self.params,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl From<RpcError> for Error {
    fn from(err: RpcError) -> Self {
        Error::api(err.code, err.message)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

impl Response {
    /// The result, or the error object classified as `Error::Api`
    pub fn into_result(self) -> Result<Value> {
        match (self.error, self.result) {
            (Some(err), _) => Err(err.into()),
            (None, Some(result)) => Ok(result),
            (None, None) => Ok(Value::Null),
        }
    }

    pub fn id_str(&self) -> Option<&str> {
        self.id.as_ref().and_then(Value::as_str)
    }
}

/// Build the `edgeRpc` parameters wrapping `request` for `edge_id`
pub fn edge_rpc_params(edge_id: &str, request: &Request) -> Value {
    json!({
        "edgeId": edge_id,
        "payload": request.to_value(),
    })
}

/// Extract `payload.result` from an `edgeRpc` response
pub fn edge_rpc_result(response: Value) -> Result<Value> {
    let Value::Object(mut outer) = response else {
        return Err(Error::UnexpectedResponse("edgeRpc result is not an object".into()));
    };
    let Some(Value::Object(mut payload)) = outer.remove("payload") else {
        return Err(Error::UnexpectedResponse("edgeRpc result has no payload".into()));
    };
    if let Some(error) = payload.remove("error") {
        let error: RpcError = serde_json::from_value(error)?;
        return Err(error.into());
    }
    payload
        .remove("result")
        .ok_or_else(|| Error::UnexpectedResponse("edgeRpc payload has no result".into()))
}
