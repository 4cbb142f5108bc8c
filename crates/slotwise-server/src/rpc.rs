//! JSON-RPC 2.0 envelope and the mapping from [`ServiceError`] to error codes.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use slotwise_service::ServiceError;

pub mod codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;

    pub const NOT_AUTHORIZED: i32 = 401;
    pub const INVALID_SIGNATURE: i32 = 402;
    pub const SIGNATURE_EXPIRED: i32 = 403;
    pub const NOT_FOUND: i32 = 404;
    pub const CONFLICT: i32 = 409;
    pub const INTERNAL: i32 = 500;
}

/// String or numeric request id. Requests without an id get `null` back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcId {
    String(String),
    Number(i64),
}

#[derive(Clone, Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Option<JsonRpcId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Option<JsonRpcId>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<JsonRpcId>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn failure(id: Option<JsonRpcId>, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error(details: impl std::fmt::Display) -> Self {
        Self::new(codes::PARSE_ERROR, format!("parse error: {details}"))
    }

    pub fn invalid_request(details: impl std::fmt::Display) -> Self {
        Self::new(codes::INVALID_REQUEST, format!("invalid request: {details}"))
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(codes::METHOD_NOT_FOUND, format!("method not found: {method}"))
    }

    pub fn invalid_params(details: impl std::fmt::Display) -> Self {
        Self::new(codes::INVALID_PARAMS, format!("invalid params: {details}"))
    }
}

impl From<ServiceError> for RpcError {
    fn from(e: ServiceError) -> Self {
        let code = match &e {
            ServiceError::NotAuthorized(_) => codes::NOT_AUTHORIZED,
            ServiceError::InvalidSignature(_) => codes::INVALID_SIGNATURE,
            ServiceError::SignatureExpired(_) => codes::SIGNATURE_EXPIRED,
            ServiceError::NotFound(_) => codes::NOT_FOUND,
            ServiceError::Conflict(_) => codes::CONFLICT,
            ServiceError::InvalidParams(_) => codes::INVALID_PARAMS,
            ServiceError::Internal { .. } => codes::INTERNAL,
        };
        // Internal details stay in the server log.
        let message = match &e {
            ServiceError::Internal { .. } => "internal error".to_string(),
            other => other.to_string(),
        };
        Self {
            code,
            message,
            data: Some(json!({ "kind": e.kind(), "retryable": e.is_retryable() })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_may_be_strings_or_numbers() {
        let req: JsonRpcRequest = serde_json::from_value(json!({
            "jsonrpc": "2.0", "method": "getKeys", "id": "a1"
        }))
        .unwrap();
        assert_eq!(req.id, Some(JsonRpcId::String("a1".into())));
        assert_eq!(req.params, Value::Null);

        let req: JsonRpcRequest = serde_json::from_value(json!({
            "jsonrpc": "2.0", "method": "getKeys", "params": {}, "id": 7
        }))
        .unwrap();
        assert_eq!(req.id, Some(JsonRpcId::Number(7)));
    }

    #[test]
    fn service_errors_map_to_codes() {
        let cases = [
            (ServiceError::NotAuthorized("x".into()), 401),
            (ServiceError::InvalidSignature("x".into()), 402),
            (ServiceError::SignatureExpired("x".into()), 403),
            (ServiceError::NotFound("x".into()), 404),
            (ServiceError::Conflict("x".into()), 409),
            (ServiceError::InvalidParams("x".into()), -32602),
        ];
        for (err, code) in cases {
            assert_eq!(RpcError::from(err).code, code);
        }
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = RpcError::from(ServiceError::Internal {
            message: "store: backend exploded".into(),
            retryable: true,
        });
        assert_eq!(err.code, 500);
        assert_eq!(err.message, "internal error");
        assert_eq!(err.data, Some(json!({ "kind": "internal", "retryable": true })));
    }

    #[test]
    fn response_omits_the_absent_half() {
        let ok = serde_json::to_value(JsonRpcResponse::success(None, json!(1))).unwrap();
        assert!(ok.get("error").is_none());
        assert_eq!(ok["id"], Value::Null);

        let err = serde_json::to_value(JsonRpcResponse::failure(
            Some(JsonRpcId::Number(3)),
            RpcError::method_not_found("nope"),
        ))
        .unwrap();
        assert!(err.get("result").is_none());
        assert_eq!(err["error"]["code"], -32601);
    }
}
