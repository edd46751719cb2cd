//! Wire frames: one JSON object per WebSocket text message, discriminated by
//! the presence of a `request`, `response` or `event` key.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client → server RPC request. `id` is client-chosen; the response echoes
/// both the request name and the id.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFrame {
    pub request: String,
    pub id: u64,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub args: Value,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dry_run: bool,
}

impl RequestFrame {
    pub fn new(request: impl Into<String>, id: u64, args: Value) -> Self {
        Self {
            request: request.into(),
            id,
            args,
            dry_run: false,
        }
    }
}

/// Server → client RPC response. `result == false` is an application-level
/// failure; `messages` then carries the human-readable reasons.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseFrame {
    pub response: String,
    pub id: u64,
    pub result: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl ResponseFrame {
    pub fn ok(request: &str, id: u64, data: Value) -> Self {
        Self {
            response: request.to_string(),
            id,
            result: true,
            messages: Vec::new(),
            data,
        }
    }

    pub fn error(request: &str, id: u64, messages: Vec<String>) -> Self {
        Self {
            response: request.to_string(),
            id,
            result: false,
            messages,
            data: Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_optional_fields_omitted() {
        let req = RequestFrame::new("SaveScene", 7, Value::Null);
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"request":"SaveScene","id":7}"#);
    }

    #[test]
    fn request_dry_run_on_wire() {
        let mut req = RequestFrame::new("CloseScene", 1, json!({"force": true}));
        req.dry_run = true;
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"dryRun\":true"));
        let back: RequestFrame = serde_json::from_str(&json).unwrap();
        assert!(back.dry_run);
        assert_eq!(back.args["force"], Value::Bool(true));
    }

    #[test]
    fn response_error_shape() {
        let resp = ResponseFrame::error("OpenScene", 3, vec!["Scene not found.".into()]);
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(
            json,
            r#"{"response":"OpenScene","id":3,"result":false,"messages":["Scene not found."]}"#
        );
    }

    #[test]
    fn response_ok_without_data_is_compact() {
        let resp = ResponseFrame::ok("SaveScene", 2, Value::Null);
        assert_eq!(
            serde_json::to_string(&resp).unwrap(),
            r#"{"response":"SaveScene","id":2,"result":true}"#
        );
    }
}
