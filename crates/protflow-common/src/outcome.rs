//! Tagged tool outcomes and parameter-bag helpers.
//!
//! Every tool adapter reports either a success payload or a failure message.
//! On the wire both collapse into one JSON object carrying a `success` flag:
//! `{"success": true, ...payload}` or `{"success": false, "error": "..."}`.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// The parameter bag of a job: string keys to arbitrary JSON values.
pub type Parameters = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Success(Parameters),
    Failure(String),
}

impl ToolOutcome {
    /// Build a success outcome. Non-object payloads are stored under `result`.
    pub fn success(payload: Value) -> Self {
        match payload {
            Value::Object(mut map) => {
                map.remove("success");
                ToolOutcome::Success(map)
            }
            other => {
                let mut map = Map::new();
                map.insert("result".to_string(), other);
                ToolOutcome::Success(map)
            }
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        ToolOutcome::Failure(message.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Success(_))
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ToolOutcome::Failure(msg) => Some(msg),
            ToolOutcome::Success(_) => None,
        }
    }

    /// Interpret a raw `{success, ...}` dictionary returned by an external service.
    /// A missing `success` flag counts as success.
    pub fn from_value(value: Value) -> Self {
        let ok = value.get("success").and_then(Value::as_bool).unwrap_or(true);
        if ok {
            ToolOutcome::success(value)
        } else {
            let msg = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            ToolOutcome::Failure(msg)
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ToolOutcome::Success(payload) => {
                let mut map = Map::with_capacity(payload.len() + 1);
                map.insert("success".to_string(), Value::Bool(true));
                for (k, v) in payload {
                    map.insert(k.clone(), v.clone());
                }
                Value::Object(map)
            }
            ToolOutcome::Failure(msg) => serde_json::json!({
                "success": false,
                "error": msg,
            }),
        }
    }
}

impl Serialize for ToolOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Non-empty string parameter.
pub fn param_str<'a>(params: &'a Parameters, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Numeric parameter; numeric strings are accepted.
pub fn param_f64(params: &Parameters, key: &str) -> Option<f64> {
    match params.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn param_u64(params: &Parameters, key: &str) -> Option<u64> {
    param_f64(params, key).filter(|v| *v >= 0.0).map(|v| v as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_round_trips_payload_with_flag() {
        let outcome = ToolOutcome::success(json!({ "sequence": "ACDEFG" }));
        assert_eq!(outcome.to_value(), json!({ "success": true, "sequence": "ACDEFG" }));
    }

    #[test]
    fn test_from_value_failure_keeps_message() {
        let outcome = ToolOutcome::from_value(json!({ "success": false, "error": "API error: 500" }));
        assert_eq!(outcome.error(), Some("API error: 500"));
        assert_eq!(outcome.to_value()["success"], false);
    }

    #[test]
    fn test_scalar_payload_wrapped() {
        let outcome = ToolOutcome::success(json!("done"));
        assert_eq!(outcome.to_value()["result"], "done");
    }

    #[test]
    fn test_param_helpers() {
        let params = json!({ "sequence": "  ", "center_x": "1.5", "cpu": 4 });
        let params = params.as_object().unwrap();
        assert_eq!(param_str(params, "sequence"), None);
        assert_eq!(param_f64(params, "center_x"), Some(1.5));
        assert_eq!(param_u64(params, "cpu"), Some(4));
        assert_eq!(param_f64(params, "missing"), None);
    }
}
