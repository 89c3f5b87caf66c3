//! Lenient numeric decoding for tool output.
//!
//! Search services report numbers as JSON numbers, numeric strings ("1e-30") or
//! null depending on the tool and version. Every field collapses to a number so
//! downstream aggregation stays total.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

fn value_to_f64(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => 0.0,
    }
}

pub fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let n = value_to_f64(&value);
    Ok(if n.is_finite() { n } else { 0.0 })
}

pub fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let n = lenient_f64(deserializer)?;
    Ok(if n > 0.0 { n as u64 } else { 0 })
}

pub fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Clamp a percentage identity into [0, 100].
///
/// Every source reports identity as a percentage: BLAST `identity` and `pident`,
/// and Foldseek `seqId`. No value is rescaled, so a 0.8% hit stays 0.8.
pub fn clamp_identity(raw: f64) -> f64 {
    if raw.is_finite() {
        raw.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "lenient_f64")]
        evalue: f64,
        #[serde(default, deserialize_with = "lenient_u64")]
        len: u64,
        #[serde(default, deserialize_with = "lenient_string")]
        id: String,
    }

    #[test]
    fn test_numeric_strings_and_nulls() {
        let p: Probe = serde_json::from_value(json!({ "evalue": "1e-30", "len": "120", "id": 42 })).unwrap();
        assert_eq!(p.evalue, 1e-30);
        assert_eq!(p.len, 120);
        assert_eq!(p.id, "42");

        let p: Probe = serde_json::from_value(json!({ "evalue": null, "len": -3 })).unwrap();
        assert_eq!(p.evalue, 0.0);
        assert_eq!(p.len, 0);
        assert_eq!(p.id, "");
    }

    #[test]
    fn test_garbage_string_is_zero() {
        let p: Probe = serde_json::from_value(json!({ "evalue": "n/a" })).unwrap();
        assert_eq!(p.evalue, 0.0);
    }

    #[test]
    fn test_identity_clamping() {
        assert_eq!(clamp_identity(0.42), 0.42);
        assert_eq!(clamp_identity(87.5), 87.5);
        assert_eq!(clamp_identity(140.0), 100.0);
        assert_eq!(clamp_identity(-1.0), 0.0);
        assert_eq!(clamp_identity(f64::NAN), 0.0);
    }
}
