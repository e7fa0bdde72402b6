// src/validator.rs
//! Turns an untyped value (a decoded tag payload or live form state) into a
//! normalized `DeviceConfig`.
//!
//! Required fields are checked by truthiness: `0`, `false`, `""` and `null`
//! all count as missing. Everything else is coerced to its field type.

use log::debug;
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::schema::{
    DEFAULT_PUBLISH_INTERVAL, DEFAULT_VERSION, DeviceConfig, ServerConfig, WifiConfig,
};

pub fn validate(candidate: &Value) -> Result<DeviceConfig, ConfigError> {
    if !matches!(candidate, Value::Object(_) | Value::Array(_)) {
        return Err(ConfigError::InvalidPayload);
    }

    let device_id = field(candidate, "deviceId");
    let wifi = field(candidate, "wifi");
    let server = field(candidate, "server");
    let ssid = wifi.and_then(|w| field(w, "ssid"));
    let url = server.and_then(|s| field(s, "url"));

    let (Some(device_id), Some(wifi), Some(ssid), Some(server), Some(url)) = (
        device_id.filter(|v| truthy(v)),
        wifi.filter(|v| truthy(v)),
        ssid.filter(|v| truthy(v)),
        server.filter(|v| truthy(v)),
        url.filter(|v| truthy(v)),
    ) else {
        return Err(ConfigError::MissingRequiredFields);
    };

    Ok(DeviceConfig {
        version: Some(
            present(field(candidate, "version"))
                .map(coerce_string)
                .unwrap_or_else(|| DEFAULT_VERSION.to_string()),
        ),
        device_id: coerce_string(device_id),
        publish_interval: Some(
            integer_field(field(candidate, "publishInterval"), "publishInterval")
                .unwrap_or(DEFAULT_PUBLISH_INTERVAL),
        ),
        wifi: WifiConfig {
            ssid: coerce_string(ssid),
            password: optional_string(field(wifi, "password")),
        },
        server: ServerConfig {
            url: coerce_string(url),
            port: integer_field(field(server, "port"), "server.port"),
            tls: Some(field(server, "tls").is_some_and(truthy)),
            token: optional_string(field(server, "token")),
            topic: optional_string(field(server, "topic")),
        },
    })
}

fn field<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.as_object().and_then(|map| map.get(key))
}

/// Absent and `null` both mean "not supplied".
pub(crate) fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

pub(crate) fn optional_string(value: Option<&Value>) -> Option<String> {
    value.filter(|v| truthy(v)).map(coerce_string)
}

pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub fn coerce_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => coerce_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

// Integral floats print as plain digits below 1e21 and with a signed
// exponent from there on, as they would in the payload.
fn format_number(n: &serde_json::Number) -> String {
    let Some(f) = n.as_f64().filter(|_| n.is_f64()) else {
        return n.to_string();
    };
    if f == 0.0 {
        return "0".to_string();
    }

    // Shortest round-trip digits, e.g. "-1.2345e20"
    let sci = format!("{:e}", f);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return n.to_string();
    };
    let Ok(exp) = exp.parse::<i32>() else {
        return n.to_string();
    };

    if f.abs() >= 1e21 {
        return format!("{}e+{}", mantissa, exp);
    }
    if f.fract() != 0.0 {
        return n.to_string();
    }

    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let zeros = (exp + 1 - digits.len() as i32).max(0) as usize;
    format!("{}{}{}", sign, digits, "0".repeat(zeros))
}

pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Null => Some(0.0),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse::<f64>().ok().filter(|f| !f.is_nan())
            }
        }
        Value::Array(items) => match items.as_slice() {
            [] => Some(0.0),
            [single] => coerce_number(single),
            _ => None,
        },
        Value::Object(_) => None,
    }
}

/// Numeric coercion narrowed to an integer field; anything that does not
/// land on a whole number in range is treated as not supplied.
pub fn coerce_integer<T: TryFrom<i64>>(value: &Value) -> Option<T> {
    let f = coerce_number(value)?;
    if !f.is_finite() || f.fract() != 0.0 {
        return None;
    }
    T::try_from(f as i64).ok()
}

// Supplied but unusable numbers are dropped; log them so a defaulted field
// can be traced back to the input.
fn integer_field<T: TryFrom<i64>>(value: Option<&Value>, name: &str) -> Option<T> {
    let value = present(value)?;
    let coerced = coerce_integer(value);
    if coerced.is_none() {
        debug!("Dropping {} value {}: not a whole number in range", name, value);
    }
    coerced
}

/// Overlay of form values on the wizard's form defaults, with no required
/// field checks. Used for best-effort previews of an incomplete form.
pub fn lenient(form: &Value) -> DeviceConfig {
    let mut config = DeviceConfig::form_defaults();
    let empty = Map::new();
    let root = form.as_object().unwrap_or(&empty);
    let wifi = root.get("wifi").and_then(Value::as_object).unwrap_or(&empty);
    let server = root.get("server").and_then(Value::as_object).unwrap_or(&empty);

    if let Some(id) = root.get("deviceId").filter(|v| truthy(v)) {
        config.device_id = coerce_string(id);
    }
    if let Some(interval) = integer_field(root.get("publishInterval"), "publishInterval") {
        config.publish_interval = Some(interval);
    }
    if let Some(ssid) = wifi.get("ssid").filter(|v| truthy(v)) {
        config.wifi.ssid = coerce_string(ssid);
    }
    if let Some(password) = optional_string(wifi.get("password")) {
        config.wifi.password = Some(password);
    }
    if let Some(url) = server.get("url").filter(|v| truthy(v)) {
        config.server.url = coerce_string(url);
    }
    if present(server.get("port")).is_some() {
        config.server.port = integer_field(server.get("port"), "server.port");
    }
    config.server.tls = Some(server.get("tls").is_some_and(truthy));
    if let Some(token) = optional_string(server.get("token")) {
        config.server.token = Some(token);
    }
    if let Some(topic) = optional_string(server.get("topic")) {
        config.server.topic = Some(topic);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_json() -> Value {
        json!({
            "deviceId": "d1",
            "wifi": { "ssid": "net" },
            "server": { "url": "http://h" }
        })
    }

    #[test]
    fn test_rejects_non_objects() {
        assert_eq!(validate(&Value::Null), Err(ConfigError::InvalidPayload));
        assert_eq!(validate(&json!("text")), Err(ConfigError::InvalidPayload));
        assert_eq!(validate(&json!(42)), Err(ConfigError::InvalidPayload));
        assert_eq!(validate(&json!(true)), Err(ConfigError::InvalidPayload));
    }

    #[test]
    fn test_missing_required_fields() {
        for candidate in [
            json!({}),
            json!([]),
            json!({ "deviceId": "d1" }),
            json!({ "deviceId": "d1", "wifi": { "ssid": "net" } }),
            json!({ "deviceId": "", "wifi": { "ssid": "net" }, "server": { "url": "u" } }),
            json!({ "deviceId": "d1", "wifi": { "ssid": "" }, "server": { "url": "u" } }),
            json!({ "deviceId": "d1", "wifi": "net", "server": { "url": "u" } }),
            json!({ "deviceId": 0, "wifi": { "ssid": "net" }, "server": { "url": "u" } }),
        ] {
            assert_eq!(
                validate(&candidate),
                Err(ConfigError::MissingRequiredFields),
                "{candidate}"
            );
        }
    }

    #[test]
    fn test_applies_defaults() {
        let cfg = validate(&minimal_json()).unwrap();
        assert_eq!(cfg.version.as_deref(), Some("1.0"));
        assert_eq!(cfg.publish_interval, Some(60));
        assert_eq!(cfg.wifi.password, None);
        assert_eq!(cfg.server.port, None);
        assert_eq!(cfg.server.tls, Some(false));
        assert_eq!(cfg.server.token, None);
        assert_eq!(cfg.server.topic, None);
    }

    #[test]
    fn test_coerces_types() {
        let cfg = validate(&json!({
            "version": 2,
            "deviceId": 1001,
            "publishInterval": "30",
            "wifi": { "ssid": "net", "password": 1234 },
            "server": { "url": "mqtt://b", "port": "1883", "tls": "yes", "token": "t", "topic": "" }
        }))
        .unwrap();
        assert_eq!(cfg.version.as_deref(), Some("2"));
        assert_eq!(cfg.device_id, "1001");
        assert_eq!(cfg.publish_interval, Some(30));
        assert_eq!(cfg.wifi.password.as_deref(), Some("1234"));
        assert_eq!(cfg.server.port, Some(1883));
        assert_eq!(cfg.server.tls, Some(true));
        assert_eq!(cfg.server.token.as_deref(), Some("t"));
        assert_eq!(cfg.server.topic, None);
    }

    #[test]
    fn test_unusable_numbers_fall_back() {
        let cfg = validate(&json!({
            "deviceId": "d1",
            "publishInterval": "soon",
            "wifi": { "ssid": "net" },
            "server": { "url": "u", "port": 70000, "tls": 0 }
        }))
        .unwrap();
        assert_eq!(cfg.publish_interval, Some(60));
        assert_eq!(cfg.server.port, None);
        assert_eq!(cfg.server.tls, Some(false));
    }

    #[test]
    fn test_does_not_mutate_input() {
        let input = minimal_json();
        let before = input.clone();
        let _ = validate(&input);
        assert_eq!(input, before);
    }

    #[test]
    fn test_truthiness() {
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(!truthy(&json!(null)));
        assert!(truthy(&json!("0")));
        assert!(truthy(&json!({})));
        assert!(truthy(&json!(-1.5)));
    }

    #[test]
    fn test_string_coercion() {
        assert_eq!(coerce_string(&json!(3.0)), "3");
        assert_eq!(coerce_string(&json!(3.5)), "3.5");
        assert_eq!(coerce_string(&json!(false)), "false");
        assert_eq!(coerce_string(&json!([1, null, "a"])), "1,,a");
        assert_eq!(coerce_string(&json!({ "a": 1 })), "[object Object]");
    }

    #[test]
    fn test_large_numbers_keep_their_digits() {
        assert_eq!(coerce_string(&json!(1e20)), "100000000000000000000");
        assert_eq!(coerce_string(&json!(-1e20)), "-100000000000000000000");
        assert_eq!(coerce_string(&json!(1.2345678901234568e20)), "123456789012345680000");
        assert_eq!(coerce_string(&json!(1.5e21)), "1.5e+21");
        assert_eq!(coerce_string(&json!(-0.0)), "0");

        let cfg = validate(&json!({
            "deviceId": 1e20,
            "wifi": { "ssid": "n" },
            "server": { "url": "u" }
        }))
        .unwrap();
        assert_eq!(cfg.device_id, "100000000000000000000");
    }

    #[test]
    fn test_fractional_interval_is_dropped() {
        let cfg = validate(&json!({
            "deviceId": "d1",
            "publishInterval": 30.5,
            "wifi": { "ssid": "n" },
            "server": { "url": "u", "port": 80.5 }
        }))
        .unwrap();
        assert_eq!(cfg.publish_interval, Some(60));
        assert_eq!(cfg.server.port, None);
    }

    #[test]
    fn test_lenient_overlays_form_defaults() {
        let cfg = lenient(&json!({ "deviceId": "d1", "server": { "tls": true } }));
        assert_eq!(cfg.device_id, "d1");
        assert_eq!(cfg.wifi.ssid, "");
        assert_eq!(cfg.server.port, Some(443));
        assert_eq!(cfg.server.tls, Some(true));
        assert_eq!(cfg.publish_interval, Some(60));

        let cfg = lenient(&Value::Null);
        assert_eq!(cfg.server.tls, Some(false));
    }
}
