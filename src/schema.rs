// src/schema.rs
//! Device configuration carried on the tag.
//!
//! Optional fields stay `None` until the codec writes them out; the
//! serializer materializes every default so the tag payload is explicit.

use serde::{Deserialize, Serialize};

pub const DEFAULT_VERSION: &str = "1.0";
pub const DEFAULT_PUBLISH_INTERVAL: u32 = 60;

/// Port and TLS preset offered by a fresh wizard form.
pub const FORM_DEFAULT_PORT: u16 = 443;
pub const FORM_DEFAULT_TLS: bool = true;

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct WifiConfig {
    pub ssid: String,
    /// `None` means an open network.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ServerConfig {
    /// URL or host, e.g. `https://api.server.com` or `mqtt://broker.local`.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Publish destination, e.g. `devices/esp32-001/telemetry`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub device_id: String,
    /// Seconds between publishes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_interval: Option<u32>,
    pub wifi: WifiConfig,
    pub server: ServerConfig,
}

impl DeviceConfig {
    /// The values a new wizard form starts from.
    pub fn form_defaults() -> Self {
        Self {
            version: Some(DEFAULT_VERSION.to_string()),
            device_id: String::new(),
            publish_interval: Some(DEFAULT_PUBLISH_INTERVAL),
            wifi: WifiConfig {
                ssid: String::new(),
                password: Some(String::new()),
            },
            server: ServerConfig {
                url: String::new(),
                port: Some(FORM_DEFAULT_PORT),
                tls: Some(FORM_DEFAULT_TLS),
                token: Some(String::new()),
                topic: Some(String::new()),
            },
        }
    }

    pub fn is_minimally_valid(&self) -> bool {
        !self.device_id.is_empty() && !self.wifi.ssid.is_empty() && !self.server.url.is_empty()
    }

    pub fn version_or_default(&self) -> &str {
        self.version.as_deref().unwrap_or(DEFAULT_VERSION)
    }

    pub fn publish_interval_or_default(&self) -> u32 {
        self.publish_interval.unwrap_or(DEFAULT_PUBLISH_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> DeviceConfig {
        DeviceConfig {
            device_id: "d1".into(),
            wifi: WifiConfig {
                ssid: "net".into(),
                password: None,
            },
            server: ServerConfig {
                url: "http://h".into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_minimal_validity() {
        assert!(minimal().is_minimally_valid());

        let mut cfg = minimal();
        cfg.server.url.clear();
        assert!(!cfg.is_minimally_valid());

        assert!(!DeviceConfig::form_defaults().is_minimally_valid());
    }

    #[test]
    fn test_defaults_when_absent() {
        let cfg = minimal();
        assert_eq!(cfg.version_or_default(), "1.0");
        assert_eq!(cfg.publish_interval_or_default(), 60);
    }

    #[test]
    fn test_camel_case_fields() {
        let json = serde_json::to_value(minimal()).unwrap();
        assert_eq!(json["deviceId"], "d1");
        assert!(json.get("publishInterval").is_none());
        assert!(json["wifi"].get("password").is_none());
    }
}
