// src/settings.rs
//! Service settings, read once from the environment.
//!
//! | Variable                 | Default     |
//! |--------------------------|-------------|
//! | `NFC_WIZARD_HOST`        | `127.0.0.1` |
//! | `NFC_WIZARD_PORT`        | `3500`      |
//! | `NFC_WIZARD_POLL_MS`     | `500`       |
//! | `NFC_WIZARD_LANG`        | `en`        |
//! | `NFC_WIZARD_DISABLE_NFC` | `false`     |

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use lazy_static::lazy_static;
use log::warn;

lazy_static! {
    pub static ref SETTINGS: Settings = Settings::from_env();
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub host: IpAddr,
    pub port: u16,
    /// How long the reader thread blocks waiting for a status change.
    pub poll_interval: Duration,
    /// Language code stamped on written Text records.
    pub text_lang: String,
    pub nfc_disabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3500,
            poll_interval: Duration::from_millis(500),
            text_lang: "en".to_string(),
            nfc_disabled: false,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        let text_lang = match lookup("NFC_WIZARD_LANG") {
            Some(lang) if !lang.is_empty() && lang.len() <= 0x3F && lang.is_ascii() => lang,
            Some(lang) => {
                warn!("Ignoring NFC_WIZARD_LANG={:?}, using {}", lang, defaults.text_lang);
                defaults.text_lang
            }
            None => defaults.text_lang,
        };

        Self {
            host: parse_or(&lookup, "NFC_WIZARD_HOST", defaults.host),
            port: parse_or(&lookup, "NFC_WIZARD_PORT", defaults.port),
            poll_interval: Duration::from_millis(parse_or(
                &lookup,
                "NFC_WIZARD_POLL_MS",
                defaults.poll_interval.as_millis() as u64,
            )),
            text_lang,
            nfc_disabled: parse_or(&lookup, "NFC_WIZARD_DISABLE_NFC", defaults.nfc_disabled),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + std::fmt::Debug,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Invalid value {:?} for {}, using {:?}", raw, key, default);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[]));
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.bind_addr().to_string(), "127.0.0.1:3500");
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            ("NFC_WIZARD_HOST", "0.0.0.0"),
            ("NFC_WIZARD_PORT", "8080"),
            ("NFC_WIZARD_POLL_MS", "250"),
            ("NFC_WIZARD_LANG", "id"),
            ("NFC_WIZARD_DISABLE_NFC", "true"),
        ]));
        assert_eq!(settings.bind_addr().to_string(), "0.0.0.0:8080");
        assert_eq!(settings.poll_interval, Duration::from_millis(250));
        assert_eq!(settings.text_lang, "id");
        assert!(settings.nfc_disabled);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let settings = Settings::from_lookup(lookup(&[
            ("NFC_WIZARD_PORT", "not-a-port"),
            ("NFC_WIZARD_DISABLE_NFC", "maybe"),
            ("NFC_WIZARD_LANG", ""),
        ]));
        assert_eq!(settings, Settings::default());
    }
}
