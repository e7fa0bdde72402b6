// src/codec.rs
//! Payload codec: pulls the JSON text out of a tag's records and writes a
//! configuration back as canonical JSON.
//!
//! The canonical form is the on-tag contract. Key order is fixed by the field
//! order of the structs below and every optional field is written with its
//! default, so a reader never has to guess about absence.

use log::debug;
use serde::Serialize;

use crate::error::CodecError;
use crate::schema::DeviceConfig;
use crate::types::{NfcRecord, RecordData};

/// Returns the text of the first text or `application/json` record that
/// decodes cleanly. Records that fail to decode are skipped.
pub fn extract_json_string(records: &[NfcRecord]) -> Option<String> {
    records.iter().enumerate().find_map(|(index, rec)| {
        if !rec.is_text() && !rec.is_json() {
            return None;
        }
        match decode_data(&rec.data) {
            Ok(text) => text,
            Err(err) => {
                debug!("Skipping record {}: {}", index, err);
                None
            }
        }
    })
}

fn decode_data(data: &RecordData) -> Result<Option<String>, std::string::FromUtf8Error> {
    match data {
        RecordData::Text(s) => Ok(Some(s.clone())),
        RecordData::Buffer(bytes) => String::from_utf8(bytes.clone()).map(Some),
        RecordData::Empty => Ok(None),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CanonicalPayload<'a> {
    version: &'a str,
    device_id: &'a str,
    publish_interval: u32,
    wifi: CanonicalWifi<'a>,
    server: CanonicalServer<'a>,
}

#[derive(Serialize)]
struct CanonicalWifi<'a> {
    ssid: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct CanonicalServer<'a> {
    url: &'a str,
    port: Option<u16>,
    tls: bool,
    token: &'a str,
    topic: &'a str,
}

impl<'a> From<&'a DeviceConfig> for CanonicalPayload<'a> {
    fn from(config: &'a DeviceConfig) -> Self {
        Self {
            version: config.version_or_default(),
            device_id: &config.device_id,
            publish_interval: config.publish_interval_or_default(),
            wifi: CanonicalWifi {
                ssid: &config.wifi.ssid,
                password: config.wifi.password.as_deref().unwrap_or(""),
            },
            server: CanonicalServer {
                url: &config.server.url,
                port: config.server.port,
                tls: config.server.tls.unwrap_or(false),
                token: config.server.token.as_deref().unwrap_or(""),
                topic: config.server.topic.as_deref().unwrap_or(""),
            },
        }
    }
}

/// Compact canonical JSON ready to be written as a text record.
pub fn serialize_config(config: &DeviceConfig) -> Result<String, CodecError> {
    Ok(serde_json::to_string(&CanonicalPayload::from(config))?)
}
