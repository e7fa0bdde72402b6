// src/scan.rs
use log::debug;
use serde::Serialize;

use crate::codec;
use crate::schema::DeviceConfig;
use crate::types::NfcRecord;
use crate::validator;

/// What one tag read produced.
///
/// `raw_payload` is kept even when it did not validate, so the UI can show the
/// user what was on the tag.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_payload: Option<String>,
    pub config: Option<DeviceConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// No text or JSON record on the tag.
    NoPayload,
    /// A payload was read but is not a usable configuration.
    Unrecognized,
    Configured,
}

impl ScanOutcome {
    pub fn message(self) -> &'static str {
        match self {
            ScanOutcome::NoPayload => "Tag read, but it holds no configuration. Fill in a new one.",
            ScanOutcome::Unrecognized => {
                "Tag read, but its payload is not a valid configuration. Fill in a new one."
            }
            ScanOutcome::Configured => "Configuration detected on tag.",
        }
    }
}

impl ScanResult {
    pub fn outcome(&self) -> ScanOutcome {
        match (&self.raw_payload, &self.config) {
            (_, Some(_)) => ScanOutcome::Configured,
            (Some(_), None) => ScanOutcome::Unrecognized,
            (None, None) => ScanOutcome::NoPayload,
        }
    }
}

/// Builds the result for one tag. Unreadable or incomplete payloads end up
/// as `config: None`; this never fails.
pub fn assemble(serial_number: Option<String>, records: &[NfcRecord]) -> ScanResult {
    let raw_payload = codec::extract_json_string(records);
    let config = raw_payload.as_deref().and_then(|raw| {
        let parsed = match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(value) => value,
            Err(err) => {
                debug!("Tag payload is not JSON: {}", err);
                return None;
            }
        };
        validator::validate(&parsed)
            .map_err(|err| debug!("Tag payload rejected: {}", err))
            .ok()
    });

    ScanResult {
        serial_number,
        raw_payload,
        config,
    }
}
