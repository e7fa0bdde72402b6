// src/types.rs
#![allow(non_camel_case_types)]

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::scan::ScanResult;
use crate::schema::DeviceConfig;

// Messages sent TO the WebSocket client (Frontend)
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum OutgoingMessage {
    READER_STATUS { success: bool },
    SCAN_STATUS { scanning: bool },
    CARD_STATUS { success: bool, message: String },
    SCAN_RESULT { result: ScanResult, message: String },
    DATA_READ_ERROR { error: String },
    PREVIEW { payload: String, complete: bool },
    FORM_DEFAULTS { config: DeviceConfig },
    DATA_WRITE_PENDING { message: String },
    DATA_WRITE_SUCCESS { message: String },
    DATA_WRITE_ERROR {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<String>,
    },
    READER_ERROR { error: String },
}

// Messages received FROM the WebSocket client
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum IncomingMessage {
    GET_READER_STATUS,
    START_SCAN,
    STOP_SCAN,
    GET_FORM_DEFAULTS,
    // Form state is forwarded untyped; the validator decides what it means.
    PREVIEW {
        #[serde(default)]
        form: Value,
    },
    WRITE_CONFIG {
        #[serde(default)]
        config: Value,
    },
}

// Internal commands sent from the platform handle -> NFC Thread
#[derive(Debug, Clone, PartialEq)]
pub enum NfcCommand {
    StartScan,
    StopScan,
    Write { payload: String },
    CheckReaderStatus,
}

/// Raw record as laid out in tag memory.
#[derive(Debug, Clone, PartialEq)]
pub struct NdefRecord {
    pub tnf: u8, // Type Name Format (How to interpret the type)
    pub record_type: Vec<u8>,
    pub payload: Vec<u8>,
    pub id: Option<Vec<u8>>,
}

pub const RECORD_TYPE_TEXT: &str = "text";
pub const RECORD_TYPE_MIME: &str = "mime";
pub const MEDIA_TYPE_JSON: &str = "application/json";

/// A record as handed to the payload codec.
///
/// `record_type` follows the reader vocabulary ("text", "mime", "url",
/// "unknown", ...); `media_type` is only set for media records.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NfcRecord {
    #[serde(default)]
    pub record_type: Option<String>,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub data: RecordData,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(untagged)]
pub enum RecordData {
    Text(String),
    Buffer(Vec<u8>),
    #[default]
    Empty,
}

impl NfcRecord {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            record_type: Some(RECORD_TYPE_TEXT.to_string()),
            media_type: None,
            data: RecordData::Text(content.into()),
        }
    }

    pub fn mime(media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            record_type: Some(RECORD_TYPE_MIME.to_string()),
            media_type: Some(media_type.into()),
            data: RecordData::Buffer(bytes),
        }
    }

    pub fn is_text(&self) -> bool {
        self.record_type.as_deref() == Some(RECORD_TYPE_TEXT)
    }

    pub fn is_json(&self) -> bool {
        self.media_type.as_deref() == Some(MEDIA_TYPE_JSON)
    }
}

pub const CARD_TYPE_MIFARE_1K: &str = "6a"; // MIFARE Classic 1K
pub const CARD_TYPE_NTAG: &str = "68"; // NTAG215/Ultralight
