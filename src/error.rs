// src/error.rs
use thiserror::Error;

/// Why a candidate value could not become a `DeviceConfig`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The decoded value is not a structured object.
    #[error("payload is not a valid configuration object")]
    InvalidPayload,

    /// deviceId, wifi.ssid and server.url are jointly required.
    #[error("a minimal configuration must contain deviceId, wifi.ssid and server.url")]
    MissingRequiredFields,
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors raised while walking raw tag memory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NdefError {
    #[error("no NDEF TLV found")]
    NoNdefTlv,
    #[error("NDEF message is empty")]
    EmptyMessage,
    #[error("truncated data: {0}")]
    Truncated(&'static str),
}

/// Platform level failures. These are advisory: they are shown to the user,
/// never treated as fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NfcError {
    #[error("NFC is not available on this host")]
    Unavailable,
    #[error("no reader connected")]
    NoReader,
    #[error("no card found on reader")]
    NoCard,
    #[error("reader error: {0}")]
    Reader(String),
    #[error("card error: {0}")]
    Card(String),
    #[error("replaced by a newer write request")]
    Superseded,
    #[error("NFC service stopped")]
    Disconnected,
}

impl From<pcsc::Error> for NfcError {
    fn from(err: pcsc::Error) -> Self {
        NfcError::Reader(err.to_string())
    }
}

impl From<NdefError> for NfcError {
    fn from(err: NdefError) -> Self {
        NfcError::Card(err.to_string())
    }
}
