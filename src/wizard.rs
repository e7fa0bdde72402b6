// src/wizard.rs
//! What the wizard UI asks of the service, and how reader events are shown
//! to it.

use log::{info, warn};
use serde_json::Value;

use crate::codec;
use crate::error::{CodecError, ConfigError};
use crate::platform::{NfcCapability, NfcEvent};
use crate::scan;
use crate::schema::DeviceConfig;
use crate::types::{IncomingMessage, OutgoingMessage};
use crate::validator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub payload: String,
    /// Whether the form holds a minimal configuration.
    pub complete: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Live payload preview for in-progress form state. An incomplete form is
/// previewed on top of the form defaults.
pub fn preview(form: &Value) -> Result<Preview, CodecError> {
    match validator::validate(form) {
        Ok(config) => Ok(Preview {
            payload: codec::serialize_config(&config)?,
            complete: true,
        }),
        Err(_) => Ok(Preview {
            payload: codec::serialize_config(&validator::lenient(form))?,
            complete: false,
        }),
    }
}

/// Validates submitted form state and returns the text to write to the tag.
pub fn prepare_write(form: &Value) -> Result<String, WriteError> {
    let config = validator::validate(form)?;
    Ok(codec::serialize_config(&config)?)
}

/// Replies for the client that sent `msg`. Outcomes reported later by the
/// reader arrive as broadcast events instead.
pub fn handle_request(msg: IncomingMessage, nfc: &dyn NfcCapability) -> Vec<OutgoingMessage> {
    match msg {
        IncomingMessage::GET_READER_STATUS => match nfc.check_reader() {
            Ok(()) => Vec::new(),
            Err(err) => vec![
                OutgoingMessage::READER_STATUS { success: false },
                OutgoingMessage::READER_ERROR {
                    error: err.to_string(),
                },
            ],
        },
        IncomingMessage::START_SCAN => match nfc.start_scan() {
            Ok(()) => vec![OutgoingMessage::SCAN_STATUS { scanning: true }],
            Err(err) => vec![
                OutgoingMessage::SCAN_STATUS { scanning: false },
                OutgoingMessage::READER_ERROR {
                    error: format!("Unable to start NFC scan: {}", err),
                },
            ],
        },
        IncomingMessage::STOP_SCAN => {
            let mut replies = vec![OutgoingMessage::SCAN_STATUS { scanning: false }];
            if let Err(err) = nfc.stop_scan() {
                replies.push(OutgoingMessage::READER_ERROR {
                    error: err.to_string(),
                });
            }
            replies
        }
        IncomingMessage::GET_FORM_DEFAULTS => vec![OutgoingMessage::FORM_DEFAULTS {
            config: DeviceConfig::form_defaults(),
        }],
        IncomingMessage::PREVIEW { form } => match preview(&form) {
            Ok(p) => vec![OutgoingMessage::PREVIEW {
                payload: p.payload,
                complete: p.complete,
            }],
            Err(err) => vec![OutgoingMessage::DATA_WRITE_ERROR {
                error: err.to_string(),
                payload: None,
            }],
        },
        IncomingMessage::WRITE_CONFIG { config } => handle_write(&config, nfc),
    }
}

fn handle_write(form: &Value, nfc: &dyn NfcCapability) -> Vec<OutgoingMessage> {
    let payload = match prepare_write(form) {
        Ok(payload) => payload,
        Err(err) => {
            return vec![OutgoingMessage::DATA_WRITE_ERROR {
                error: err.to_string(),
                payload: None,
            }];
        }
    };

    if !nfc.is_available() {
        return vec![OutgoingMessage::DATA_WRITE_ERROR {
            error: "NFC is not available. Copy the JSON payload to configure the device another way."
                .into(),
            payload: Some(payload),
        }];
    }

    info!("Requesting tag write ({} bytes)", payload.len());
    match nfc.write(payload.clone()) {
        Ok(()) => Vec::new(),
        Err(err) => {
            warn!("Write request rejected: {}", err);
            vec![OutgoingMessage::DATA_WRITE_ERROR {
                error: err.to_string(),
                payload: Some(payload),
            }]
        }
    }
}

/// Message broadcast to every client for a reader event.
pub fn event_message(event: NfcEvent) -> OutgoingMessage {
    match event {
        NfcEvent::ReaderStatus { connected } => OutgoingMessage::READER_STATUS { success: connected },
        NfcEvent::CardPresent => OutgoingMessage::CARD_STATUS {
            success: true,
            message: "Card detected!".into(),
        },
        NfcEvent::CardRemoved => OutgoingMessage::CARD_STATUS {
            success: false,
            message: "Card removed!".into(),
        },
        NfcEvent::TagRead {
            serial_number,
            records,
        } => {
            let result = scan::assemble(serial_number, &records);
            let message = result.outcome().message().to_string();
            OutgoingMessage::SCAN_RESULT { result, message }
        }
        NfcEvent::ReadFailed { error } => OutgoingMessage::DATA_READ_ERROR {
            error: format!("Failed to read tag, try again: {}", error),
        },
        NfcEvent::WritePending => OutgoingMessage::DATA_WRITE_PENDING {
            message: "Hold the tag against the reader to write.".into(),
        },
        NfcEvent::WriteCompleted => OutgoingMessage::DATA_WRITE_SUCCESS {
            message: "Configuration written to tag.".into(),
        },
        NfcEvent::WriteFailed { error } => OutgoingMessage::DATA_WRITE_ERROR {
            error: format!("Failed to write tag: {}", error),
            payload: None,
        },
        NfcEvent::ReaderError { error } => OutgoingMessage::READER_ERROR {
            error: error.to_string(),
        },
    }
}
