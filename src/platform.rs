// src/platform.rs
//! The NFC capability the wizard depends on.
//!
//! The session only ever talks to `dyn NfcCapability`. On hosts without a
//! PC/SC stack (or with NFC disabled) `UnavailableNfc` stands in and every
//! request reports `NfcError::Unavailable`.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{info, warn};
use pcsc::{Context, Scope};

use crate::error::NfcError;
use crate::nfc_service;
use crate::settings::Settings;
use crate::types::{NfcCommand, NfcRecord};

/// Everything the reader side reports, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum NfcEvent {
    ReaderStatus { connected: bool },
    CardPresent,
    CardRemoved,
    TagRead {
        serial_number: Option<String>,
        records: Vec<NfcRecord>,
    },
    ReadFailed { error: NfcError },
    /// A write is waiting for the next tag.
    WritePending,
    WriteCompleted,
    WriteFailed { error: NfcError },
    ReaderError { error: NfcError },
}

/// Stream of reader events. Dropping the capability ends it.
pub type EventStream = Receiver<NfcEvent>;

pub trait NfcCapability: Send + Sync {
    fn is_available(&self) -> bool;

    /// Tag reads are reported as `NfcEvent::TagRead` until `stop_scan`.
    fn start_scan(&self) -> Result<(), NfcError>;

    fn stop_scan(&self) -> Result<(), NfcError>;

    /// Writes `payload` as a single Text record to the next tag touched.
    /// The outcome arrives once, as `WriteCompleted` or `WriteFailed`.
    fn write(&self, payload: String) -> Result<(), NfcError>;

    /// Answers with `NfcEvent::ReaderStatus`.
    fn check_reader(&self) -> Result<(), NfcError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableNfc;

impl NfcCapability for UnavailableNfc {
    fn is_available(&self) -> bool {
        false
    }

    fn start_scan(&self) -> Result<(), NfcError> {
        Err(NfcError::Unavailable)
    }

    fn stop_scan(&self) -> Result<(), NfcError> {
        Err(NfcError::Unavailable)
    }

    fn write(&self, _payload: String) -> Result<(), NfcError> {
        Err(NfcError::Unavailable)
    }

    fn check_reader(&self) -> Result<(), NfcError> {
        Err(NfcError::Unavailable)
    }
}

/// Handle to the blocking PC/SC reader thread.
pub struct PcscNfc {
    commands: Sender<NfcCommand>,
}

impl PcscNfc {
    pub fn spawn(ctx: Context, settings: &Settings) -> (Self, EventStream) {
        // Crossbeam (Sync) on both sides because the NFC thread is blocking
        let (cmd_tx, cmd_rx) = unbounded::<NfcCommand>();
        let (event_tx, event_rx) = unbounded::<NfcEvent>();
        let options = nfc_service::ServiceOptions {
            poll_interval: settings.poll_interval,
            text_lang: settings.text_lang.clone(),
        };

        std::thread::spawn(move || {
            nfc_service::run(ctx, options, event_tx, cmd_rx);
        });

        (Self { commands: cmd_tx }, event_rx)
    }

    fn send(&self, cmd: NfcCommand) -> Result<(), NfcError> {
        self.commands.send(cmd).map_err(|_| NfcError::Disconnected)
    }
}

impl NfcCapability for PcscNfc {
    fn is_available(&self) -> bool {
        true
    }

    fn start_scan(&self) -> Result<(), NfcError> {
        self.send(NfcCommand::StartScan)
    }

    fn stop_scan(&self) -> Result<(), NfcError> {
        self.send(NfcCommand::StopScan)
    }

    fn write(&self, payload: String) -> Result<(), NfcError> {
        self.send(NfcCommand::Write { payload })
    }

    fn check_reader(&self) -> Result<(), NfcError> {
        self.send(NfcCommand::CheckReaderStatus)
    }
}

/// A capability that never produces events.
pub fn unavailable() -> (Arc<dyn NfcCapability>, EventStream) {
    let (_tx, rx) = unbounded::<NfcEvent>();
    (Arc::new(UnavailableNfc), rx)
}

/// Picks the PC/SC reader when the host has one, the unavailable stand-in
/// otherwise.
pub fn probe(settings: &Settings) -> (Arc<dyn NfcCapability>, EventStream) {
    if settings.nfc_disabled {
        info!("NFC disabled by configuration");
        return unavailable();
    }

    match Context::establish(Scope::User) {
        Ok(ctx) => {
            info!("PC/SC context established");
            let (nfc, events) = PcscNfc::spawn(ctx, settings);
            (Arc::new(nfc), events)
        }
        Err(err) => {
            warn!("NFC not available: {}", err);
            unavailable()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_rejects_everything() {
        let (nfc, events) = unavailable();
        assert!(!nfc.is_available());
        assert_eq!(nfc.start_scan(), Err(NfcError::Unavailable));
        assert_eq!(nfc.stop_scan(), Err(NfcError::Unavailable));
        assert_eq!(nfc.write("{}".into()), Err(NfcError::Unavailable));
        assert_eq!(nfc.check_reader(), Err(NfcError::Unavailable));
        // The stream is already closed
        assert!(events.recv().is_err());
    }

    #[test]
    fn test_disable_flag_gives_unavailable_nfc() {
        let settings = Settings {
            nfc_disabled: true,
            ..Settings::default()
        };
        let (nfc, _events) = probe(&settings);
        assert!(!nfc.is_available());
    }

    #[test]
    fn test_pcsc_handle_forwards_commands() {
        let (tx, rx) = unbounded();
        let nfc = PcscNfc { commands: tx };
        nfc.start_scan().unwrap();
        nfc.write("{}".into()).unwrap();
        assert_eq!(rx.recv().unwrap(), NfcCommand::StartScan);
        assert_eq!(
            rx.recv().unwrap(),
            NfcCommand::Write {
                payload: "{}".into()
            }
        );

        drop(rx);
        assert_eq!(nfc.stop_scan(), Err(NfcError::Disconnected));
    }
}
