// src/nfc_service.rs
use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info};
use pcsc::{Card, Context, PNP_NOTIFICATION, Protocols, ReaderState, ShareMode, State};
use std::ffi::{CStr, CString};
use std::time::Duration;

use crate::error::{NdefError, NfcError};
use crate::platform::NfcEvent;
use crate::types::{CARD_TYPE_MIFARE_1K, CARD_TYPE_NTAG, NfcCommand, NfcRecord};
use crate::{apdu, cards, ndef};

pub struct ServiceOptions {
    pub poll_interval: Duration,
    pub text_lang: String,
}

/// Reader thread state between status changes.
#[derive(Debug, Default)]
struct Session {
    scanning: bool,
    /// TLV-framed payload waiting for the next tag.
    pending_write: Option<Vec<u8>>,
}

/// What a newly inserted tag is used for.
#[derive(Debug, PartialEq)]
enum TagAction {
    Ignore,
    Write(Vec<u8>),
    Read,
}

impl Session {
    /// Drops a pending write in favour of a newer one. The dropped write
    /// resolves here.
    fn supersede_pending(&mut self) -> Option<NfcEvent> {
        self.pending_write.take().map(|_| NfcEvent::WriteFailed {
            error: NfcError::Superseded,
        })
    }

    fn park_write(&mut self, tlv_data: Vec<u8>) -> NfcEvent {
        self.pending_write = Some(tlv_data);
        NfcEvent::WritePending
    }

    /// A pending write takes the tag ahead of a scan read.
    fn claim_tag(&mut self) -> TagAction {
        match self.pending_write.take() {
            Some(tlv_data) => TagAction::Write(tlv_data),
            None if self.scanning => TagAction::Read,
            None => TagAction::Ignore,
        }
    }

    /// The tag could not be reached. A write goes back to waiting for the
    /// next tag; a read is reported as failed.
    fn connect_failed(&mut self, action: TagAction, error: NfcError) -> Option<NfcEvent> {
        match action {
            TagAction::Write(tlv_data) => {
                // A newer write may have been queued meanwhile; it wins
                if self.pending_write.is_none() {
                    self.pending_write = Some(tlv_data);
                }
                None
            }
            TagAction::Read => Some(NfcEvent::ReadFailed { error }),
            TagAction::Ignore => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CardFamily {
    MifareClassic,
    /// NTAG/Ultralight and anything else addressed in 4-byte pages.
    Type2,
}

impl CardFamily {
    fn from_atr_suffix(suffix: &str) -> Self {
        match suffix {
            CARD_TYPE_MIFARE_1K => CardFamily::MifareClassic,
            CARD_TYPE_NTAG => CardFamily::Type2,
            other => {
                debug!("Unrecognised ATR suffix {:?}, treating as page-addressed tag", other);
                CardFamily::Type2
            }
        }
    }
}

pub fn run(ctx: Context, options: ServiceOptions, tx: Sender<NfcEvent>, rx: Receiver<NfcCommand>) {
    info!("Starting NFC Service (Event Driven)...");

    let mut readers_buf = [0; 2048];
    let mut reader_names: Vec<CString> = Vec::new();
    let mut session = Session::default();

    let mut reader_states = vec![ReaderState::new(PNP_NOTIFICATION(), State::UNAWARE)];
    let mut last_error: Option<pcsc::Error> = None;

    loop {
        // 1. Wait for State Change
        match ctx.get_status_change(options.poll_interval, &mut reader_states) {
            Ok(()) | Err(pcsc::Error::Timeout) => last_error = None,
            Err(err) => {
                error!("PCSC Error: {}", err);
                // Report each distinct failure once
                if last_error != Some(err) {
                    let _ = tx.send(NfcEvent::ReaderError { error: err.into() });
                    last_error = Some(err);
                }
                std::thread::sleep(Duration::from_secs(1));
                continue;
            }
        }

        // 2. CHECK FOR COMMANDS
        loop {
            match rx.try_recv() {
                Ok(cmd) => handle_command(&ctx, cmd, &reader_names, &mut session, &options, &tx),
                Err(crossbeam_channel::TryRecvError::Empty) => break,
                Err(crossbeam_channel::TryRecvError::Disconnected) => {
                    info!("Command channel closed, stopping NFC Service");
                    return;
                }
            }
        }

        // 3. PROCESS EVENTS
        let mut readers_changed = false;

        // Check PnP (Index 0)
        if reader_states[0].event_state().intersects(State::CHANGED) {
            info!("Hardware change detected");
            readers_changed = true;
            reader_states[0].sync_current_state();
        }

        // Check Readers (Indices 1..)
        for i in 1..reader_states.len() {
            let Some(name) = reader_names.get(i - 1).cloned() else {
                continue;
            };
            let rs = &reader_states[i];

            if rs.event_state().intersects(State::CHANGED) {
                let current = rs.event_state();

                if current.intersects(State::PRESENT)
                    && !rs.current_state().intersects(State::PRESENT)
                {
                    info!("Card Inserted on {:?}", name);
                    handle_card_insertion(&ctx, &name, &mut session, &tx);
                }

                if current.intersects(State::EMPTY) && rs.current_state().intersects(State::PRESENT)
                {
                    info!("Card Removed from {:?}", name);
                    let _ = tx.send(NfcEvent::CardRemoved);
                }

                reader_states[i].sync_current_state();
            }
        }

        // 4. REFRESH LIST
        if readers_changed {
            reader_names = list_readers(&ctx, &mut readers_buf);
            // Keep the PnP state (index 0), rebuild the rest
            reader_states.truncate(1);
            for name in &reader_names {
                reader_states.push(ReaderState::new(name.clone(), State::UNAWARE));
            }
            let _ = tx.send(NfcEvent::ReaderStatus {
                connected: !reader_names.is_empty(),
            });
        }
    }
}

fn list_readers(ctx: &Context, readers_buf: &mut [u8]) -> Vec<CString> {
    match ctx.list_readers(readers_buf) {
        Ok(iter) => iter.map(CString::from).collect(),
        Err(err) => {
            debug!("No readers listed: {}", err);
            Vec::new()
        }
    }
}

fn handle_command(
    ctx: &Context,
    cmd: NfcCommand,
    reader_names: &[CString],
    session: &mut Session,
    options: &ServiceOptions,
    tx: &Sender<NfcEvent>,
) {
    match cmd {
        NfcCommand::StartScan => {
            info!("Scan started");
            session.scanning = true;
        }
        NfcCommand::StopScan => {
            info!("Scan stopped");
            session.scanning = false;
        }
        NfcCommand::Write { payload } => {
            info!("Received write command ({} bytes)", payload.len());
            let tlv_data = ndef::wrap_in_tlv(&ndef::encode_text_message(&payload, &options.text_lang));
            if let Some(event) = session.supersede_pending() {
                let _ = tx.send(event);
            }
            handle_write_command(ctx, reader_names, tlv_data, session, tx);
        }
        NfcCommand::CheckReaderStatus => {
            let mut readers_buf = [0; 2048];
            let names = list_readers(ctx, &mut readers_buf);
            let _ = tx.send(NfcEvent::ReaderStatus {
                connected: !names.is_empty(),
            });
        }
    }
}

fn card_family(card: &Card) -> Option<CardFamily> {
    let mut names_buf = [0u8; 128];
    let mut atr_buf = [0u8; 64];
    let status = card.status2(&mut names_buf, &mut atr_buf).ok()?;
    status
        .atr()
        .last()
        .map(|last| CardFamily::from_atr_suffix(&format!("{:x}", last)))
}

fn read_tag(card: &Card) -> Result<(Option<String>, Vec<NfcRecord>), NfcError> {
    let serial_number = apdu::get_uid(card)
        .ok()
        .map(|uid| apdu::format_serial(&uid));

    let raw = match card_family(card) {
        Some(CardFamily::MifareClassic) => cards::read_mifare(card)?,
        Some(CardFamily::Type2) | None => cards::read_ntag(card)?,
    };

    let records = match ndef::records_from_tag_data(&raw) {
        Ok(records) => records,
        // Blank or unformatted tag: a read with nothing on it
        Err(NdefError::NoNdefTlv) | Err(NdefError::EmptyMessage) => Vec::new(),
        Err(err) => return Err(err.into()),
    };
    Ok((serial_number, records))
}

fn write_tag(card: &Card, tlv_data: &[u8]) -> Result<(), NfcError> {
    match card_family(card) {
        Some(CardFamily::MifareClassic) => cards::write_mifare(card, tlv_data),
        Some(CardFamily::Type2) => cards::write_ntag(card, tlv_data),
        None => Err(NfcError::Card("Unknown card type".into())),
    }
}

fn report_write(result: Result<(), NfcError>, tx: &Sender<NfcEvent>) {
    let event = match result {
        Ok(()) => NfcEvent::WriteCompleted,
        Err(error) => NfcEvent::WriteFailed { error },
    };
    let _ = tx.send(event);
}

fn handle_card_insertion(ctx: &Context, reader_name: &CStr, session: &mut Session, tx: &Sender<NfcEvent>) {
    let _ = tx.send(NfcEvent::CardPresent);

    let action = session.claim_tag();
    if action == TagAction::Ignore {
        return;
    }

    let card = match ctx.connect(reader_name, ShareMode::Shared, Protocols::ANY) {
        Ok(card) => card,
        Err(e) => {
            error!("Failed to connect to card: {}", e);
            if let Some(event) = session.connect_failed(action, e.into()) {
                let _ = tx.send(event);
            }
            return;
        }
    };

    match action {
        TagAction::Write(tlv_data) => report_write(write_tag(&card, &tlv_data), tx),
        TagAction::Read => {
            let event = match read_tag(&card) {
                Ok((serial_number, records)) => NfcEvent::TagRead {
                    serial_number,
                    records,
                },
                Err(error) => NfcEvent::ReadFailed { error },
            };
            let _ = tx.send(event);
        }
        TagAction::Ignore => {}
    }
}

fn handle_write_command(
    ctx: &Context,
    reader_names: &[CString],
    tlv_data: Vec<u8>,
    session: &mut Session,
    tx: &Sender<NfcEvent>,
) {
    if reader_names.is_empty() {
        let _ = tx.send(NfcEvent::WriteFailed {
            error: NfcError::NoReader,
        });
        return;
    }

    for name in reader_names {
        if let Ok(card) = ctx.connect(name, ShareMode::Shared, Protocols::ANY) {
            report_write(write_tag(&card, &tlv_data), tx);
            return;
        }
    }

    // No tag on any reader yet: wait for the next one
    let _ = tx.send(session.park_write(tlv_data));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newer_write_supersedes_pending() {
        let mut session = Session::default();
        assert_eq!(session.supersede_pending(), None);
        assert_eq!(session.park_write(vec![1]), NfcEvent::WritePending);

        assert_eq!(
            session.supersede_pending(),
            Some(NfcEvent::WriteFailed {
                error: NfcError::Superseded
            })
        );
        // Resolved once only
        assert_eq!(session.supersede_pending(), None);

        session.park_write(vec![2]);
        assert_eq!(session.claim_tag(), TagAction::Write(vec![2]));
    }

    #[test]
    fn test_pending_write_takes_tag_before_scan() {
        let mut session = Session {
            scanning: true,
            ..Session::default()
        };
        session.park_write(vec![0x03, 0x00, 0xFE]);

        assert_eq!(session.claim_tag(), TagAction::Write(vec![0x03, 0x00, 0xFE]));
        // The write is spent; the next tag is read
        assert_eq!(session.claim_tag(), TagAction::Read);
    }

    #[test]
    fn test_idle_session_ignores_tags() {
        let mut session = Session::default();
        assert_eq!(session.claim_tag(), TagAction::Ignore);
    }

    #[test]
    fn test_connect_failure_during_scan_is_reported() {
        let mut session = Session {
            scanning: true,
            ..Session::default()
        };
        let action = session.claim_tag();
        assert_eq!(
            session.connect_failed(action, pcsc::Error::RemovedCard.into()),
            Some(NfcEvent::ReadFailed {
                error: NfcError::from(pcsc::Error::RemovedCard)
            })
        );
    }

    #[test]
    fn test_connect_failure_requeues_write() {
        let mut session = Session {
            scanning: true,
            ..Session::default()
        };
        session.park_write(vec![9]);
        let action = session.claim_tag();

        assert_eq!(session.connect_failed(action, NfcError::NoCard), None);
        assert_eq!(session.claim_tag(), TagAction::Write(vec![9]));
    }

    #[test]
    fn test_card_family_from_atr() {
        assert_eq!(CardFamily::from_atr_suffix("6a"), CardFamily::MifareClassic);
        assert_eq!(CardFamily::from_atr_suffix("68"), CardFamily::Type2);
        assert_eq!(CardFamily::from_atr_suffix("ff"), CardFamily::Type2);
    }
}
