// src/ndef.rs
use std::str;

use crate::error::NdefError;
use crate::types::{NdefRecord, NfcRecord, RecordData};

pub const TNF_EMPTY: u8 = 0x00;
pub const TNF_WELL_KNOWN: u8 = 0x01;
pub const TNF_MEDIA: u8 = 0x02;
pub const TNF_ABSOLUTE_URI: u8 = 0x03;
pub const TNF_EXTERNAL: u8 = 0x04;

const TLV_NULL: u8 = 0x00;
const TLV_NDEF: u8 = 0x03;
const TLV_TERMINATOR: u8 = 0xFE;

// Header flags
const FLAG_MB: u8 = 0x80;
const FLAG_ME: u8 = 0x40;
const FLAG_SR: u8 = 0x10;
const FLAG_IL: u8 = 0x08;

/// Text record payload: [Status Byte] + [Lang Code] + [Text]
pub fn create_text_record_payload(text: &str, lang: &str) -> Vec<u8> {
    let lang = &lang.as_bytes()[..lang.len().min(0x3F)];
    let mut payload = Vec::with_capacity(1 + lang.len() + text.len());
    // Status byte: UTF-8 (bit 7=0) | Lang length (bits 0-5)
    payload.push(lang.len() as u8);
    payload.extend_from_slice(lang);
    payload.extend_from_slice(text.as_bytes());
    payload
}

/// Single well-known Text record (MB=1, ME=1). Falls back to a long record
/// when the payload does not fit in one length byte.
pub fn encode_text_message(text: &str, lang: &str) -> Vec<u8> {
    let payload = create_text_record_payload(text, lang);
    encode_record(TNF_WELL_KNOWN, b"T", &payload, true, true)
}

fn encode_record(tnf: u8, record_type: &[u8], payload: &[u8], mb: bool, me: bool) -> Vec<u8> {
    let short = payload.len() <= u8::MAX as usize;

    // Bit 7: MB, Bit 6: ME, Bit 5: CF(0), Bit 4: SR, Bit 3: IL(0), Bits 2-0: TNF
    let mut header = tnf & 0x07;
    if mb {
        header |= FLAG_MB;
    }
    if me {
        header |= FLAG_ME;
    }
    if short {
        header |= FLAG_SR;
    }

    let mut record = Vec::with_capacity(6 + record_type.len() + payload.len());
    record.push(header);
    record.push(record_type.len() as u8); // Type Length
    if short {
        record.push(payload.len() as u8);
    } else {
        record.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    }
    record.extend_from_slice(record_type);
    record.extend_from_slice(payload);
    record
}

/// NDEF Message TLV followed by the terminator TLV.
pub fn wrap_in_tlv(ndef_bytes: &[u8]) -> Vec<u8> {
    let mut tlv = Vec::with_capacity(ndef_bytes.len() + 5);
    tlv.push(TLV_NDEF);

    if ndef_bytes.len() < 0xFF {
        tlv.push(ndef_bytes.len() as u8);
    } else {
        // 3-byte form: 0xFF then 16-bit big endian length
        tlv.push(0xFF);
        tlv.extend_from_slice(&(ndef_bytes.len() as u16).to_be_bytes());
    }

    tlv.extend_from_slice(ndef_bytes);
    tlv.push(TLV_TERMINATOR);
    tlv
}

/// Reads a TLV length field at `pos`, returning (length, bytes consumed).
fn read_tlv_length(buffer: &[u8], pos: usize) -> Result<(usize, usize), NdefError> {
    match buffer.get(pos) {
        Some(0xFF) => {
            let hi = *buffer.get(pos + 1).ok_or(NdefError::Truncated("TLV length"))?;
            let lo = *buffer.get(pos + 2).ok_or(NdefError::Truncated("TLV length"))?;
            Ok((((hi as usize) << 8) | lo as usize, 3))
        }
        Some(&len) => Ok((len as usize, 1)),
        None => Err(NdefError::Truncated("TLV length")),
    }
}

/// Walks the TLV blocks of a tag's data area and returns the NDEF message.
pub fn find_ndef_message(buffer: &[u8]) -> Result<&[u8], NdefError> {
    let mut pos = 0;
    while let Some(&tag) = buffer.get(pos) {
        match tag {
            TLV_NULL => pos += 1,
            TLV_TERMINATOR => return Err(NdefError::NoNdefTlv),
            _ => {
                let (len, consumed) = read_tlv_length(buffer, pos + 1)?;
                let start = pos + 1 + consumed;
                let end = start + len;
                if tag == TLV_NDEF {
                    if end > buffer.len() {
                        return Err(NdefError::Truncated("NDEF message"));
                    }
                    if len == 0 {
                        return Err(NdefError::EmptyMessage);
                    }
                    return Ok(&buffer[start..end]);
                }
                // Lock/Memory Control or proprietary TLV
                pos = end;
            }
        }
    }
    // Ran off the end without a terminator: more memory to read
    Err(NdefError::Truncated("TLV area"))
}

fn take<'a>(data: &'a [u8], cursor: &mut usize, len: usize, what: &'static str) -> Result<&'a [u8], NdefError> {
    let end = cursor.checked_add(len).ok_or(NdefError::Truncated(what))?;
    let slice = data.get(*cursor..end).ok_or(NdefError::Truncated(what))?;
    *cursor = end;
    Ok(slice)
}

pub fn parse_ndef_records(data: &[u8]) -> Result<Vec<NdefRecord>, NdefError> {
    if data.is_empty() {
        return Err(NdefError::EmptyMessage);
    }

    let mut records = Vec::new();
    let mut cursor = 0;

    while cursor < data.len() {
        let header = take(data, &mut cursor, 1, "record header")?[0];
        let tnf = header & 0x07; // Last 3 bits
        let is_short_record = (header & FLAG_SR) != 0;
        let has_id = (header & FLAG_IL) != 0;
        let is_me = (header & FLAG_ME) != 0;

        // 1. Type Length
        let type_len = take(data, &mut cursor, 1, "type length")?[0] as usize;

        // 2. Payload Length (1 byte for Short Record, 4 bytes otherwise)
        let payload_len = if is_short_record {
            take(data, &mut cursor, 1, "payload length")?[0] as usize
        } else {
            let raw = take(data, &mut cursor, 4, "payload length")?;
            u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize
        };

        // 3. ID Length (if present)
        let id_len = if has_id {
            take(data, &mut cursor, 1, "id length")?[0] as usize
        } else {
            0
        };

        let record_type = take(data, &mut cursor, type_len, "record type")?.to_vec();
        let id = if has_id {
            Some(take(data, &mut cursor, id_len, "record id")?.to_vec())
        } else {
            None
        };
        let payload = take(data, &mut cursor, payload_len, "record payload")?.to_vec();

        records.push(NdefRecord {
            tnf,
            record_type,
            payload,
            id,
        });

        if is_me {
            break;
        }
    }

    Ok(records)
}

/// Decodes a Text record payload, honouring the UTF-16 flag in the status
/// byte.
pub fn decode_text_payload(payload: &[u8]) -> Option<String> {
    let status_byte = *payload.first()?;
    let lang_len = (status_byte & 0x3F) as usize; // Bit 5-0 is length
    let text = payload.get(1 + lang_len..)?;

    if status_byte & 0x80 == 0 {
        return str::from_utf8(text).ok().map(str::to_string);
    }
    if text.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = text
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).ok()
}

impl NdefRecord {
    /// Reader-level view of the record. Text that does not decode carries no
    /// data, so the extractor moves on to the next record.
    pub fn to_nfc_record(&self) -> NfcRecord {
        let (record_type, media_type, data) = match (self.tnf, self.record_type.as_slice()) {
            (TNF_WELL_KNOWN, b"T") => {
                let data = match decode_text_payload(&self.payload) {
                    Some(text) => RecordData::Text(text),
                    None => RecordData::Empty,
                };
                ("text", None, data)
            }
            (TNF_WELL_KNOWN, b"U") => ("url", None, RecordData::Buffer(self.payload.clone())),
            (TNF_MEDIA, media) => (
                "mime",
                Some(String::from_utf8_lossy(media).into_owned()),
                RecordData::Buffer(self.payload.clone()),
            ),
            (TNF_EMPTY, _) => ("empty", None, RecordData::Empty),
            (TNF_ABSOLUTE_URI, _) => ("absolute-url", None, RecordData::Buffer(self.payload.clone())),
            (TNF_EXTERNAL, _) => ("external", None, RecordData::Buffer(self.payload.clone())),
            _ => ("unknown", None, RecordData::Buffer(self.payload.clone())),
        };

        NfcRecord {
            record_type: Some(record_type.to_string()),
            media_type,
            data,
        }
    }
}

/// Raw tag memory -> records ready for the payload codec.
pub fn records_from_tag_data(buffer: &[u8]) -> Result<Vec<NfcRecord>, NdefError> {
    let message = find_ndef_message(buffer)?;
    Ok(parse_ndef_records(message)?
        .iter()
        .map(NdefRecord::to_nfc_record)
        .collect())
}
