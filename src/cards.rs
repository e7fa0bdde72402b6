// src/cards.rs
use log::warn;
use pcsc::Card;

use crate::error::{NdefError, NfcError};
use crate::{apdu, ndef};

// Default transport keys seen in the field
pub const COMMON_KEYS: [[u8; 6]; 8] = [
    [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
    [0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5],
    [0xD3, 0xF7, 0xD3, 0xF7, 0xD3, 0xF7],
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
    [0xB0, 0xB1, 0xB2, 0xB3, 0xB4, 0xB5],
    [0x4D, 0x3A, 0x99, 0xC3, 0x51, 0xDD],
    [0x1A, 0x98, 0x2C, 0x7E, 0x45, 0x9A],
    [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF],
];

const NTAG_FIRST_USER_PAGE: u8 = 4;
// NTAG216 ends its user area at page 0xE1
const NTAG_LAST_USER_PAGE: u8 = 0xE1;
const NTAG_MAX_BYTES: usize = (NTAG_LAST_USER_PAGE - NTAG_FIRST_USER_PAGE + 1) as usize * 4;

const MIFARE_MAX_BYTES: usize = 15 * 3 * 16;

pub fn get_mifare_data_blocks() -> Vec<u8> {
    let mut blocks = Vec::new();
    // Sector 0 is usually read-only manufacturer data, so we start at Sector 1
    for sector in 1..16 {
        for block_in_sector in 0..3 {
            // 0, 1, 2 are data. 3 is the Trailer.
            blocks.push((sector * 4) + block_in_sector);
        }
    }
    blocks
}

// Whether the bytes read so far already hold the whole TLV area we care about.
fn tlv_area_complete(data: &[u8]) -> bool {
    !matches!(ndef::find_ndef_message(data), Err(NdefError::Truncated(_)))
}

fn authenticate_sector(card: &Card, block: u8, key_types: &[u8]) -> bool {
    COMMON_KEYS.iter().any(|key| {
        apdu::load_key(card, key).is_ok()
            && key_types
                .iter()
                .any(|&key_type| apdu::authenticate(card, block, key_type).is_ok())
    })
}

pub fn read_mifare(card: &Card) -> Result<Vec<u8>, NfcError> {
    let mut full_data = Vec::new();

    for block in get_mifare_data_blocks() {
        // We must authenticate at the start of every sector (blocks 4, 8, 12, etc.)
        // Try Key A (0x60) then Key B (0x61)
        if block % 4 == 0 && !authenticate_sector(card, block, &[0x60, 0x61]) {
            warn!("Could not authenticate sector at block {}. Stopping.", block);
            break;
        }

        match apdu::read_binary(card, block, 16) {
            Ok(data) => {
                full_data.extend_from_slice(&data);
                if tlv_area_complete(&full_data) {
                    break;
                }
            }
            Err(_) => break,
        }
    }

    if full_data.is_empty() {
        return Err(NfcError::Card("No data could be read from the card.".into()));
    }

    Ok(full_data)
}

pub fn write_mifare(card: &Card, data: &[u8]) -> Result<(), NfcError> {
    if data.len() > MIFARE_MAX_BYTES {
        return Err(NfcError::Card(format!(
            "Payload of {} bytes exceeds tag capacity",
            data.len()
        )));
    }

    let mut offset = 0;
    let mut current_block: u8 = 4;

    while offset < data.len() {
        // Skip trailers
        if (current_block + 1) % 4 == 0 {
            current_block += 1;
            continue;
        }

        if current_block % 4 == 0 && !authenticate_sector(card, current_block, &[0x60]) {
            return Err(NfcError::Card("Write Auth Failed".to_string()));
        }

        // Chunking 16 bytes, padded with 0s
        let copy_len = std::cmp::min(16, data.len() - offset);
        let mut chunk = [0u8; 16];
        chunk[..copy_len].copy_from_slice(&data[offset..offset + copy_len]);

        apdu::update_binary(card, current_block, &chunk)?;

        offset += 16;
        current_block += 1;
    }
    Ok(())
}

pub fn read_ntag(card: &Card) -> Result<Vec<u8>, NfcError> {
    let mut full_data = Vec::new();
    let mut page = NTAG_FIRST_USER_PAGE;

    // READ BINARY with 16 bytes returns four pages at a time
    while page <= NTAG_LAST_USER_PAGE {
        match apdu::read_binary(card, page, 16) {
            Ok(data) if !data.is_empty() => full_data.extend(data),
            Ok(_) => break,
            Err(e) if full_data.is_empty() => return Err(e),
            Err(_) => break,
        }
        if tlv_area_complete(&full_data) {
            break;
        }
        page = page.saturating_add(4);
    }

    Ok(full_data)
}

pub fn write_ntag(card: &Card, data: &[u8]) -> Result<(), NfcError> {
    if data.len() > NTAG_MAX_BYTES {
        return Err(NfcError::Card(format!(
            "Payload of {} bytes exceeds tag capacity",
            data.len()
        )));
    }

    // NTAG writes 4 bytes (1 page) at a time
    // Pad to multiple of 4
    let mut padded_data = data.to_vec();
    while padded_data.len() % 4 != 0 {
        padded_data.push(0x00);
    }

    let mut current_page = NTAG_FIRST_USER_PAGE;
    for chunk in padded_data.chunks(4) {
        apdu::update_binary(card, current_page, chunk)?;
        current_page += 1;
    }
    Ok(())
}
