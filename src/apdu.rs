// src/apdu.rs
use pcsc::Card;

use crate::error::NfcError;

const SW_SUCCESS: [u8; 2] = [0x90, 0x00];

// Sends a pseudo-APDU and strips the status word. Anything but 90 00 fails
// with `what` as the reason.
fn transmit(card: &Card, apdu: &[u8], what: &str) -> Result<Vec<u8>, NfcError> {
    let mut recv_buffer = [0u8; 258];
    let resp = card.transmit(apdu, &mut recv_buffer)?;
    match resp.split_last_chunk::<2>() {
        Some((data, sw)) if *sw == SW_SUCCESS => Ok(data.to_vec()),
        _ => Err(NfcError::Card(format!("{} ({:02X?})", what, resp))),
    }
}

// Get Data (UID): FF CA 00 00 00
pub fn get_uid(card: &Card) -> Result<Vec<u8>, NfcError> {
    transmit(card, &[0xFF, 0xCA, 0x00, 0x00, 0x00], "Get UID Failed")
}

/// Formats a UID the way browsers report a tag serial: `04:a2:3b:...`.
pub fn format_serial(uid: &[u8]) -> String {
    uid.iter()
        .map(|b| hex::encode([*b]))
        .collect::<Vec<_>>()
        .join(":")
}

// Load Authentication Keys into Reader Memory (Location 0x00)
// ACR122U standard: FF 82 00 key_num 06 [KEY]
pub fn load_key(card: &Card, key: &[u8; 6]) -> Result<(), NfcError> {
    let mut apdu = vec![0xFF, 0x82, 0x00, 0x00, 0x06];
    apdu.extend_from_slice(key);
    transmit(card, &apdu, "Load Key Failed").map(|_| ())
}

// Authenticate Block
// CMD: FF 86 00 00 05 01 00 Block KeyType KeyNumber
// KeyType: 0x60 (A), 0x61 (B)
pub fn authenticate(card: &Card, block: u8, key_type: u8) -> Result<(), NfcError> {
    let apdu = [
        0xFF, 0x86, 0x00, 0x00, 0x05, 0x01, 0x00, block, key_type, 0x00,
    ];
    transmit(card, &apdu, "Auth Failed").map(|_| ())
}

pub fn read_binary(card: &Card, block: u8, length: u8) -> Result<Vec<u8>, NfcError> {
    // Read: FF B0 00 Block Len
    transmit(card, &[0xFF, 0xB0, 0x00, block, length], "Read Failed")
}

pub fn update_binary(card: &Card, block: u8, data: &[u8]) -> Result<(), NfcError> {
    // Write: FF D6 00 Block Len [Data]
    let mut apdu = vec![0xFF, 0xD6, 0x00, block, data.len() as u8];
    apdu.extend_from_slice(data);
    transmit(card, &apdu, "Write Failed").map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_serial() {
        assert_eq!(format_serial(&[0x04, 0xA2, 0x3B, 0x00]), "04:a2:3b:00");
        assert_eq!(format_serial(&[]), "");
    }
}
