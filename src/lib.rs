// src/lib.rs
//! NFC device-configuration wizard service.
//!
//! The core turns tag records into a validated [`schema::DeviceConfig`]
//! ([`scan::assemble`]) and a configuration back into the canonical JSON
//! written to tags ([`codec::serialize_config`]). Around it sit the PC/SC
//! reader thread and the WebSocket endpoint the wizard UI talks to.

pub mod apdu;
pub mod cards;
pub mod codec;
pub mod error;
pub mod ndef;
pub mod nfc_service;
pub mod platform;
pub mod scan;
pub mod schema;
pub mod settings;
pub mod types;
pub mod validator;
pub mod wizard;
pub mod ws;

pub use codec::{extract_json_string, serialize_config};
pub use error::{ConfigError, NfcError};
pub use scan::{ScanResult, assemble};
pub use schema::{DeviceConfig, ServerConfig, WifiConfig};
pub use validator::validate;
