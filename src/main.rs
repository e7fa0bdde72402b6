use crossbeam_channel::Receiver;
use log::info;
use tokio::sync::broadcast;

use nfc_config_wizard::platform::{self, NfcEvent};
use nfc_config_wizard::settings::SETTINGS;
use nfc_config_wizard::types::OutgoingMessage;
use nfc_config_wizard::{wizard, ws};

#[tokio::main]
async fn main() {
    env_logger::init();
    info!("Starting NFC configuration wizard service...");

    // Reader thread (or the unavailable stand-in) and its event stream
    let (nfc, events) = platform::probe(&SETTINGS);

    // Channel: NFC -> WS (Events)
    // Tokio Broadcast for distribution to WS clients
    let (event_tx, event_rx) = broadcast::channel::<OutgoingMessage>(100);

    // Bridge the blocking event stream into the broadcast channel
    std::thread::spawn(move || bridge(events, event_tx));

    ws::start_server(nfc, event_rx, SETTINGS.bind_addr()).await;
}

fn bridge(events: Receiver<NfcEvent>, event_tx: broadcast::Sender<OutgoingMessage>) {
    while let Ok(event) = events.recv() {
        let _ = event_tx.send(wizard::event_message(event));
    }
    info!("NFC event stream closed");
}
