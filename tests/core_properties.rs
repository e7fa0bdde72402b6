use nfc_config_wizard::ndef;
use nfc_config_wizard::scan::ScanOutcome;
use nfc_config_wizard::types::{NfcRecord, RecordData};
use nfc_config_wizard::{
    ConfigError, DeviceConfig, ServerConfig, WifiConfig, assemble, extract_json_string,
    serialize_config, validate,
};
use serde_json::{Value, json};

fn sample_configs() -> Vec<DeviceConfig> {
    vec![
        validate(&json!({
            "deviceId": "d1",
            "wifi": { "ssid": "net" },
            "server": { "url": "http://h" }
        }))
        .unwrap(),
        DeviceConfig {
            version: Some("1.2".into()),
            device_id: "esp32-001".into(),
            publish_interval: Some(5),
            wifi: WifiConfig {
                ssid: "Kantor Lt. 2".into(),
                password: Some("p@ss \"quoted\"".into()),
            },
            server: ServerConfig {
                url: "mqtts://broker.example.com".into(),
                port: Some(8883),
                tls: Some(true),
                token: Some("Bearer xyz".into()),
                topic: Some("devices/esp32-001/telemetry".into()),
            },
        },
    ]
}

#[test]
fn serialize_then_validate_reproduces_config() {
    for config in sample_configs() {
        let json = serialize_config(&config).unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(validate(&parsed).unwrap(), config);
    }
}

#[test]
fn serialize_is_idempotent() {
    for config in sample_configs() {
        assert_eq!(
            serialize_config(&config).unwrap(),
            serialize_config(&config).unwrap()
        );
    }
}

#[test]
fn serialize_fills_every_default() {
    let config = DeviceConfig {
        device_id: "d1".into(),
        wifi: WifiConfig {
            ssid: "net".into(),
            password: None,
        },
        server: ServerConfig {
            url: "http://h".into(),
            ..Default::default()
        },
        ..Default::default()
    };
    assert_eq!(
        serialize_config(&config).unwrap(),
        r#"{"version":"1.0","deviceId":"d1","publishInterval":60,"wifi":{"ssid":"net","password":""},"server":{"url":"http://h","port":null,"tls":false,"token":"","topic":""}}"#
    );
}

#[test]
fn extraction_skips_a_bad_record() {
    let records = vec![
        NfcRecord {
            record_type: Some("text".into()),
            media_type: None,
            data: RecordData::Buffer(vec![0xF0, 0x28, 0x8C, 0x28]),
        },
        NfcRecord::text(r#"{"deviceId":"x","wifi":{"ssid":"n"},"server":{"url":"u"}}"#),
    ];
    assert_eq!(
        extract_json_string(&records).as_deref(),
        Some(r#"{"deviceId":"x","wifi":{"ssid":"n"},"server":{"url":"u"}}"#)
    );
}

#[test]
fn missing_fields_are_rejected() {
    assert_eq!(
        validate(&json!({ "deviceId": "d1" })),
        Err(ConfigError::MissingRequiredFields)
    );
    assert_eq!(validate(&json!({})), Err(ConfigError::MissingRequiredFields));
    assert_eq!(validate(&Value::Null), Err(ConfigError::InvalidPayload));
}

#[test]
fn assemble_without_records() {
    let result = assemble(None, &[]);
    assert_eq!(result.serial_number, None);
    assert_eq!(result.raw_payload, None);
    assert_eq!(result.config, None);
    assert_eq!(result.outcome(), ScanOutcome::NoPayload);
}

#[test]
fn assemble_keeps_raw_text_that_is_not_json() {
    let result = assemble(None, &[NfcRecord::text("not json")]);
    assert_eq!(result.raw_payload.as_deref(), Some("not json"));
    assert_eq!(result.config, None);
}

#[test]
fn written_tag_bytes_read_back_as_the_same_config() {
    let config = sample_configs().remove(1);
    let payload = serialize_config(&config).unwrap();
    let tag_memory = ndef::wrap_in_tlv(&ndef::encode_text_message(&payload, "en"));

    let records = ndef::records_from_tag_data(&tag_memory).unwrap();
    let result = assemble(Some("04:a2:3b:11".into()), &records);

    assert_eq!(result.raw_payload.as_deref(), Some(payload.as_str()));
    assert_eq!(result.config, Some(config));
    assert_eq!(result.outcome(), ScanOutcome::Configured);
}
