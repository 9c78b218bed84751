use base64::prelude::*;
use common::domain::{NormalizedEvent, RawMessage};
use mesh_payload::{portnum_type, Envelope, Packet, TypedPayload};
use serde_json::json;

/// Flatten the pipeline outputs for one message into a storage record.
///
/// `packet` is the packet after any decryption, so its `decoded` field is the
/// payload that `typed` was produced from. Every input may be absent; the
/// result always carries the topic, the base64 of the original bytes and the
/// reception time.
pub fn normalize(
    raw: &RawMessage,
    envelope: Option<&Envelope>,
    packet: Option<&Packet>,
    typed: Option<&TypedPayload>,
) -> NormalizedEvent {
    let mut event = NormalizedEvent::empty(
        storable(&raw.topic),
        BASE64_STANDARD.encode(&raw.payload),
        raw.received_at,
    );

    if let Some(envelope) = envelope {
        event.node_id = storable_opt(&envelope.channel_id);
        event.gateway_id = storable_opt(&envelope.gateway_id);
    }

    if let Some(packet) = packet {
        apply_packet(&mut event, packet);
    }

    if let Some(typed) = typed {
        apply_typed(&mut event, typed);
    }

    event
}

fn apply_packet(event: &mut NormalizedEvent, packet: &Packet) {
    event.from_node = packet.from.map(|from| from.to_string());
    event.to_node = packet.to.map(|to| to.to_string());
    event.channel = packet.channel;
    event.packet_id = packet.id;
    event.hop_limit = packet.hop_limit;
    event.hop_start = packet.hop_start;
    event.want_ack = packet.want_ack;
    event.via_mqtt = packet.via_mqtt;
    event.rx_time = packet.rx_time;
    event.rx_snr = packet.rx_snr;
    event.rx_rssi = packet.rx_rssi;

    if let Some(decoded) = &packet.decoded {
        event.message_type = Some(decoded.portnum);
        event.portnum_type = Some(portnum_type(decoded.portnum));
        event.want_response = decoded.want_response;
    }
}

fn apply_typed(event: &mut NormalizedEvent, typed: &TypedPayload) {
    match typed {
        TypedPayload::TextMessage(message) => {
            event.message_text = Some(storable(&message.text));
        }
        TypedPayload::Position(position) => {
            event.latitude = position.latitude;
            event.longitude = position.longitude;
            event.altitude = position.altitude;
            event.position_time = position.time;
        }
        TypedPayload::NodeIdentity(node) => {
            event.node_info_id = storable_opt(&node.id);
            event.long_name = storable_opt(&node.long_name);
            event.short_name = storable_opt(&node.short_name);
            event.mac_address = node.mac_address_hex.clone();
        }
        TypedPayload::Telemetry(telemetry) => {
            event.device_metrics = telemetry.device_metrics.clone();
            event.environment_metrics = telemetry.environment_metrics.clone();
            event.air_quality_metrics = telemetry.air_quality_metrics.clone();
        }
        TypedPayload::Opaque(opaque) => {
            event.parsed_data_json = Some(json!({
                "portnum": opaque.portnum,
                "payloadBase64": opaque.payload_base64,
            }));
        }
    }
}

// Text columns cannot hold NUL, and wire strings (or a wrong-key decrypt) may
// contain it.
fn storable(text: &str) -> String {
    text.replace('\0', "\u{FFFD}")
}

fn storable_opt(text: &Option<String>) -> Option<String> {
    text.as_deref().map(storable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_payload::{
        DecodedPayload, NodeIdentity, OpaquePayload, PositionReport, TelemetryReport, TextMessage,
    };

    fn raw() -> RawMessage {
        RawMessage::new("msh/US/2/e/LongFast/!abcd1234", vec![0x0A, 0x02, 0x08, 0x01])
    }

    fn packet_with(portnum: i32) -> Packet {
        Packet {
            from: Some(2_882_400_000),
            to: Some(0xFFFF_FFFF),
            channel: Some(8),
            id: Some(42),
            hop_limit: Some(3),
            hop_start: Some(3),
            rx_time: Some(1_700_000_000),
            rx_snr: Some(5.5),
            rx_rssi: Some(-90),
            decoded: Some(DecodedPayload {
                portnum,
                payload: vec![1, 2, 3],
                want_response: Some(true),
            }),
            ..Default::default()
        }
    }

    fn assert_typed_fields_empty_except(event: &NormalizedEvent, keep: &str) {
        if keep != "text" {
            assert!(event.message_text.is_none());
        }
        if keep != "position" {
            assert!(event.latitude.is_none());
            assert!(event.longitude.is_none());
            assert!(event.altitude.is_none());
            assert!(event.position_time.is_none());
        }
        if keep != "node" {
            assert!(event.node_info_id.is_none());
            assert!(event.long_name.is_none());
            assert!(event.short_name.is_none());
            assert!(event.mac_address.is_none());
        }
        if keep != "telemetry" {
            assert!(event.device_metrics.is_none());
            assert!(event.environment_metrics.is_none());
            assert!(event.air_quality_metrics.is_none());
        }
        if keep != "opaque" {
            assert!(event.parsed_data_json.is_none());
        }
    }

    #[test]
    fn test_all_absent_keeps_reception_fields() {
        let raw = raw();
        let event = normalize(&raw, None, None, None);

        assert_eq!(event.topic, raw.topic);
        assert_eq!(event.payload_base64, "CgIIAQ==");
        assert_eq!(event.received_at, raw.received_at);
        assert!(event.node_id.is_none());
        assert!(event.from_node.is_none());
        assert!(event.portnum_type.is_none());
        assert_typed_fields_empty_except(&event, "");
    }

    #[test]
    fn test_envelope_without_packet_has_no_packet_fields() {
        let envelope = Envelope {
            channel_id: Some("LongFast".to_string()),
            gateway_id: Some("!abcd1234".to_string()),
            packet: None,
        };
        let event = normalize(&raw(), Some(&envelope), None, None);

        assert_eq!(event.node_id.as_deref(), Some("LongFast"));
        assert_eq!(event.gateway_id.as_deref(), Some("!abcd1234"));
        assert!(event.from_node.is_none());
        assert!(event.to_node.is_none());
        assert!(event.packet_id.is_none());
        assert!(event.message_type.is_none());
        assert!(event.portnum_type.is_none());
    }

    #[test]
    fn test_packet_fields_are_copied() {
        let packet = packet_with(mesh_payload::portnum::TEXT_MESSAGE_APP);
        let event = normalize(&raw(), None, Some(&packet), None);

        assert_eq!(event.from_node.as_deref(), Some("2882400000"));
        assert_eq!(event.to_node.as_deref(), Some("4294967295"));
        assert_eq!(event.channel, Some(8));
        assert_eq!(event.packet_id, Some(42));
        assert_eq!(event.hop_limit, Some(3));
        assert_eq!(event.hop_start, Some(3));
        assert_eq!(event.rx_time, Some(1_700_000_000));
        assert_eq!(event.rx_snr, Some(5.5));
        assert_eq!(event.rx_rssi, Some(-90));
        assert_eq!(event.want_ack, None);
        assert_eq!(event.message_type, Some(1));
        assert_eq!(event.portnum_type.as_deref(), Some("TEXT_MESSAGE_APP"));
        assert_eq!(event.want_response, Some(true));
    }

    #[test]
    fn test_encrypted_packet_without_decoded_has_no_port() {
        let mut packet = packet_with(1);
        packet.decoded = None;
        packet.encrypted = Some(vec![0xDE, 0xAD]);
        let event = normalize(&raw(), None, Some(&packet), None);

        assert_eq!(event.packet_id, Some(42));
        assert!(event.portnum_type.is_none());
        assert!(event.message_type.is_none());
        assert_typed_fields_empty_except(&event, "");
    }

    #[test]
    fn test_text_message_is_flattened() {
        let typed = TypedPayload::TextMessage(TextMessage {
            text: "hello".to_string(),
        });
        let event = normalize(&raw(), None, None, Some(&typed));
        assert_eq!(event.message_text.as_deref(), Some("hello"));
        assert_typed_fields_empty_except(&event, "text");
    }

    #[test]
    fn test_position_is_flattened() {
        let typed = TypedPayload::Position(PositionReport {
            latitude: Some(37.7749),
            longitude: None,
            altitude: Some(12),
            time: Some(1_700_000_000),
        });
        let event = normalize(&raw(), None, None, Some(&typed));
        assert_eq!(event.latitude, Some(37.7749));
        assert_eq!(event.longitude, None);
        assert_eq!(event.altitude, Some(12));
        assert_eq!(event.position_time, Some(1_700_000_000));
        assert_typed_fields_empty_except(&event, "position");
    }

    #[test]
    fn test_node_identity_is_flattened() {
        let typed = TypedPayload::NodeIdentity(NodeIdentity {
            id: Some("!abcd1234".to_string()),
            long_name: Some("Base Camp".to_string()),
            short_name: Some("BC".to_string()),
            mac_address_hex: Some("deadbeef0a0b".to_string()),
        });
        let event = normalize(&raw(), None, None, Some(&typed));
        assert_eq!(event.node_info_id.as_deref(), Some("!abcd1234"));
        assert_eq!(event.long_name.as_deref(), Some("Base Camp"));
        assert_eq!(event.short_name.as_deref(), Some("BC"));
        assert_eq!(event.mac_address.as_deref(), Some("deadbeef0a0b"));
        assert_typed_fields_empty_except(&event, "node");
    }

    #[test]
    fn test_nul_bytes_are_replaced_in_wire_strings() {
        let typed = TypedPayload::TextMessage(TextMessage {
            text: "a\0b".to_string(),
        });
        let envelope = Envelope {
            packet: None,
            channel_id: Some("Long\0Fast".to_string()),
            gateway_id: Some("!abcd1234".to_string()),
        };
        let event = normalize(&raw(), Some(&envelope), None, Some(&typed));

        assert_eq!(event.message_text.as_deref(), Some("a\u{FFFD}b"));
        assert_eq!(event.node_id.as_deref(), Some("Long\u{FFFD}Fast"));
        assert_eq!(event.gateway_id.as_deref(), Some("!abcd1234"));
    }

    #[test]
    fn test_long_node_identity_fields_are_kept_whole() {
        let short_name = "S".repeat(60);
        let mac_hex = "ab".repeat(30);
        let typed = TypedPayload::NodeIdentity(NodeIdentity {
            id: Some("!\0".to_string()),
            long_name: None,
            short_name: Some(short_name.clone()),
            mac_address_hex: Some(mac_hex.clone()),
        });
        let event = normalize(&raw(), None, None, Some(&typed));

        assert_eq!(event.node_info_id.as_deref(), Some("!\u{FFFD}"));
        assert_eq!(event.short_name, Some(short_name));
        assert_eq!(event.mac_address, Some(mac_hex));
    }

    #[test]
    fn test_telemetry_is_flattened() {
        let typed = TypedPayload::Telemetry(TelemetryReport {
            device_metrics: Some(json!({"batteryLevel": 87})),
            environment_metrics: None,
            air_quality_metrics: None,
        });
        let event = normalize(&raw(), None, None, Some(&typed));
        assert_eq!(event.device_metrics, Some(json!({"batteryLevel": 87})));
        assert_typed_fields_empty_except(&event, "telemetry");
    }

    #[test]
    fn test_opaque_goes_to_parsed_data() {
        let packet = packet_with(9999);
        let typed = TypedPayload::Opaque(OpaquePayload {
            portnum: 9999,
            payload_base64: "AQID".to_string(),
        });
        let event = normalize(&raw(), None, Some(&packet), Some(&typed));

        assert_eq!(event.portnum_type.as_deref(), Some("UNKNOWN_9999"));
        assert_eq!(
            event.parsed_data_json,
            Some(json!({"portnum": 9999, "payloadBase64": "AQID"}))
        );
        assert_typed_fields_empty_except(&event, "opaque");
    }
}
