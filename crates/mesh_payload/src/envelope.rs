use crate::proto::{self, mesh_packet::PayloadVariant};
use crate::Result;
use prost::Message;

/// Decoded outer envelope
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Envelope {
    pub channel_id: Option<String>,
    pub gateway_id: Option<String>,
    pub packet: Option<Packet>,
}

/// Mesh packet metadata plus its payload.
///
/// At most one of `decoded` / `encrypted` is set by the envelope decoder. The
/// ingestion loop may fill `decoded` after a successful decrypt.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Packet {
    pub from: Option<u32>,
    pub to: Option<u32>,
    pub channel: Option<u32>,
    pub id: Option<u32>,
    pub hop_limit: Option<u32>,
    pub hop_start: Option<u32>,
    pub want_ack: Option<bool>,
    pub via_mqtt: Option<bool>,
    pub rx_time: Option<i64>,
    pub rx_snr: Option<f32>,
    pub rx_rssi: Option<i32>,
    pub decoded: Option<DecodedPayload>,
    pub encrypted: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedPayload {
    pub portnum: i32,
    pub payload: Vec<u8>,
    pub want_response: Option<bool>,
}

/// Parse the raw bytes of an MQTT publish as a `ServiceEnvelope`.
///
/// Fails with `PayloadError::EnvelopeMalformed` when the bytes are not a valid
/// encoding. An envelope without a packet is valid.
pub fn decode_envelope(raw: &[u8]) -> Result<Envelope> {
    let envelope = proto::ServiceEnvelope::decode(raw)?;
    Ok(envelope.into())
}

impl From<proto::ServiceEnvelope> for Envelope {
    fn from(proto: proto::ServiceEnvelope) -> Self {
        Envelope {
            channel_id: non_empty(proto.channel_id),
            gateway_id: non_empty(proto.gateway_id),
            packet: proto.packet.map(Packet::from),
        }
    }
}

// proto3 scalars have no presence bit: a default value is treated as absent.
impl From<proto::MeshPacket> for Packet {
    fn from(proto: proto::MeshPacket) -> Self {
        let (decoded, encrypted) = match proto.payload_variant {
            Some(PayloadVariant::Decoded(data)) => (Some(DecodedPayload::from(data)), None),
            Some(PayloadVariant::Encrypted(bytes)) if !bytes.is_empty() => (None, Some(bytes)),
            _ => (None, None),
        };

        Packet {
            from: non_zero(proto.from),
            to: non_zero(proto.to),
            channel: non_zero(proto.channel),
            id: non_zero(proto.id),
            hop_limit: non_zero(proto.hop_limit),
            hop_start: non_zero(proto.hop_start),
            want_ack: proto.want_ack.then_some(true),
            via_mqtt: proto.via_mqtt.then_some(true),
            rx_time: non_zero(proto.rx_time).map(i64::from),
            rx_snr: (proto.rx_snr != 0.0).then_some(proto.rx_snr),
            rx_rssi: (proto.rx_rssi != 0).then_some(proto.rx_rssi),
            decoded,
            encrypted,
        }
    }
}

impl From<proto::Data> for DecodedPayload {
    fn from(data: proto::Data) -> Self {
        DecodedPayload {
            portnum: data.portnum,
            payload: data.payload,
            want_response: data.want_response.then_some(true),
        }
    }
}

fn non_zero(value: u32) -> Option<u32> {
    (value != 0).then_some(value)
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{portnum, PayloadError};

    fn text_packet() -> proto::MeshPacket {
        proto::MeshPacket {
            from: 0xABCD_1234,
            to: 0xFFFF_FFFF,
            channel: 8,
            id: 42,
            rx_time: 1_700_000_000,
            rx_snr: 6.25,
            hop_limit: 3,
            want_ack: false,
            rx_rssi: -87,
            hop_start: 3,
            payload_variant: Some(PayloadVariant::Decoded(proto::Data {
                portnum: portnum::TEXT_MESSAGE_APP,
                payload: b"hi".to_vec(),
                ..Default::default()
            })),
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_envelope_with_decoded_packet() {
        let raw = proto::ServiceEnvelope {
            packet: Some(text_packet()),
            channel_id: "LongFast".to_string(),
            gateway_id: "!abcd1234".to_string(),
        }
        .encode_to_vec();

        let envelope = decode_envelope(&raw).unwrap();
        assert_eq!(envelope.channel_id.as_deref(), Some("LongFast"));
        assert_eq!(envelope.gateway_id.as_deref(), Some("!abcd1234"));

        let packet = envelope.packet.unwrap();
        assert_eq!(packet.from, Some(0xABCD_1234));
        assert_eq!(packet.to, Some(0xFFFF_FFFF));
        assert_eq!(packet.channel, Some(8));
        assert_eq!(packet.id, Some(42));
        assert_eq!(packet.rx_time, Some(1_700_000_000));
        assert_eq!(packet.rx_snr, Some(6.25));
        assert_eq!(packet.rx_rssi, Some(-87));
        assert_eq!(packet.want_ack, None);
        assert!(packet.encrypted.is_none());

        let decoded = packet.decoded.unwrap();
        assert_eq!(decoded.portnum, portnum::TEXT_MESSAGE_APP);
        assert_eq!(decoded.payload, b"hi".to_vec());
    }

    #[test]
    fn test_decode_envelope_without_packet() {
        let raw = proto::ServiceEnvelope {
            packet: None,
            channel_id: "admin".to_string(),
            gateway_id: String::new(),
        }
        .encode_to_vec();

        let envelope = decode_envelope(&raw).unwrap();
        assert!(envelope.packet.is_none());
        assert_eq!(envelope.channel_id.as_deref(), Some("admin"));
        assert!(envelope.gateway_id.is_none());
    }

    #[test]
    fn test_decode_envelope_encrypted_packet() {
        let mut packet = text_packet();
        packet.payload_variant = Some(PayloadVariant::Encrypted(vec![0xDE, 0xAD, 0xBE, 0xEF]));
        let raw = proto::ServiceEnvelope {
            packet: Some(packet),
            ..Default::default()
        }
        .encode_to_vec();

        let packet = decode_envelope(&raw).unwrap().packet.unwrap();
        assert!(packet.decoded.is_none());
        assert_eq!(packet.encrypted, Some(vec![0xDE, 0xAD, 0xBE, 0xEF]));
    }

    #[test]
    fn test_empty_encrypted_bytes_are_absent() {
        let mut packet = text_packet();
        packet.payload_variant = Some(PayloadVariant::Encrypted(Vec::new()));
        let packet = Packet::from(packet);
        assert!(packet.encrypted.is_none());
        assert!(packet.decoded.is_none());
    }

    #[test]
    fn test_decode_envelope_truncated() {
        let mut raw = proto::ServiceEnvelope {
            packet: Some(text_packet()),
            channel_id: "LongFast".to_string(),
            gateway_id: "!abcd1234".to_string(),
        }
        .encode_to_vec();
        raw.truncate(raw.len() - 3);

        let result = decode_envelope(&raw);
        assert!(matches!(result, Err(PayloadError::EnvelopeMalformed(_))));
    }

    #[test]
    fn test_decode_envelope_garbage() {
        // Plain-text status message as published on `stat` topics
        let result = decode_envelope(b"online");
        assert!(matches!(result, Err(PayloadError::EnvelopeMalformed(_))));
    }
}
