use crate::domain::normalize;
use common::domain::{DomainResult, MeshEventRepository, NormalizedEvent, RawMessage};
use futures::FutureExt;
use mesh_payload::{decode_envelope, decode_typed, decrypt, ChannelKey};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

/// Drives one received message through decode, decrypt, dispatch and
/// normalization, then hands the event to the repository.
///
/// Delivery is at most once: a message that fails to decode or to persist is
/// logged and dropped.
pub struct MeshEventService {
    repository: Arc<dyn MeshEventRepository>,
    channel_key: Option<ChannelKey>,
}

impl MeshEventService {
    pub fn new(repository: Arc<dyn MeshEventRepository>, channel_key: Option<ChannelKey>) -> Self {
        Self {
            repository,
            channel_key,
        }
    }

    /// Entry point for the transport. Never fails and never panics outward.
    pub async fn on_message(&self, topic: &str, payload: &[u8]) {
        let raw = RawMessage::new(topic, payload);

        let outcome = AssertUnwindSafe(self.process_message(&raw))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(id)) => {
                debug!(id, topic = %topic, "mesh event stored");
            }
            Ok(Err(e)) if e.is_envelope_malformed() => {
                warn!(
                    topic = %topic,
                    payload_size = payload.len(),
                    error = %e,
                    "dropping message with malformed envelope"
                );
            }
            Ok(Err(e)) => {
                error!(
                    topic = %topic,
                    payload_size = payload.len(),
                    error = %e,
                    "failed to store mesh event"
                );
            }
            Err(_) => {
                error!(
                    topic = %topic,
                    payload_size = payload.len(),
                    "message processing panicked"
                );
            }
        }
    }

    /// Process one message and return the id assigned by the repository
    #[instrument(skip(self, raw), fields(topic = %raw.topic, payload_size = raw.payload.len()))]
    pub async fn process_message(&self, raw: &RawMessage) -> DomainResult<i64> {
        let event = self.build_event(raw)?;
        self.repository.insert(&event).await
    }

    /// Run the pure part of the pipeline. Fails only on a malformed envelope.
    pub fn build_event(&self, raw: &RawMessage) -> DomainResult<NormalizedEvent> {
        let envelope = decode_envelope(&raw.payload)?;

        let packet = envelope.packet.clone().map(|mut packet| {
            if packet.decoded.is_none() && packet.encrypted.is_some() {
                match &self.channel_key {
                    Some(key) => packet.decoded = decrypt(&packet, key),
                    None => debug!(packet_id = ?packet.id, "encrypted packet and no channel key"),
                }
            }
            packet
        });

        let typed = packet
            .as_ref()
            .and_then(|packet| packet.decoded.as_ref())
            .map(decode_typed);

        Ok(normalize(
            raw,
            Some(&envelope),
            packet.as_ref(),
            typed.as_ref(),
        ))
    }
}

/// Parse the configured channel key. Empty text disables decryption; an
/// unusable key is reported and also disables decryption.
pub fn parse_channel_key(text: &str) -> Option<ChannelKey> {
    if text.trim().is_empty() {
        return None;
    }
    match ChannelKey::parse(text) {
        Ok(key) => Some(key),
        Err(e) => {
            warn!(error = %e, "ignoring unusable channel key, decryption disabled");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use base64::prelude::*;
    use common::domain::{DomainError, MockMeshEventRepository};
    use mesh_payload::crypto::apply_keystream;
    use mesh_payload::portnum::{POSITION_APP, TEXT_MESSAGE_APP};
    use mesh_payload::proto::{self, mesh_packet::PayloadVariant};
    use prost::Message;

    const KEY_B64: &str = "1PG7OiApB1nwvP+rz05pAQ==";

    fn text_envelope(from: u32, id: u32, text: &str) -> Vec<u8> {
        let inner = proto::Data {
            payload: text.as_bytes().to_vec(),
            ..Default::default()
        };
        proto::ServiceEnvelope {
            packet: Some(proto::MeshPacket {
                from,
                to: 0xFFFF_FFFF,
                id,
                payload_variant: Some(PayloadVariant::Decoded(proto::Data {
                    portnum: TEXT_MESSAGE_APP,
                    payload: inner.encode_to_vec(),
                    ..Default::default()
                })),
                ..Default::default()
            }),
            channel_id: "LongFast".to_string(),
            gateway_id: "!abcd1234".to_string(),
        }
        .encode_to_vec()
    }

    fn encrypted_position_envelope(key: &ChannelKey) -> Vec<u8> {
        let position = proto::Position {
            latitude_i: Some(377_749_000),
            longitude_i: Some(-1_224_194_000),
            ..Default::default()
        };
        let mut ciphertext = proto::Data {
            portnum: POSITION_APP,
            payload: position.encode_to_vec(),
            ..Default::default()
        }
        .encode_to_vec();
        apply_keystream(key, 7, 1234, &mut ciphertext);

        proto::ServiceEnvelope {
            packet: Some(proto::MeshPacket {
                from: 1234,
                id: 7,
                payload_variant: Some(PayloadVariant::Encrypted(ciphertext)),
                ..Default::default()
            }),
            channel_id: "LongFast".to_string(),
            ..Default::default()
        }
        .encode_to_vec()
    }

    fn service(repository: MockMeshEventRepository, key: Option<ChannelKey>) -> MeshEventService {
        MeshEventService::new(Arc::new(repository), key)
    }

    #[tokio::test]
    async fn test_text_message_end_to_end() {
        let mut repository = MockMeshEventRepository::new();
        repository
            .expect_insert()
            .withf(|event: &NormalizedEvent| {
                event.from_node.as_deref() == Some("2882400000")
                    && event.packet_id == Some(42)
                    && event.portnum_type.as_deref() == Some("TEXT_MESSAGE_APP")
                    && event.message_text.as_deref() == Some("hello")
                    && event.latitude.is_none()
                    && event.longitude.is_none()
                    && event.node_info_id.is_none()
                    && event.device_metrics.is_none()
                    && event.parsed_data_json.is_none()
            })
            .times(1)
            .returning(|_| Ok(1));

        service(repository, None)
            .on_message("msh/US/2/e/LongFast/!abcd1234", &text_envelope(2_882_400_000, 42, "hello"))
            .await;
    }

    #[tokio::test]
    async fn test_malformed_then_valid_stores_one_event() {
        let mut repository = MockMeshEventRepository::new();
        repository.expect_insert().times(1).returning(|_| Ok(7));
        let service = service(repository, None);

        service.on_message("msh/US/2/stat/!abcd1234", b"online").await;
        service
            .on_message("msh/US/2/e/LongFast/!abcd1234", &text_envelope(1, 2, "hi"))
            .await;
    }

    #[tokio::test]
    async fn test_process_message_reports_malformed_envelope() {
        let mut repository = MockMeshEventRepository::new();
        repository.expect_insert().times(0);

        let raw = RawMessage::new("msh/US/2/e/LongFast/!abcd1234", vec![0x0A, 0x05, 0x0D]);
        let result = service(repository, None).process_message(&raw).await;
        assert!(result.unwrap_err().is_envelope_malformed());
    }

    #[tokio::test]
    async fn test_persistence_failure_does_not_escape() {
        let mut repository = MockMeshEventRepository::new();
        repository
            .expect_insert()
            .times(2)
            .returning(|_| Err(DomainError::PersistenceFailed(anyhow::anyhow!("pool closed"))));
        let service = service(repository, None);

        service.on_message("msh/US/2/e/LongFast/!a", &text_envelope(1, 1, "a")).await;
        service.on_message("msh/US/2/e/LongFast/!a", &text_envelope(1, 2, "b")).await;
    }

    struct PanickingRepository;

    #[async_trait]
    impl MeshEventRepository for PanickingRepository {
        async fn insert(&self, _event: &NormalizedEvent) -> DomainResult<i64> {
            panic!("driver bug")
        }
    }

    #[tokio::test]
    async fn test_repository_panic_does_not_escape() {
        let service = MeshEventService::new(Arc::new(PanickingRepository), None);

        service.on_message("msh/US/2/e/LongFast/!a", &text_envelope(1, 1, "a")).await;
        service.on_message("msh/US/2/e/LongFast/!a", &text_envelope(1, 2, "b")).await;
    }

    #[tokio::test]
    async fn test_process_message_returns_repository_id() {
        let mut repository = MockMeshEventRepository::new();
        repository.expect_insert().returning(|_| Ok(99));

        let raw = RawMessage::new("msh/US/2/e/LongFast/!a", text_envelope(1, 1, "a"));
        let id = service(repository, None).process_message(&raw).await.unwrap();
        assert_eq!(id, 99);
    }

    #[test]
    fn test_encrypted_packet_is_decrypted_with_key() {
        let key = ChannelKey::parse(KEY_B64).unwrap();
        let raw = RawMessage::new("msh/US/2/e/LongFast/!a", encrypted_position_envelope(&key));

        let event = service(MockMeshEventRepository::new(), Some(key))
            .build_event(&raw)
            .unwrap();

        assert_eq!(event.portnum_type.as_deref(), Some("POSITION_APP"));
        assert_eq!(event.latitude, Some(37.7749));
        assert_eq!(event.longitude, Some(-122.4194));
        assert_eq!(event.from_node.as_deref(), Some("1234"));
    }

    #[test]
    fn test_encrypted_packet_without_key_passes_through() {
        let key = ChannelKey::parse(KEY_B64).unwrap();
        let bytes = encrypted_position_envelope(&key);
        let raw = RawMessage::new("msh/US/2/e/LongFast/!a", bytes.clone());

        let event = service(MockMeshEventRepository::new(), None)
            .build_event(&raw)
            .unwrap();

        assert_eq!(event.payload_base64, BASE64_STANDARD.encode(&bytes));
        assert_eq!(event.packet_id, Some(7));
        assert!(event.portnum_type.is_none());
        assert!(event.latitude.is_none());
        assert!(event.parsed_data_json.is_none());
    }

    #[test]
    fn test_envelope_without_packet_is_stored_with_null_packet_fields() {
        let bytes = proto::ServiceEnvelope {
            packet: None,
            channel_id: "admin".to_string(),
            gateway_id: String::new(),
        }
        .encode_to_vec();
        let raw = RawMessage::new("msh/US/2/e/admin/!a", bytes);

        let event = service(MockMeshEventRepository::new(), None)
            .build_event(&raw)
            .unwrap();

        assert_eq!(event.node_id.as_deref(), Some("admin"));
        assert!(event.from_node.is_none());
        assert!(event.packet_id.is_none());
        assert!(event.portnum_type.is_none());
    }

    #[test]
    fn test_parse_channel_key() {
        assert!(parse_channel_key("").is_none());
        assert!(parse_channel_key("   ").is_none());
        assert!(parse_channel_key("AQ==").is_none());
        assert!(parse_channel_key(KEY_B64).is_some());
    }
}
