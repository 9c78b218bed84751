use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One transport delivery, consumed by a single pass through the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub received_at: DateTime<Utc>,
}

impl RawMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            received_at: Utc::now(),
        }
    }
}

/// Flat, storage-ready record for one received message.
///
/// Fields that do not apply to the message are `None`. Only one group of
/// typed fields (text, position, node identity, telemetry or `parsed_data`)
/// is ever populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedEvent {
    pub topic: String,
    /// Base64 of the original envelope bytes
    pub payload_base64: String,
    pub received_at: DateTime<Utc>,

    // Envelope
    pub node_id: Option<String>,
    pub gateway_id: Option<String>,

    // Packet
    pub from_node: Option<String>,
    pub to_node: Option<String>,
    pub channel: Option<u32>,
    pub packet_id: Option<u32>,
    pub hop_limit: Option<u32>,
    pub hop_start: Option<u32>,
    pub want_ack: Option<bool>,
    pub via_mqtt: Option<bool>,
    pub rx_time: Option<i64>,
    pub rx_snr: Option<f32>,
    pub rx_rssi: Option<i32>,

    // Decoded payload
    pub message_type: Option<i32>,
    pub portnum_type: Option<String>,
    pub want_response: Option<bool>,

    // Text message
    pub message_text: Option<String>,

    // Position
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<i32>,
    pub position_time: Option<i64>,

    // Node identity
    pub node_info_id: Option<String>,
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    pub mac_address: Option<String>,

    // Telemetry
    pub device_metrics: Option<serde_json::Value>,
    pub environment_metrics: Option<serde_json::Value>,
    pub air_quality_metrics: Option<serde_json::Value>,

    // Opaque fallback
    pub parsed_data_json: Option<serde_json::Value>,
}

impl NormalizedEvent {
    /// Event with only the reception fields set
    pub fn empty(topic: impl Into<String>, payload_base64: String, received_at: DateTime<Utc>) -> Self {
        Self {
            topic: topic.into(),
            payload_base64,
            received_at,
            node_id: None,
            gateway_id: None,
            from_node: None,
            to_node: None,
            channel: None,
            packet_id: None,
            hop_limit: None,
            hop_start: None,
            want_ack: None,
            via_mqtt: None,
            rx_time: None,
            rx_snr: None,
            rx_rssi: None,
            message_type: None,
            portnum_type: None,
            want_response: None,
            message_text: None,
            latitude: None,
            longitude: None,
            altitude: None,
            position_time: None,
            node_info_id: None,
            long_name: None,
            short_name: None,
            mac_address: None,
            device_metrics: None,
            environment_metrics: None,
            air_quality_metrics: None,
            parsed_data_json: None,
        }
    }
}

/// Storage collaborator for normalized events
/// Infrastructure layer (e.g., PostgreSQL) implements this trait
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MeshEventRepository: Send + Sync {
    /// Persist a single event and return its generated id
    async fn insert(&self, event: &NormalizedEvent) -> DomainResult<i64>;
}
