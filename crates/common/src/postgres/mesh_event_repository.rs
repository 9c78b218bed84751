use crate::domain::{DomainError, DomainResult, MeshEventRepository, NormalizedEvent};
use crate::postgres::PostgresClient;
use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, instrument};

const CREATE_TABLE: &str = "
CREATE TABLE IF NOT EXISTS mesh_events (
    id BIGSERIAL PRIMARY KEY,
    topic TEXT NOT NULL,
    payload TEXT NOT NULL,
    parsed_data JSONB,
    node_id TEXT,
    gateway_id TEXT,
    from_node TEXT,
    to_node TEXT,
    channel BIGINT,
    packet_id BIGINT,
    hop_limit BIGINT,
    hop_start BIGINT,
    want_ack BOOLEAN,
    via_mqtt BOOLEAN,
    rx_time BIGINT,
    rx_snr REAL,
    rx_rssi INTEGER,
    message_type INTEGER,
    portnum_type TEXT,
    want_response BOOLEAN,
    message_text TEXT,
    latitude DOUBLE PRECISION,
    longitude DOUBLE PRECISION,
    altitude INTEGER,
    position_time BIGINT,
    node_info_id TEXT,
    long_name TEXT,
    short_name TEXT,
    mac_address TEXT,
    device_metrics JSONB,
    environment_metrics JSONB,
    air_quality_metrics JSONB,
    received_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)";

const CREATE_INDEXES: [&str; 5] = [
    "CREATE INDEX IF NOT EXISTS idx_mesh_events_topic ON mesh_events (topic)",
    "CREATE INDEX IF NOT EXISTS idx_mesh_events_node_id ON mesh_events (node_id)",
    "CREATE INDEX IF NOT EXISTS idx_mesh_events_from_node ON mesh_events (from_node)",
    "CREATE INDEX IF NOT EXISTS idx_mesh_events_received_at ON mesh_events (received_at)",
    "CREATE INDEX IF NOT EXISTS idx_mesh_events_portnum_type ON mesh_events (portnum_type)",
];

const INSERT_EVENT: &str = "
INSERT INTO mesh_events (
    topic, payload, parsed_data, node_id, gateway_id, from_node, to_node,
    channel, packet_id, hop_limit, hop_start, want_ack, via_mqtt,
    rx_time, rx_snr, rx_rssi, message_type, portnum_type, want_response,
    message_text, latitude, longitude, altitude, position_time,
    node_info_id, long_name, short_name, mac_address,
    device_metrics, environment_metrics, air_quality_metrics, received_at
) VALUES (
    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
    $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30, $31, $32
)
RETURNING id";

/// PostgreSQL implementation of MeshEventRepository trait
#[derive(Clone)]
pub struct PostgresMeshEventRepository {
    client: PostgresClient,
}

impl PostgresMeshEventRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }

    /// Create the `mesh_events` table and its indexes if they do not exist
    #[instrument(skip(self))]
    pub async fn ensure_schema(&self) -> Result<()> {
        let conn = self.client.get_connection().await?;
        conn.batch_execute(CREATE_TABLE).await?;
        for statement in CREATE_INDEXES {
            conn.batch_execute(statement).await?;
        }
        info!("mesh_events schema ready");
        Ok(())
    }
}

// Postgres has no unsigned types.
fn widen(value: Option<u32>) -> Option<i64> {
    value.map(i64::from)
}

#[async_trait]
impl MeshEventRepository for PostgresMeshEventRepository {
    #[instrument(skip(self, event), fields(topic = %event.topic, portnum_type = ?event.portnum_type))]
    async fn insert(&self, event: &NormalizedEvent) -> DomainResult<i64> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::PersistenceFailed)?;

        let channel = widen(event.channel);
        let packet_id = widen(event.packet_id);
        let hop_limit = widen(event.hop_limit);
        let hop_start = widen(event.hop_start);

        let row = conn
            .query_one(
                INSERT_EVENT,
                &[
                    &event.topic,
                    &event.payload_base64,
                    &event.parsed_data_json,
                    &event.node_id,
                    &event.gateway_id,
                    &event.from_node,
                    &event.to_node,
                    &channel,
                    &packet_id,
                    &hop_limit,
                    &hop_start,
                    &event.want_ack,
                    &event.via_mqtt,
                    &event.rx_time,
                    &event.rx_snr,
                    &event.rx_rssi,
                    &event.message_type,
                    &event.portnum_type,
                    &event.want_response,
                    &event.message_text,
                    &event.latitude,
                    &event.longitude,
                    &event.altitude,
                    &event.position_time,
                    &event.node_info_id,
                    &event.long_name,
                    &event.short_name,
                    &event.mac_address,
                    &event.device_metrics,
                    &event.environment_metrics,
                    &event.air_quality_metrics,
                    &event.received_at,
                ],
            )
            .await
            .map_err(|e| DomainError::PersistenceFailed(e.into()))?;

        let id: i64 = row.get(0);
        debug!(id, "stored mesh event");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_binds_every_placeholder() {
        let columns = INSERT_EVENT
            .split("VALUES")
            .next()
            .map(|head| head.matches(',').count() + 1)
            .unwrap();
        assert_eq!(columns, 32);
        assert!(INSERT_EVENT.contains("$32"));
        assert!(!INSERT_EVENT.contains("$33"));
    }

    #[test]
    fn test_free_text_columns_are_unbounded() {
        assert!(!CREATE_TABLE.contains("VARCHAR"));
        for column in ["node_id", "gateway_id", "short_name", "long_name", "mac_address"] {
            assert!(CREATE_TABLE.contains(&format!("{} TEXT,", column)), "{}", column);
        }
    }

    #[test]
    fn test_widen_keeps_full_unsigned_range() {
        assert_eq!(widen(Some(u32::MAX)), Some(4_294_967_295));
        assert_eq!(widen(None), None);
    }
}
