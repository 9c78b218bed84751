use crate::domain::{parse_channel_key, MeshEventService};
use crate::mqtt::{run_mqtt_subscriber, MqttConfig};
use common::domain::MeshEventRepository;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct IngestionWorkerConfig {
    pub mqtt: MqttConfig,
    /// Channel key as base64 or hex text; empty disables decryption
    pub channel_key: String,
}

/// Wires the MQTT subscriber to the mesh event pipeline
pub struct IngestionWorker {
    mqtt_config: MqttConfig,
    service: Arc<MeshEventService>,
}

impl IngestionWorker {
    pub fn new(repository: Arc<dyn MeshEventRepository>, config: IngestionWorkerConfig) -> Self {
        let channel_key = parse_channel_key(&config.channel_key);
        info!(
            decryption_enabled = channel_key.is_some(),
            root_topic = %config.mqtt.root_topic,
            "initializing ingestion worker"
        );

        Self {
            mqtt_config: config.mqtt,
            service: Arc::new(MeshEventService::new(repository, channel_key)),
        }
    }

    #[allow(clippy::type_complexity)]
    pub fn into_runner_process(
        self,
    ) -> Box<
        dyn FnOnce(
                CancellationToken,
            ) -> std::pin::Pin<
                Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
            > + Send,
    > {
        Box::new(move |ctx| {
            Box::pin(async move {
                run_mqtt_subscriber(self.mqtt_config, ctx, self.service).await?;
                Ok(())
            })
        })
    }
}
