mod config;

use common::postgres::{PostgresClient, PostgresMeshEventRepository};
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryProviders};
use config::ServiceConfig;
use ingestion_worker::{IngestionWorker, IngestionWorkerConfig};
use meshlog_runner::Runner;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let telemetry_providers: Option<TelemetryProviders> = match init_telemetry(&config.telemetry()) {
        Ok(providers) => providers,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        otel_enabled = config.otel_enabled,
        broker_url = %config.mqtt_broker_url,
        root_topic = %config.mqtt_root_topic,
        "starting meshlog service"
    );
    debug!(
        postgres_host = %config.postgres_host,
        postgres_database = %config.postgres_database,
        mqtt_use_tls = config.mqtt_use_tls,
        "configuration loaded"
    );

    let repository = match initialize_repository(&config).await {
        Ok(repository) => repository,
        Err(e) => {
            error!("Failed to initialize PostgreSQL: {:#}", e);
            shutdown_telemetry(telemetry_providers);
            std::process::exit(1);
        }
    };

    let ingestion_worker = IngestionWorker::new(
        repository,
        IngestionWorkerConfig {
            mqtt: config.mqtt(),
            channel_key: config.channel_key.clone(),
        },
    );

    Runner::new()
        .with_boxed_process("ingestion_worker", ingestion_worker.into_runner_process())
        .with_closer(move || async move {
            info!("flushing telemetry");
            shutdown_telemetry(telemetry_providers);
            Ok(())
        })
        .with_closer_timeout(Duration::from_secs(10))
        .run()
        .await;
}

async fn initialize_repository(
    config: &ServiceConfig,
) -> anyhow::Result<Arc<PostgresMeshEventRepository>> {
    info!("initializing PostgreSQL...");
    let client = PostgresClient::from_config(&config.postgres())?;
    client.ping().await?;

    let repository = PostgresMeshEventRepository::new(client);
    repository.ensure_schema().await?;
    Ok(Arc::new(repository))
}
