use common::postgres::PostgresConfig;
use common::telemetry::TelemetryConfig;
use config::{Config, ConfigError, Environment};
use ingestion_worker::mqtt::MqttConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // OpenTelemetry configuration
    /// OpenTelemetry OTLP endpoint (gRPC)
    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    /// Enable OpenTelemetry export
    #[serde(default)]
    pub otel_enabled: bool,

    /// Service name for OpenTelemetry resource
    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,

    // MQTT configuration
    /// Broker URL (mqtt://, tcp:// or mqtts://)
    #[serde(default = "default_mqtt_broker_url")]
    pub mqtt_broker_url: String,

    #[serde(default)]
    pub mqtt_username: String,

    #[serde(default)]
    pub mqtt_password: String,

    #[serde(default = "default_mqtt_client_id")]
    pub mqtt_client_id: String,

    /// Topic filter to subscribe to
    #[serde(default = "default_mqtt_root_topic")]
    pub mqtt_root_topic: String,

    #[serde(default = "default_mqtt_keep_alive_secs")]
    pub mqtt_keep_alive_secs: u64,

    /// Largest accepted MQTT packet in bytes
    #[serde(default = "default_mqtt_max_packet_size")]
    pub mqtt_max_packet_size: usize,

    #[serde(default)]
    pub mqtt_use_tls: bool,

    /// CA certificate (PEM), required when TLS is on
    #[serde(default)]
    pub mqtt_ca_path: String,

    /// Client certificate (PEM) for mutual TLS
    #[serde(default)]
    pub mqtt_cert_path: String,

    /// Client private key (PEM) for mutual TLS
    #[serde(default)]
    pub mqtt_key_path: String,

    #[serde(default = "default_mqtt_retry_delay_secs")]
    pub mqtt_retry_delay_secs: u64,

    /// Consecutive connection failures before giving up (0 = retry forever)
    #[serde(default)]
    pub mqtt_max_retry_attempts: u32,

    // Decryption
    /// Channel key, base64 or hex. Empty disables decryption.
    #[serde(default)]
    pub channel_key: String,

    // PostgreSQL configuration
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    #[serde(default = "default_postgres_max_pool_size")]
    pub postgres_max_pool_size: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

// OpenTelemetry defaults
fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_service_name() -> String {
    "meshlog".to_string()
}

// MQTT defaults
fn default_mqtt_broker_url() -> String {
    "mqtt://localhost:1883".to_string()
}

fn default_mqtt_client_id() -> String {
    "meshtastic-logger".to_string()
}

fn default_mqtt_root_topic() -> String {
    "msh/US/#".to_string()
}

fn default_mqtt_keep_alive_secs() -> u64 {
    30
}

fn default_mqtt_max_packet_size() -> usize {
    1024 * 1024
}

fn default_mqtt_retry_delay_secs() -> u64 {
    5
}

// PostgreSQL defaults
fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "meshtastic".to_string()
}

fn default_postgres_username() -> String {
    "meshlog".to_string()
}

fn default_postgres_password() -> String {
    "meshlog".to_string()
}

fn default_postgres_max_pool_size() -> usize {
    5
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("MESHLOG"))
            .build()?
            .try_deserialize()
    }

    pub fn telemetry(&self) -> TelemetryConfig {
        TelemetryConfig {
            service_name: self.otel_service_name.clone(),
            otel_endpoint: self.otel_endpoint.clone(),
            otel_enabled: self.otel_enabled,
            log_level: self.log_level.clone(),
        }
    }

    pub fn mqtt(&self) -> MqttConfig {
        MqttConfig {
            broker_url: self.mqtt_broker_url.clone(),
            username: non_empty(&self.mqtt_username),
            password: non_empty(&self.mqtt_password),
            client_id: self.mqtt_client_id.clone(),
            root_topic: self.mqtt_root_topic.clone(),
            keep_alive_secs: self.mqtt_keep_alive_secs,
            max_packet_size: self.mqtt_max_packet_size,
            use_tls: self.mqtt_use_tls,
            ca_path: non_empty(&self.mqtt_ca_path),
            cert_path: non_empty(&self.mqtt_cert_path),
            key_path: non_empty(&self.mqtt_key_path),
            retry_delay_secs: self.mqtt_retry_delay_secs,
            max_retry_attempts: self.mqtt_max_retry_attempts,
        }
    }

    pub fn postgres(&self) -> PostgresConfig {
        PostgresConfig {
            host: self.postgres_host.clone(),
            port: self.postgres_port,
            database: self.postgres_database.clone(),
            username: self.postgres_username.clone(),
            password: self.postgres_password.clone(),
            max_pool_size: self.postgres_max_pool_size,
        }
    }
}
