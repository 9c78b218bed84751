use common::domain::{DomainError, DomainResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    /// `mqtt://host:port`, `tcp://host:port`, `mqtts://host:port` or `host:port`
    pub broker_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
    /// Topic filter to subscribe to (e.g. `msh/US/#`)
    pub root_topic: String,
    pub keep_alive_secs: u64,
    /// Largest MQTT packet accepted or sent, in bytes
    pub max_packet_size: usize,

    pub use_tls: bool,
    pub ca_path: Option<String>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,

    /// Delay before reconnecting after a connection error
    pub retry_delay_secs: u64,
    /// Consecutive failed connections before giving up; 0 retries forever
    pub max_retry_attempts: u32,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_url: "mqtt://localhost:1883".to_string(),
            username: None,
            password: None,
            client_id: "meshtastic-logger".to_string(),
            root_topic: "msh/US/#".to_string(),
            keep_alive_secs: 30,
            max_packet_size: 1024 * 1024,
            use_tls: false,
            ca_path: None,
            cert_path: None,
            key_path: None,
            retry_delay_secs: 5,
            max_retry_attempts: 0,
        }
    }
}

impl MqttConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    /// Reject settings the MQTT client would refuse or panic on
    pub fn validate(&self) -> DomainResult<()> {
        if self.client_id.is_empty() || self.client_id.starts_with(' ') {
            return Err(DomainError::InvalidConfiguration(format!(
                "invalid MQTT client id '{}'",
                self.client_id
            )));
        }
        if self.root_topic.is_empty() {
            return Err(DomainError::InvalidConfiguration(
                "MQTT root topic must not be empty".to_string(),
            ));
        }
        if self.max_packet_size == 0 {
            return Err(DomainError::InvalidConfiguration(
                "MQTT max packet size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn retries_exhausted(&self, attempts: u32) -> bool {
        self.max_retry_attempts != 0 && attempts >= self.max_retry_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_max_attempts_retries_forever() {
        let config = MqttConfig::default();
        assert!(!config.retries_exhausted(1));
        assert!(!config.retries_exhausted(u32::MAX));
    }

    #[test]
    fn test_retry_cap() {
        let config = MqttConfig {
            max_retry_attempts: 3,
            ..Default::default()
        };
        assert!(!config.retries_exhausted(2));
        assert!(config.retries_exhausted(3));
        assert_eq!(config.retry_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(MqttConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_client_id_is_rejected() {
        for client_id in ["", " logger"] {
            let config = MqttConfig {
                client_id: client_id.to_string(),
                ..Default::default()
            };
            assert!(matches!(
                config.validate(),
                Err(DomainError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn test_zero_packet_size_is_rejected() {
        let config = MqttConfig {
            max_packet_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
