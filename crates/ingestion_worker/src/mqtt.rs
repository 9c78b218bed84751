mod config;
pub(crate) mod subscriber;
mod topic;

pub use config::MqttConfig;
pub use subscriber::run_mqtt_subscriber;
pub use topic::{parse_topic, ParsedTopic};
