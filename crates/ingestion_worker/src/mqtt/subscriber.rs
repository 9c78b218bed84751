use crate::domain::MeshEventService;
use crate::mqtt::{parse_topic, MqttConfig};
use common::domain::{DomainError, DomainResult};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS, TlsConfiguration, Transport};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument, Span};

const DEFAULT_PORT: u16 = 1883;
const DEFAULT_TLS_PORT: u16 = 8883;

/// Broker address parsed from the configured URL
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BrokerAddress<'a> {
    pub host: &'a str,
    pub port: u16,
    pub tls: bool,
}

/// Run the MQTT subscriber until cancelled or out of retries
///
/// Subscribes to the configured root topic and feeds every publish to the
/// service, one at a time, in delivery order.
#[instrument(
    name = "mqtt_subscriber",
    skip_all,
    fields(
        broker_url = %config.broker_url,
        root_topic = %config.root_topic,
    )
)]
pub async fn run_mqtt_subscriber(
    config: MqttConfig,
    shutdown_token: CancellationToken,
    service: Arc<MeshEventService>,
) -> DomainResult<()> {
    info!(
        broker_url = %config.broker_url,
        root_topic = %config.root_topic,
        "starting MQTT subscriber"
    );

    let mut retry_count: u32 = 0;

    loop {
        if shutdown_token.is_cancelled() {
            debug!("MQTT subscriber cancelled before connection");
            break;
        }

        match run_mqtt_connection(&config, &shutdown_token, Arc::clone(&service), &mut retry_count)
            .await
        {
            Ok(()) => {
                debug!("MQTT subscriber stopped cleanly");
                break;
            }
            Err(e @ DomainError::InvalidConfiguration(_)) => {
                error!(error = %e, "MQTT configuration rejected");
                return Err(e);
            }
            Err(e) => {
                error!(error = %e, "MQTT connection error");

                retry_count += 1;
                if config.retries_exhausted(retry_count) {
                    error!(
                        max_retries = config.max_retry_attempts,
                        "max retry attempts reached, stopping MQTT subscriber"
                    );
                    return Err(e);
                }

                warn!(
                    attempt = retry_count,
                    max_attempts = config.max_retry_attempts,
                    "retrying MQTT connection"
                );

                tokio::select! {
                    _ = shutdown_token.cancelled() => break,
                    _ = tokio::time::sleep(config.retry_delay()) => {}
                }
            }
        }
    }

    info!("MQTT subscriber stopped");
    Ok(())
}

/// Run a single MQTT connection session
#[instrument(name = "mqtt_connection", skip_all, fields(broker_url = %config.broker_url))]
async fn run_mqtt_connection(
    config: &MqttConfig,
    shutdown_token: &CancellationToken,
    service: Arc<MeshEventService>,
    retry_count: &mut u32,
) -> DomainResult<()> {
    let mqtt_options = build_mqtt_options(config)?;
    let (client, mut eventloop) = AsyncClient::new(mqtt_options, 100);

    // Queued until the connection is up; re-issued on every new session
    client
        .subscribe(&config.root_topic, QoS::AtMostOnce)
        .await
        .map_err(|e| DomainError::TransportFailed(format!("failed to subscribe: {}", e)))?;

    loop {
        tokio::select! {
            _ = shutdown_token.cancelled() => {
                debug!("shutdown signal received");
                if let Err(e) = client.disconnect().await {
                    debug!(error = %e, "disconnect request not sent");
                }
                return Ok(());
            }
            event = eventloop.poll() => {
                match event {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        handle_mqtt_message(&publish.topic, &publish.payload, &service).await;
                    }
                    Ok(Event::Incoming(Packet::SubAck(_))) => {
                        info!(topic = %config.root_topic, "subscribed to MQTT topic");
                    }
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        *retry_count = 0;
                        info!("connected to MQTT broker");
                    }
                    Ok(Event::Incoming(Packet::PingResp)) => {}
                    Ok(_) => {}
                    Err(e) => {
                        return Err(DomainError::TransportFailed(format!(
                            "MQTT event loop error: {}",
                            e
                        )));
                    }
                }
            }
        }
    }
}

/// Handle an incoming MQTT publish
///
/// Each message gets its own root span so that one message is one trace.
pub(crate) async fn handle_mqtt_message(topic: &str, payload: &[u8], service: &MeshEventService) {
    let span = info_span!(
        parent: Span::none(),
        "mesh_message",
        topic = %topic,
        payload_size = payload.len(),
        channel = tracing::field::Empty,
        gateway_id = tracing::field::Empty,
    );

    async {
        // Labels only; unparseable topics are still processed
        match parse_topic(topic) {
            Ok(parsed) => {
                if let Some(channel) = &parsed.channel {
                    Span::current().record("channel", channel.as_str());
                }
                if let Some(gateway_id) = &parsed.gateway_id {
                    Span::current().record("gateway_id", gateway_id.as_str());
                }
            }
            Err(e) => debug!(error = %e, "topic not in mesh format"),
        }

        service.on_message(topic, payload).await;
    }
    .instrument(span)
    .await
}

fn build_mqtt_options(config: &MqttConfig) -> DomainResult<MqttOptions> {
    config.validate()?;
    let address = parse_broker_url(&config.broker_url)?;

    let mut mqtt_options = MqttOptions::new(&config.client_id, address.host, address.port);
    mqtt_options.set_keep_alive(config.keep_alive());
    mqtt_options.set_clean_session(true);
    mqtt_options.set_max_packet_size(config.max_packet_size, config.max_packet_size);

    if let Some(username) = config.username.as_deref().filter(|u| !u.is_empty()) {
        mqtt_options.set_credentials(username, config.password.as_deref().unwrap_or_default());
    }

    if config.use_tls || address.tls {
        mqtt_options.set_transport(build_tls_transport(config)?);
    }

    Ok(mqtt_options)
}

fn build_tls_transport(config: &MqttConfig) -> DomainResult<Transport> {
    let ca_path = config.ca_path.as_deref().ok_or_else(|| {
        DomainError::InvalidConfiguration("TLS requires a CA certificate path".to_string())
    })?;
    let ca = read_pem(ca_path)?;

    let client_auth = match (config.cert_path.as_deref(), config.key_path.as_deref()) {
        (Some(cert), Some(key)) => Some((read_pem(cert)?, read_pem(key)?)),
        (None, None) => None,
        _ => {
            return Err(DomainError::InvalidConfiguration(
                "client certificate and key must be configured together".to_string(),
            ))
        }
    };

    Ok(Transport::tls_with_config(TlsConfiguration::Simple {
        ca,
        alpn: None,
        client_auth,
    }))
}

fn read_pem(path: &str) -> DomainResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        DomainError::InvalidConfiguration(format!("failed to read '{}': {}", path, e))
    })
}

/// Parse broker URL in format mqtt://host:port, tcp://host:port,
/// mqtts://host:port or host:port
pub(crate) fn parse_broker_url(url: &str) -> DomainResult<BrokerAddress<'_>> {
    let (rest, tls) = if let Some(rest) = url.strip_prefix("mqtts://") {
        (rest, true)
    } else if let Some(rest) = url.strip_prefix("ssl://") {
        (rest, true)
    } else {
        let rest = url.trim_start_matches("mqtt://");
        (rest.trim_start_matches("tcp://"), false)
    };
    let default_port = if tls { DEFAULT_TLS_PORT } else { DEFAULT_PORT };

    let parts: Vec<&str> = rest.split(':').collect();
    let (host, port) = match parts.as_slice() {
        [host] => (*host, default_port),
        [host, port] => {
            let port = port.parse::<u16>().map_err(|_| {
                DomainError::InvalidConfiguration(format!("Invalid port in broker URL: {}", port))
            })?;
            (*host, port)
        }
        _ => {
            return Err(DomainError::InvalidConfiguration(format!(
                "Invalid broker URL format: {}",
                url
            )))
        }
    };

    if host.is_empty() {
        return Err(DomainError::InvalidConfiguration(format!(
            "Missing host in broker URL: {}",
            url
        )));
    }

    Ok(BrokerAddress { host, port, tls })
}
