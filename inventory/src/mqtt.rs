use crate::config::MqttConfig;
use crate::errors::{Error, Result};
use crate::ingest::{IngestOutcome, TelemetryIngestor};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Device id and metric carried by a `device/<id>/<metric>` topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryTopic<'a> {
    pub device_id: &'a str,
    pub metric: &'a str,
}

pub fn parse_topic(topic: &str) -> Option<TelemetryTopic<'_>> {
    let mut levels = topic.split('/');
    match (levels.next(), levels.next(), levels.next(), levels.next()) {
        (Some("device"), Some(device_id), Some(metric), None)
            if !device_id.is_empty() && !metric.is_empty() =>
        {
            Some(TelemetryTopic { device_id, metric })
        }
        _ => None,
    }
}

/// MQTT filter matching with `+` and `#` wildcards.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => continue,
            (Some(f), Some(t)) if f == t => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

pub async fn run_mqtt(config: MqttConfig, client_id: String, ingestor: TelemetryIngestor) -> Result<()> {
    info!(
        "Connecting to MQTT broker at {}:{}",
        config.broker_ip, config.broker_port
    );

    let mut mqtt_options = MqttOptions::new(client_id, &config.broker_ip, config.broker_port);
    mqtt_options.set_keep_alive(Duration::from_secs(60));
    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        info!("Using MQTT credentials for user {}", username);
        mqtt_options.set_credentials(username, password);
    }

    let (client, mut eventloop) = AsyncClient::new(mqtt_options, 1000);

    let topic = config.target_telemetry_topic.clone();
    client
        .subscribe(&topic, QoS::AtMostOnce)
        .await
        .map_err(Error::Mqtt)?;

    info!("Subscribed to {}", topic);

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                // Clean sessions drop subscriptions, so renew on every connect.
                if let Err(e) = client.try_subscribe(&topic, QoS::AtMostOnce) {
                    warn!("Failed to renew subscription to {}: {}", topic, e);
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                handle_publish(&ingestor, &topic, &publish.topic, &publish.payload);
            }
            Ok(_) => {}
            Err(e) => {
                error!("MQTT error: {}", e);
                // rumqttc reconnects on the next poll
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

fn handle_publish(
    ingestor: &TelemetryIngestor,
    filter: &str,
    topic: &str,
    payload: &[u8],
) -> Option<IngestOutcome> {
    if !topic_matches(filter, topic) {
        debug!("Ignoring message on unmatched topic {}", topic);
        return None;
    }

    let Some(parsed) = parse_topic(topic) else {
        warn!("Ignoring message on malformed topic {}", topic);
        return None;
    };

    debug!(
        "Received {} from device {}, size: {} bytes",
        parsed.metric,
        parsed.device_id,
        payload.len()
    );
    Some(ingestor.ingest(parsed.device_id, payload))
}
