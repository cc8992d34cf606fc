mod telemetry;

use clap::Parser;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use std::time::Duration;
use telemetry::TelemetryMessage;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "simulator", about = "Publishes simulated device telemetry over MQTT")]
struct Args {
    #[arg(long, env = "MQTT_BROKER", default_value = "localhost")]
    broker: String,

    #[arg(long, env = "MQTT_PORT", default_value_t = 1883)]
    port: u16,

    /// Number of simulated devices, named d0001, d0002, ...
    #[arg(long, env = "DEVICES", default_value_t = 1)]
    devices: usize,

    /// Messages per second across all devices
    #[arg(long, env = "RATE", default_value_t = 1)]
    rate: u64,

    #[arg(long, env = "METRIC", default_value = "temperature")]
    metric: String,

    /// Stop after this many messages (0 = run forever)
    #[arg(long, default_value_t = 0)]
    count: u64,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting telemetry simulator");
    info!(
        "Broker: {}:{}, Rate: {} msg/s, Devices: {}, Metric: {}",
        args.broker, args.port, args.rate, args.devices, args.metric
    );

    let client_id = format!("sim-{}", uuid::Uuid::new_v4());
    let mut mqtt_options = MqttOptions::new(client_id, &args.broker, args.port);
    mqtt_options.set_keep_alive(Duration::from_secs(30));
    mqtt_options.set_clean_session(true);

    let (client, mut eventloop) = AsyncClient::new(mqtt_options, 1000);

    // Spawn eventloop handler
    tokio::spawn(async move {
        loop {
            if let Err(e) = eventloop.poll().await {
                error!("MQTT eventloop error: {}", e);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    });

    let devices = args.devices.max(1);
    let mut ticker = tokio::time::interval(telemetry::publish_period(args.rate));
    let mut rng = rand::thread_rng();
    let mut sent = 0u64;

    loop {
        ticker.tick().await;

        let device_id = telemetry::device_id((sent % devices as u64) as usize);
        let message = TelemetryMessage::sample(&mut rng, &args.metric);
        let payload = match serde_json::to_string(&message) {
            Ok(p) => p,
            Err(e) => {
                error!("Failed to serialize telemetry: {}", e);
                continue;
            }
        };

        let topic = telemetry::topic(&device_id, &args.metric);
        match client.publish(&topic, QoS::AtMostOnce, false, payload).await {
            Ok(()) => sent += 1,
            Err(e) => warn!("Failed to publish to {}: {}", topic, e),
        }

        if sent > 0 && sent % 1000 == 0 {
            info!("Published {} messages", sent);
        }
        if args.count > 0 && sent >= args.count {
            info!("Published {} messages, stopping", sent);
            break;
        }
    }
}
