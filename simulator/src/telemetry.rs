use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use std::time::Duration;

/// Reading as devices publish it on `device/<id>/<metric>`.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryMessage {
    /// Epoch milliseconds
    pub timestamp: i64,
    pub data_type: String,
    pub value: f64,
}

impl TelemetryMessage {
    pub fn sample(rng: &mut impl Rng, metric: &str) -> Self {
        let value = match metric {
            "temperature" => {
                if rng.gen_bool(0.05) {
                    rng.gen_range(-20.0..60.0) // 5% outliers
                } else {
                    rng.gen_range(18.0..26.0)
                }
            }
            "humidity" => rng.gen_range(30.0..80.0),
            _ => rng.gen_range(0.0..100.0),
        };

        Self {
            timestamp: Utc::now().timestamp_millis(),
            data_type: metric.to_string(),
            value,
        }
    }
}

pub fn topic(device_id: &str, metric: &str) -> String {
    format!("device/{}/{}", device_id, metric)
}

/// Device ids in the inventory's `d0001` style.
/// Interval between publishes for `rate` messages per second, never zero.
pub fn publish_period(rate: u64) -> Duration {
    Duration::from_micros(1_000_000 / rate.max(1)).max(Duration::from_micros(1))
}

pub fn device_id(index: usize) -> String {
    format!("d{:04}", index + 1)
}
