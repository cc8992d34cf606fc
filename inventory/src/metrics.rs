use crate::errors::Result;
use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Gauge, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref MESSAGES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "inventory_telemetry_messages_total",
        "Total telemetry messages received from MQTT"
    ))
    .unwrap();
    pub static ref ACCEPTED_MESSAGES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "inventory_telemetry_accepted_total",
        "Total telemetry readings recorded"
    ))
    .unwrap();
    pub static ref INVALID_MESSAGES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "inventory_telemetry_invalid_total",
        "Total telemetry messages rejected as malformed"
    ))
    .unwrap();
    pub static ref UNREGISTERED_MESSAGES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "inventory_telemetry_unregistered_total",
        "Total telemetry messages dropped for unregistered devices"
    ))
    .unwrap();
    pub static ref REST_ERRORS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "inventory_rest_errors_total",
        "Total REST requests answered with an error status"
    ))
    .unwrap();
    pub static ref REGISTERED_DEVICES: Gauge = Gauge::with_opts(Opts::new(
        "inventory_registered_devices",
        "Devices currently registered across all locations"
    ))
    .unwrap();
}

pub fn init_metrics() -> Result<()> {
    REGISTRY.register(Box::new(MESSAGES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ACCEPTED_MESSAGES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(INVALID_MESSAGES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(UNREGISTERED_MESSAGES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REST_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REGISTERED_DEVICES.clone()))?;
    Ok(())
}

pub fn gather_metrics() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("metrics output is not UTF-8: {}", e)).into())
}
