use crate::errors::RegistryError;
use crate::manager::InventoryManager;
use crate::metrics::{
    ACCEPTED_MESSAGES_TOTAL, INVALID_MESSAGES_TOTAL, MESSAGES_TOTAL, UNREGISTERED_MESSAGES_TOTAL,
};
use crate::model::{TelemetryMessage, TelemetryReading};
use std::sync::Arc;
use tracing::{debug, warn};

/// What happened to one inbound telemetry message.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Accepted,
    /// Payload did not parse into a reading. Carries the reason.
    Invalid(String),
    /// Device unknown at the time of ingestion; the message is dropped.
    Unregistered,
}

/// Turns raw MQTT deliveries into `record_telemetry` calls.
///
/// Never fails: every message ends up counted and logged so the delivery
/// loop keeps running. Unknown devices are dropped, not queued.
#[derive(Debug, Clone)]
pub struct TelemetryIngestor {
    manager: Arc<InventoryManager>,
}

impl TelemetryIngestor {
    pub fn new(manager: Arc<InventoryManager>) -> Self {
        Self { manager }
    }

    pub fn ingest(&self, device_id: &str, payload: &[u8]) -> IngestOutcome {
        MESSAGES_TOTAL.inc();

        let reading = match parse_reading(payload) {
            Ok(reading) => reading,
            Err(e) => {
                INVALID_MESSAGES_TOTAL.inc();
                warn!("Rejected telemetry from {}: {}", device_id, e);
                return IngestOutcome::Invalid(e.to_string());
            }
        };

        match self.manager.record_telemetry(device_id, reading) {
            Ok(()) => {
                ACCEPTED_MESSAGES_TOTAL.inc();
                debug!("Telemetry recorded for device {}", device_id);
                IngestOutcome::Accepted
            }
            Err(RegistryError::DeviceNotRegistered(_)) => {
                UNREGISTERED_MESSAGES_TOTAL.inc();
                warn!("Dropping telemetry for unregistered device {}", device_id);
                IngestOutcome::Unregistered
            }
            Err(e) => {
                INVALID_MESSAGES_TOTAL.inc();
                warn!("Rejected telemetry from {}: {}", device_id, e);
                IngestOutcome::Invalid(e.to_string())
            }
        }
    }
}

/// Parses a payload into the reading shape, or `InvalidMessage`.
pub fn parse_reading(payload: &[u8]) -> Result<TelemetryReading, RegistryError> {
    let message = serde_json::from_slice::<TelemetryMessage>(payload)
        .map_err(|e| RegistryError::InvalidMessage(format!("JSON parse error: {}", e)))?;

    TelemetryReading::try_from(message)
}
