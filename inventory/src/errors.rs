use thiserror::Error;

/// Outcomes of registry, telemetry and ingestion operations.
///
/// Every variant is a local, recoverable condition; collaborators decide
/// how to surface it (HTTP status, log severity).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("{kind} with id '{id}' already exists")]
    DuplicateId { kind: EntityKind, id: String },

    #[error("location '{0}' not found")]
    LocationNotFound(String),

    #[error("device '{0}' not found")]
    DeviceNotFound(String),

    #[error("device '{0}' is not registered")]
    DeviceNotRegistered(String),

    #[error("id mismatch: addressed '{expected}', payload carries '{actual}'")]
    IdMismatch { expected: String, actual: String },

    #[error("invalid telemetry message: {0}")]
    InvalidMessage(String),

    #[error("invalid {kind}: {reason}")]
    InvalidEntity { kind: EntityKind, reason: String },

    #[error("no telemetry recorded for device '{0}'")]
    TelemetryNotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Location,
    Device,
    Reading,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::Location => "location",
            EntityKind::Device => "device",
            EntityKind::Reading => "telemetry reading",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
