use crate::errors::{EntityKind, RegistryError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn require(kind: EntityKind, field: &str, value: &str) -> Result<(), RegistryError> {
    if value.trim().is_empty() {
        return Err(RegistryError::InvalidEntity {
            kind,
            reason: format!("{} cannot be empty", field),
        });
    }
    Ok(())
}

/// A physical site. The device collection lives in the registry, not here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    #[serde(rename = "uuid")]
    id: String,
    name: String,
    latitude: f64,
    longitude: f64,
}

impl Location {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Result<Self, RegistryError> {
        let id = id.into();
        let name = name.into();
        require(EntityKind::Location, "id", &id)?;
        require(EntityKind::Location, "name", &name)?;

        Ok(Self {
            id,
            name,
            latitude,
            longitude,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// Device category. Free-form, `device.default` when unspecified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceType(String);

impl DeviceType {
    pub const DEFAULT: &'static str = "device.default";

    pub fn new(category: impl Into<String>) -> Self {
        Self(category.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DeviceType {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A monitored unit installed at exactly one location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    #[serde(rename = "uuid")]
    id: String,
    name: String,
    location_id: String,
    #[serde(rename = "type")]
    device_type: DeviceType,
    manufacturer: String,
    software_version: String,
    latitude: f64,
    longitude: f64,
}

impl Device {
    pub fn builder(
        id: impl Into<String>,
        name: impl Into<String>,
        location_id: impl Into<String>,
    ) -> DeviceBuilder {
        DeviceBuilder {
            id: id.into(),
            name: name.into(),
            location_id: location_id.into(),
            device_type: DeviceType::default(),
            manufacturer: String::new(),
            software_version: String::new(),
            latitude: 0.0,
            longitude: 0.0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location_id(&self) -> &str {
        &self.location_id
    }

    pub fn device_type(&self) -> &DeviceType {
        &self.device_type
    }

    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    pub fn software_version(&self) -> &str {
        &self.software_version
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Same device, owned by another location.
    pub(crate) fn relocated(&self, location_id: &str) -> Self {
        Self {
            location_id: location_id.to_string(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeviceBuilder {
    id: String,
    name: String,
    location_id: String,
    device_type: DeviceType,
    manufacturer: String,
    software_version: String,
    latitude: f64,
    longitude: f64,
}

impl DeviceBuilder {
    pub fn device_type(mut self, device_type: DeviceType) -> Self {
        self.device_type = device_type;
        self
    }

    pub fn manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = manufacturer.into();
        self
    }

    pub fn software_version(mut self, version: impl Into<String>) -> Self {
        self.software_version = version.into();
        self
    }

    pub fn position(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = latitude;
        self.longitude = longitude;
        self
    }

    pub fn build(self) -> Result<Device, RegistryError> {
        require(EntityKind::Device, "id", &self.id)?;
        require(EntityKind::Device, "name", &self.name)?;
        require(EntityKind::Device, "location_id", &self.location_id)?;

        Ok(Device {
            id: self.id,
            name: self.name,
            location_id: self.location_id,
            device_type: self.device_type,
            manufacturer: self.manufacturer,
            software_version: self.software_version,
            latitude: self.latitude,
            longitude: self.longitude,
        })
    }
}

/// Measurement payload: a plain number or a JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TelemetryValue {
    Numeric(f64),
    Structured(serde_json::Map<String, serde_json::Value>),
}

impl std::fmt::Display for TelemetryValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TelemetryValue::Numeric(v) => write!(f, "{}", v),
            TelemetryValue::Structured(map) => {
                write!(f, "{}", serde_json::Value::Object(map.clone()))
            }
        }
    }
}

/// One timestamped measurement emitted by a device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryReading {
    timestamp: DateTime<Utc>,
    data_type: String,
    value: TelemetryValue,
}

impl TelemetryReading {
    pub fn new(
        timestamp: DateTime<Utc>,
        data_type: impl Into<String>,
        value: TelemetryValue,
    ) -> Result<Self, RegistryError> {
        let data_type = data_type.into();
        require(EntityKind::Reading, "data_type", &data_type)?;

        Ok(Self {
            timestamp,
            data_type,
            value,
        })
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn data_type(&self) -> &str {
        &self.data_type
    }

    pub fn value(&self) -> &TelemetryValue {
        &self.value
    }
}

/// Timestamps as devices put them on the wire.
///
/// Integers are epoch milliseconds, floats are epoch seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireTimestamp {
    Millis(i64),
    Seconds(f64),
    Text(DateTime<Utc>),
}

impl WireTimestamp {
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            WireTimestamp::Millis(ms) => DateTime::from_timestamp_millis(*ms),
            WireTimestamp::Seconds(secs) if secs.is_finite() => {
                let whole = secs.floor();
                let nanos = ((secs - whole) * 1e9) as u32;
                DateTime::from_timestamp(whole as i64, nanos)
            }
            WireTimestamp::Seconds(_) => None,
            WireTimestamp::Text(ts) => Some(*ts),
        }
    }
}

/// Raw telemetry payload as published on `device/<id>/<metric>`.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryMessage {
    pub timestamp: WireTimestamp,
    #[serde(alias = "type")]
    pub data_type: String,
    pub value: TelemetryValue,
}

impl TryFrom<TelemetryMessage> for TelemetryReading {
    type Error = RegistryError;

    fn try_from(message: TelemetryMessage) -> Result<Self, Self::Error> {
        let timestamp = message.timestamp.to_datetime().ok_or_else(|| {
            RegistryError::InvalidMessage("timestamp out of range".to_string())
        })?;

        TelemetryReading::new(timestamp, message.data_type, message.value)
            .map_err(|e| RegistryError::InvalidMessage(e.to_string()))
    }
}

/// A location together with the ids of the devices it holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationEntity {
    #[serde(flatten)]
    pub location: Location,
    #[serde(rename = "device_list")]
    pub device_ids: Vec<String>,
}

/// Telemetry history for one device id.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryHistory {
    /// The device is registered; the history may be empty.
    Live(Vec<TelemetryReading>),
    /// Readings retained after the device left the registry.
    Orphaned(Vec<TelemetryReading>),
}

impl TelemetryHistory {
    pub fn readings(&self) -> &[TelemetryReading] {
        match self {
            TelemetryHistory::Live(r) | TelemetryHistory::Orphaned(r) => r,
        }
    }

    pub fn is_orphaned(&self) -> bool {
        matches!(self, TelemetryHistory::Orphaned(_))
    }
}

/// Registry and store sizes at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct InventoryStats {
    pub locations: usize,
    pub devices: usize,
    pub series: usize,
    pub readings: usize,
}
