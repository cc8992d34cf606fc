use crate::model::TelemetryReading;
use dashmap::DashMap;

/// Append-only per-device reading log.
///
/// No existence checks happen here; the manager decides whether a reading
/// may be appended. Series are sharded, so appends for different devices
/// rarely contend.
#[derive(Debug, Default)]
pub struct TelemetryStore {
    series: DashMap<String, Vec<TelemetryReading>>,
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends to the device's series, creating it on first write.
    pub fn append(&self, device_id: &str, reading: TelemetryReading) {
        self.series
            .entry(device_id.to_string())
            .or_default()
            .push(reading);
    }

    /// Full ordered series, or `None` when nothing was ever recorded.
    pub fn get(&self, device_id: &str) -> Option<Vec<TelemetryReading>> {
        self.series.get(device_id).map(|series| series.clone())
    }

    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    pub fn reading_count(&self) -> usize {
        self.series.iter().map(|series| series.len()).sum()
    }
}
