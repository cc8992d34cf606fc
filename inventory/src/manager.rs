use crate::errors::RegistryError;
use crate::model::{
    Device, DeviceType, InventoryStats, Location, LocationEntity, TelemetryHistory,
    TelemetryReading,
};
use crate::registry::LocationRegistry;
use crate::store::TelemetryStore;
use parking_lot::RwLock;

type Result<T> = std::result::Result<T, RegistryError>;

/// Single coordination point for the registry and the telemetry store.
///
/// Lock discipline:
/// - registry mutations take the registry write lock;
/// - reads and telemetry appends take the registry read lock, so they run
///   in parallel with each other;
/// - `record_telemetry` appends while still holding the read lock it used
///   to resolve the device, so a concurrent device or location removal is
///   ordered strictly before or after the append.
///
/// Lock order is always registry, then store. No I/O happens under either.
#[derive(Debug)]
pub struct InventoryManager {
    registry: RwLock<LocationRegistry>,
    telemetry: TelemetryStore,
}

impl InventoryManager {
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(LocationRegistry::new()),
            telemetry: TelemetryStore::new(),
        }
    }

    /// Registers the `l0001` / `d0001` demo pair.
    pub fn seed_demo_data(&self) -> Result<()> {
        let location = Location::new("l0001", "TestBuilding", 48.312321, 10.433423211)?;
        let device = Device::builder("d0001", "demo-device", location.id())
            .device_type(DeviceType::default())
            .manufacturer("ACME Inc")
            .software_version("0.0.1beta")
            .position(48.312321, 10.433423211)
            .build()?;

        let mut registry = self.registry.write();
        registry.register(location)?;
        registry.add_device("l0001", device)
    }

    // Locations

    pub fn register_location(&self, location: Location) -> Result<()> {
        self.registry.write().register(location)
    }

    pub fn replace_location(&self, location: Location) -> Result<()> {
        self.registry.write().replace(location)
    }

    /// Cascades to the location's devices. Their telemetry is kept.
    pub fn remove_location(&self, location_id: &str) {
        self.registry.write().remove(location_id);
    }

    pub fn get_location(&self, location_id: &str) -> Result<LocationEntity> {
        self.registry
            .read()
            .get(location_id)
            .ok_or_else(|| RegistryError::LocationNotFound(location_id.to_string()))
    }

    /// Snapshot of all locations at the instant of the call.
    pub fn list_locations(&self) -> Vec<LocationEntity> {
        self.registry.read().list()
    }

    pub fn location_exists(&self, location_id: &str) -> bool {
        self.registry.read().exists(location_id)
    }

    // Devices

    pub fn add_device(&self, location_id: &str, device: Device) -> Result<()> {
        self.registry.write().add_device(location_id, device)
    }

    pub fn replace_device(&self, location_id: &str, device_id: &str, device: Device) -> Result<()> {
        self.registry
            .write()
            .replace_device(location_id, device_id, device)
    }

    pub fn remove_device(&self, location_id: &str, device_id: &str) {
        self.registry.write().remove_device(location_id, device_id);
    }

    pub fn move_device(&self, device_id: &str, target_location_id: &str) -> Result<Device> {
        self.registry
            .write()
            .move_device(device_id, target_location_id)
    }

    pub fn get_device_by_id(&self, device_id: &str) -> Result<Device> {
        self.registry
            .read()
            .device(device_id)
            .cloned()
            .ok_or_else(|| RegistryError::DeviceNotFound(device_id.to_string()))
    }

    pub fn list_devices_by_location(&self, location_id: &str) -> Result<Vec<Device>> {
        self.registry.read().devices_of(location_id)
    }

    // Telemetry

    /// Appends a reading if and only if the device is registered at the
    /// instant the registry read lock is held.
    pub fn record_telemetry(&self, device_id: &str, reading: TelemetryReading) -> Result<()> {
        let registry = self.registry.read();
        if !registry.contains_device(device_id) {
            return Err(RegistryError::DeviceNotRegistered(device_id.to_string()));
        }
        self.telemetry.append(device_id, reading);
        drop(registry);
        Ok(())
    }

    pub fn get_telemetry_by_device(&self, device_id: &str) -> Result<TelemetryHistory> {
        let registry = self.registry.read();
        let registered = registry.contains_device(device_id);

        match (self.telemetry.get(device_id), registered) {
            (Some(readings), true) => Ok(TelemetryHistory::Live(readings)),
            (None, true) => Ok(TelemetryHistory::Live(Vec::new())),
            (Some(readings), false) => Ok(TelemetryHistory::Orphaned(readings)),
            (None, false) => Err(RegistryError::TelemetryNotFound(device_id.to_string())),
        }
    }

    pub fn stats(&self) -> InventoryStats {
        let registry = self.registry.read();
        InventoryStats {
            locations: registry.location_count(),
            devices: registry.device_count(),
            series: self.telemetry.series_count(),
            readings: self.telemetry.reading_count(),
        }
    }
}

impl Default for InventoryManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EntityKind;
    use crate::model::TelemetryValue;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    fn location(id: &str) -> Location {
        Location::new(id, "Building", 48.3, 10.4).unwrap()
    }

    fn device(id: &str, location_id: &str) -> Device {
        Device::builder(id, "sensor", location_id).build().unwrap()
    }

    fn reading(value: f64) -> TelemetryReading {
        TelemetryReading::new(Utc::now(), "temperature", TelemetryValue::Numeric(value)).unwrap()
    }

    #[test]
    fn test_demo_scenario() {
        let manager = InventoryManager::new();
        manager
            .register_location(Location::new("l0001", "TestBuilding", 48.312321, 10.433423211).unwrap())
            .unwrap();
        manager.add_device("l0001", device("d0001", "l0001")).unwrap();

        let devices = manager.list_devices_by_location("l0001").unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].id(), "d0001");

        let r = reading(21.0);
        manager.record_telemetry("d0001", r.clone()).unwrap();
        let history = manager.get_telemetry_by_device("d0001").unwrap();
        assert_eq!(history, TelemetryHistory::Live(vec![r]));

        manager.remove_location("l0001");
        assert_eq!(
            manager.get_device_by_id("d0001"),
            Err(RegistryError::DeviceNotFound("d0001".to_string()))
        );
    }

    #[test]
    fn test_seed_demo_data() {
        let manager = InventoryManager::new();
        manager.seed_demo_data().unwrap();
        assert_eq!(manager.get_location("l0001").unwrap().location.name(), "TestBuilding");
        assert_eq!(manager.get_device_by_id("d0001").unwrap().manufacturer(), "ACME Inc");
        assert!(manager.seed_demo_data().is_err());
    }

    #[test]
    fn test_duplicate_registration_keeps_first() {
        let manager = InventoryManager::new();
        manager.register_location(location("l1")).unwrap();

        let second = Location::new("l1", "Impostor", 0.0, 0.0).unwrap();
        assert!(matches!(
            manager.register_location(second),
            Err(RegistryError::DuplicateId { kind: EntityKind::Location, .. })
        ));
        assert_eq!(manager.get_location("l1").unwrap().location.name(), "Building");
    }

    #[test]
    fn test_device_lookup_is_system_wide() {
        let manager = InventoryManager::new();
        manager.register_location(location("l1")).unwrap();
        manager.register_location(location("l2")).unwrap();
        manager.add_device("l2", device("d7", "l2")).unwrap();

        assert_eq!(manager.get_device_by_id("d7").unwrap().location_id(), "l2");
    }

    #[test]
    fn test_remove_location_cascades() {
        let manager = InventoryManager::new();
        manager.register_location(location("l1")).unwrap();
        manager.add_device("l1", device("d1", "l1")).unwrap();
        manager.add_device("l1", device("d2", "l1")).unwrap();

        manager.remove_location("l1");
        assert_eq!(
            manager.list_devices_by_location("l1"),
            Err(RegistryError::LocationNotFound("l1".to_string()))
        );
        assert!(manager.get_device_by_id("d1").is_err());
        assert!(manager.get_device_by_id("d2").is_err());
        assert!(!manager.location_exists("l1"));
    }

    #[test]
    fn test_removals_are_idempotent() {
        let manager = InventoryManager::new();
        manager.remove_location("nope");
        manager.remove_device("nope", "d1");

        manager.register_location(location("l1")).unwrap();
        manager.add_device("l1", device("d1", "l1")).unwrap();
        manager.remove_device("l1", "d1");
        manager.remove_device("l1", "d1");
        assert!(manager.list_devices_by_location("l1").unwrap().is_empty());
    }

    #[test]
    fn test_telemetry_requires_registered_device() {
        let manager = InventoryManager::new();
        assert_eq!(
            manager.record_telemetry("ghost", reading(1.0)),
            Err(RegistryError::DeviceNotRegistered("ghost".to_string()))
        );
        assert_eq!(
            manager.get_telemetry_by_device("ghost"),
            Err(RegistryError::TelemetryNotFound("ghost".to_string()))
        );
    }

    #[test]
    fn test_telemetry_in_append_order() {
        let manager = InventoryManager::new();
        manager.register_location(location("l1")).unwrap();
        manager.add_device("l1", device("d1", "l1")).unwrap();

        for v in 0..5 {
            manager.record_telemetry("d1", reading(v as f64)).unwrap();
        }

        let history = manager.get_telemetry_by_device("d1").unwrap();
        let values: Vec<_> = history.readings().iter().map(|r| r.value().clone()).collect();
        let expected: Vec<_> = (0..5).map(|v| TelemetryValue::Numeric(v as f64)).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn test_telemetry_history_states() {
        let manager = InventoryManager::new();
        manager.register_location(location("l1")).unwrap();
        manager.add_device("l1", device("d1", "l1")).unwrap();

        // Registered, nothing recorded yet.
        assert_eq!(
            manager.get_telemetry_by_device("d1"),
            Ok(TelemetryHistory::Live(Vec::new()))
        );

        manager.record_telemetry("d1", reading(3.0)).unwrap();
        manager.remove_device("l1", "d1");

        let history = manager.get_telemetry_by_device("d1").unwrap();
        assert!(history.is_orphaned());
        assert_eq!(history.readings().len(), 1);

        // Re-registering the id revives the retained series.
        manager.add_device("l1", device("d1", "l1")).unwrap();
        let history = manager.get_telemetry_by_device("d1").unwrap();
        assert!(!history.is_orphaned());
        assert_eq!(history.readings().len(), 1);
    }

    #[test]
    fn test_remove_location_orphans_telemetry() {
        let manager = InventoryManager::new();
        manager.register_location(location("l1")).unwrap();
        manager.add_device("l1", device("d1", "l1")).unwrap();
        manager.record_telemetry("d1", reading(7.5)).unwrap();

        manager.remove_location("l1");

        let history = manager.get_telemetry_by_device("d1").unwrap();
        assert!(history.is_orphaned());
        assert_eq!(history.readings().len(), 1);
        assert_eq!(history.readings()[0].value(), &TelemetryValue::Numeric(7.5));
        assert_eq!(
            manager.record_telemetry("d1", reading(8.0)),
            Err(RegistryError::DeviceNotRegistered("d1".to_string()))
        );
        assert_eq!(manager.get_telemetry_by_device("d1").unwrap().readings().len(), 1);
    }

    #[test]
    fn test_replace_device_rejects_mismatch() {
        let manager = InventoryManager::new();
        manager.register_location(location("l1")).unwrap();
        manager.add_device("l1", device("d1", "l1")).unwrap();

        assert!(matches!(
            manager.replace_device("l1", "d1", device("d2", "l1")),
            Err(RegistryError::IdMismatch { .. })
        ));
        assert!(matches!(
            manager.replace_device("l1", "d1", device("d1", "l2")),
            Err(RegistryError::IdMismatch { .. })
        ));
    }

    #[test]
    fn test_move_device_keeps_telemetry_flowing() {
        let manager = InventoryManager::new();
        manager.register_location(location("l1")).unwrap();
        manager.register_location(location("l2")).unwrap();
        manager.add_device("l1", device("d1", "l1")).unwrap();
        manager.record_telemetry("d1", reading(1.0)).unwrap();

        manager.move_device("d1", "l2").unwrap();
        manager.remove_location("l1");

        manager.record_telemetry("d1", reading(2.0)).unwrap();
        let history = manager.get_telemetry_by_device("d1").unwrap();
        assert_eq!(history.readings().len(), 2);
        assert_eq!(manager.get_device_by_id("d1").unwrap().location_id(), "l2");
    }

    #[test]
    fn test_concurrent_register_single_winner() {
        const N: usize = 16;
        let manager = InventoryManager::new();
        let barrier = Barrier::new(N);
        let wins = AtomicUsize::new(0);
        let duplicates = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for i in 0..N {
                let (manager, barrier, wins, duplicates) = (&manager, &barrier, &wins, &duplicates);
                s.spawn(move || {
                    let candidate = Location::new("l-race", format!("writer {}", i), 0.0, 0.0).unwrap();
                    barrier.wait();
                    match manager.register_location(candidate) {
                        Ok(()) => wins.fetch_add(1, Ordering::SeqCst),
                        Err(RegistryError::DuplicateId { .. }) => duplicates.fetch_add(1, Ordering::SeqCst),
                        Err(e) => panic!("unexpected error: {}", e),
                    };
                });
            }
        });

        assert_eq!(wins.load(Ordering::SeqCst), 1);
        assert_eq!(duplicates.load(Ordering::SeqCst), N - 1);
    }

    #[test]
    fn test_concurrent_add_device_across_locations() {
        const N: usize = 8;
        let manager = InventoryManager::new();
        for i in 0..N {
            manager.register_location(location(&format!("l{}", i))).unwrap();
        }
        let barrier = Barrier::new(N);
        let wins = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for i in 0..N {
                let (manager, barrier, wins) = (&manager, &barrier, &wins);
                s.spawn(move || {
                    let location_id = format!("l{}", i);
                    let candidate = device("shared", &location_id);
                    barrier.wait();
                    if manager.add_device(&location_id, candidate).is_ok() {
                        wins.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(wins.load(Ordering::SeqCst), 1);
        assert_eq!(manager.stats().devices, 1);
    }

    #[test]
    fn test_record_races_removal() {
        let manager = InventoryManager::new();
        manager.register_location(location("l1")).unwrap();
        manager.add_device("l1", device("d1", "l1")).unwrap();

        let accepted = AtomicUsize::new(0);
        let rejected_after_removal = AtomicUsize::new(0);

        std::thread::scope(|s| {
            s.spawn(|| {
                for i in 0..2000 {
                    match manager.record_telemetry("d1", reading(i as f64)) {
                        Ok(()) => {
                            assert_eq!(
                                rejected_after_removal.load(Ordering::SeqCst),
                                0,
                                "append accepted after a rejection"
                            );
                            accepted.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(RegistryError::DeviceNotRegistered(_)) => {
                            rejected_after_removal.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(e) => panic!("unexpected error: {}", e),
                    }
                }
            });
            s.spawn(|| {
                std::thread::yield_now();
                manager.remove_device("l1", "d1");
            });
        });

        let recorded = manager
            .get_telemetry_by_device("d1")
            .map(|h| h.readings().len())
            .unwrap_or(0);
        assert_eq!(recorded, accepted.load(Ordering::SeqCst));
        assert_eq!(
            accepted.load(Ordering::SeqCst) + rejected_after_removal.load(Ordering::SeqCst),
            2000
        );
        assert!(manager.record_telemetry("d1", reading(0.0)).is_err());
    }

    #[test]
    fn test_readers_see_whole_entries() {
        let manager = InventoryManager::new();
        manager.register_location(Location::new("l1", "a", 0.0, 0.0).unwrap()).unwrap();

        std::thread::scope(|s| {
            s.spawn(|| {
                for i in 0..500 {
                    let (name, v) = if i % 2 == 0 { ("b", 1.0) } else { ("a", 0.0) };
                    manager
                        .replace_location(Location::new("l1", name, v, v).unwrap())
                        .unwrap();
                }
            });
            for _ in 0..2 {
                s.spawn(|| {
                    for _ in 0..500 {
                        let entity = manager.get_location("l1").unwrap();
                        let expected = if entity.location.name() == "a" { 0.0 } else { 1.0 };
                        assert_eq!(entity.location.latitude(), expected);
                        assert_eq!(entity.location.longitude(), expected);
                    }
                });
            }
        });
    }
}
