use crate::errors::{EntityKind, RegistryError};
use crate::model::{Device, Location, LocationEntity};
use std::collections::{BTreeMap, HashMap};

type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, Clone)]
struct LocationSlot {
    location: Location,
    devices: BTreeMap<String, Device>,
}

/// Locations with their nested devices, plus a system-wide device index.
///
/// Not synchronized on its own. `InventoryManager` owns the only instance
/// and wraps it in a lock, so every method here runs against a consistent
/// view. The index maps device id to owning location id and is updated
/// in the same call as the nested map, which keeps device ids unique
/// across all locations.
#[derive(Debug, Default)]
pub struct LocationRegistry {
    locations: BTreeMap<String, LocationSlot>,
    device_index: HashMap<String, String>,
}

impl LocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, location: Location) -> Result<()> {
        if self.locations.contains_key(location.id()) {
            return Err(RegistryError::DuplicateId {
                kind: EntityKind::Location,
                id: location.id().to_string(),
            });
        }

        self.locations.insert(
            location.id().to_string(),
            LocationSlot {
                location,
                devices: BTreeMap::new(),
            },
        );
        Ok(())
    }

    /// Overwrites name and coordinates; the device collection is kept.
    pub fn replace(&mut self, location: Location) -> Result<()> {
        let slot = self
            .locations
            .get_mut(location.id())
            .ok_or_else(|| RegistryError::LocationNotFound(location.id().to_string()))?;
        slot.location = location;
        Ok(())
    }

    /// Removes the location and every device it holds. Absent ids are a no-op.
    /// Returns the removed devices.
    pub fn remove(&mut self, id: &str) -> Vec<Device> {
        let Some(slot) = self.locations.remove(id) else {
            return Vec::new();
        };

        for device_id in slot.devices.keys() {
            self.device_index.remove(device_id);
        }
        slot.devices.into_values().collect()
    }

    pub fn get(&self, id: &str) -> Option<LocationEntity> {
        self.locations.get(id).map(Self::entity)
    }

    pub fn list(&self) -> Vec<LocationEntity> {
        self.locations.values().map(Self::entity).collect()
    }

    pub fn exists(&self, id: &str) -> bool {
        self.locations.contains_key(id)
    }

    pub fn location_count(&self) -> usize {
        self.locations.len()
    }

    pub fn device_count(&self) -> usize {
        self.device_index.len()
    }

    fn entity(slot: &LocationSlot) -> LocationEntity {
        LocationEntity {
            location: slot.location.clone(),
            device_ids: slot.devices.keys().cloned().collect(),
        }
    }

    fn check_owner(location_id: &str, device: &Device) -> Result<()> {
        if device.location_id() != location_id {
            return Err(RegistryError::IdMismatch {
                expected: location_id.to_string(),
                actual: device.location_id().to_string(),
            });
        }
        Ok(())
    }

    // Devices

    pub fn add_device(&mut self, location_id: &str, device: Device) -> Result<()> {
        Self::check_owner(location_id, &device)?;

        let slot = self
            .locations
            .get_mut(location_id)
            .ok_or_else(|| RegistryError::LocationNotFound(location_id.to_string()))?;

        if self.device_index.contains_key(device.id()) {
            return Err(RegistryError::DuplicateId {
                kind: EntityKind::Device,
                id: device.id().to_string(),
            });
        }

        self.device_index
            .insert(device.id().to_string(), location_id.to_string());
        slot.devices.insert(device.id().to_string(), device);
        Ok(())
    }

    pub fn replace_device(&mut self, location_id: &str, device_id: &str, device: Device) -> Result<()> {
        let slot = self
            .locations
            .get_mut(location_id)
            .ok_or_else(|| RegistryError::LocationNotFound(location_id.to_string()))?;

        let current = slot
            .devices
            .get_mut(device_id)
            .ok_or_else(|| RegistryError::DeviceNotFound(device_id.to_string()))?;

        if device.id() != device_id {
            return Err(RegistryError::IdMismatch {
                expected: device_id.to_string(),
                actual: device.id().to_string(),
            });
        }
        Self::check_owner(location_id, &device)?;

        *current = device;
        Ok(())
    }

    /// Absent location or device is a no-op. Returns the removed device.
    pub fn remove_device(&mut self, location_id: &str, device_id: &str) -> Option<Device> {
        let removed = self.locations.get_mut(location_id)?.devices.remove(device_id)?;
        self.device_index.remove(device_id);
        Some(removed)
    }

    pub fn move_device(&mut self, device_id: &str, target_location_id: &str) -> Result<Device> {
        let source_id = self
            .device_index
            .get(device_id)
            .cloned()
            .ok_or_else(|| RegistryError::DeviceNotFound(device_id.to_string()))?;

        if !self.locations.contains_key(target_location_id) {
            return Err(RegistryError::LocationNotFound(target_location_id.to_string()));
        }

        let device = self
            .locations
            .get_mut(&source_id)
            .and_then(|slot| slot.devices.remove(device_id))
            .ok_or_else(|| RegistryError::DeviceNotFound(device_id.to_string()))?;

        let moved = device.relocated(target_location_id);
        if let Some(target) = self.locations.get_mut(target_location_id) {
            target.devices.insert(device_id.to_string(), moved.clone());
        }
        self.device_index
            .insert(device_id.to_string(), target_location_id.to_string());
        Ok(moved)
    }

    pub fn device(&self, device_id: &str) -> Option<&Device> {
        let location_id = self.device_index.get(device_id)?;
        self.locations.get(location_id)?.devices.get(device_id)
    }

    pub fn contains_device(&self, device_id: &str) -> bool {
        self.device_index.contains_key(device_id)
    }

    pub fn devices_of(&self, location_id: &str) -> Result<Vec<Device>> {
        self.locations
            .get(location_id)
            .map(|slot| slot.devices.values().cloned().collect())
            .ok_or_else(|| RegistryError::LocationNotFound(location_id.to_string()))
    }
}
