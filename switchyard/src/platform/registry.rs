//! Name-to-factory registry of switch drivers.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;
use log::debug;

use super::vendors;
use crate::driver::{DeviceSettings, DeviceSwitch};
use crate::error::{RegistryError, Result};

/// Builds a driver bound to the given settings.
pub type DeviceSwitchFactory =
    Arc<dyn Fn(DeviceSettings) -> Box<dyn DeviceSwitch> + Send + Sync>;

/// Registry of switch drivers, keyed by platform name.
///
/// Safe to share between tasks; every operation takes the internal lock
/// only for the map access itself.
#[derive(Default)]
pub struct DriverRegistry {
    factories: RwLock<IndexMap<String, DeviceSwitchFactory>>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in drivers registered.
    pub fn with_builtin() -> Self {
        let mut factories: IndexMap<String, DeviceSwitchFactory> = IndexMap::new();
        factories.insert(
            vendors::procurve::NAME.to_string(),
            Arc::new(vendors::procurve::factory),
        );
        debug!("registered built-in drivers: {:?}", factories.keys());
        Self {
            factories: RwLock::new(factories),
        }
    }

    /// Register `factory` under `name`.
    ///
    /// Fails with [`RegistryError::AlreadyRegistered`] if the name is taken;
    /// the existing entry is left untouched.
    pub fn register<F>(&self, name: impl Into<String>, factory: F) -> Result<()>
    where
        F: Fn(DeviceSettings) -> Box<dyn DeviceSwitch> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut factories = self.write();
        if factories.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered { name }.into());
        }
        debug!("registered driver '{}'", name);
        factories.insert(name, Arc::new(factory));
        Ok(())
    }

    /// Remove `name`. Removing an absent name is not an error.
    pub fn unregister(&self, name: &str) -> Result<()> {
        if self.write().shift_remove(name).is_some() {
            debug!("unregistered driver '{}'", name);
        }
        Ok(())
    }

    /// Build the driver registered under `name`.
    pub fn resolve(&self, name: &str, settings: DeviceSettings) -> Result<Box<dyn DeviceSwitch>> {
        let factory = self
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_string(),
            })?;
        Ok(factory(settings))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexMap<String, DeviceSwitchFactory>> {
        self.factories.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexMap<String, DeviceSwitchFactory>> {
        self.factories.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("names", &self.names())
            .finish()
    }
}
