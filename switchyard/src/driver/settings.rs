//! Per-driver settings.

use std::sync::Arc;
use std::time::Duration;

use crate::channel::Connection;

/// Read timeout used when a driver operation has no explicit one.
pub const DEFAULT_TIMEOUT_READ: Duration = Duration::from_secs(5);

/// Settings a driver is constructed with. Drivers never mutate them.
#[derive(Debug, Clone)]
pub struct DeviceSettings {
    /// Connection to the device.
    pub connection: Arc<Connection>,

    /// Default timeout for reads issued by the driver.
    pub timeout_read: Duration,
}

impl DeviceSettings {
    /// Create settings with [`DEFAULT_TIMEOUT_READ`].
    pub fn new(connection: Arc<Connection>) -> Self {
        Self {
            connection,
            timeout_read: DEFAULT_TIMEOUT_READ,
        }
    }

    /// Override the default read timeout.
    pub fn with_timeout_read(mut self, timeout: Duration) -> Self {
        self.timeout_read = timeout;
        self
    }
}
