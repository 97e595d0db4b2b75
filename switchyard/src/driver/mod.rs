//! Driver layer: the command protocol and the device capability traits.
//!
//! A vendor driver implements [`Device`] by supplying its prompt patterns
//! and paging command; `cmd`, `initialize` and `disable_paging` come for
//! free from [`protocol`]. Switches additionally implement
//! [`DeviceSwitch`] for the inventory getters.

mod builder;
pub mod protocol;
mod response;
pub mod sanitize;
mod settings;
pub mod text;

pub use builder::{DriverBuilder, SwitchSession};
pub use response::DeviceResult;
pub use settings::{DEFAULT_TIMEOUT_READ, DeviceSettings};

use std::time::Duration;

use async_trait::async_trait;
use regex::bytes::Regex;
use tokio_util::sync::CancellationToken;

use crate::channel::Connection;
use crate::error::Result;

/// A device reachable over an interactive CLI.
#[async_trait]
pub trait Device: Send + Sync {
    /// Settings this driver was constructed with.
    fn settings(&self) -> &DeviceSettings;

    /// Connection to the device.
    fn connection(&self) -> &Connection {
        &self.settings().connection
    }

    /// Pattern for the first prompt after login.
    fn regex_init(&self) -> &Regex;

    /// Pattern for the prompt that ends each command's output.
    fn regex_cmd(&self) -> &Regex;

    /// Command that stops the CLI from pausing long output.
    fn paging_command(&self) -> &str;

    /// Turn raw output into plain text.
    fn sanitize(&self, raw: &[u8]) -> String {
        sanitize::sanitize(raw)
    }

    /// Provoke and synchronize on the first prompt, then disable paging.
    async fn initialize(&self, token: &CancellationToken) -> Result<()> {
        protocol::initialize(self, token).await
    }

    /// Disable paging with [`paging_command`](Self::paging_command).
    async fn disable_paging(&self, token: &CancellationToken) -> Result<()> {
        protocol::disable_paging(self, token).await
    }

    /// Run a command and return its sanitized output.
    async fn cmd(
        &self,
        token: &CancellationToken,
        timeout: Duration,
        command: &str,
    ) -> Result<DeviceResult> {
        protocol::cmd(self, token, timeout, command).await
    }

    /// Discard unsolicited output for `window`.
    async fn flush_for(&self, token: &CancellationToken, window: Duration) -> Result<usize> {
        self.connection().flush_for(token, window).await
    }
}

/// Typical operations every switch driver supports.
#[async_trait]
pub trait DeviceSwitch: Device {
    /// Current running configuration.
    async fn get_running_config(&self, token: &CancellationToken) -> Result<String>;

    /// Event log, newest first.
    async fn get_logs(&self, token: &CancellationToken) -> Result<String>;

    /// Running software version(s).
    async fn get_version(&self, token: &CancellationToken) -> Result<Vec<String>>;

    /// Boot ROM version(s), if distinct from the software version.
    async fn get_version_rom(&self, token: &CancellationToken) -> Result<Vec<String>>;

    /// CPU utilization percentage.
    async fn get_cpu(&self, token: &CancellationToken) -> Result<u32>;

    /// Memory utilization percentage.
    async fn get_ram(&self, token: &CancellationToken) -> Result<u32>;

    async fn get_uptime(&self, token: &CancellationToken) -> Result<String>;

    async fn get_sysname(&self, token: &CancellationToken) -> Result<String>;

    /// Serial numbers, one per stack member.
    async fn get_serial_numbers(&self, token: &CancellationToken) -> Result<Vec<String>>;

    /// Model / part numbers, one per stack member.
    async fn get_model_numbers(&self, token: &CancellationToken) -> Result<Vec<String>>;

    /// Full model names, one per stack member.
    async fn get_model_names(&self, token: &CancellationToken) -> Result<Vec<String>>;
}
