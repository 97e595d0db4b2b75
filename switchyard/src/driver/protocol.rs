//! The command request/response cycle shared by every driver.
//!
//! These functions back the provided methods of [`Device`]; vendor drivers
//! normally only supply prompt patterns and a paging command.

use std::time::Duration;

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use super::Device;
use super::response::DeviceResult;
use super::sanitize::strip_echo;
use crate::error::Result;

/// Send `command`, wait for the command prompt and sanitize the output.
///
/// Send and read errors are returned unchanged.
pub async fn cmd<D>(
    device: &D,
    token: &CancellationToken,
    timeout: Duration,
    command: &str,
) -> Result<DeviceResult>
where
    D: Device + ?Sized,
{
    let connection = device.connection();

    let mut framed = String::with_capacity(command.len() + 1);
    framed.push_str(command);
    framed.push('\n');
    connection.send(framed.as_bytes()).await?;

    let raw = connection
        .read_until_match(token, timeout, device.regex_cmd())
        .await?;

    let sanitized = device.sanitize(&raw);
    let output = strip_echo(&sanitized, command);
    debug!(
        "cmd {:?}: {} raw bytes, {} output bytes",
        command,
        raw.len(),
        output.len()
    );

    Ok(DeviceResult::new(command, output))
}

/// Synchronize on the first prompt, then disable paging.
pub async fn initialize<D>(device: &D, token: &CancellationToken) -> Result<()>
where
    D: Device + ?Sized,
{
    let settings = device.settings();
    settings.connection.send(b"\n").await?;

    let data = settings
        .connection
        .read_until_match(token, settings.timeout_read, device.regex_init())
        .await?;
    info!("initial prompt: {:?}", String::from_utf8_lossy(&data));

    device.disable_paging(token).await
}

/// Run the vendor's paging-disable command.
pub async fn disable_paging<D>(device: &D, token: &CancellationToken) -> Result<()>
where
    D: Device + ?Sized,
{
    let timeout = device.settings().timeout_read;
    match device.cmd(token, timeout, device.paging_command()).await {
        Ok(result) => {
            info!("disabled paging: {:?}", result.output);
            Ok(())
        }
        Err(e) => {
            warn!("failed to disable paging: {}", e);
            Err(e)
        }
    }
}
