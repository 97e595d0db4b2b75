//! HP / Aruba ProCurve switch driver.
//!
//! ProCurve redraws its prompt with a burst of cursor-positioning escape
//! sequences, which is what both prompt patterns anchor on. Inventory data
//! comes from the CLI's `getMIB` / `walkMIB` commands rather than scraping
//! `show` output.

use async_trait::async_trait;
use log::debug;
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::driver::text::{join_lines, parse_count, parse_key_value, split_lines};
use crate::driver::{Device, DeviceSettings, DeviceSwitch};
use crate::error::{DriverError, Result};
use crate::platform::DriverRegistry;

/// Registry name of this driver.
pub const NAME: &str = "procurve";

/// `#`, whitespace, then the five escape sequences every ProCurve
/// firmware emits after it.
static PROMPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#\s+(?:\x1b\[\??\d+;?\d+[a-zA-Z]){5}").unwrap());

/// Separator between name and value in `getMIB` / `walkMIB` output.
const MIB_SEPARATOR: &str = " =";

/// `entPhysicalClass` value for a chassis (RFC 2737).
const CLASS_CHASSIS: &str = "3";

#[derive(Debug)]
pub struct ProcurveDevice {
    settings: DeviceSettings,
    /// Entity indices of the stack members, discovered on first use.
    members: OnceCell<Vec<String>>,
}

impl ProcurveDevice {
    pub fn new(settings: DeviceSettings) -> Self {
        Self {
            settings,
            members: OnceCell::new(),
        }
    }

    /// Read a single MIB object, returning `(name, value)`.
    pub async fn get_mib(&self, token: &CancellationToken, mib: &str) -> Result<(String, String)> {
        let result = self
            .cmd(token, self.settings.timeout_read, &format!("getMIB {}", mib))
            .await?;
        let (key, value) = parse_key_value(result.output.trim(), MIB_SEPARATOR)
            .map_err(|_| DriverError::protocol("invalid MIB", result.output.trim()))?;
        Ok((key.to_string(), value.to_string()))
    }

    /// Value of a single MIB object.
    pub async fn get_value_mib(&self, token: &CancellationToken, mib: &str) -> Result<String> {
        self.get_mib(token, mib).await.map(|(_, value)| value)
    }

    /// Walk a MIB subtree, returning `(name, value)` pairs in device order.
    pub async fn walk_mib(
        &self,
        token: &CancellationToken,
        mib: &str,
    ) -> Result<Vec<(String, String)>> {
        let result = self
            .cmd(token, self.settings.timeout_read, &format!("walkMIB {}", mib))
            .await?;

        split_lines(&result.output)
            .into_iter()
            .map(|line| -> Result<(String, String)> {
                let (key, value) = parse_key_value(line, MIB_SEPARATOR)
                    .map_err(|_| DriverError::protocol("invalid output", line))?;
                Ok((key.to_string(), value.to_string()))
            })
            .collect()
    }

    /// Entity indices of every chassis in the stack.
    ///
    /// A standalone switch reports a single member. Cached after the first
    /// successful walk.
    pub async fn get_members(&self, token: &CancellationToken) -> Result<Vec<String>> {
        let members = self
            .members
            .get_or_try_init(|| async {
                let mut ids = Vec::new();
                for (key, class) in self.walk_mib(token, "entPhysicalClass").await? {
                    if class != CLASS_CHASSIS && !class.eq_ignore_ascii_case("chassis") {
                        continue;
                    }
                    match key.split_once('.') {
                        Some((_, id)) if !id.is_empty() && !id.contains('.') => {
                            ids.push(id.to_string())
                        }
                        _ => {
                            return Err(crate::Error::from(DriverError::protocol(
                                "invalid MIB name returned while walking",
                                key.clone(),
                            )));
                        }
                    }
                }
                debug!("procurve stack members: {:?}", ids);
                Ok::<_, crate::Error>(ids)
            })
            .await?;
        Ok(members.clone())
    }

    /// `prefix.<id>` for every stack member.
    async fn per_member(&self, token: &CancellationToken, prefix: &str) -> Result<Vec<String>> {
        let mut values = Vec::new();
        for id in self.get_members(token).await? {
            values.push(self.get_value_mib(token, &format!("{}.{}", prefix, id)).await?);
        }
        Ok(values)
    }

    async fn get_count(&self, token: &CancellationToken, mib: &str) -> Result<u64> {
        let value = self.get_value_mib(token, mib).await?;
        Ok(parse_count(&value)?)
    }
}

#[async_trait]
impl Device for ProcurveDevice {
    fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    fn regex_init(&self) -> &Regex {
        &PROMPT
    }

    fn regex_cmd(&self) -> &Regex {
        &PROMPT
    }

    fn paging_command(&self) -> &str {
        "no page"
    }
}

#[async_trait]
impl DeviceSwitch for ProcurveDevice {
    async fn get_running_config(&self, token: &CancellationToken) -> Result<String> {
        let result = self
            .cmd(token, self.settings.timeout_read, "write terminal")
            .await?;
        Ok(join_lines(&split_lines(&result.output)))
    }

    async fn get_logs(&self, token: &CancellationToken) -> Result<String> {
        let result = self
            .cmd(token, self.settings.timeout_read, "show log -r")
            .await?;
        Ok(join_lines(&split_lines(&result.output)))
    }

    async fn get_version(&self, token: &CancellationToken) -> Result<Vec<String>> {
        Ok(vec![self.get_value_mib(token, "hpHttpMgVersion.0").await?])
    }

    async fn get_version_rom(&self, token: &CancellationToken) -> Result<Vec<String>> {
        Ok(vec![self.get_value_mib(token, "hpHttpMgROMVersion.0").await?])
    }

    async fn get_cpu(&self, token: &CancellationToken) -> Result<u32> {
        let value = self.get_value_mib(token, "hpSwitchCpuStat.0").await?;
        let cpu = parse_count(&value)?;
        u32::try_from(cpu).map_err(|_| DriverError::protocol("CPU out of range", value).into())
    }

    async fn get_ram(&self, token: &CancellationToken) -> Result<u32> {
        let alloc = self.get_count(token, "hpLocalMemAllocBytes.1").await?;
        let total = self.get_count(token, "hpLocalMemTotalBytes.1").await?;
        if total == 0 || alloc > total {
            return Err(DriverError::protocol(
                "invalid memory counters",
                format!("{} / {}", alloc, total),
            )
            .into());
        }
        // alloc <= total, so the percentage fits.
        Ok((alloc.saturating_mul(100) / total) as u32)
    }

    async fn get_uptime(&self, token: &CancellationToken) -> Result<String> {
        self.get_value_mib(token, "sysUpTime.0").await
    }

    async fn get_sysname(&self, token: &CancellationToken) -> Result<String> {
        self.get_value_mib(token, "sysName.0").await
    }

    async fn get_serial_numbers(&self, token: &CancellationToken) -> Result<Vec<String>> {
        self.per_member(token, "entPhysicalSerialNum").await
    }

    async fn get_model_numbers(&self, token: &CancellationToken) -> Result<Vec<String>> {
        self.per_member(token, "entPhysicalModelName").await
    }

    async fn get_model_names(&self, token: &CancellationToken) -> Result<Vec<String>> {
        self.per_member(token, "entPhysicalDescr").await
    }
}

/// Registry factory for [`ProcurveDevice`].
pub fn factory(settings: DeviceSettings) -> Box<dyn DeviceSwitch> {
    Box::new(ProcurveDevice::new(settings))
}

/// Register this driver under [`NAME`].
pub fn register(registry: &DriverRegistry) -> Result<()> {
    registry.register(NAME, factory)
}
