//! Builder for connecting to a switch and binding its driver.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::info;
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;

use super::settings::{DEFAULT_TIMEOUT_READ, DeviceSettings};
use super::DeviceSwitch;
use crate::channel::Connection;
use crate::error::{DriverError, RegistryError, Result};
use crate::platform::DriverRegistry;
use crate::transport::config::{AuthMethod, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT};
use crate::transport::{HostKeyVerification, SshConfig, SshTransport};

/// Builder for a [`SwitchSession`].
///
/// # Example
///
/// ```rust,no_run
/// use switchyard::driver::{DeviceSwitch, DriverBuilder};
/// use switchyard::platform::DriverRegistry;
///
/// # async fn example() -> Result<(), switchyard::Error> {
/// let registry = DriverRegistry::with_builtin();
/// let session = DriverBuilder::new("10.0.0.2")
///     .username("manager")
///     .password("secret")
///     .platform("procurve")
///     .connect(&registry)
///     .await?;
///
/// let sysname = session.driver().get_sysname(session.token()).await?;
/// println!("{}", sysname);
/// session.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct DriverBuilder {
    host: String,
    port: u16,
    username: Option<String>,
    auth: AuthMethod,
    platform: Option<String>,
    timeout: Duration,
    timeout_read: Duration,
    terminal_width: u32,
    terminal_height: u32,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    initialize: bool,
}

impl DriverBuilder {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: None,
            auth: AuthMethod::None,
            platform: None,
            timeout: DEFAULT_CONNECT_TIMEOUT,
            timeout_read: DEFAULT_TIMEOUT_READ,
            terminal_width: 511,
            terminal_height: 24,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
            initialize: true,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Use password authentication.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.auth = AuthMethod::Password(SecretString::from(password.into()));
        self
    }

    /// Use private key authentication.
    pub fn private_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: None,
        };
        self
    }

    /// Use an encrypted private key.
    pub fn private_key_with_passphrase(
        mut self,
        key_path: impl Into<PathBuf>,
        passphrase: impl Into<String>,
    ) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: Some(SecretString::from(passphrase.into())),
        };
        self
    }

    /// Registry name of the driver, e.g. `"procurve"`.
    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    /// SSH dial timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Default read timeout for driver commands.
    pub fn timeout_read(mut self, timeout: Duration) -> Self {
        self.timeout_read = timeout;
        self
    }

    pub fn terminal_size(mut self, width: u32, height: u32) -> Self {
        self.terminal_width = width;
        self.terminal_height = height;
        self
    }

    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    /// Whether `connect` runs the driver's `initialize` (default: yes).
    pub fn initialize(mut self, initialize: bool) -> Self {
        self.initialize = initialize;
        self
    }

    /// Check required fields and that the platform is registered.
    fn validate(&self, registry: &DriverRegistry) -> Result<(String, String)> {
        let username = self.username.clone().ok_or_else(|| DriverError::InvalidConfig {
            message: "Username is required".to_string(),
        })?;

        let platform = self.platform.clone().ok_or_else(|| DriverError::InvalidConfig {
            message: "Platform must be specified".to_string(),
        })?;

        if !registry.contains(&platform) {
            return Err(RegistryError::NotFound { name: platform }.into());
        }

        Ok((username, platform))
    }

    /// Dial, open a shell, bind the driver and (by default) initialize it.
    pub async fn connect(self, registry: &DriverRegistry) -> Result<SwitchSession> {
        let (username, platform) = self.validate(registry)?;

        let config = SshConfig {
            host: self.host,
            port: self.port,
            username,
            auth: self.auth,
            timeout: self.timeout,
            terminal_width: self.terminal_width,
            terminal_height: self.terminal_height,
            host_key_verification: self.host_key_verification,
            known_hosts_path: self.known_hosts_path,
        };
        let addr = config.socket_addr();

        let transport = SshTransport::connect(config).await?;
        let connection = Arc::new(transport.open_connection().await?);

        let token = CancellationToken::new();
        connection.start(&token)?;

        let settings =
            DeviceSettings::new(connection.clone()).with_timeout_read(self.timeout_read);
        let driver = registry.resolve(&platform, settings)?;

        let session = SwitchSession {
            driver,
            connection,
            transport,
            token,
        };

        if self.initialize {
            if let Err(e) = session.driver.initialize(&session.token).await {
                // Report the init error, not the teardown one.
                let _ = session.close().await;
                return Err(e);
            }
        }

        info!("{} session open on {}", platform, addr);
        Ok(session)
    }
}

/// A connected switch: the transport, its shell connection and the driver.
pub struct SwitchSession {
    driver: Box<dyn DeviceSwitch>,
    connection: Arc<Connection>,
    transport: SshTransport,
    token: CancellationToken,
}

impl SwitchSession {
    pub fn driver(&self) -> &dyn DeviceSwitch {
        self.driver.as_ref()
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Session-wide token; cancelling it aborts every in-flight read.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Stop the connection and disconnect.
    pub async fn close(self) -> Result<()> {
        self.token.cancel();
        self.connection.stop()?;
        self.transport.close().await
    }
}
