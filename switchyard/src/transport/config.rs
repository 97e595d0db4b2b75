//! SSH connection configuration.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

/// Default SSH port.
pub const DEFAULT_PORT: u16 = 22;

/// Default dial and inactivity timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Host key verification mode, analogous to OpenSSH's `StrictHostKeyChecking`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HostKeyVerification {
    /// Reject unknown and changed keys.
    Strict,

    /// Learn unknown keys into known_hosts, reject changed ones.
    #[default]
    AcceptNew,

    /// Accept any key. Lab use only.
    Disabled,
}

/// SSH connection configuration.
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// Target host (hostname or IP address).
    pub host: String,

    pub port: u16,

    pub username: String,

    pub auth: AuthMethod,

    /// Dial timeout, also used as the session inactivity timeout.
    pub timeout: Duration,

    /// PTY columns. Switch CLIs wrap long lines at this width.
    pub terminal_width: u32,

    /// PTY rows.
    pub terminal_height: u32,

    pub host_key_verification: HostKeyVerification,

    /// known_hosts file; the user's default when `None`.
    pub known_hosts_path: Option<PathBuf>,
}

impl SshConfig {
    /// Configuration with defaults for everything but host and user.
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            auth: AuthMethod::None,
            timeout: DEFAULT_CONNECT_TIMEOUT,
            terminal_width: 511,
            terminal_height: 24,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
        }
    }

    /// `host:port`, for logging.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Authentication method for SSH connections.
///
/// Secrets are held in [`SecretString`] so they never show up in `Debug`
/// output or logs.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// No authentication.
    None,

    Password(SecretString),

    PrivateKey {
        /// Path to the private key file.
        path: PathBuf,
        /// Passphrase for encrypted keys.
        passphrase: Option<SecretString>,
    },
}
