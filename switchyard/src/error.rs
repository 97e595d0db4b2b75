//! Error types for switchyard.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for switchyard operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Connection engine errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Driver-level errors
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// Driver registry errors
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl Error {
    /// Bytes accumulated by a read that was cancelled or timed out.
    ///
    /// Returns `None` for every other error, including [`ChannelError::Closed`]
    /// where the partial output is deliberately discarded.
    pub fn partial_output(&self) -> Option<&[u8]> {
        match self {
            Error::Channel(ChannelError::ParentCancelled { partial })
            | Error::Channel(ChannelError::Timeout { partial, .. }) => Some(partial),
            _ => None,
        }
    }

    /// Whether this is a per-call read timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Channel(ChannelError::Timeout { .. }))
    }

    /// Whether the overarching cancellation token fired during a read.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Channel(ChannelError::ParentCancelled { .. }))
    }

    /// Whether the connection is gone and a new session is required.
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::Channel(ChannelError::Closed))
    }
}

/// Transport layer errors (SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Host key differs from the one recorded in known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// Host not present in known_hosts under strict verification
    #[error("Host key for {host}:{port} is not in known_hosts")]
    HostKeyUnknown { host: String, port: u16 },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Connection engine errors.
///
/// `ParentCancelled` and `Timeout` carry whatever bytes the read had
/// accumulated when it gave up, so the caller can decide whether to retry.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The overarching cancellation token fired during a read
    #[error("Parent context cancelled after {} bytes", partial.len())]
    ParentCancelled { partial: Vec<u8> },

    /// The per-call deadline elapsed before the predicate matched
    #[error("Read timed out after {timeout:?} ({} bytes received)", partial.len())]
    Timeout { timeout: Duration, partial: Vec<u8> },

    /// The connection stopped while a read was pending
    #[error("Channel closed")]
    Closed,

    /// Another read operation already owns the connection
    #[error("Another read is already in progress on this connection")]
    ReaderBusy,

    /// Writing to the device failed
    #[error("Send failed: {0}")]
    Send(#[source] io::Error),
}

/// Driver layer errors.
#[derive(Error, Debug)]
pub enum DriverError {
    /// Device output did not have the expected shape
    #[error("{message}: '{output}'")]
    Protocol { message: String, output: String },

    /// Invalid configuration in the driver builder
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl DriverError {
    /// Build a protocol error carrying the offending device output.
    pub fn protocol(message: impl Into<String>, output: impl Into<String>) -> Self {
        DriverError::Protocol {
            message: message.into(),
            output: output.into(),
        }
    }
}

/// Driver registry errors.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// A driver with this name already exists
    #[error("Driver '{name}' is already registered")]
    AlreadyRegistered { name: String },

    /// No driver with this name exists
    #[error("Driver '{name}' cannot be found")]
    NotFound { name: String },
}

/// Result type alias using switchyard's Error.
pub type Result<T> = std::result::Result<T, Error>;
