//! SSH transport: dial, authenticate and hand out PTY shell connections.

pub mod config;
mod ssh;

pub use config::{AuthMethod, HostKeyVerification, SshConfig};
pub use ssh::SshTransport;
