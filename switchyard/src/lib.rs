//! # Switchyard
//!
//! Async SSH automation for network switch CLIs.
//!
//! Switchyard drives a switch's interactive shell over SSH: it streams the
//! shell output into a background task, lets callers read until a prompt
//! appears (with cancellation and timeouts that keep whatever partial output
//! arrived), and layers vendor drivers on top that know each platform's
//! prompts, paging and inventory commands.
//!
//! ## Features
//!
//! - Async SSH connections via russh
//! - Predicate, pattern and time-window reads over a streaming shell
//! - Cancellation via `CancellationToken`, partial output on timeout
//! - Pluggable drivers through a name-keyed registry
//! - Built-in HP / Aruba ProCurve driver with MIB-based inventory getters
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use switchyard::{Device, DriverBuilder, DriverRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), switchyard::Error> {
//!     let registry = DriverRegistry::with_builtin();
//!     let session = DriverBuilder::new("10.0.0.2")
//!         .username("manager")
//!         .password("secret")
//!         .platform("procurve")
//!         .connect(&registry)
//!         .await?;
//!
//!     let token = session.token().clone();
//!     let result = session
//!         .driver()
//!         .cmd(&token, std::time::Duration::from_secs(5), "show vlans")
//!         .await?;
//!     println!("{}", result.output);
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod driver;
pub mod error;
pub mod platform;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use channel::Connection;
pub use driver::{Device, DeviceResult, DeviceSettings, DeviceSwitch, DriverBuilder, SwitchSession};
pub use error::{Error, Result};
pub use platform::DriverRegistry;
pub use transport::{AuthMethod, SshConfig};
