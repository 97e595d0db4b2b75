//! Platform support: the driver registry and the built-in vendor drivers.
//!
//! New platforms plug in by registering a factory:
//!
//! ```rust,no_run
//! use switchyard::platform::{DriverRegistry, vendors::procurve};
//!
//! let registry = DriverRegistry::new();
//! registry.register("aruba_2930f", procurve::factory).unwrap();
//! ```

mod registry;
pub mod vendors;

pub use registry::{DeviceSwitchFactory, DriverRegistry};
