//! Built-in vendor drivers.

pub mod procurve;
