//! Channel layer: the connection engine and prompt matching.
//!
//! This module turns a device's raw byte stream into start/stop-able,
//! pattern-aware reads with timeout and cancellation handling.

mod buffer;
mod connection;
mod patterns;

pub use buffer::StreamBuffer;
pub use connection::{Connection, POLL_INTERVAL, READ_CHUNK_SIZE};
pub use patterns::PromptMatcher;
