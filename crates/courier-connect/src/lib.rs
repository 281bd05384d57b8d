//! Connection lifecycle management for the courier worker.
//!
//! Provides:
//! - `ConnectionManager` - Single-connection state machine
//! - `Backoff` - Bounded exponential reconnect policy
//! - `SimClient` - Simulated network client (feature: sim)

pub mod backoff;
pub mod manager;

#[cfg(feature = "sim")]
pub mod sim;

pub use backoff::Backoff;
pub use manager::{ConnectConfig, ConnectionManager};

#[cfg(feature = "sim")]
pub use sim::SimClient;
