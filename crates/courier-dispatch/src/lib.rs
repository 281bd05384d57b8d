//! Outbound message dispatch for the courier worker.
//!
//! Provides:
//! - `MessageDispatcher` - Validation, registration gate and paced sends
//! - `SendReceipt` - Synchronous acceptance plus an async completion signal

pub mod dispatcher;

pub use dispatcher::{DispatchConfig, DispatchError, MessageDispatcher, SendError, SendReceipt};
