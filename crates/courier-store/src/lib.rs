//! Persistence backends for the courier worker.
//!
//! Provides:
//! - In-memory store and publisher (feature: memory)
//! - File-backed store and publisher (feature: file)

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "file")]
pub mod file;

#[cfg(feature = "memory")]
pub use memory::{MemoryStatusPublisher, MemoryStore};

#[cfg(feature = "file")]
pub use file::{FileStatusPublisher, FileStore};
