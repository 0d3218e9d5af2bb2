//! Conversation store implementations for Palaver.

pub mod in_memory;
pub mod timed;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::MemoryStore;
pub use timed::TimedStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
