//! Polyagent core: shared types, configuration, utilities and the SQLite
//! memory store.

pub mod config;
pub mod error;
pub mod memory;
pub mod types;
pub mod utils;

pub use error::{ConfigError, MemoryError};
