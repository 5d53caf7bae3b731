//! Configuration for the update subsystem
//!
//! Persists which release source to use and where the helper lives, and turns
//! that into `UpdateOptions` and a ready `UpdateManager`.

mod storage;
#[cfg(test)]
mod tests;

pub use storage::{
    ConfigError, ConfigResult, ConfigStore, ConfigStoreConfig, SourceConfig, UpdateConfig,
};
