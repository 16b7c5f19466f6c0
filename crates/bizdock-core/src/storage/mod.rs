//! # BizDock Core Storage
//!
//! File access through the [`StorageProvider`] trait, its local filesystem
//! implementation [`LocalStorageProvider`], and configuration documents
//! ([`ConfigData`]) from which the typed [`RuntimeSettings`] are built.
pub mod config;
pub mod error;
pub mod local;
pub mod provider;

pub use config::{ConfigData, ConfigFormat, RuntimeSettings};
pub use local::LocalStorageProvider;
pub use provider::StorageProvider;

#[cfg(test)]
mod tests;
