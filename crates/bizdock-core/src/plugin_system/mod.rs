//! # BizDock Plugin System
//!
//! Registration, lifecycle and event routing of plugin configurations.
//! Plugin types come from loaded extensions; each configuration of a type is
//! registered with its own runner instance, lifecycle worker and, while
//! started, its own IN and OUT worker pools.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`manager`]**: the [`PluginManager`] trait and its
//!   [`DefaultPluginManager`] implementation: registration, start/stop,
//!   status callbacks, message posting and configuration blocks.
//! - **[`registry`]**: [`PluginRegistry`], the registered configurations and
//!   their per-entry locks.
//! - **[`lifecycle`]**: the lifecycle worker running the start and stop
//!   hooks of a runner.
//! - **[`context`]**: [`PluginContext`], the services a runner uses (logs,
//!   state, configuration blocks, identification links, shared storage).
//! - **[`store`]**: [`PluginStore`], the persistence façade, with an
//!   in-memory implementation.
//! - **[`traits`]**: [`PluginRunner`], implemented by plugin types.
//! - **[`status`]**: [`PluginStatus`] and the lifecycle messages.
//! - **[`error`]**: [`PluginSystemError`](error::PluginSystemError) and
//!   [`PluginError`](error::PluginError).
pub mod context;
pub mod error;
pub mod lifecycle;
pub mod manager;
pub mod registry;
pub mod status;
pub mod store;
pub mod traits;

pub use context::{PluginContext, PluginHost, SharedContext};
pub use manager::{DefaultPluginManager, PluginInfo, PluginManager};
pub use registry::PluginRegistry;
pub use status::PluginStatus;
pub use store::{InMemoryPluginStore, PluginStore};
pub use traits::{PluginMenuDescriptor, PluginRunner};

#[cfg(test)]
mod tests;
