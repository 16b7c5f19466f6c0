//! # BizDock Core Kernel
//!
//! Bootstrapping and lifecycle of the runtime components.
//!
//! - **[`bootstrap`]**: [`Application`](bootstrap::Application), which wires
//!   the [`ExtensionManager`](crate::extension::ExtensionManager) and the
//!   [`DefaultPluginManager`](crate::plugin_system::DefaultPluginManager)
//!   from the runtime settings and starts and stops them in order.
//! - **[`component`]**: the [`KernelComponent`](component::KernelComponent)
//!   trait and the [`DependencyRegistry`](component::DependencyRegistry).
//! - **[`constants`]**: application-wide constants.
//! - **[`error`]**: the crate-wide [`Error`](error::Error) and `Result`.
pub mod bootstrap;
pub mod component;
pub mod constants;
pub mod error;

pub use bootstrap::Application;
pub use component::{DependencyRegistry, KernelComponent};
pub use error::{Error, Result};

#[cfg(test)]
mod tests;
