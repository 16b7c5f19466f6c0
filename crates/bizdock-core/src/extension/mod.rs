//! # BizDock Extensions
//!
//! An extension is a bundle file dropped into the extension directory. Its
//! descriptor declares web controllers, plugin types, translated messages
//! and menu customizations; the implementation classes it names are
//! resolved against the [`ClassRegistry`](classes::ClassRegistry) compiled
//! into the host.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`descriptor`]**: Parsing and validation of the descriptor resource
//!   ([`ExtensionDescriptor`], [`PluginDescriptor`]).
//! - **[`classes`]**: Host and per-extension namespaces of controller and
//!   plugin runner factories.
//! - **[`loader`]**: Turns a bundle file into a loaded [`Extension`].
//! - **[`manager`]**: The [`ExtensionManager`], which owns the loaded
//!   extensions and everything they registered, reloads modified bundles and
//!   instantiates plugin runners for the plugin manager.
//! - **[`i18n`]** and **[`menu`]**: The message catalog and the top menu bar
//!   extensions contribute to.
//! - **[`refresh`]**: The periodic auto-refresh task.
//! - **[`error`]**: [`ExtensionError`](error::ExtensionError).
pub mod classes;
pub mod descriptor;
pub mod error;
pub mod i18n;
pub mod loader;
pub mod manager;
pub mod menu;
pub mod refresh;

pub use classes::{ClassRegistry, ClassRegistryBuilder, LoadingContext};
pub use descriptor::{ExtensionDescriptor, PluginDescriptor};
pub use error::ExtensionError;
pub use loader::{Extension, BUNDLE_EXTENSION};
pub use manager::ExtensionManager;
pub use refresh::RefreshReport;

#[cfg(test)]
mod tests;
