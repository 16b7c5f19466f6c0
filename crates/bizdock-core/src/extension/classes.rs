//! Compiled-in implementation classes.
//!
//! Extensions do not ship executable code. Their descriptors name classes,
//! and the host resolves those names against a [`ClassRegistry`] populated
//! at build time. Each registry has a host namespace shared by every
//! extension and one private namespace per extension name. A
//! [`LoadingContext`] resolves names in the private namespace first and
//! falls back to the host namespace.
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::extension::error::{BoxedCause, ExtensionError};
use crate::plugin_system::traits::PluginRunner;
use crate::web_command::controller::Controller;

pub type ControllerFactory = Arc<dyn Fn() -> Result<Arc<dyn Controller>, BoxedCause> + Send + Sync>;
pub type RunnerFactory = Arc<dyn Fn() -> Result<Arc<dyn PluginRunner>, BoxedCause> + Send + Sync>;

#[derive(Clone, Default)]
struct Namespace {
    controllers: HashMap<String, ControllerFactory>,
    runners: HashMap<String, RunnerFactory>,
}

impl Namespace {
    fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .controllers
            .keys()
            .chain(self.runners.keys())
            .cloned()
            .collect();
        names.sort();
        names
    }
}

/// Immutable set of the implementation classes known to the host
#[derive(Clone, Default)]
pub struct ClassRegistry {
    host: Namespace,
    bundles: HashMap<String, Namespace>,
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRegistry")
            .field("host", &self.host.class_names())
            .field("bundles", &self.bundles.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ClassRegistry {
    pub fn builder() -> ClassRegistryBuilder {
        ClassRegistryBuilder::default()
    }

    /// Create the loading context of the extension `extension`.
    pub fn context_for(self: &Arc<Self>, extension: &str) -> LoadingContext {
        LoadingContext {
            extension: extension.to_string(),
            registry: self.clone(),
        }
    }

    pub fn host_classes(&self) -> Vec<String> {
        self.host.class_names()
    }
}

/// Builder for [`ClassRegistry`]
#[derive(Default)]
pub struct ClassRegistryBuilder {
    registry: ClassRegistry,
}

impl ClassRegistryBuilder {
    /// Register a controller class visible to every extension.
    pub fn controller<F>(mut self, class_name: &str, factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Controller>, BoxedCause> + Send + Sync + 'static,
    {
        self.registry
            .host
            .controllers
            .insert(class_name.to_string(), Arc::new(factory));
        self
    }

    /// Register a plugin runner class visible to every extension.
    pub fn runner<F>(mut self, class_name: &str, factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn PluginRunner>, BoxedCause> + Send + Sync + 'static,
    {
        self.registry
            .host
            .runners
            .insert(class_name.to_string(), Arc::new(factory));
        self
    }

    /// Register a controller class private to the extension `extension`.
    pub fn bundle_controller<F>(mut self, extension: &str, class_name: &str, factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Controller>, BoxedCause> + Send + Sync + 'static,
    {
        self.registry
            .bundles
            .entry(extension.to_string())
            .or_default()
            .controllers
            .insert(class_name.to_string(), Arc::new(factory));
        self
    }

    /// Register a plugin runner class private to the extension `extension`.
    pub fn bundle_runner<F>(mut self, extension: &str, class_name: &str, factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn PluginRunner>, BoxedCause> + Send + Sync + 'static,
    {
        self.registry
            .bundles
            .entry(extension.to_string())
            .or_default()
            .runners
            .insert(class_name.to_string(), Arc::new(factory));
        self
    }

    pub fn build(self) -> Arc<ClassRegistry> {
        Arc::new(self.registry)
    }
}

/// Class resolution scope of one extension
#[derive(Clone)]
pub struct LoadingContext {
    extension: String,
    registry: Arc<ClassRegistry>,
}

impl fmt::Debug for LoadingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadingContext")
            .field("extension", &self.extension)
            .finish_non_exhaustive()
    }
}

impl LoadingContext {
    pub fn extension(&self) -> &str {
        &self.extension
    }

    fn unknown(&self, class_name: &str) -> ExtensionError {
        ExtensionError::UnknownClass {
            extension: self.extension.clone(),
            class_name: class_name.to_string(),
        }
    }

    fn controller_factory(&self, class_name: &str) -> Option<&ControllerFactory> {
        self.registry
            .bundles
            .get(&self.extension)
            .and_then(|ns| ns.controllers.get(class_name))
            .or_else(|| self.registry.host.controllers.get(class_name))
    }

    fn runner_factory(&self, class_name: &str) -> Option<&RunnerFactory> {
        self.registry
            .bundles
            .get(&self.extension)
            .and_then(|ns| ns.runners.get(class_name))
            .or_else(|| self.registry.host.runners.get(class_name))
    }

    /// Instantiate a controller class. A panicking factory counts as a
    /// failed instantiation.
    pub fn instantiate_controller(&self, class_name: &str) -> Result<Arc<dyn Controller>, ExtensionError> {
        let factory = self
            .controller_factory(class_name)
            .ok_or_else(|| self.unknown(class_name))?;
        invoke_factory(class_name, || factory())
    }

    /// Instantiate a plugin runner class.
    pub fn instantiate_runner(&self, class_name: &str) -> Result<Arc<dyn PluginRunner>, ExtensionError> {
        let factory = self
            .runner_factory(class_name)
            .ok_or_else(|| self.unknown(class_name))?;
        invoke_factory(class_name, || factory())
    }
}

fn invoke_factory<T>(
    class_name: &str,
    factory: impl FnOnce() -> Result<T, BoxedCause>,
) -> Result<T, ExtensionError> {
    match panic::catch_unwind(AssertUnwindSafe(factory)) {
        Ok(Ok(instance)) => Ok(instance),
        Ok(Err(cause)) => Err(ExtensionError::ManagerError(format!(
            "unable to instantiate '{}': {}",
            class_name, cause
        ))),
        Err(_) => Err(ExtensionError::ManagerError(format!(
            "unable to instantiate '{}': the factory panicked",
            class_name
        ))),
    }
}
