use std::any::TypeId;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::extension::classes::ClassRegistry;
use crate::extension::manager::ExtensionManager;
use crate::kernel::component::{DependencyRegistry, KernelComponent};
use crate::kernel::constants;
use crate::kernel::error::{Error, KernelLifecyclePhase, Result};
use crate::plugin_system::manager::DefaultPluginManager;
use crate::plugin_system::store::PluginStore;
use crate::storage::config::ConfigData;
use crate::storage::local::LocalStorageProvider;
use crate::storage::RuntimeSettings;

/// Owns the runtime components and drives their lifecycle.
///
/// Components are initialized and started in registration order (the
/// extension manager, then the plugin manager) and stopped in reverse order.
pub struct Application {
    settings: RuntimeSettings,
    started: bool,
    dependencies: Arc<Mutex<DependencyRegistry>>,
    component_init_order: Vec<TypeId>,
}

impl Application {
    pub fn new(settings: RuntimeSettings, classes: Arc<ClassRegistry>, store: Arc<dyn PluginStore>) -> Self {
        log::info!("Creating {} v{}", constants::APP_NAME, constants::APP_VERSION);

        let mut registry = DependencyRegistry::new();
        let mut init_order = Vec::new();

        let extension_manager = Arc::new(ExtensionManager::new(settings.clone(), classes));
        registry.register_instance(extension_manager.clone());
        init_order.push(TypeId::of::<ExtensionManager>());

        let plugin_manager = Arc::new(DefaultPluginManager::new(
            settings.clone(),
            store,
            extension_manager.as_ref().clone(),
        ));
        registry.register_instance(plugin_manager);
        init_order.push(TypeId::of::<DefaultPluginManager>());

        Application {
            settings,
            started: false,
            dependencies: Arc::new(Mutex::new(registry)),
            component_init_order: init_order,
        }
    }

    /// Build from a settings file. A missing file yields the default settings.
    pub fn from_settings_file(path: &Path, classes: Arc<ClassRegistry>, store: Arc<dyn PluginStore>) -> Result<Self> {
        let settings = load_settings(path)?;
        log::info!("Settings loaded from {}", path.display());
        Ok(Self::new(settings, classes, store))
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub async fn get_component<T: KernelComponent + 'static>(&self) -> Option<Arc<T>> {
        self.dependencies.lock().await.get_concrete::<T>()
    }

    async fn required<T: KernelComponent + 'static>(&self, name: &str) -> Result<Arc<T>> {
        self.get_component::<T>()
            .await
            .ok_or_else(|| Error::ComponentRegistryError {
                operation: "get_component".to_string(),
                component_name: Some(name.to_string()),
                message: "component not registered".to_string(),
            })
    }

    pub async fn extension_manager(&self) -> Result<Arc<ExtensionManager>> {
        self.required::<ExtensionManager>("ExtensionManager").await
    }

    pub async fn plugin_manager(&self) -> Result<Arc<DefaultPluginManager>> {
        self.required::<DefaultPluginManager>("DefaultPluginManager").await
    }

    /// Initialize then start every component
    pub async fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(Error::KernelLifecycleError {
                phase: KernelLifecyclePhase::RunPreCheck,
                component_name: None,
                type_id_str: None,
                message: "Application already started".to_string(),
                source: None,
            });
        }

        self.for_each_component(KernelLifecyclePhase::Initialize).await?;
        self.for_each_component(KernelLifecyclePhase::Start).await?;
        self.started = true;
        log::info!("{} started", constants::APP_NAME);
        Ok(())
    }

    /// Start, wait for `shutdown_signal`, then shut down
    pub async fn run_until<F>(&mut self, shutdown_signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        shutdown_signal.await;
        log::info!("Shutdown requested");
        self.shutdown().await
    }

    async fn for_each_component(&self, phase: KernelLifecyclePhase) -> Result<()> {
        let registry = self.dependencies.lock().await;
        for type_id in &self.component_init_order {
            let Some(component) = registry.get_component_by_id(type_id) else {
                log::error!("Component {:?} missing from the registry during {}", type_id, phase);
                return Err(Error::KernelLifecycleError {
                    phase,
                    component_name: None,
                    type_id_str: Some(format!("{:?}", type_id)),
                    message: "Instance missing from registry".to_string(),
                    source: None,
                });
            };
            log::info!("{}: {}", phase, component.name());
            let outcome = match phase {
                KernelLifecyclePhase::Initialize => component.initialize().await,
                _ => component.start().await,
            };
            if let Err(e) = outcome {
                log::error!("{} of {} failed: {}", phase, component.name(), e);
                return Err(Error::KernelLifecycleError {
                    phase,
                    component_name: Some(component.name().to_string()),
                    type_id_str: Some(format!("{:?}", type_id)),
                    message: format!("Component failed: {}", e),
                    source: Some(Box::new(e)),
                });
            }
        }
        Ok(())
    }

    /// Stop every component in reverse order. Every component is stopped
    /// even when one fails; the first failure is returned.
    pub async fn shutdown(&mut self) -> Result<()> {
        log::info!("Shutting down components...");
        let registry = self.dependencies.lock().await;
        let mut first_error = None;

        for type_id in self.component_init_order.iter().rev() {
            let Some(component) = registry.get_component_by_id(type_id) else {
                log::warn!("Component {:?} missing from the registry during stop", type_id);
                continue;
            };
            log::info!("Stopping component: {}", component.name());
            if let Err(e) = component.stop().await {
                log::error!("Error stopping component {}: {}", component.name(), e);
                first_error.get_or_insert(Error::KernelLifecycleError {
                    phase: KernelLifecyclePhase::Shutdown,
                    component_name: Some(component.name().to_string()),
                    type_id_str: Some(format!("{:?}", type_id)),
                    message: "Component failed to stop".to_string(),
                    source: Some(Box::new(e)),
                });
            }
        }
        self.started = false;
        match first_error {
            Some(e) => Err(e),
            None => {
                log::info!("Component shutdown complete.");
                Ok(())
            }
        }
    }
}

/// Read runtime settings from a JSON, YAML or TOML file
pub fn load_settings(path: &Path) -> Result<RuntimeSettings> {
    let directory = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let file_name = path.file_name().ok_or_else(|| Error::Other(format!("'{}' is not a file path", path.display())))?;
    let provider = LocalStorageProvider::new(directory.to_path_buf());
    let config = ConfigData::load(&provider, Path::new(file_name))?;
    Ok(RuntimeSettings::from_config(&config))
}
