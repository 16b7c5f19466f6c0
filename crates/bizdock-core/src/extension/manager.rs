use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use log::{debug, error, info, warn};
use tokio::sync::{Mutex, RwLock};

use crate::extension::classes::ClassRegistry;
use crate::extension::descriptor::PluginDescriptor;
use crate::extension::error::ExtensionError;
use crate::extension::i18n::MessageCatalog;
use crate::extension::loader::{self, Extension, BUNDLE_EXTENSION};
use crate::extension::menu::TopMenuBar;
use crate::extension::refresh::{RefreshReport, RefreshTask};
use crate::kernel::component::KernelComponent;
use crate::kernel::constants::ADMIN_PLUGIN_MANAGER_PERMISSION;
use crate::kernel::error::Result as KernelResult;
use crate::plugin_system::context::PluginContext;
use crate::plugin_system::traits::PluginRunner;
use crate::storage::RuntimeSettings;
use crate::utils::fs as fs_utils;
use crate::web_command::controller::Controller;
use crate::web_command::registry::{controller_key, WebCommandRegistry};
use crate::web_command::{CommandResult, ParamValue, RequestContext};

/// Controllers registered for one plugin configuration
#[derive(Debug, Clone)]
struct PluginResources {
    extension: String,
    controller_keys: Vec<String>,
}

fn resource_key(identifier: &str, plugin_configuration_id: i64) -> String {
    format!("{}#{}", identifier, plugin_configuration_id)
}

struct ManagerState {
    settings: RuntimeSettings,
    classes: Arc<ClassRegistry>,
    extensions: RwLock<Vec<Arc<Extension>>>,
    commands: RwLock<WebCommandRegistry>,
    plugin_resources: Mutex<HashMap<String, PluginResources>>,
    messages: Arc<MessageCatalog>,
    menu: Arc<TopMenuBar>,
    /// Serializes loads and unloads
    load_lock: Mutex<()>,
    /// Serializes refresh passes
    refresh_lock: Mutex<()>,
    refresh_task: Mutex<Option<RefreshTask>>,
}

/// Loads bundles, owns their web commands, i18n messages and menu
/// customizations, and instantiates plugin runners on behalf of the plugin
/// manager.
#[derive(Clone)]
pub struct ExtensionManager {
    state: Arc<ManagerState>,
}

impl fmt::Debug for ExtensionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionManager")
            .field("directory", &self.state.settings.extension_directory)
            .finish_non_exhaustive()
    }
}

impl ExtensionManager {
    pub fn new(settings: RuntimeSettings, classes: Arc<ClassRegistry>) -> Self {
        Self::with_services(
            settings,
            classes,
            Arc::new(MessageCatalog::default()),
            Arc::new(TopMenuBar::default()),
        )
    }

    pub fn with_services(
        settings: RuntimeSettings,
        classes: Arc<ClassRegistry>,
        messages: Arc<MessageCatalog>,
        menu: Arc<TopMenuBar>,
    ) -> Self {
        Self {
            state: Arc::new(ManagerState {
                settings,
                classes,
                extensions: RwLock::new(Vec::new()),
                commands: RwLock::new(WebCommandRegistry::new()),
                plugin_resources: Mutex::new(HashMap::new()),
                messages,
                menu,
                load_lock: Mutex::new(()),
                refresh_lock: Mutex::new(()),
                refresh_task: Mutex::new(None),
            }),
        }
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.state.settings
    }

    pub fn messages(&self) -> &Arc<MessageCatalog> {
        &self.state.messages
    }

    pub fn menu(&self) -> &Arc<TopMenuBar> {
        &self.state.menu
    }

    /// Load every bundle of the extension directory, apply the menu
    /// customizations and start the auto-refresh if enabled.
    pub async fn init(&self) -> Result<(), ExtensionError> {
        let directory = &self.state.settings.extension_directory;
        let bundles = if directory.is_dir() {
            fs_utils::list_files_with_extension(directory, BUNDLE_EXTENSION).map_err(|e| {
                ExtensionError::load_with_source(directory.clone(), "unable to list the extension directory", e)
            })?
        } else {
            warn!("Extension directory {} does not exist", directory.display());
            Vec::new()
        };

        for bundle in bundles {
            match self.load(&bundle).await {
                Ok(extension) => info!("Extension successfully loaded {}", extension.path().display()),
                Err(e) => error!("Failure while loading the extension {}: {}", bundle.display(), e),
            }
        }

        self.customize_menu().await;

        if self.state.settings.auto_refresh {
            self.start_auto_refresh().await;
        }
        Ok(())
    }

    /// Unload every extension and cancel the auto-refresh
    pub async fn destroy(&self) {
        for extension in self.loaded_extensions().await {
            self.unload(&extension).await;
        }
        if let Some(task) = self.state.refresh_task.lock().await.take() {
            task.cancel().await;
        }
    }

    pub async fn loaded_extensions(&self) -> Vec<Arc<Extension>> {
        self.state.extensions.read().await.clone()
    }

    pub async fn extension(&self, name: &str) -> Option<Arc<Extension>> {
        self.state
            .extensions
            .read()
            .await
            .iter()
            .find(|e| e.name() == name)
            .cloned()
    }

    /// Load the bundle at `path` and register its controllers and messages.
    ///
    /// Nothing stays registered when the load fails.
    pub async fn load(&self, path: &Path) -> Result<Arc<Extension>, ExtensionError> {
        let _guard = self.state.load_lock.lock().await;
        let mut extension = loader::load_bundle(path, &self.state.classes).await?;

        {
            let extensions = self.state.extensions.read().await;
            for loaded in extensions.iter() {
                if loaded.name() == extension.name() {
                    return Err(ExtensionError::load(
                        path,
                        format!("an extension named '{}' is already loaded", extension.name()),
                    ));
                }
                if loaded.path() == extension.path() {
                    return Err(ExtensionError::load(path, "the bundle is already loaded"));
                }
                let clash = extension
                    .descriptor()
                    .plugins
                    .iter()
                    .find(|p| loaded.descriptor().plugin(&p.identifier).is_some());
                if let Some(plugin) = clash {
                    return Err(ExtensionError::load(
                        path,
                        format!(
                            "the plugin '{}' is already provided by the extension '{}'",
                            plugin.identifier,
                            loaded.name()
                        ),
                    ));
                }
            }
        }

        {
            let mut commands = self.state.commands.write().await;
            for controller in extension.controllers() {
                if let Err(e) = commands.register_controller(extension.name(), controller.clone(), None, &[]) {
                    let removed = commands.remove_owner(extension.name());
                    debug!("Rolled back {} controller(s) of {}", removed.len(), extension.name());
                    return Err(ExtensionError::load_with_source(
                        path,
                        format!("unable to register the controller '{}'", controller.class_name()),
                        e,
                    ));
                }
            }
        }

        let descriptor = extension.descriptor().clone();
        for block in &descriptor.i18n_messages {
            if let Some(added) = self.state.messages.add(&block.language, &block.messages).await {
                info!(
                    "Loaded i18n keys [{}] for the extension {}",
                    added.language,
                    extension.name()
                );
                extension.messages.push(added);
            }
        }

        let extension = Arc::new(extension);
        self.state.extensions.write().await.push(extension.clone());
        info!("Extension {} loaded from {}", extension.name(), path.display());
        Ok(extension)
    }

    /// Unload an extension. Returns false, doing nothing, when it is not
    /// currently loaded.
    pub async fn unload(&self, extension: &Extension) -> bool {
        let _guard = self.state.load_lock.lock().await;
        let loaded = self
            .state
            .extensions
            .read()
            .await
            .iter()
            .any(|e| e.is_same(extension));
        if !loaded {
            debug!("Extension {} is not loaded, nothing to unload", extension.name());
            return false;
        }

        {
            let mut commands = self.state.commands.write().await;
            for key in commands.remove_owner(extension.name()) {
                info!("Unloading controller {}", key);
            }
        }
        self.state
            .plugin_resources
            .lock()
            .await
            .retain(|_, resources| resources.extension != extension.name());

        for added in &extension.messages {
            self.state.messages.remove(added).await;
            info!(
                "Unloaded i18n keys [{}] for the extension {}",
                added.language,
                extension.name()
            );
        }

        self.state
            .extensions
            .write()
            .await
            .retain(|e| !e.is_same(extension));
        info!("Extension {} unloaded", extension.name());
        true
    }

    pub async fn unload_by_name(&self, name: &str) -> bool {
        match self.extension(name).await {
            Some(extension) => self.unload(&extension).await,
            None => false,
        }
    }

    /// Reset the menu once, then apply the customization of every loaded
    /// extension. Returns true if any was applied.
    pub async fn customize_menu(&self) -> bool {
        let mut reset = false;
        for extension in self.loaded_extensions().await {
            if let Some(customization) = &extension.descriptor().menu_customization {
                if !reset {
                    info!("Reseting the toolbar before adding menu customizations");
                    self.state.menu.reset().await;
                    reset = true;
                }
                info!("Loading menu customization for extension {}", extension.name());
                self.state.menu.apply_customization(customization).await;
            }
        }
        reset
    }

    /// Reload the extensions whose bundle changed since they were loaded
    pub async fn refresh_once(&self) -> RefreshReport {
        let _guard = self.state.refresh_lock.lock().await;
        let mut report = RefreshReport::default();
        for extension in self.loaded_extensions().await {
            match fs_utils::is_modified_since(extension.path(), extension.loading_time()) {
                Ok(true) => {
                    info!("Extension {} updated, reloading", extension.name());
                    self.unload(&extension).await;
                    match self.load(extension.path()).await {
                        Ok(_) => report.reloaded.push(extension.path().to_path_buf()),
                        Err(e) => {
                            error!("Failure while reloading the extension {}: {}", extension.path().display(), e);
                            report.failed.push((extension.path().to_path_buf(), e.to_string()));
                        }
                    }
                }
                Ok(false) => {}
                Err(e) => warn!(
                    "Unable to check the bundle of the extension {}: {}",
                    extension.name(),
                    e
                ),
            }
        }
        report
    }

    /// Start the recurring refresh, unless it is already running
    pub async fn start_auto_refresh(&self) {
        let mut task = self.state.refresh_task.lock().await;
        if task.is_some() {
            return;
        }
        let period = self.state.settings.auto_refresh_frequency;
        let state: Weak<ManagerState> = Arc::downgrade(&self.state);
        *task = Some(RefreshTask::spawn(period, move || {
            let state = state.upgrade()?;
            Some(async move {
                let report = ExtensionManager { state }.refresh_once().await;
                if !report.is_empty() {
                    debug!("Refresh pass: {:?}", report);
                }
            })
        }));
        info!("Extension auto-refresh started, every {:?}", period);
    }

    pub async fn is_auto_refresh_running(&self) -> bool {
        self.state.refresh_task.lock().await.is_some()
    }

    /// Total size in bytes of the extension directory
    pub fn size(&self) -> Result<u64, ExtensionError> {
        fs_utils::directory_size(&self.state.settings.extension_directory)
            .map_err(|e| ExtensionError::ManagerError(format!("unable to compute the extension directory size: {}", e)))
    }

    /// Dispatch a request to the extension commands
    pub async fn execute(&self, path: &str, request: &RequestContext) -> CommandResult {
        self.state.commands.read().await.execute(path, request)
    }

    /// Absolute link to a command. `controller` is the class name of a
    /// standalone controller or the key returned for a plugin controller.
    pub async fn link(
        &self,
        controller: &str,
        command_id: &str,
        params: &[ParamValue],
    ) -> Result<String, ExtensionError> {
        let path = self
            .state
            .commands
            .read()
            .await
            .link(controller, command_id, params)
            .map_err(|e| ExtensionError::ManagerError(e.to_string()))?;
        Ok(format!("{}{}", self.state.settings.extension_link_prefix(), path))
    }

    pub async fn command_count(&self) -> usize {
        self.state.commands.read().await.command_count()
    }

    pub async fn controller_keys(&self) -> Vec<String> {
        self.state.commands.read().await.controller_keys()
    }

    /// Descriptors of the plugins of every loaded extension
    pub async fn plugin_descriptors(&self) -> Vec<PluginDescriptor> {
        self.state
            .extensions
            .read()
            .await
            .iter()
            .flat_map(|e| e.descriptor().plugins.clone())
            .collect()
    }

    pub async fn plugin_descriptor(&self, identifier: &str) -> Option<PluginDescriptor> {
        self.find_plugin(identifier).await.map(|(_, d)| d)
    }

    async fn find_plugin(&self, identifier: &str) -> Option<(Arc<Extension>, PluginDescriptor)> {
        self.state.extensions.read().await.iter().find_map(|e| {
            e.descriptor()
                .plugin(identifier)
                .map(|d| (e.clone(), d.clone()))
        })
    }

    /// Instantiate and initialize the runner of a plugin configuration, and
    /// register its configurator controllers.
    pub async fn load_plugin_instance(
        &self,
        identifier: &str,
        plugin_configuration_id: i64,
        context: Arc<PluginContext>,
    ) -> Result<Arc<dyn PluginRunner>, ExtensionError> {
        let (extension, descriptor) = self.find_plugin(identifier).await.ok_or_else(|| {
            ExtensionError::ManagerError(format!(
                "No plugin implementation found for the plugin identifier {}",
                identifier
            ))
        })?;

        let runner = extension
            .context()
            .instantiate_runner(&descriptor.class_name)
            .map_err(|e| {
                ExtensionError::ManagerError(format!(
                    "Unable to create an instance for the specified plugin {}: {}",
                    identifier, e
                ))
            })?;
        runner.init(context).await.map_err(|e| {
            ExtensionError::ManagerError(format!(
                "Unable to initialize the plugin {} for the configuration {}: {}",
                identifier, plugin_configuration_id, e
            ))
        })?;
        info!(
            "Plugin instance [{}] for the unique id [{}] in the extension {} : runner instantiated",
            plugin_configuration_id,
            identifier,
            extension.name()
        );

        let default_permissions = vec![ADMIN_PLUGIN_MANAGER_PERMISSION.to_string()];
        let mut configurators: Vec<(String, String)> = Vec::new();
        if let Some(class_name) = &descriptor.custom_configurator {
            configurators.push((class_name.clone(), format!("/{}/custom", plugin_configuration_id)));
        }
        for registration in &descriptor.registration_configurators {
            configurators.push((
                registration.class_name.clone(),
                format!(
                    "/{}/register{}",
                    plugin_configuration_id,
                    registration.data_type.to_lowercase()
                ),
            ));
        }

        let mut controller_keys = Vec::new();
        {
            let mut commands = self.state.commands.write().await;
            for (class_name, prefix) in configurators {
                let controller: Arc<dyn Controller> = match extension.context().instantiate_controller(&class_name) {
                    Ok(controller) => controller,
                    Err(e) => {
                        warn!("Error while loading the configuration controller {}: {}", class_name, e);
                        continue;
                    }
                };
                match commands.register_controller(extension.name(), controller, Some(&prefix), &default_permissions) {
                    Ok(key) => {
                        info!("Configuration controller {} registered", key);
                        controller_keys.push(key);
                    }
                    Err(e) => warn!("Error while registering the configuration controller {}: {}", class_name, e),
                }
            }
        }

        self.state.plugin_resources.lock().await.insert(
            resource_key(identifier, plugin_configuration_id),
            PluginResources {
                extension: extension.name().to_string(),
                controller_keys,
            },
        );
        Ok(runner)
    }

    /// Remove the configurator controllers of a plugin configuration
    pub async fn unload_plugin_instance(
        &self,
        identifier: &str,
        plugin_configuration_id: i64,
    ) -> Result<(), ExtensionError> {
        let resources = self
            .state
            .plugin_resources
            .lock()
            .await
            .remove(&resource_key(identifier, plugin_configuration_id))
            .ok_or_else(|| {
                ExtensionError::ManagerError(format!(
                    "No plugin implementation found for the plugin identifier {} and instance {}",
                    identifier, plugin_configuration_id
                ))
            })?;
        let mut commands = self.state.commands.write().await;
        for key in &resources.controller_keys {
            if commands.remove_controller(key) {
                info!("Un-registering the configuration controller {}", key);
            }
        }
        info!(
            "Plugin instance [{}] for the unique id [{}] in the extension {} unloaded",
            plugin_configuration_id, identifier, resources.extension
        );
        Ok(())
    }

    /// Keys of the controllers registered for a plugin configuration
    pub async fn plugin_controller_keys(&self, identifier: &str, plugin_configuration_id: i64) -> Vec<String> {
        self.state
            .plugin_resources
            .lock()
            .await
            .get(&resource_key(identifier, plugin_configuration_id))
            .map(|r| r.controller_keys.clone())
            .unwrap_or_default()
    }

    /// Key of a standalone controller class
    pub fn standalone_key(class_name: &str) -> String {
        controller_key(class_name, None)
    }

    pub fn extension_directory(&self) -> PathBuf {
        self.state.settings.extension_directory.clone()
    }
}

#[async_trait]
impl KernelComponent for ExtensionManager {
    fn name(&self) -> &'static str {
        "ExtensionManager"
    }

    async fn initialize(&self) -> KernelResult<()> {
        Ok(self.init().await?)
    }

    async fn start(&self) -> KernelResult<()> {
        Ok(())
    }

    async fn stop(&self) -> KernelResult<()> {
        self.destroy().await;
        Ok(())
    }
}
