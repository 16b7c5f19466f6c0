//! Fixtures shared by the module and integration tests.
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::event::EventMessage;
use crate::extension::classes::ClassRegistry;
use crate::extension::descriptor::{ExtensionDescriptor, PluginDescriptor};
use crate::plugin_system::context::{PluginContext, PluginHost, SharedContext};
use crate::plugin_system::error::{PluginError, PluginSystemError};
use crate::plugin_system::store::PluginStore;
use crate::plugin_system::traits::{PluginMenuDescriptor, PluginRunner};
use crate::storage::local::LocalStorageProvider;
use crate::storage::RuntimeSettings;
use crate::web_command::controller::{CommandDescriptor, CommandReply, Controller, ControllerError, ParamKind, ParamValue};
use crate::web_command::request::{CommandResult, RequestContext};

pub const WIDGET_CONTROLLER: &str = "sample.WidgetController";
pub const BROKEN_CONTROLLER: &str = "sample.BrokenController";
pub const CUSTOM_CONFIGURATOR: &str = "test.CustomConfigurator";
pub const PROJECT_CONFIGURATOR: &str = "test.ProjectConfigurator";
pub const PROBE_RUNNER: &str = "test.ProbeRunner";
pub const MENU_RUNNER: &str = "test.MenuRunner";

// ===== RUNNERS =====

/// Shared switches and journal of every runner built from one registry
#[derive(Debug, Default)]
pub struct RunnerProbe {
    events: StdMutex<Vec<String>>,
    pub fail_start: AtomicBool,
    pub panic_start: AtomicBool,
    pub fail_stop: AtomicBool,
    pub fail_messages: AtomicBool,
    pub message_delay_ms: AtomicU64,
}

impl RunnerProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events().iter().filter(|e| e.starts_with(prefix)).count()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

pub struct ProbeRunner {
    probe: Arc<RunnerProbe>,
    context: StdMutex<Option<Arc<PluginContext>>>,
    with_menu: bool,
}

impl ProbeRunner {
    pub fn new(probe: Arc<RunnerProbe>, with_menu: bool) -> Self {
        Self {
            probe,
            context: StdMutex::new(None),
            with_menu,
        }
    }

    fn id(&self) -> i64 {
        self.context
            .lock()
            .unwrap()
            .as_ref()
            .map(|c| c.plugin_configuration_id())
            .unwrap_or(-1)
    }

    async fn handle(&self, flow: &str, message: &EventMessage) -> Result<(), PluginError> {
        self.probe.record(format!(
            "{}:{}:{}:{}",
            flow,
            self.id(),
            message.message_type,
            message.transaction_id
        ));
        let delay = self.probe.message_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.probe.fail_messages.load(Ordering::SeqCst) {
            return Err(PluginError::new("remote system unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl PluginRunner for ProbeRunner {
    async fn init(&self, context: Arc<PluginContext>) -> Result<(), PluginError> {
        self.probe.record(format!("init:{}", context.plugin_configuration_id()));
        *self.context.lock().unwrap() = Some(context);
        Ok(())
    }

    async fn start(&self) -> Result<(), PluginError> {
        self.probe.record(format!("start:{}", self.id()));
        if self.probe.panic_start.load(Ordering::SeqCst) {
            panic!("start hook exploded");
        }
        if self.probe.fail_start.load(Ordering::SeqCst) {
            return Err(PluginError::new("cannot connect"));
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), PluginError> {
        self.probe.record(format!("stop:{}", self.id()));
        if self.probe.fail_stop.load(Ordering::SeqCst) {
            return Err(PluginError::new("connection already closed"));
        }
        Ok(())
    }

    async fn handle_in_provisioning_message(&self, message: &EventMessage) -> Result<(), PluginError> {
        self.handle("in", message).await
    }

    async fn handle_out_provisioning_message(&self, message: &EventMessage) -> Result<(), PluginError> {
        self.handle("out", message).await
    }

    fn menu_descriptor(&self) -> Option<PluginMenuDescriptor> {
        self.with_menu.then(|| PluginMenuDescriptor {
            label: "Probe".to_string(),
            path: "/custom/settings".to_string(),
        })
    }
}

// ===== CONTROLLERS =====

pub struct WidgetController;

impl Controller for WidgetController {
    fn class_name(&self) -> &str {
        WIDGET_CONTROLLER
    }

    fn path(&self) -> &str {
        "/widgets"
    }

    fn commands(&self) -> Vec<CommandDescriptor> {
        vec![CommandDescriptor::get("show", "/:id")
            .with_id("show")
            .with_param("id", ParamKind::Long)]
    }

    fn invoke(&self, _: &str, args: &[ParamValue], _: &RequestContext) -> Result<CommandReply, ControllerError> {
        Ok(Box::new(CommandResult::ok(format!("widget {}", args[0]))))
    }
}

pub struct ConfiguratorController {
    class_name: &'static str,
}

impl Controller for ConfiguratorController {
    fn class_name(&self) -> &str {
        self.class_name
    }

    fn path(&self) -> &str {
        "/settings"
    }

    fn commands(&self) -> Vec<CommandDescriptor> {
        vec![CommandDescriptor::get("show", "").with_id("show")]
    }

    fn invoke(&self, _: &str, _: &[ParamValue], _: &RequestContext) -> Result<CommandReply, ControllerError> {
        Ok(Box::new(CommandResult::ok(self.class_name)))
    }
}

/// Registry holding every fixture class
pub fn class_registry(probe: &Arc<RunnerProbe>) -> Arc<ClassRegistry> {
    let plain = probe.clone();
    let with_menu = probe.clone();
    ClassRegistry::builder()
        .controller(WIDGET_CONTROLLER, || Ok(Arc::new(WidgetController) as Arc<dyn Controller>))
        .controller(BROKEN_CONTROLLER, || Err("no database connection".into()))
        .controller(CUSTOM_CONFIGURATOR, || {
            Ok(Arc::new(ConfiguratorController {
                class_name: CUSTOM_CONFIGURATOR,
            }) as Arc<dyn Controller>)
        })
        .controller(PROJECT_CONFIGURATOR, || {
            Ok(Arc::new(ConfiguratorController {
                class_name: PROJECT_CONFIGURATOR,
            }) as Arc<dyn Controller>)
        })
        .runner(PROBE_RUNNER, move || {
            Ok(Arc::new(ProbeRunner::new(plain.clone(), false)) as Arc<dyn PluginRunner>)
        })
        .runner(MENU_RUNNER, move || {
            Ok(Arc::new(ProbeRunner::new(with_menu.clone(), true)) as Arc<dyn PluginRunner>)
        })
        .build()
}

// ===== BUNDLES =====

/// Plugin declaration with both interfaces, the `project` data type and a
/// properties block `main`
pub fn plugin_entry(identifier: &str, class: &str) -> serde_json::Value {
    json!({
        "identifier": identifier,
        "class": class,
        "name": format!("{} plugin", identifier),
        "version": "1.0",
        "event-interface": { "in": true, "out": true },
        "supported-data-types": ["project"],
        "configuration-blocks": [
            { "identifier": "main", "type": "PROPERTIES", "version": 1, "default": "url=http://localhost\ntimeout=30\n" }
        ],
        "custom-configurator": CUSTOM_CONFIGURATOR,
        "registration-configurators": [
            { "data-type": "Project", "class": PROJECT_CONFIGURATOR }
        ]
    })
}

pub fn bundle_document(name: &str, controllers: &[&str], plugins: Vec<serde_json::Value>) -> serde_json::Value {
    json!({
        "descriptor": {
            "name": name,
            "controllers": controllers,
            "plugins": plugins,
            "i18n-messages": [
                { "language": "en", "messages": format!("{}.title=Title of {}\n", name, name) }
            ]
        }
    })
}

/// Descriptor of [`plugin_entry`], as a loaded extension would expose it
pub fn plugin_descriptor(identifier: &str, class: &str) -> PluginDescriptor {
    let document = bundle_document("fixture", &[], vec![plugin_entry(identifier, class)]);
    let descriptor = ExtensionDescriptor::from_bundle_bytes(&serde_json::to_vec(&document).unwrap())
        .unwrap()
        .unwrap();
    descriptor.plugin(identifier).unwrap().clone()
}

pub fn write_bundle(dir: &Path, file_name: &str, document: &serde_json::Value) -> PathBuf {
    let path = dir.join(file_name);
    std::fs::write(&path, serde_json::to_vec_pretty(document).unwrap()).unwrap();
    path
}

pub fn test_settings(extension_directory: &Path, shared_storage: &Path) -> RuntimeSettings {
    RuntimeSettings {
        extension_directory: extension_directory.to_path_buf(),
        shared_storage: shared_storage.to_path_buf(),
        probe_timeout: Duration::from_millis(500),
        ..RuntimeSettings::default()
    }
}

// ===== CONTEXT =====

/// Host recording what plugins ask for
#[derive(Debug, Default)]
pub struct RecordingHost {
    pub posted: StdMutex<Vec<EventMessage>>,
    pub stop_requests: StdMutex<Vec<i64>>,
}

#[async_trait]
impl PluginHost for RecordingHost {
    async fn post_out_message(&self, message: EventMessage) -> Result<(), PluginSystemError> {
        self.posted.lock().unwrap().push(message);
        Ok(())
    }

    async fn request_stop(&self, plugin_configuration_id: i64) {
        self.stop_requests.lock().unwrap().push(plugin_configuration_id);
    }
}

pub fn test_context(
    plugin_configuration_id: i64,
    descriptor: PluginDescriptor,
    store: Arc<dyn PluginStore>,
    host: Arc<RecordingHost>,
    shared_storage: &Path,
) -> Arc<PluginContext> {
    Arc::new(PluginContext::new(
        plugin_configuration_id,
        format!("configuration {}", plugin_configuration_id),
        Arc::new(descriptor),
        store,
        host,
        Arc::new(LocalStorageProvider::new(shared_storage.to_path_buf())),
        Arc::new(SharedContext::new()),
    ))
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_until<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
