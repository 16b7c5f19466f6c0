//! End-to-end behavior across the extension manager, the web command
//! registry and the plugin manager.
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tempfile::TempDir;

use crate::extension::manager::ExtensionManager;
use crate::plugin_system::manager::{DefaultPluginManager, PluginManager};
use crate::plugin_system::status::PluginStatus;
use crate::plugin_system::store::{InMemoryPluginStore, PluginStore};
use crate::tests::integration::common::{
    bundle_document, class_registry, plugin_entry, test_settings, wait_until, write_bundle, RunnerProbe, PROBE_RUNNER,
    WIDGET_CONTROLLER,
};
use crate::web_command::request::RequestContext;

#[tokio::test]
async fn test_widget_command_dispatch() {
    let extensions = TempDir::new().unwrap();
    let shared = TempDir::new().unwrap();
    write_bundle(
        extensions.path(),
        "widgets.bundle",
        &bundle_document("widgets", &[WIDGET_CONTROLLER], vec![]),
    );
    let manager = ExtensionManager::new(
        test_settings(extensions.path(), shared.path()),
        class_registry(&RunnerProbe::new()),
    );
    manager.init().await.unwrap();

    let found = manager.execute("/widgets/42", &RequestContext::get()).await;
    assert!(!found.is_bad_request());
    assert_eq!(found.body, "widget 42");

    let not_a_long = manager.execute("/widgets/abc", &RequestContext::get()).await;
    assert!(not_a_long.is_bad_request());

    let unknown = manager.execute("/gadgets/1", &RequestContext::get()).await;
    assert!(unknown.is_bad_request());
}

#[tokio::test]
async fn test_plugin_status_transitions() {
    let extensions = TempDir::new().unwrap();
    let shared = TempDir::new().unwrap();
    write_bundle(
        extensions.path(),
        "probe.bundle",
        &bundle_document("probe", &[], vec![plugin_entry("probe", PROBE_RUNNER)]),
    );
    let settings = test_settings(extensions.path(), shared.path());
    let probe = RunnerProbe::new();
    let extension_manager = ExtensionManager::new(settings.clone(), class_registry(&probe));
    extension_manager.init().await.unwrap();

    // Configurations 1 to 6 belong to a plugin type no extension provides
    let store = Arc::new(InMemoryPluginStore::new());
    for n in 1..=6 {
        store.create_configuration(&format!("Legacy {}", n), "legacy", false).await.unwrap();
    }
    let configuration = store.create_configuration("Probe", "probe", false).await.unwrap();
    assert_eq!(configuration.id, 7);

    let manager = DefaultPluginManager::new(settings, store.clone(), extension_manager);
    manager.init().await.unwrap();
    assert_eq!(manager.get_plugin_status(7).await.unwrap(), PluginStatus::Stopped);

    manager.start_plugin(7).await.unwrap();
    let status = manager.get_plugin_status(7).await.unwrap();
    assert!(
        matches!(status, PluginStatus::Starting | PluginStatus::Started),
        "unexpected status {}",
        status
    );
    let m = &manager;
    assert!(wait_until(Duration::from_secs(5), move || async move {
        m.get_plugin_status(7).await.ok() == Some(PluginStatus::Started)
    })
    .await);

    assert!(manager.unregister_plugin(7).await.is_err());

    manager.stop_plugin(7).await.unwrap();
    let status = manager.get_plugin_status(7).await.unwrap();
    assert!(
        matches!(status, PluginStatus::Stopping | PluginStatus::Stopped),
        "unexpected status {}",
        status
    );
    assert!(wait_until(Duration::from_secs(5), move || async move {
        m.get_plugin_status(7).await.ok() == Some(PluginStatus::Stopped)
    })
    .await);

    manager.unregister_plugin(7).await.unwrap();
    assert_eq!(probe.events()[..3], ["init:7", "start:7", "stop:7"]);
}

#[tokio::test]
async fn test_auto_refresh_reloads_a_changed_bundle_once() {
    let extensions = TempDir::new().unwrap();
    let shared = TempDir::new().unwrap();
    let path = write_bundle(
        extensions.path(),
        "widgets.bundle",
        &bundle_document("widgets", &[WIDGET_CONTROLLER], vec![]),
    );
    let mut settings = test_settings(extensions.path(), shared.path());
    settings.auto_refresh = true;
    settings.auto_refresh_frequency = Duration::from_millis(50);
    let manager = ExtensionManager::new(settings, class_registry(&RunnerProbe::new()));
    manager.init().await.unwrap();
    assert!(manager.is_auto_refresh_running().await);

    let original = manager.extension("widgets").await.unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;
    let untouched = manager.extension("widgets").await.unwrap();
    assert!(untouched.is_same(&original), "an unchanged bundle is left alone");

    let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
    file.set_modified(SystemTime::now()).unwrap();
    drop(file);

    let handle = &manager;
    let original_ref = &original;
    assert!(wait_until(Duration::from_secs(5), move || async move {
        match handle.extension("widgets").await {
            Some(current) => !current.is_same(original_ref),
            None => false,
        }
    })
    .await);
    let reloaded = manager.extension("widgets").await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    let later = manager.extension("widgets").await.unwrap();
    assert!(later.is_same(&reloaded), "the reloaded bundle is not reloaded again");
    assert_eq!(manager.loaded_extensions().await.len(), 1);
    assert_eq!(manager.execute("/widgets/5", &RequestContext::get()).await.body, "widget 5");

    manager.destroy().await;
    assert!(!manager.is_auto_refresh_running().await);
}
