use std::sync::Arc;
use std::time::Duration;

use bizdock_core::event::{EventMessage, MessageType};
use bizdock_core::plugin_system::store::{InMemoryPluginStore, PluginStore};
use bizdock_core::web_command::request::{Principal, RequestContext};
use bizdock_core::{Application, PluginManager, PluginStatus, RuntimeSettings};
use sample_extension::widgets::WIDGET_LIST_PERMISSION;
use sample_extension::{PLUGIN_IDENTIFIER, class_registry, write_bundle};
use tempfile::TempDir;

fn application(dir: &TempDir, auto_register: bool) -> Application {
    let extensions = dir.path().join("extensions");
    write_bundle(&extensions, auto_register).unwrap();
    let settings = RuntimeSettings {
        extension_directory: extensions,
        shared_storage: dir.path().join("shared"),
        probe_timeout: Duration::from_millis(200),
        ..RuntimeSettings::default()
    };
    Application::new(settings, class_registry(), Arc::new(InMemoryPluginStore::new()))
}

async fn wait_for_log(app: &Application, id: i64, expected: &str) {
    let manager = app.plugin_manager().await.unwrap();
    let found = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let logs = manager.logs(id).await.unwrap();
            if logs.iter().any(|l| l.log_message == expected) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(found.is_ok(), "no log '{}' for the plugin {}", expected, id);
}

async fn wait_started(app: &Application, id: i64) {
    let manager = app.plugin_manager().await.unwrap();
    let started = tokio::time::timeout(Duration::from_secs(5), async {
        while manager.get_plugin_status(id).await.unwrap() != PluginStatus::Started {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(started.is_ok(), "the plugin {} did not start", id);
}

#[tokio::test]
async fn test_widget_commands() {
    let dir = TempDir::new().unwrap();
    let mut app = application(&dir, false);
    app.start().await.unwrap();
    let extensions = app.extension_manager().await.unwrap();

    let shown = extensions.execute("/widgets/42", &RequestContext::get()).await;
    assert_eq!(shown.body, "widget 42");
    assert!(extensions.execute("/widgets/abc", &RequestContext::get()).await.is_bad_request());

    // Listing needs a permission
    assert!(extensions.execute("/widgets", &RequestContext::get()).await.is_bad_request());
    let allowed = RequestContext::get().with_principal(Principal::new("jdoe").with_permission(WIDGET_LIST_PERMISSION));
    let listed = extensions.execute("/widgets", &allowed).await;
    assert_eq!(listed.status, 200);
    assert_eq!(listed.content_type.as_deref(), Some("application/json"));

    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_auto_registered_connector_links_projects() {
    let dir = TempDir::new().unwrap();
    let mut app = application(&dir, true);
    app.start().await.unwrap();
    let manager = app.plugin_manager().await.unwrap();

    let plugins = manager.registered_plugins().await;
    assert_eq!(plugins.len(), 1);
    assert_eq!(plugins[0].identifier, PLUGIN_IDENTIFIER);
    let id = plugins[0].id;
    wait_started(&app, id).await;
    wait_for_log(&app, id, "Connected to https://acme.example.com/api").await;

    manager
        .post_out_message(EventMessage::internal(5, "project", MessageType::ObjectCreated))
        .await
        .unwrap();
    wait_for_log(&app, id, "Project 5 created as acme-5").await;

    let links = manager.store().links(id).await.unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].external_id.as_deref(), Some("acme-5"));

    manager
        .post_in_message(EventMessage::external("acme-5", "project", MessageType::ObjectUpdated))
        .await
        .unwrap();
    wait_for_log(&app, id, "acme-5 is the project 5").await;

    manager
        .post_out_message(EventMessage::internal(5, "project", MessageType::ObjectDeleted))
        .await
        .unwrap();
    wait_for_log(&app, id, "Project 5 deleted").await;
    assert!(manager.store().links(id).await.unwrap().is_empty());

    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_connector_without_endpoint_fails_to_start() {
    let dir = TempDir::new().unwrap();
    let mut app = application(&dir, false);
    app.start().await.unwrap();
    let manager = app.plugin_manager().await.unwrap();

    let id = manager.register_plugin("Broken ACME", PLUGIN_IDENTIFIER).await.unwrap();
    manager
        .update_plugin_configuration(id, "main", b"endpoint=\n".to_vec())
        .await
        .unwrap();
    manager.start_plugin(id).await.unwrap();

    let failed = tokio::time::timeout(Duration::from_secs(5), async {
        while manager.get_plugin_status(id).await.unwrap() != PluginStatus::StartFailed {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(failed.is_ok());

    app.shutdown().await.unwrap();
}
