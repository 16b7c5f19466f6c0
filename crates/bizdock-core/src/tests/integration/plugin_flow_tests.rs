//! A plugin configuration seen from the outside: its configurator
//! commands, its messages and its removal.
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;

use crate::event::{EventMessage, MessageType};
use crate::extension::manager::ExtensionManager;
use crate::kernel::constants::ADMIN_PLUGIN_MANAGER_PERMISSION;
use crate::plugin_system::manager::{DefaultPluginManager, PluginManager};
use crate::plugin_system::status::PluginStatus;
use crate::plugin_system::store::InMemoryPluginStore;
use crate::tests::integration::common::{
    bundle_document, class_registry, plugin_entry, test_settings, wait_until, write_bundle, RunnerProbe,
    CUSTOM_CONFIGURATOR, PROBE_RUNNER, PROJECT_CONFIGURATOR,
};
use crate::web_command::request::{Principal, RequestContext};

const WAIT: Duration = Duration::from_secs(5);

struct Setup {
    _extensions: TempDir,
    _shared: TempDir,
    probe: Arc<RunnerProbe>,
    manager: DefaultPluginManager,
}

async fn setup() -> Setup {
    let extensions = TempDir::new().unwrap();
    let shared = TempDir::new().unwrap();
    let mut entry = plugin_entry("probe", PROBE_RUNNER);
    entry["multi-instance"] = json!(true);
    write_bundle(extensions.path(), "probe.bundle", &bundle_document("probe", &[], vec![entry]));

    let settings = test_settings(extensions.path(), shared.path());
    let probe = RunnerProbe::new();
    let extension_manager = ExtensionManager::new(settings.clone(), class_registry(&probe));
    extension_manager.init().await.unwrap();
    let manager = DefaultPluginManager::new(settings, Arc::new(InMemoryPluginStore::new()), extension_manager);
    manager.init().await.unwrap();
    Setup {
        _extensions: extensions,
        _shared: shared,
        probe,
        manager,
    }
}

fn admin() -> RequestContext {
    RequestContext::get().with_principal(Principal::new("admin").with_permission(ADMIN_PLUGIN_MANAGER_PERMISSION))
}

#[tokio::test]
async fn test_configurators_follow_the_registration() {
    let s = setup().await;
    let extensions = s.manager.extensions().clone();
    let id = s.manager.register_plugin("Probe", "probe").await.unwrap();

    let custom = format!("/{}/custom/settings", id);
    let registration = format!("/{}/registerproject/settings", id);
    assert_eq!(extensions.execute(&custom, &admin()).await.body, CUSTOM_CONFIGURATOR);
    assert_eq!(extensions.execute(&registration, &admin()).await.body, PROJECT_CONFIGURATOR);

    let anonymous = extensions.execute(&custom, &RequestContext::get()).await;
    assert!(anonymous.is_bad_request(), "configurators require the plugin administration permission");

    s.manager.unregister_plugin(id).await.unwrap();
    assert!(extensions.execute(&custom, &admin()).await.is_bad_request());
    assert!(extensions.execute(&registration, &admin()).await.is_bad_request());
}

#[tokio::test]
async fn test_messages_posted_by_a_plugin_reach_started_plugins() {
    let s = setup().await;
    let m = &s.manager;
    let sender = m.register_plugin("Sender", "probe").await.unwrap();
    let receiver = m.register_plugin("Receiver", "probe").await.unwrap();
    for id in [sender, receiver] {
        m.start_plugin(id).await.unwrap();
        assert!(wait_until(WAIT, move || async move {
            m.get_plugin_status(id).await.ok() == Some(PluginStatus::Started)
        })
        .await);
    }

    let context = m.registry().get(sender).await.unwrap().context().clone();
    let message = EventMessage::external("EXT-9", "project", MessageType::ObjectStatusChanged);
    context.post_out_message(message.clone()).await.unwrap();

    let probe = s.probe.clone();
    let expected = format!("out:{}:OBJECT_STATUS_CHANGED:{}", receiver, message.transaction_id);
    assert!(wait_until(WAIT, || {
        let probe = probe.clone();
        let expected = expected.clone();
        async move { probe.events().contains(&expected) }
    })
    .await);

    // Messages queued on a stopped plugin are not delivered
    m.stop_plugin(receiver).await.unwrap();
    assert!(wait_until(WAIT, move || async move {
        m.get_plugin_status(receiver).await.ok() == Some(PluginStatus::Stopped)
    })
    .await);
    let before = s.probe.count(&format!("out:{}:", receiver));
    m.post_out_message(EventMessage::internal(2, "project", MessageType::ObjectCreated))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(s.probe.count(&format!("out:{}:", receiver)), before);
}

#[tokio::test]
async fn test_slow_plugins_do_not_block_the_sender() {
    let s = setup().await;
    let m = &s.manager;
    let id = m.register_plugin("Slow", "probe").await.unwrap();
    m.start_plugin(id).await.unwrap();
    assert!(wait_until(WAIT, move || async move {
        m.get_plugin_status(id).await.ok() == Some(PluginStatus::Started)
    })
    .await);

    s.probe.message_delay_ms.store(200, std::sync::atomic::Ordering::SeqCst);
    let posted = tokio::time::timeout(Duration::from_millis(100), async {
        for n in 0..5 {
            m.post_out_message(EventMessage::internal(n, "project", MessageType::ObjectUpdated))
                .await
                .unwrap();
        }
    })
    .await;
    assert!(posted.is_ok(), "posting only enqueues");

    let probe = s.probe.clone();
    assert!(wait_until(WAIT, || {
        let probe = probe.clone();
        async move { probe.count("out:") == 5 }
    })
    .await);
}

#[tokio::test]
async fn test_concurrent_posters_reach_every_started_plugin() {
    let s = setup().await;
    let m = &s.manager;
    let first = m.register_plugin("First", "probe").await.unwrap();
    let second = m.register_plugin("Second", "probe").await.unwrap();
    for id in [first, second] {
        m.start_plugin(id).await.unwrap();
        assert!(wait_until(WAIT, move || async move {
            m.get_plugin_status(id).await.ok() == Some(PluginStatus::Started)
        })
        .await);
    }

    let posts = (0..10).map(|n| m.post_out_message(EventMessage::internal(n, "project", MessageType::ObjectCreated)));
    let results = futures::future::join_all(posts).await;
    assert!(results.iter().all(|r| r.is_ok()));

    let probe = s.probe.clone();
    assert!(wait_until(WAIT, || {
        let probe = probe.clone();
        async move { probe.count(&format!("out:{}:", first)) == 10 && probe.count(&format!("out:{}:", second)) == 10 }
    })
    .await);
}
