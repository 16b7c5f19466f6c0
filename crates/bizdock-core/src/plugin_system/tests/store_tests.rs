use std::time::Duration;

use crate::event::{EventInterfaceConfiguration, FlowType};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::store::{
    IdentificationLink, InMemoryPluginStore, PluginLogEntry, PluginStore, StoredConfigurationBlock, LOG_EVENT_START,
};

fn link(plugin_configuration_id: i64, internal_id: i64, external_id: &str, parent_id: Option<i64>) -> IdentificationLink {
    IdentificationLink {
        id: 0,
        plugin_configuration_id,
        internal_id: Some(internal_id),
        external_id: Some(external_id.to_string()),
        link_type: "PROJECT".to_string(),
        parent_id,
    }
}

#[tokio::test]
async fn test_configuration_ids_are_sequential() {
    let store = InMemoryPluginStore::new();
    let first = store.create_configuration("Jira", "jira", false).await.unwrap();
    let second = store.create_configuration("Jira 2", "jira", true).await.unwrap();

    assert_eq!(first.id, 1);
    assert_eq!(second.id, 2);
    assert!(second.is_autostart);
    assert_eq!(store.configurations().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_ensure_definition_is_idempotent() {
    let store = InMemoryPluginStore::new();
    store.ensure_definition("jira").await.unwrap();
    store.set_definition_availability("jira", false).await.unwrap();

    let again = store.ensure_definition("jira").await.unwrap();
    assert!(!again.is_available, "an existing definition must be returned untouched");
    assert_eq!(store.definitions().await.unwrap().len(), 1);

    let unknown = store.set_definition_availability("redmine", true).await;
    assert!(matches!(unknown, Err(PluginSystemError::StoreError(_))));
}

#[tokio::test]
async fn test_delete_configuration_cascades() {
    let store = InMemoryPluginStore::new();
    let configuration = store.create_configuration("Jira", "jira", false).await.unwrap();
    let id = configuration.id;

    store
        .save_log(PluginLogEntry::lifecycle(id, LOG_EVENT_START, false, "started"))
        .await
        .unwrap();
    store.set_state(id, Some(b"cursor=3".to_vec())).await.unwrap();
    store
        .save_configuration_block(
            id,
            StoredConfigurationBlock {
                identifier: "main".to_string(),
                version: 1,
                value: b"url=x".to_vec(),
            },
        )
        .await
        .unwrap();
    store.create_link(link(id, 5, "P-5", None)).await.unwrap();
    store.set_registration(id, "project", 5, b"on".to_vec()).await.unwrap();
    store
        .set_event_interface_configuration(
            id,
            FlowType::Out,
            EventInterfaceConfiguration::new(2, 1, Duration::from_secs(10)).unwrap(),
        )
        .await
        .unwrap();

    store.delete_configuration(id).await.unwrap();

    assert!(store.configuration(id).await.unwrap().is_none());
    assert!(store.logs(id).await.unwrap().is_empty());
    assert!(store.state(id).await.unwrap().is_none());
    assert!(store.configuration_block(id, "main").await.unwrap().is_none());
    assert!(store.links(id).await.unwrap().is_empty());
    assert!(store.registration(id, "project", 5).await.unwrap().is_none());
    assert!(store
        .event_interface_configuration(id, FlowType::Out)
        .await
        .unwrap()
        .is_none());

    assert!(store.delete_configuration(id).await.is_err());
}

#[tokio::test]
async fn test_state_requires_a_configuration() {
    let store = InMemoryPluginStore::new();
    assert!(store.set_state(42, Some(vec![1])).await.is_err());

    let configuration = store.create_configuration("Jira", "jira", false).await.unwrap();
    store.set_state(configuration.id, Some(vec![1, 2])).await.unwrap();
    assert_eq!(store.state(configuration.id).await.unwrap(), Some(vec![1, 2]));

    store.set_state(configuration.id, None).await.unwrap();
    assert_eq!(store.state(configuration.id).await.unwrap(), None);
}

#[tokio::test]
async fn test_links_are_scoped_to_their_configuration() {
    let store = InMemoryPluginStore::new();
    let parent = store.create_link(link(1, 5, "P-5", None)).await.unwrap();
    let child = store.create_link(link(1, 6, "T-6", Some(parent.id))).await.unwrap();
    store.create_link(link(2, 5, "P-5", None)).await.unwrap();

    assert_ne!(parent.id, child.id);
    assert_eq!(store.links(1).await.unwrap().len(), 2);
    assert_eq!(store.links(2).await.unwrap().len(), 1);

    store.delete_link(child.id).await.unwrap();
    let remaining = store.links(1).await.unwrap();
    assert_eq!(remaining, vec![parent]);
}
