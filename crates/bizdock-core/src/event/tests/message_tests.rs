use std::time::Duration;

use serde_json::json;

use crate::event::{EventInterfaceConfiguration, EventMessage, FlowType, MessageType};

#[test]
fn test_custom_message_needs_a_target() {
    let untargeted = EventMessage::default();
    assert_eq!(untargeted.message_type, MessageType::Custom);
    assert!(!untargeted.is_consistent());

    let targeted = EventMessage::custom(7, json!({"action": "sync"}));
    assert!(targeted.is_consistent());
    assert_eq!(targeted.plugin_configuration_id, Some(7));
}

#[test]
fn test_object_message_needs_an_id_and_a_data_type() {
    assert!(EventMessage::internal(12, "Actor", MessageType::ObjectCreated).is_consistent());
    assert!(EventMessage::external("EXT-12", "Actor", MessageType::ObjectUpdated).is_consistent());

    let no_id = EventMessage {
        data_type: Some("Actor".to_string()),
        message_type: MessageType::ObjectDeleted,
        ..EventMessage::default()
    };
    assert!(!no_id.is_consistent());

    let no_type = EventMessage {
        internal_id: Some(1),
        message_type: MessageType::ObjectDeleted,
        ..EventMessage::default()
    };
    assert!(!no_type.is_consistent());
}

#[test]
fn test_resync_prefers_the_external_id() {
    let mut message = EventMessage::internal(12, "Actor", MessageType::ObjectUpdated);
    message.external_id = Some("EXT-12".to_string());

    let resync = message.resync_message();
    assert_eq!(resync.message_type, MessageType::Resync);
    assert_eq!(resync.external_id.as_deref(), Some("EXT-12"));
    assert_eq!(resync.internal_id, None);
    assert_eq!(resync.data_type.as_deref(), Some("Actor"));
    assert_eq!(resync.plugin_configuration_id, None);
    assert_ne!(resync.transaction_id, message.transaction_id);
    assert!(resync.is_consistent());
}

#[test]
fn test_resync_keeps_the_internal_id_without_external_id() {
    let message = EventMessage::internal(5, "PortfolioEntry", MessageType::ObjectCreated);
    let resync = message.resync_message();
    assert_eq!(resync.internal_id, Some(5));
    assert_eq!(resync.external_id, None);
}

#[test]
fn test_terminal_message_types() {
    assert!(MessageType::Resync.is_terminal_on_failure());
    assert!(MessageType::Custom.is_terminal_on_failure());
    assert!(!MessageType::ObjectCreated.is_terminal_on_failure());
    assert!(!MessageType::ObjectStatusChanged.is_terminal_on_failure());
}

#[test]
fn test_message_type_serializes_screaming_snake() {
    let value = serde_json::to_value(MessageType::ObjectStatusChanged).unwrap();
    assert_eq!(value, json!("OBJECT_STATUS_CHANGED"));
    assert_eq!(MessageType::ObjectStatusChanged.to_string(), "OBJECT_STATUS_CHANGED");
}

#[test]
fn test_router_addresses() {
    assert_eq!(FlowType::In.router_address(3), "in-router-3");
    assert_eq!(FlowType::Out.router_address(3), "out-router-3");
    assert_eq!(FlowType::Out.to_string(), "OUT");
}

#[test]
fn test_display_mentions_the_transaction() {
    let message = EventMessage::internal(1, "Actor", MessageType::ObjectCreated);
    let rendered = message.to_string();
    assert!(rendered.starts_with("EventMessage ["));
    assert!(rendered.contains(&message.transaction_id));
    assert!(rendered.contains("OBJECT_CREATED"));
}

#[test]
fn test_interface_configuration_bounds() {
    let default = EventInterfaceConfiguration::default();
    assert_eq!(default.pool_size(), 1);
    assert_eq!(default.retries(), 0);

    assert!(EventInterfaceConfiguration::new(0, 1, Duration::from_secs(1)).is_err());
    assert!(EventInterfaceConfiguration::from_raw(2, -1, 10).is_err());

    let config = EventInterfaceConfiguration::from_raw(4, 3, 10).unwrap();
    assert_eq!(config.pool_size(), 4);
    assert_eq!(config.retries(), 3);
    assert_eq!(config.retry_window(), Duration::from_secs(10));
}
