use crate::extension::descriptor::{ConfigurationBlockType, ExtensionDescriptor, MenuAnchor};
use crate::extension::error::ExtensionError;

const FULL_DESCRIPTOR: &str = r#"{
    "name": "erp-connector",
    "controllers": ["sample.WidgetController"],
    "plugins": [{
        "identifier": "erp1",
        "class": "test.ProbeRunner",
        "version": "2.1",
        "vendor-url": "  ",
        "multi-instance": true,
        "event-interface": { "in": true },
        "configuration-blocks": [
            { "identifier": "main", "type": "properties", "version": 3, "default": "a=1" }
        ],
        "supported-data-types": ["project", " "],
        "registration-configurators": [
            { "data-type": "Project", "class": "test.ProjectConfigurator" },
            { "data-type": "", "class": "ignored" }
        ]
    }],
    "i18n-messages": [
        { "language": " EN ", "messages": "title=Title" },
        { "language": "", "messages": "ignored=yes" }
    ],
    "menu-customization": {
        "remove": ["reporting"],
        "add": [
            { "uuid": "erp", "label": "ERP", "url": "/erp", "after": "home" },
            { "uuid": "erp-admin", "label": "Admin", "url": "/erp/admin", "to": "admin" },
            { "uuid": "erp-top", "label": "Top", "url": "/erp/top" }
        ]
    }
}"#;

#[test]
fn test_full_descriptor_is_parsed() {
    let descriptor = ExtensionDescriptor::from_json(FULL_DESCRIPTOR).unwrap();
    assert_eq!(descriptor.name, "erp-connector");
    assert_eq!(descriptor.controllers, vec!["sample.WidgetController"]);

    let plugin = descriptor.plugin("erp1").expect("plugin erp1");
    // The name falls back to the identifier
    assert_eq!(plugin.name, "erp1");
    assert_eq!(plugin.class_name, "test.ProbeRunner");
    assert!(plugin.multi_instance);
    assert!(!plugin.auto_register);
    assert!(plugin.has_in_interface());
    assert!(!plugin.has_out_interface());
    assert_eq!(plugin.vendor_url, None);
    assert!(plugin.supports_data_type("project"));
    assert_eq!(plugin.supported_data_types.len(), 1);

    let block = plugin.configuration_block("main").unwrap();
    assert_eq!(block.block_type, ConfigurationBlockType::Properties);
    assert_eq!(block.version, 3);
    assert_eq!(block.default_value, b"a=1".to_vec());

    assert_eq!(plugin.registration_configurators.len(), 1);
    assert!(plugin.registration_configurator("Project").is_some());

    assert_eq!(descriptor.i18n_messages.len(), 1);
    assert_eq!(descriptor.i18n_messages[0].language, "en");

    let menu = descriptor.menu_customization.unwrap();
    assert_eq!(menu.remove, vec!["reporting"]);
    assert_eq!(menu.add[0].anchor, MenuAnchor::After("home".to_string()));
    assert_eq!(menu.add[1].anchor, MenuAnchor::Into("admin".to_string()));
    assert_eq!(menu.add[2].anchor, MenuAnchor::TopLevel);
}

#[test]
fn test_bundle_without_descriptor_resource() {
    let parsed = ExtensionDescriptor::from_bundle_bytes(br#"{"resources": []}"#).unwrap();
    assert!(parsed.is_none());
}

#[test]
fn test_malformed_bundle_document() {
    let err = ExtensionDescriptor::from_bundle_bytes(b"not json").unwrap_err();
    assert!(matches!(err, ExtensionError::DescriptorError { .. }));
}

#[test]
fn test_blank_name_is_rejected() {
    let err = ExtensionDescriptor::from_json(r#"{"name": "  "}"#).unwrap_err();
    assert!(err.to_string().contains("name is empty"));
}

#[test]
fn test_duplicate_plugin_identifier_is_rejected() {
    let err = ExtensionDescriptor::from_json(
        r#"{"name": "x", "plugins": [
            {"identifier": "p", "class": "A"},
            {"identifier": "p", "class": "B"}
        ]}"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("duplicate plugin identifier 'p'"));
}

#[test]
fn test_plugin_without_class_is_rejected() {
    let err = ExtensionDescriptor::from_json(r#"{"name": "x", "plugins": [{"identifier": "p"}]}"#).unwrap_err();
    assert!(err.to_string().contains("no implementation class"));
}

#[test]
fn test_unknown_block_type_is_rejected() {
    let err = ExtensionDescriptor::from_json(
        r#"{"name": "x", "plugins": [{"identifier": "p", "class": "A",
            "configuration-blocks": [{"identifier": "b", "type": "YAML"}]}]}"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("unknown configuration block type 'YAML'"));
}

#[test]
fn test_block_type_names() {
    for name in ["XML", "PROPERTIES", "JAVASCRIPT", "VELOCITY", "FILE"] {
        let parsed: ConfigurationBlockType = name.parse().unwrap();
        assert_eq!(parsed.to_string(), name);
    }
}
