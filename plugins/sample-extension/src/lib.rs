//! # ACME sample extension
//!
//! A statically linked extension for BizDock. Its classes are registered in
//! the private namespace of the `acme` extension; the matching bundle
//! document is produced by [`bundle_document`] and written into an
//! extension directory with [`write_bundle`].
//!
//! - [`widgets::WidgetController`] serves `/widgets/:id`.
//! - [`connector::AcmeConnector`] is the runner of the `acme-connector`
//!   plugin, with [`widgets::ConnectorConfigurator`] as its custom
//!   configurator.
pub mod connector;
pub mod widgets;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bizdock_core::extension::classes::{ClassRegistry, ClassRegistryBuilder};
use bizdock_core::extension::BUNDLE_EXTENSION;
use bizdock_core::plugin_system::traits::PluginRunner;
use bizdock_core::web_command::controller::Controller;
use serde_json::json;

use crate::connector::AcmeConnector;
use crate::widgets::{ConnectorConfigurator, WidgetController};

pub const EXTENSION_NAME: &str = "acme";
pub const PLUGIN_IDENTIFIER: &str = "acme-connector";

pub const WIDGET_CONTROLLER: &str = "acme.WidgetController";
pub const CONNECTOR_RUNNER: &str = "acme.AcmeConnector";
pub const CONNECTOR_CONFIGURATOR: &str = "acme.ConnectorConfigurator";

/// Add the classes of the extension to `builder`.
pub fn register(builder: ClassRegistryBuilder) -> ClassRegistryBuilder {
    builder
        .bundle_controller(EXTENSION_NAME, WIDGET_CONTROLLER, || {
            Ok(Arc::new(WidgetController) as Arc<dyn Controller>)
        })
        .bundle_controller(EXTENSION_NAME, CONNECTOR_CONFIGURATOR, || {
            Ok(Arc::new(ConnectorConfigurator) as Arc<dyn Controller>)
        })
        .bundle_runner(EXTENSION_NAME, CONNECTOR_RUNNER, || {
            Ok(Arc::new(AcmeConnector::new()) as Arc<dyn PluginRunner>)
        })
}

/// Registry holding only the classes of this extension
pub fn class_registry() -> Arc<ClassRegistry> {
    register(ClassRegistry::builder()).build()
}

/// Bundle document of the extension.
///
/// `auto_register` makes the plugin manager create (and autostart) a
/// connector configuration on its first initialization.
pub fn bundle_document(auto_register: bool) -> serde_json::Value {
    json!({
        "descriptor": {
            "name": EXTENSION_NAME,
            "controllers": [WIDGET_CONTROLLER],
            "plugins": [{
                "identifier": PLUGIN_IDENTIFIER,
                "class": CONNECTOR_RUNNER,
                "name": "ACME connector",
                "description": "Mirrors projects into the ACME tracker",
                "version": "1.2",
                "vendor-url": "https://acme.example.com",
                "multi-instance": true,
                "auto-register": auto_register,
                "event-interface": { "in": true, "out": true },
                "supported-data-types": ["project"],
                "configuration-blocks": [{
                    "identifier": connector::MAIN_BLOCK,
                    "type": "PROPERTIES",
                    "name": "Connection",
                    "version": 2,
                    "default": "endpoint=https://acme.example.com/api\ntimeout=30\n"
                }],
                "custom-configurator": CONNECTOR_CONFIGURATOR
            }],
            "i18n-messages": [
                { "language": "en", "messages": "acme.widgets.title=Widgets\n" },
                { "language": "fr", "messages": "acme.widgets.title=Gadgets\n" }
            ],
            "menu-customization": {
                "add": [{
                    "uuid": "acme-widgets",
                    "label": "acme.widgets.title",
                    "url": "/ext/widgets"
                }]
            }
        }
    })
}

/// Write the bundle of the extension as `acme.bundle` in `directory`.
pub fn write_bundle(directory: &Path, auto_register: bool) -> io::Result<PathBuf> {
    let path = directory
        .join(EXTENSION_NAME)
        .with_extension(BUNDLE_EXTENSION);
    let content = serde_json::to_vec_pretty(&bundle_document(auto_register))?;
    std::fs::create_dir_all(directory)?;
    std::fs::write(&path, content)?;
    Ok(path)
}
