//! Extension descriptor parsing.
//!
//! A bundle is a JSON document whose `descriptor` key holds the extension
//! descriptor. Parsing happens in two steps: the document is deserialized
//! into raw structs where every field is optional, then validated into the
//! immutable descriptor types used by the rest of the runtime.
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::extension::error::ExtensionError;

/// Metadata of a loaded extension
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionDescriptor {
    pub name: String,
    /// Class names of the standalone controllers
    pub controllers: Vec<String>,
    pub plugins: Vec<PluginDescriptor>,
    pub i18n_messages: Vec<I18nMessages>,
    pub menu_customization: Option<MenuCustomization>,
}

/// Static identity of a plugin type
#[derive(Debug, Clone, PartialEq)]
pub struct PluginDescriptor {
    /// Unique across every loaded extension
    pub identifier: String,
    /// Class name of the plugin runner implementation
    pub class_name: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub vendor_url: Option<String>,
    pub multi_instance: bool,
    /// Create an autostart configuration if none exists yet
    pub auto_register: bool,
    pub event_interface: EventInterfaceFlags,
    pub configuration_blocks: Vec<ConfigurationBlockDescriptor>,
    pub supported_data_types: Vec<String>,
    pub custom_configurator: Option<String>,
    pub registration_configurators: Vec<RegistrationConfigurator>,
}

impl PluginDescriptor {
    pub fn has_in_interface(&self) -> bool {
        self.event_interface.input
    }

    pub fn has_out_interface(&self) -> bool {
        self.event_interface.output
    }

    pub fn supports_data_type(&self, data_type: &str) -> bool {
        self.supported_data_types.iter().any(|d| d == data_type)
    }

    pub fn configuration_block(&self, identifier: &str) -> Option<&ConfigurationBlockDescriptor> {
        self.configuration_blocks
            .iter()
            .find(|b| b.identifier == identifier)
    }

    /// Registration configurator bound to `data_type`, if any
    pub fn registration_configurator(&self, data_type: &str) -> Option<&RegistrationConfigurator> {
        self.registration_configurators
            .iter()
            .find(|r| r.data_type == data_type)
    }
}

/// Which event interfaces a plugin exposes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInterfaceFlags {
    #[serde(rename = "in", default)]
    pub input: bool,
    #[serde(rename = "out", default)]
    pub output: bool,
}

/// Format of a configuration block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfigurationBlockType {
    Xml,
    Properties,
    Javascript,
    Velocity,
    File,
}

impl FromStr for ConfigurationBlockType {
    type Err = ExtensionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "XML" => Ok(Self::Xml),
            "PROPERTIES" => Ok(Self::Properties),
            "JAVASCRIPT" => Ok(Self::Javascript),
            "VELOCITY" => Ok(Self::Velocity),
            "FILE" => Ok(Self::File),
            other => Err(ExtensionError::descriptor(format!(
                "unknown configuration block type '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ConfigurationBlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Xml => "XML",
            Self::Properties => "PROPERTIES",
            Self::Javascript => "JAVASCRIPT",
            Self::Velocity => "VELOCITY",
            Self::File => "FILE",
        };
        f.write_str(name)
    }
}

/// A versioned block of plugin configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationBlockDescriptor {
    pub identifier: String,
    pub block_type: ConfigurationBlockType,
    pub name: String,
    pub description: String,
    pub version: i32,
    /// Value used when nothing was saved yet
    pub default_value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationConfigurator {
    pub data_type: String,
    pub class_name: String,
}

/// Translations of one language, as properties text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct I18nMessages {
    pub language: String,
    pub messages: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuCustomization {
    /// Uuids of the items to remove
    pub remove: Vec<String>,
    pub add: Vec<MenuItemAddition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItemAddition {
    pub uuid: String,
    pub label: String,
    pub url: String,
    pub permissions: Vec<String>,
    pub anchor: MenuAnchor,
}

/// Where a new menu item goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAnchor {
    After(String),
    Before(String),
    /// As a child of the given item
    Into(String),
    TopLevel,
}

// --- Raw (serde) representation ---

#[derive(Debug, Default, Deserialize)]
struct RawBundle {
    #[serde(default)]
    descriptor: Option<RawDescriptor>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct RawDescriptor {
    name: String,
    controllers: Vec<String>,
    plugins: Vec<RawPlugin>,
    i18n_messages: Vec<RawI18n>,
    menu_customization: Option<RawMenuCustomization>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct RawPlugin {
    identifier: String,
    class: String,
    name: Option<String>,
    description: String,
    version: String,
    vendor_url: Option<String>,
    multi_instance: bool,
    auto_register: bool,
    event_interface: EventInterfaceFlags,
    configuration_blocks: Vec<RawConfigurationBlock>,
    supported_data_types: Vec<String>,
    custom_configurator: Option<String>,
    registration_configurators: Vec<RawRegistrationConfigurator>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct RawConfigurationBlock {
    identifier: String,
    #[serde(rename = "type")]
    block_type: String,
    name: Option<String>,
    description: String,
    version: i32,
    default: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct RawRegistrationConfigurator {
    data_type: String,
    class: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawI18n {
    language: String,
    messages: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMenuCustomization {
    remove: Vec<String>,
    add: Vec<RawMenuItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMenuItem {
    uuid: String,
    label: String,
    url: String,
    permissions: Vec<String>,
    after: Option<String>,
    before: Option<String>,
    to: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl ExtensionDescriptor {
    /// Parse the content of a bundle file.
    ///
    /// Returns `Ok(None)` if the document has no descriptor resource.
    pub fn from_bundle_bytes(bytes: &[u8]) -> Result<Option<Self>, ExtensionError> {
        let raw: RawBundle = serde_json::from_slice(bytes)
            .map_err(|e| ExtensionError::descriptor(format!("malformed bundle document: {}", e)))?;
        raw.descriptor.map(Self::validate).transpose()
    }

    /// Parse a descriptor document on its own (without the bundle envelope).
    pub fn from_json(text: &str) -> Result<Self, ExtensionError> {
        let raw: RawDescriptor = serde_json::from_str(text)
            .map_err(|e| ExtensionError::descriptor(format!("malformed descriptor: {}", e)))?;
        Self::validate(raw)
    }

    fn validate(raw: RawDescriptor) -> Result<Self, ExtensionError> {
        let name = raw.name.trim().to_string();
        if name.is_empty() {
            return Err(ExtensionError::descriptor("the extension name is empty"));
        }

        let mut controllers = Vec::with_capacity(raw.controllers.len());
        for class in raw.controllers {
            let class = class.trim().to_string();
            if class.is_empty() {
                return Err(ExtensionError::descriptor(format!(
                    "blank controller class in '{}'",
                    name
                )));
            }
            controllers.push(class);
        }

        let mut identifiers = HashSet::new();
        let mut plugins = Vec::with_capacity(raw.plugins.len());
        for plugin in raw.plugins {
            let plugin = Self::validate_plugin(&name, plugin)?;
            if !identifiers.insert(plugin.identifier.clone()) {
                return Err(ExtensionError::descriptor(format!(
                    "duplicate plugin identifier '{}' in '{}'",
                    plugin.identifier, name
                )));
            }
            plugins.push(plugin);
        }

        let i18n_messages = raw
            .i18n_messages
            .into_iter()
            .filter(|m| !m.language.trim().is_empty())
            .map(|m| I18nMessages {
                language: m.language.trim().to_lowercase(),
                messages: m.messages,
            })
            .collect();

        let menu_customization = match raw.menu_customization {
            Some(menu) => Some(Self::validate_menu(&name, menu)?),
            None => None,
        };

        Ok(Self {
            name,
            controllers,
            plugins,
            i18n_messages,
            menu_customization,
        })
    }

    fn validate_plugin(extension: &str, raw: RawPlugin) -> Result<PluginDescriptor, ExtensionError> {
        let identifier = raw.identifier.trim().to_string();
        if identifier.is_empty() {
            return Err(ExtensionError::descriptor(format!(
                "a plugin of '{}' has no identifier",
                extension
            )));
        }
        let class_name = raw.class.trim().to_string();
        if class_name.is_empty() {
            return Err(ExtensionError::descriptor(format!(
                "the plugin '{}' has no implementation class",
                identifier
            )));
        }

        let mut configuration_blocks = Vec::with_capacity(raw.configuration_blocks.len());
        for block in raw.configuration_blocks {
            let block_identifier = block.identifier.trim().to_string();
            if block_identifier.is_empty() {
                return Err(ExtensionError::descriptor(format!(
                    "a configuration block of '{}' has no identifier",
                    identifier
                )));
            }
            configuration_blocks.push(ConfigurationBlockDescriptor {
                block_type: block.block_type.parse()?,
                name: non_blank(block.name).unwrap_or_else(|| block_identifier.clone()),
                identifier: block_identifier,
                description: block.description,
                version: block.version,
                default_value: block.default.into_bytes(),
            });
        }

        let registration_configurators = raw
            .registration_configurators
            .into_iter()
            .map(|r| RegistrationConfigurator {
                data_type: r.data_type.trim().to_string(),
                class_name: r.class.trim().to_string(),
            })
            .filter(|r| !r.data_type.is_empty() && !r.class_name.is_empty())
            .collect();

        Ok(PluginDescriptor {
            name: non_blank(raw.name).unwrap_or_else(|| identifier.clone()),
            identifier,
            class_name,
            description: raw.description,
            version: raw.version,
            vendor_url: non_blank(raw.vendor_url),
            multi_instance: raw.multi_instance,
            auto_register: raw.auto_register,
            event_interface: raw.event_interface,
            configuration_blocks,
            supported_data_types: raw
                .supported_data_types
                .into_iter()
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .collect(),
            custom_configurator: non_blank(raw.custom_configurator),
            registration_configurators,
        })
    }

    fn validate_menu(
        extension: &str,
        raw: RawMenuCustomization,
    ) -> Result<MenuCustomization, ExtensionError> {
        let mut add = Vec::with_capacity(raw.add.len());
        for item in raw.add {
            if item.uuid.trim().is_empty() {
                return Err(ExtensionError::descriptor(format!(
                    "a menu item of '{}' has no uuid",
                    extension
                )));
            }
            let anchor = match (non_blank(item.after), non_blank(item.before), non_blank(item.to)) {
                (Some(after), _, _) => MenuAnchor::After(after),
                (None, Some(before), _) => MenuAnchor::Before(before),
                (None, None, Some(to)) => MenuAnchor::Into(to),
                (None, None, None) => MenuAnchor::TopLevel,
            };
            add.push(MenuItemAddition {
                uuid: item.uuid.trim().to_string(),
                label: item.label,
                url: item.url,
                permissions: item.permissions,
                anchor,
            });
        }
        Ok(MenuCustomization {
            remove: raw
                .remove
                .into_iter()
                .filter(|r| !r.trim().is_empty())
                .collect(),
            add,
        })
    }

    pub fn plugin(&self, identifier: &str) -> Option<&PluginDescriptor> {
        self.plugins.iter().find(|p| p.identifier == identifier)
    }
}
