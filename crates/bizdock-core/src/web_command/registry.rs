use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info};

use crate::web_command::command::WebCommand;
use crate::web_command::controller::{Controller, ParamValue};
use crate::web_command::error::WebCommandError;
use crate::web_command::request::{CommandResult, RequestContext};

/// A controller instance together with the commands compiled from it
struct ControllerEntry {
    owner: String,
    commands: Vec<Arc<WebCommand>>,
}

/// Registry of the web commands exposed by loaded controllers.
///
/// Commands are dispatched by a linear scan in registration order, the
/// first match wins. Each controller is registered under a key (its class
/// name, or `class@prefix` when a path prefix is used) and claimed by an
/// owner; a key can only be claimed once.
#[derive(Default)]
pub struct WebCommandRegistry {
    commands: Vec<Arc<WebCommand>>,
    controllers: HashMap<String, ControllerEntry>,
}

impl std::fmt::Debug for WebCommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebCommandRegistry")
            .field("commands", &self.commands.len())
            .field("controllers", &self.controllers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Key a controller is registered under
pub fn controller_key(class_name: &str, prefix: Option<&str>) -> String {
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{}@{}", class_name, prefix),
        _ => class_name.to_string(),
    }
}

impl WebCommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and register every command of `controller`.
    ///
    /// Nothing is registered if one of the commands fails to compile.
    /// Returns the key the controller was registered under.
    pub fn register_controller(
        &mut self,
        owner: &str,
        controller: Arc<dyn Controller>,
        prefix: Option<&str>,
        default_permissions: &[String],
    ) -> Result<String, WebCommandError> {
        let key = controller_key(controller.class_name(), prefix);
        if let Some(existing) = self.controllers.get(&key) {
            return Err(WebCommandError::ControllerClaimed {
                controller: key,
                owner: existing.owner.clone(),
            });
        }

        let mut compiled = Vec::new();
        if controller.path().trim().is_empty() {
            debug!("Controller {} has no path, no command exposed", key);
        } else {
            for descriptor in controller.commands() {
                let command =
                    WebCommand::compile(controller.clone(), &descriptor, prefix, default_permissions)?;
                compiled.push(Arc::new(command));
            }
        }

        info!(
            "Registering controller {} for {} with {} command(s)",
            key,
            owner,
            compiled.len()
        );
        self.commands.extend(compiled.iter().cloned());
        self.controllers.insert(
            key.clone(),
            ControllerEntry {
                owner: owner.to_string(),
                commands: compiled,
            },
        );
        Ok(key)
    }

    /// Remove a controller and all its commands. Returns false if the key
    /// was not registered.
    pub fn remove_controller(&mut self, key: &str) -> bool {
        let Some(entry) = self.controllers.remove(key) else {
            return false;
        };
        self.commands
            .retain(|c| !entry.commands.iter().any(|owned| Arc::ptr_eq(owned, c)));
        debug!("Removed controller {} ({} command(s))", key, entry.commands.len());
        true
    }

    /// Remove every controller claimed by `owner`, returning their keys.
    pub fn remove_owner(&mut self, owner: &str) -> Vec<String> {
        let keys: Vec<String> = self
            .controllers
            .iter()
            .filter(|(_, entry)| entry.owner == owner)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &keys {
            self.remove_controller(key);
        }
        keys
    }

    pub fn contains_controller(&self, key: &str) -> bool {
        self.controllers.contains_key(key)
    }

    pub fn owner_of(&self, key: &str) -> Option<&str> {
        self.controllers.get(key).map(|e| e.owner.as_str())
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    pub fn controller_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.controllers.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Dispatch a request to the first matching command.
    pub fn execute(&self, path: &str, request: &RequestContext) -> CommandResult {
        match self.commands.iter().find(|c| c.is_matching(path, request)) {
            Some(command) => command.call(path, request),
            None => {
                debug!("No command found for {} {}", request.method(), path);
                CommandResult::bad_request()
            }
        }
    }

    /// Generate the path of command `command_id` of the controller
    /// registered under `key`.
    pub fn link(
        &self,
        key: &str,
        command_id: &str,
        params: &[ParamValue],
    ) -> Result<String, WebCommandError> {
        let entry = self
            .controllers
            .get(key)
            .ok_or_else(|| WebCommandError::UnknownController(key.to_string()))?;
        let command = entry
            .commands
            .iter()
            .find(|c| c.id() == command_id)
            .ok_or_else(|| WebCommandError::UnknownCommand {
                controller: key.to_string(),
                command_id: command_id.to_string(),
            })?;
        command.generate_link(params)
    }
}
