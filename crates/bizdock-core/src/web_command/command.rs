use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, LazyLock};

use log::{debug, error, warn};
use regex::Regex;
use uuid::Uuid;

use crate::web_command::controller::{CommandDescriptor, Controller, ParamKind, ParamValue};
use crate::web_command::error::WebCommandError;
use crate::web_command::request::{CommandResult, HttpMethod, RequestContext};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\B(:\w+)\b").expect("placeholder regex"));

const CAPTURE: &str = "(.+)";

/// Binding of one capture group to a method argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamMapping {
    /// Name of the placeholder, without the leading colon
    pub name: String,
    /// Position of the argument in the method signature
    pub real_index: usize,
    pub kind: ParamKind,
}

/// A compiled command bound to a live controller instance
pub struct WebCommand {
    id: String,
    controller: Arc<dyn Controller>,
    method_name: String,
    http_method: HttpMethod,
    permissions: Vec<String>,
    pattern: Regex,
    link_template: String,
    /// In capture-group order
    mappings: Vec<ParamMapping>,
    arity: usize,
}

impl fmt::Debug for WebCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebCommand")
            .field("id", &self.id)
            .field("controller", &self.controller.class_name())
            .field("method_name", &self.method_name)
            .field("http_method", &self.http_method)
            .field("pattern", &self.pattern.as_str())
            .field("permissions", &self.permissions)
            .finish()
    }
}

impl WebCommand {
    /// Compile a command declared by `controller`.
    ///
    /// The full path is `prefix + controller.path() + descriptor.path`. The
    /// required permissions are the union of the command, controller and
    /// `default_permissions` sets.
    pub fn compile(
        controller: Arc<dyn Controller>,
        descriptor: &CommandDescriptor,
        prefix: Option<&str>,
        default_permissions: &[String],
    ) -> Result<Self, WebCommandError> {
        let full_path = format!(
            "{}{}{}",
            prefix.unwrap_or_default(),
            controller.path(),
            descriptor.path
        );

        let mut mappings = Vec::new();
        let mut pattern = String::from("^");
        let mut link_template = String::new();
        let mut last = 0;
        for found in PLACEHOLDER.find_iter(&full_path) {
            let literal = &full_path[last..found.start()];
            pattern.push_str(&regex::escape(literal));
            pattern.push_str(CAPTURE);
            link_template.push_str(literal);
            link_template.push_str(CAPTURE);
            last = found.end();

            let name = &found.as_str()[1..];
            let (real_index, param) = descriptor
                .params
                .iter()
                .enumerate()
                .find(|(_, p)| p.name == name)
                .ok_or_else(|| WebCommandError::UnknownPathParameter {
                    path: full_path.clone(),
                    parameter: name.to_string(),
                })?;
            mappings.push(ParamMapping {
                name: name.to_string(),
                real_index,
                kind: param.kind,
            });
        }
        let tail = &full_path[last..];
        pattern.push_str(&regex::escape(tail));
        pattern.push('$');
        link_template.push_str(tail);

        if mappings.len() != descriptor.params.len() {
            return Err(WebCommandError::ParameterMismatch {
                path: full_path,
                declared: descriptor.params.len(),
                mapped: mappings.len(),
            });
        }

        let pattern = Regex::new(&pattern).map_err(|source| WebCommandError::InvalidPattern {
            path: full_path.clone(),
            source,
        })?;

        let mut permissions: Vec<String> = Vec::new();
        for permission in descriptor
            .permissions
            .iter()
            .cloned()
            .chain(controller.permissions())
            .chain(default_permissions.iter().cloned())
        {
            if !permissions.contains(&permission) {
                permissions.push(permission);
            }
        }

        let id = match descriptor.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };

        Ok(Self {
            id,
            controller,
            method_name: descriptor.method_name.clone(),
            http_method: descriptor.http_method,
            permissions,
            pattern,
            link_template,
            arity: descriptor.params.len(),
            mappings,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn controller_class(&self) -> &str {
        self.controller.class_name()
    }

    pub fn http_method(&self) -> HttpMethod {
        self.http_method
    }

    pub fn permissions(&self) -> &[String] {
        &self.permissions
    }

    pub fn mappings(&self) -> &[ParamMapping] {
        &self.mappings
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// True if the request method is accepted and the path matches the
    /// whole compiled pattern.
    pub fn is_matching(&self, path: &str, request: &RequestContext) -> bool {
        self.http_method.is_supported(request.method()) && self.pattern.is_match(path)
    }

    /// Run the bound method for `path`. Every failure, including a missing
    /// permission, comes back as a bad request.
    pub fn call(&self, path: &str, request: &RequestContext) -> CommandResult {
        if !request.is_authorized(&self.permissions) {
            warn!(
                "Unauthorized call to command {} of {} for {}",
                self.id,
                self.controller_class(),
                path
            );
            return CommandResult::bad_request();
        }

        let Some(captures) = self.pattern.captures(path) else {
            return CommandResult::bad_request();
        };

        let mut slots: Vec<Option<ParamValue>> = vec![None; self.arity];
        for (group, mapping) in self.mappings.iter().enumerate() {
            let raw = captures.get(group + 1).map(|m| m.as_str()).unwrap_or_default();
            match mapping.kind.convert(raw) {
                Some(value) => slots[mapping.real_index] = Some(value),
                None => {
                    debug!(
                        "Cannot convert '{}' to {} for parameter {} of {}",
                        raw, mapping.kind, mapping.name, path
                    );
                    return CommandResult::bad_request();
                }
            }
        }
        let args: Vec<ParamValue> = slots.into_iter().flatten().collect();

        let invoked = panic::catch_unwind(AssertUnwindSafe(|| {
            self.controller.invoke(&self.method_name, &args, request)
        }));
        match invoked.unwrap_or_else(|_| Err("controller method panicked".into())) {
            Ok(reply) => match reply.downcast::<CommandResult>() {
                Ok(result) => *result,
                Err(_) => {
                    error!(
                        "Command {} of {} did not return a command result",
                        self.id,
                        self.controller_class()
                    );
                    CommandResult::bad_request()
                }
            },
            Err(e) => {
                error!(
                    "Error while calling {}::{} for {}: {}",
                    self.controller_class(),
                    self.method_name,
                    path,
                    e
                );
                CommandResult::bad_request()
            }
        }
    }

    /// Build the path of this command from parameter values given in
    /// method-signature order.
    pub fn generate_link(&self, params: &[ParamValue]) -> Result<String, WebCommandError> {
        if self.mappings.is_empty() {
            return Ok(self.link_template.clone());
        }
        if params.len() != self.arity {
            return Err(WebCommandError::LinkParameterCount {
                command_id: self.id.clone(),
                expected: self.arity,
                actual: params.len(),
            });
        }
        let mut link = String::with_capacity(self.link_template.len());
        let mut rest = self.link_template.as_str();
        for mapping in &self.mappings {
            let Some(at) = rest.find(CAPTURE) else { break };
            link.push_str(&rest[..at]);
            link.push_str(&params[mapping.real_index].to_string());
            rest = &rest[at + CAPTURE.len()..];
        }
        link.push_str(rest);
        Ok(link)
    }
}
