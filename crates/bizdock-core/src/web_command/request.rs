use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// HTTP methods a command can be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    /// Accepts GET and POST, nothing else
    #[default]
    Any,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Any => "ANY",
        }
    }

    /// Returns true if a request made with `method` can reach a command
    /// bound to this method.
    pub fn is_supported(&self, method: &str) -> bool {
        if method == self.as_str() {
            return true;
        }
        matches!(self, HttpMethod::Any) && (method == "GET" || method == "POST")
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated caller of a command
#[derive(Debug, Clone, Default)]
pub struct Principal {
    pub uid: String,
    permissions: HashSet<String>,
}

impl Principal {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            permissions: HashSet::new(),
        }
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

/// What the dispatcher knows about an inbound request
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: String,
    principal: Option<Principal>,
}

impl RequestContext {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into().to_uppercase(),
            principal: None,
        }
    }

    pub fn get() -> Self {
        Self::new("GET")
    }

    pub fn post() -> Self {
        Self::new("POST")
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// True when the caller holds every permission in `required`.
    /// An empty requirement is always satisfied.
    pub fn is_authorized(&self, required: &[String]) -> bool {
        if required.is_empty() {
            return true;
        }
        match &self.principal {
            Some(principal) => required.iter().all(|p| principal.has_permission(p)),
            None => false,
        }
    }
}

/// The structured result a command must return to be honored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl CommandResult {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: Some("text/plain".to_string()),
            body: body.into(),
        }
    }

    pub fn json(value: &serde_json::Value) -> Self {
        Self {
            status: 200,
            content_type: Some("application/json".to_string()),
            body: value.to_string(),
        }
    }

    pub fn bad_request() -> Self {
        Self {
            status: 400,
            content_type: None,
            body: String::new(),
        }
    }

    pub fn is_bad_request(&self) -> bool {
        self.status == 400
    }
}
