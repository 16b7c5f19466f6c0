use std::any::Any;
use std::fmt;

use crate::web_command::request::{HttpMethod, RequestContext};

/// Error returned by a controller method
pub type ControllerError = Box<dyn std::error::Error + Send + Sync>;

/// Value returned by [`Controller::invoke`]. Only a boxed
/// [`CommandResult`](crate::web_command::CommandResult) is honored by the
/// dispatcher; anything else becomes a bad request.
pub type CommandReply = Box<dyn Any + Send>;

/// Types a path parameter can be converted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Long,
    Integer,
    Double,
    Boolean,
    Text,
}

impl ParamKind {
    /// Convert a captured path segment, `None` if it does not parse.
    pub fn convert(&self, raw: &str) -> Option<ParamValue> {
        match self {
            ParamKind::Long => raw.parse().ok().map(ParamValue::Long),
            ParamKind::Integer => raw.parse().ok().map(ParamValue::Integer),
            ParamKind::Double => raw.parse().ok().map(ParamValue::Double),
            ParamKind::Boolean => raw.parse().ok().map(ParamValue::Boolean),
            ParamKind::Text => Some(ParamValue::Text(raw.to_string())),
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamKind::Long => "long",
            ParamKind::Integer => "integer",
            ParamKind::Double => "double",
            ParamKind::Boolean => "boolean",
            ParamKind::Text => "string",
        };
        f.write_str(name)
    }
}

/// A converted path parameter
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Long(i64),
    Integer(i32),
    Double(f64),
    Boolean(bool),
    Text(String),
}

impl ParamValue {
    pub fn as_long(&self) -> Option<i64> {
        match self {
            ParamValue::Long(v) => Some(*v),
            ParamValue::Integer(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Long(v) => write!(f, "{}", v),
            ParamValue::Integer(v) => write!(f, "{}", v),
            ParamValue::Double(v) => write!(f, "{}", v),
            ParamValue::Boolean(v) => write!(f, "{}", v),
            ParamValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Long(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

/// A named, typed method parameter bound to a path placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDescriptor {
    pub name: String,
    pub kind: ParamKind,
}

/// Static declaration of one command exposed by a controller.
///
/// The path template may contain `:name` placeholders, each of which must
/// match exactly one declared parameter. Parameters are passed to
/// [`Controller::invoke`] in declaration order.
#[derive(Debug, Clone)]
pub struct CommandDescriptor {
    /// Identifier used for link generation; a random one is assigned if blank
    pub id: Option<String>,
    /// Name of the controller method to invoke
    pub method_name: String,
    pub path: String,
    pub http_method: HttpMethod,
    pub permissions: Vec<String>,
    pub params: Vec<ParamDescriptor>,
}

impl CommandDescriptor {
    pub fn new(method_name: impl Into<String>, http_method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            id: None,
            method_name: method_name.into(),
            path: path.into(),
            http_method,
            permissions: Vec::new(),
            params: Vec::new(),
        }
    }

    pub fn get(method_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(method_name, HttpMethod::Get, path)
    }

    pub fn post(method_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(method_name, HttpMethod::Post, path)
    }

    pub fn any(method_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(method_name, HttpMethod::Any, path)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.push(permission.into());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, kind: ParamKind) -> Self {
        self.params.push(ParamDescriptor { name: name.into(), kind });
        self
    }
}

/// A controller contributed by an extension.
///
/// Controllers expose their commands through [`Controller::commands`] when
/// they are registered; the dispatcher then calls [`Controller::invoke`] with
/// the converted path parameters of the matching command.
pub trait Controller: Send + Sync {
    /// Implementation class name, used to claim and release the controller
    fn class_name(&self) -> &str;

    /// Path prefix shared by every command of the controller. A blank path
    /// exposes nothing.
    fn path(&self) -> &str;

    /// Permissions required by every command of the controller
    fn permissions(&self) -> Vec<String> {
        Vec::new()
    }

    fn commands(&self) -> Vec<CommandDescriptor>;

    fn invoke(
        &self,
        method_name: &str,
        args: &[ParamValue],
        request: &RequestContext,
    ) -> Result<CommandReply, ControllerError>;
}

impl fmt::Debug for dyn Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("class_name", &self.class_name())
            .field("path", &self.path())
            .finish_non_exhaustive()
    }
}
