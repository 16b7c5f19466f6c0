//! Errors raised while compiling web commands, registering controllers and
//! generating links.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebCommandError {
    #[error("No match between method parameters and path parameters of '{path}': unknown parameter '{parameter}'")]
    UnknownPathParameter { path: String, parameter: String },

    #[error("No match between method parameters and path parameters of '{path}': {declared} declared, {mapped} in the path")]
    ParameterMismatch {
        path: String,
        declared: usize,
        mapped: usize,
    },

    #[error("Invalid command pattern '{path}': {source}")]
    InvalidPattern {
        path: String,
        #[source]
        source: regex::Error,
    },

    #[error("Controller '{controller}' is already registered by '{owner}'")]
    ControllerClaimed { controller: String, owner: String },

    #[error("Unknown controller '{0}'")]
    UnknownController(String),

    #[error("Unknown command '{command_id}' in the controller '{controller}'")]
    UnknownCommand {
        controller: String,
        command_id: String,
    },

    #[error("Invalid number of parameters for command '{command_id}', expected {expected} but got {actual}")]
    LinkParameterCount {
        command_id: String,
        expected: usize,
        actual: usize,
    },
}
