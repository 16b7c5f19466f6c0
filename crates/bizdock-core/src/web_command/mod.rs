//! # BizDock Web Commands
//!
//! Binds the commands declared by extension controllers to URL path
//! patterns and dispatches requests to them.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`controller`]**: The [`Controller`] trait implemented by extension
//!   code and the static [`CommandDescriptor`] list each controller exposes.
//! - **[`command`]**: Compilation of a path template such as `/widgets/:id`
//!   into an anchored pattern plus the capture-group to argument mapping
//!   ([`WebCommand`]), invocation with type conversion, and link generation.
//! - **[`registry`]**: The [`WebCommandRegistry`], which owns the compiled
//!   commands, tracks which owner claimed which controller and runs the
//!   first-match dispatch.
//! - **[`request`]**: Request-side types: [`HttpMethod`], [`Principal`],
//!   [`RequestContext`] and the [`CommandResult`] a command must return.
//! - **[`error`]**: [`WebCommandError`](error::WebCommandError).
//!
//! Dispatch never fails with an error: no match, a missing permission, a
//! conversion failure or a failing method all produce a bad request result.
pub mod command;
pub mod controller;
pub mod error;
pub mod registry;
pub mod request;

pub use command::{ParamMapping, WebCommand};
pub use controller::{
    CommandDescriptor, CommandReply, Controller, ControllerError, ParamDescriptor, ParamKind,
    ParamValue,
};
pub use registry::{controller_key, WebCommandRegistry};
pub use request::{CommandResult, HttpMethod, Principal, RequestContext};
