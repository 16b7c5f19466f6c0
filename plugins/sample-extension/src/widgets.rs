use bizdock_core::web_command::controller::{
    CommandDescriptor, CommandReply, Controller, ControllerError, ParamKind, ParamValue,
};
use bizdock_core::web_command::request::{CommandResult, RequestContext};
use serde_json::json;

use crate::{CONNECTOR_CONFIGURATOR, WIDGET_CONTROLLER};

/// Permission required to list every widget
pub const WIDGET_LIST_PERMISSION: &str = "WIDGET_LIST_PERMISSION";

/// Read-only view over widgets, exposed under `/widgets`
#[derive(Debug, Default)]
pub struct WidgetController;

impl Controller for WidgetController {
    fn class_name(&self) -> &str {
        WIDGET_CONTROLLER
    }

    fn path(&self) -> &str {
        "/widgets"
    }

    fn commands(&self) -> Vec<CommandDescriptor> {
        vec![
            CommandDescriptor::get("show", "/:id")
                .with_id("show")
                .with_param("id", ParamKind::Long),
            CommandDescriptor::get("list", "")
                .with_id("list")
                .with_permission(WIDGET_LIST_PERMISSION),
        ]
    }

    fn invoke(&self, method_name: &str, args: &[ParamValue], _: &RequestContext) -> Result<CommandReply, ControllerError> {
        match method_name {
            "show" => {
                let id = args
                    .first()
                    .and_then(ParamValue::as_long)
                    .ok_or("the widget id is missing")?;
                Ok(Box::new(CommandResult::ok(format!("widget {}", id))))
            }
            "list" => Ok(Box::new(CommandResult::json(&json!(["widget 1", "widget 2"])))),
            other => Err(format!("unknown method {}", other).into()),
        }
    }
}

/// Settings page of a connector configuration, mounted under
/// `/{id}/custom` by the extension manager
#[derive(Debug, Default)]
pub struct ConnectorConfigurator;

impl Controller for ConnectorConfigurator {
    fn class_name(&self) -> &str {
        CONNECTOR_CONFIGURATOR
    }

    fn path(&self) -> &str {
        "/settings"
    }

    fn commands(&self) -> Vec<CommandDescriptor> {
        vec![CommandDescriptor::get("show", "").with_id("show")]
    }

    fn invoke(&self, _: &str, _: &[ParamValue], _: &RequestContext) -> Result<CommandReply, ControllerError> {
        Ok(Box::new(CommandResult::ok("ACME connector settings")))
    }
}
