//! Plugin runner mirroring BizDock projects into the ACME tracker.
//!
//! The runner does not talk to a real remote system: each created project
//! gets an `acme-{internal id}` external id, kept as an identification
//! link, and every handled message is reported in the plugin logs.
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use bizdock_core::event::{EventMessage, MessageType};
use bizdock_core::plugin_system::context::PluginContext;
use bizdock_core::plugin_system::error::PluginError;
use bizdock_core::plugin_system::traits::{PluginActionDescriptor, PluginMenuDescriptor, PluginRunner};
use bizdock_core::utils::properties;
use log::Level;

/// Link type of the project links
pub const PROJECT_LINK: &str = "project";
/// Configuration block holding the connection properties
pub const MAIN_BLOCK: &str = "main";

#[derive(Default)]
pub struct AcmeConnector {
    context: OnceLock<Arc<PluginContext>>,
}

impl AcmeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn context(&self) -> Result<&Arc<PluginContext>, PluginError> {
        self.context
            .get()
            .ok_or_else(|| PluginError::new("the connector is not initialized"))
    }

    async fn endpoint(&self) -> Result<String, PluginError> {
        let context = self.context()?;
        let raw = context.get_configuration_and_merge_with_default(MAIN_BLOCK).await?;
        let text = String::from_utf8_lossy(&raw);
        properties::parse(&text)
            .into_iter()
            .find(|(key, _)| key == "endpoint")
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| PluginError::new("the endpoint is not configured"))
    }

    async fn push_project(&self, message: &EventMessage) -> Result<(), PluginError> {
        let context = self.context()?;
        let internal_id = message
            .internal_id
            .ok_or_else(|| PluginError::new("only internal projects can be pushed"))?;

        match message.message_type {
            MessageType::ObjectCreated => {
                let external_id = format!("acme-{}", internal_id);
                if context.unique_external_id(internal_id, PROJECT_LINK).await?.is_none() {
                    context
                        .create_one_to_one_link(internal_id, &external_id, PROJECT_LINK)
                        .await?;
                }
                context
                    .report_message(
                        &message.transaction_id,
                        false,
                        &format!("Project {} created as {}", internal_id, external_id),
                    )
                    .await
            }
            MessageType::ObjectDeleted => {
                if let Some(external_id) = context.unique_external_id(internal_id, PROJECT_LINK).await? {
                    context
                        .delete_one_to_one_link(internal_id, &external_id, PROJECT_LINK)
                        .await?;
                }
                context
                    .report_message(&message.transaction_id, false, &format!("Project {} deleted", internal_id))
                    .await
            }
            _ => {
                context
                    .report_message(
                        &message.transaction_id,
                        false,
                        &format!("Project {} synchronized ({})", internal_id, message.message_type),
                    )
                    .await
            }
        }
    }
}

#[async_trait]
impl PluginRunner for AcmeConnector {
    async fn init(&self, context: Arc<PluginContext>) -> Result<(), PluginError> {
        self.context
            .set(context)
            .map_err(|_| PluginError::new("the connector is already initialized"))
    }

    async fn start(&self) -> Result<(), PluginError> {
        let endpoint = self.endpoint().await?;
        let context = self.context()?;
        context.log(Level::Info, &format!("Connected to {}", endpoint), None);
        context
            .report_on_start_up(false, &format!("Connected to {}", endpoint), None)
            .await
    }

    async fn stop(&self) -> Result<(), PluginError> {
        self.context()?.report_on_stop(false, "Disconnected", None).await
    }

    async fn handle_in_provisioning_message(&self, message: &EventMessage) -> Result<(), PluginError> {
        let context = self.context()?;
        let external_id = message
            .external_id
            .as_deref()
            .ok_or_else(|| PluginError::new("a message from ACME must carry an external id"))?;
        let log_message = match context.unique_internal_id(external_id, PROJECT_LINK).await? {
            Some(internal_id) => format!("{} is the project {}", external_id, internal_id),
            None => format!("{} is not linked to any project", external_id),
        };
        context.report_message(&message.transaction_id, false, &log_message).await
    }

    async fn handle_out_provisioning_message(&self, message: &EventMessage) -> Result<(), PluginError> {
        match message.message_type {
            MessageType::Custom => {
                let flush = message
                    .payload
                    .as_ref()
                    .and_then(|p| p.get("action"))
                    .and_then(|a| a.as_str())
                    == Some("flush");
                if flush {
                    self.context()?.flush_all_links().await?;
                }
                Ok(())
            }
            MessageType::Resync => {
                self.context()?
                    .report_message(&message.transaction_id, false, "Resynchronization requested")
                    .await
            }
            _ => self.push_project(message).await,
        }
    }

    fn menu_descriptor(&self) -> Option<PluginMenuDescriptor> {
        Some(PluginMenuDescriptor {
            label: "ACME connector".to_string(),
            path: "/custom/settings".to_string(),
        })
    }

    fn action_descriptors(&self) -> Vec<PluginActionDescriptor> {
        vec![PluginActionDescriptor {
            identifier: "open-in-acme".to_string(),
            label: "Open in ACME".to_string(),
            is_admin: false,
            data_type: "project".to_string(),
        }]
    }
}
