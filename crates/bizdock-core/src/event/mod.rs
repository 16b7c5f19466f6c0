//! # BizDock Event Dispatch
//!
//! Provisioning messages exchanged between the application and started
//! plugins, and the per-plugin, per-direction worker pools that deliver
//! them.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`pool`]**: [`WorkerPool`](pool::WorkerPool), a fixed set of workers
//!   sharing one mailbox, which hands each message to a
//!   [`ProvisioningProcessor`](pool::ProvisioningProcessor) and re-queues a
//!   RESYNC message when an ordinary message fails.
//! - **[`supervisor`]**: the retry budget checked when a worker
//!   reports an exception.
//! - **[`directory`]**: [`ActorDirectory`](directory::ActorDirectory), the
//!   address book of running pools used by the liveness probe.
//! - **[`error`]**: [`EventSystemError`](error::EventSystemError).
pub mod directory;
pub mod error;
pub mod pool;
pub mod supervisor;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::error::EventSystemError;

/// Kind of a provisioning message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    ObjectCreated,
    ObjectDeleted,
    ObjectUpdated,
    ObjectStatusChanged,
    /// Ask the plugin to resynchronize an object after a failure
    Resync,
    /// Addressed to one plugin configuration
    Custom,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::ObjectCreated => "OBJECT_CREATED",
            MessageType::ObjectDeleted => "OBJECT_DELETED",
            MessageType::ObjectUpdated => "OBJECT_UPDATED",
            MessageType::ObjectStatusChanged => "OBJECT_STATUS_CHANGED",
            MessageType::Resync => "RESYNC",
            MessageType::Custom => "CUSTOM",
        }
    }

    /// Failures of these messages are not retried with a resync
    pub fn is_terminal_on_failure(&self) -> bool {
        matches!(self, MessageType::Resync | MessageType::Custom)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a provisioning flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowType {
    /// From the plugin into the application
    In,
    /// From the application to the plugin
    Out,
}

impl FlowType {
    /// Directory address of the worker pool of a plugin configuration
    pub fn router_address(&self, plugin_configuration_id: i64) -> String {
        match self {
            FlowType::In => format!("in-router-{}", plugin_configuration_id),
            FlowType::Out => format!("out-router-{}", plugin_configuration_id),
        }
    }
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowType::In => f.write_str("IN"),
            FlowType::Out => f.write_str("OUT"),
        }
    }
}

/// Envelope of a provisioning event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    /// Correlates retries and plugin logs
    pub transaction_id: String,
    pub internal_id: Option<i64>,
    pub external_id: Option<String>,
    pub data_type: Option<String>,
    pub message_type: MessageType,
    /// Target of a CUSTOM message
    pub plugin_configuration_id: Option<i64>,
    pub payload: Option<serde_json::Value>,
}

impl Default for EventMessage {
    fn default() -> Self {
        Self {
            transaction_id: Uuid::new_v4().to_string(),
            internal_id: None,
            external_id: None,
            data_type: None,
            message_type: MessageType::Custom,
            plugin_configuration_id: None,
            payload: None,
        }
    }
}

impl EventMessage {
    /// Message about an object known by its internal id
    pub fn internal(internal_id: i64, data_type: impl Into<String>, message_type: MessageType) -> Self {
        Self {
            internal_id: Some(internal_id),
            data_type: Some(data_type.into()),
            message_type,
            ..Self::default()
        }
    }

    /// Message about an object known by its external id
    pub fn external(external_id: impl Into<String>, data_type: impl Into<String>, message_type: MessageType) -> Self {
        Self {
            external_id: Some(external_id.into()),
            data_type: Some(data_type.into()),
            message_type,
            ..Self::default()
        }
    }

    /// CUSTOM message addressed to one plugin configuration
    pub fn custom(plugin_configuration_id: i64, payload: serde_json::Value) -> Self {
        Self {
            plugin_configuration_id: Some(plugin_configuration_id),
            payload: Some(payload),
            ..Self::default()
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_target(mut self, plugin_configuration_id: i64) -> Self {
        self.plugin_configuration_id = Some(plugin_configuration_id);
        self
    }

    /// A message other than CUSTOM needs an object id and a data type; a
    /// CUSTOM message needs a target.
    pub fn is_consistent(&self) -> bool {
        match self.message_type {
            MessageType::Custom => self.plugin_configuration_id.is_some(),
            _ => (self.external_id.is_some() || self.internal_id.is_some()) && self.data_type.is_some(),
        }
    }

    /// Derive the RESYNC message sent after a failed delivery. It gets a
    /// new transaction id and keeps the external id when there is one.
    pub fn resync_message(&self) -> EventMessage {
        let (internal_id, external_id) = match &self.external_id {
            Some(external) => (None, Some(external.clone())),
            None => (self.internal_id, None),
        };
        EventMessage {
            internal_id,
            external_id,
            data_type: self.data_type.clone(),
            message_type: MessageType::Resync,
            ..EventMessage::default()
        }
    }
}

impl fmt::Display for EventMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EventMessage [transaction_id={}, internal_id={:?}, external_id={:?}, data_type={:?}, message_type={}, plugin_configuration_id={:?}, payload={:?}]",
            self.transaction_id,
            self.internal_id,
            self.external_id,
            self.data_type,
            self.message_type,
            self.plugin_configuration_id,
            self.payload
        )
    }
}

/// Sizing and supervision of one worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventInterfaceConfiguration {
    pool_size: usize,
    retries: u32,
    retry_window: Duration,
}

impl Default for EventInterfaceConfiguration {
    fn default() -> Self {
        Self {
            pool_size: 1,
            retries: 0,
            retry_window: Duration::ZERO,
        }
    }
}

impl EventInterfaceConfiguration {
    pub fn new(pool_size: usize, retries: u32, retry_window: Duration) -> Result<Self, EventSystemError> {
        if pool_size == 0 {
            return Err(EventSystemError::InvalidConfiguration(
                "the pool size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            pool_size,
            retries,
            retry_window,
        })
    }

    /// Build from stored values, which may be negative
    pub fn from_raw(pool_size: i64, retries: i64, retry_window_secs: i64) -> Result<Self, EventSystemError> {
        if pool_size < 1 || retries < 0 || retry_window_secs < 0 {
            return Err(EventSystemError::InvalidConfiguration(format!(
                "pool size {}, retries {}, window {}s",
                pool_size, retries, retry_window_secs
            )));
        }
        let retries = u32::try_from(retries)
            .map_err(|_| EventSystemError::InvalidConfiguration(format!("too many retries: {}", retries)))?;
        Self::new(pool_size as usize, retries, Duration::from_secs(retry_window_secs as u64))
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn retry_window(&self) -> Duration {
        self.retry_window
    }
}

#[cfg(test)]
mod tests;
