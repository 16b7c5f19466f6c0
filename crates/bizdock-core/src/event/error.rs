//! # BizDock Event System Errors
//!
//! [`EventSystemError`] covers the provisioning worker pools: invalid pool
//! configuration, a pool address already in use, and delivery to a pool
//! whose mailbox is closed.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventSystemError {
    #[error("Invalid event interface configuration: {0}")]
    InvalidConfiguration(String),

    #[error("A worker pool is already running at '{address}'")]
    PoolAlreadyRunning { address: String },

    #[error("The worker pool '{address}' is closed, message {transaction_id} not delivered")]
    PoolClosed {
        address: String,
        transaction_id: String,
    },
}
