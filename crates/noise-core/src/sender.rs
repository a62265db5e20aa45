//! Destination sender contract

use crate::error::SendError;
use crate::model::{Destination, Event};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Live handle to a destination.
///
/// `send` may block the caller for the duration of the write; the scheduler
/// awaits it inline, so a slow destination throttles the effective rate.
#[async_trait]
pub trait Sender: Send + Sync {
    async fn send(&self, event: &Event) -> Result<(), SendError>;

    /// Connectivity check used by the destination test endpoint
    async fn test(&self) -> Result<(), SendError>;

    async fn close(&self) -> Result<(), SendError>;
}

/// Builds senders from destination configuration
#[async_trait]
pub trait SenderFactory: Send + Sync {
    async fn connect(&self, destination: &Destination) -> Result<Arc<dyn Sender>, SendError>;
}

/// Open senders keyed by destination id
pub type SenderMap = HashMap<String, Arc<dyn Sender>>;

/// Close every sender, logging failures instead of returning them.
pub async fn close_all(senders: &SenderMap) {
    for (destination_id, sender) in senders {
        if let Err(e) = sender.close().await {
            warn!(destination = %destination_id, error = %e, "Failed to close sender");
        }
    }
}
