use crate::file::FileSender;
use crate::hec::{self, HecConfig, HecSender};
use crate::syslog::SyslogSender;
use async_trait::async_trait;
use noise_core::{Destination, DestinationKind, SendError, Sender, SenderFactory};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Builds the sender matching a destination's kind.
#[derive(Debug, Clone)]
pub struct DestinationSenderFactory {
    hec_timeout: Duration,
}

impl Default for DestinationSenderFactory {
    fn default() -> Self {
        Self {
            hec_timeout: hec::DEFAULT_TIMEOUT,
        }
    }
}

impl DestinationSenderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hec_timeout(mut self, timeout: Duration) -> Self {
        self.hec_timeout = timeout;
        self
    }
}

#[async_trait]
impl SenderFactory for DestinationSenderFactory {
    async fn connect(&self, destination: &Destination) -> Result<Arc<dyn Sender>, SendError> {
        let sender: Arc<dyn Sender> = match &destination.kind {
            DestinationKind::Syslog {
                host,
                port,
                protocol,
                format,
            } => Arc::new(SyslogSender::connect(host, *port, *protocol, *format).await?),
            DestinationKind::Hec {
                url,
                token,
                index,
                sourcetype,
                insecure_skip_verify,
            } => Arc::new(HecSender::new(HecConfig {
                url: url.clone(),
                token: token.clone(),
                index: index.clone(),
                sourcetype: sourcetype.clone(),
                insecure_skip_verify: *insecure_skip_verify,
                timeout: self.hec_timeout,
            })?),
            DestinationKind::File {
                path,
                max_size_mb,
                max_backups,
            } => Arc::new(FileSender::open(path, *max_size_mb, *max_backups).await?),
        };

        info!(
            destination = %destination.id,
            kind = destination.kind.label(),
            "Sender connected"
        );
        Ok(sender)
    }
}
