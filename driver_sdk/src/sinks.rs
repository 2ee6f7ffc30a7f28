//! Consumers of processed tag updates.

use crate::tags::structures::TagUpdate;
use async_trait::async_trait;
use std::error::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

pub type SinkResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// Publish/archive side of the pipeline.
#[async_trait]
pub trait ValueSink: Send + Sync {
    async fn publish(&self, update: &TagUpdate) -> SinkResult<()>;
}

/// Writes updates to the log.
#[derive(Debug, Default, Clone)]
pub struct LogSink;

#[async_trait]
impl ValueSink for LogSink {
    async fn publish(&self, update: &TagUpdate) -> SinkResult<()> {
        if update.persist {
            info!(
                device = %update.device_id,
                tag = %update.tag_id,
                value = ?update.value,
                side_value = ?update.side_value,
                "tag update"
            );
        } else {
            debug!(device = %update.device_id, tag = %update.tag_id, "tag update dropped");
        }
        Ok(())
    }
}

/// Forwards every update over a channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<TagUpdate>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<TagUpdate>) -> Self {
        ChannelSink { tx }
    }
}

#[async_trait]
impl ValueSink for ChannelSink {
    async fn publish(&self, update: &TagUpdate) -> SinkResult<()> {
        self.tx
            .send(update.clone())
            .map_err(|e| format!("update channel closed: {}", e).into())
    }
}
