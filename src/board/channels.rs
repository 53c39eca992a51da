use std::sync::Arc;

use super::BoardError;
use crate::api::DeskApi;
use crate::notify::{Notice, NotificationCenter};
use crate::types::{Channel, ChannelId, ChannelStatus, NewChannel};

/// Channels page: the Telegram sources the listener subscribes to.
pub struct ChannelBook {
    api: Arc<dyn DeskApi>,
    notices: Arc<NotificationCenter>,
    channels: Vec<Channel>,
}

impl ChannelBook {
    pub fn new(api: Arc<dyn DeskApi>, notices: Arc<NotificationCenter>) -> Self {
        Self {
            api,
            notices,
            channels: Vec::new(),
        }
    }

    pub async fn load(&mut self) -> Result<&[Channel], BoardError> {
        self.channels = self.api.channels().await?;
        tracing::debug!(channels = self.channels.len(), "channels loaded");
        Ok(&self.channels)
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn get(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == id)
    }

    pub fn enabled_count(&self) -> usize {
        self.channels
            .iter()
            .filter(|c| c.status == ChannelStatus::Enabled)
            .count()
    }

    pub async fn add(&mut self, channel: NewChannel) -> Result<Channel, BoardError> {
        let channel = NewChannel {
            chat_id: channel.chat_id.trim().to_string(),
            channel_name: channel.channel_name.trim().to_string(),
            ..channel
        };
        if channel.chat_id.is_empty() || channel.channel_name.is_empty() {
            return Err(BoardError::Invalid(
                "chat id and channel name are required".into(),
            ));
        }
        if self.channels.iter().any(|c| c.chat_id == channel.chat_id) {
            return Err(BoardError::Invalid(format!(
                "chat {} is already subscribed",
                channel.chat_id
            )));
        }

        let created = self.api.add_channel(&channel).await?;
        self.channels.insert(0, created.clone());
        self.notices
            .push(Notice::success("Channel", "Channel added successfully"));
        Ok(created)
    }

    /// Flips enabled/disabled and returns the new status.
    pub async fn toggle(&mut self, id: ChannelId) -> Result<ChannelStatus, BoardError> {
        let current = self
            .get(id)
            .ok_or_else(|| BoardError::Invalid(format!("channel {} not found", id.0)))?;
        let update = NewChannel {
            chat_id: current.chat_id.clone(),
            channel_name: current.channel_name.clone(),
            channel_type: current.channel_type.clone(),
            status: current.status.toggled(),
        };

        let saved = self.api.update_channel(id, &update).await?;
        let status = saved.status;
        if let Some(slot) = self.channels.iter_mut().find(|c| c.id == id) {
            *slot = saved;
        }
        self.notices
            .push(Notice::success("Channel", "Channel status updated"));
        Ok(status)
    }

    pub async fn delete(&mut self, id: ChannelId) -> Result<(), BoardError> {
        self.api.delete_channel(id).await?;
        self.channels.retain(|c| c.id != id);
        self.notices
            .push(Notice::success("Channel", "Channel deleted successfully"));
        Ok(())
    }
}
