// Chat command handlers

use tokio::time::Instant;

use crate::client::ThrottleDecision;
use crate::error::{Error, Result};
use crate::models::ChatMessage;
use crate::session::WatchSession;

impl WatchSession {
    /// Send a chat line to the room. Anyone may chat.
    ///
    /// Blank input is ignored. Messages over the configured length are
    /// rejected, as is a second message inside the rate-limit window.
    pub async fn send_message(&self, message: &str) -> Result<Option<ChatMessage>> {
        let inner = &self.inner;
        let trimmed = message.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let max_length = inner.config.chat.max_message_length;
        let length = trimmed.chars().count();
        if length > max_length {
            return Err(Error::MessageTooLong(length, max_length));
        }

        let decision = inner.chat_throttle.lock().offer((), Instant::now());
        if decision == ThrottleDecision::Dropped {
            tracing::debug!("Chat message rate limited");
            return Err(Error::ChatRateLimited);
        }

        let sent = inner
            .channel
            .send_message(&inner.room_id, &inner.state.get_display_name(), trimmed)
            .await?;
        tracing::info!("Sent chat message {}", sent.id);
        Ok(Some(sent))
    }

    /// Recent chat history, oldest first.
    pub async fn chat_history(&self) -> Result<Vec<ChatMessage>> {
        let inner = &self.inner;
        inner
            .channel
            .get_messages(&inner.room_id, inner.config.chat.history_limit)
            .await
    }
}
