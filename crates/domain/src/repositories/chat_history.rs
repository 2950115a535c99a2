use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::value_objects::chat_history::ConversationOverflow;

#[automock]
#[async_trait]
pub trait ChatHistoryRepository {
    /// Conversations holding more than `max_entries` stored messages.
    async fn list_overflowing_conversations(
        &self,
        max_entries: i64,
    ) -> Result<Vec<ConversationOverflow>>;

    /// Deletes the oldest messages of one conversation so that at least the
    /// most recent `keep_most_recent` survive. Returns the number deleted.
    async fn trim_conversation_to(&self, chat_id: i64, keep_most_recent: i64) -> Result<u64>;
}
