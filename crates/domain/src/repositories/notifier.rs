use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

/// Outbound chat messaging capability. For direct chats the platform uses
/// the user id as the chat id.
#[automock]
#[async_trait]
pub trait ChatNotifier {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()>;
}
