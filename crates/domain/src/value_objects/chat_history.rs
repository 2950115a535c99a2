use serde::{Deserialize, Serialize};

/// A conversation whose stored history exceeds the retention cap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationOverflow {
    pub chat_id: i64,
    pub message_count: i64,
}
