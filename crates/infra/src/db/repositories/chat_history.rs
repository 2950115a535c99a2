use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, dsl::count_star, prelude::*};
use std::sync::Arc;

use crate::db::postgres_connection::PgPoolSquad;
use domain::{
    repositories::chat_history::ChatHistoryRepository, schema::chat_messages,
    value_objects::chat_history::ConversationOverflow,
};

pub struct ChatHistoryPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl ChatHistoryPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl ChatHistoryRepository for ChatHistoryPostgres {
    async fn list_overflowing_conversations(
        &self,
        max_entries: i64,
    ) -> Result<Vec<ConversationOverflow>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = chat_messages::table
            .group_by(chat_messages::chat_id)
            .having(count_star().gt(max_entries))
            .select((chat_messages::chat_id, count_star()))
            .load::<(i64, i64)>(&mut conn)?;

        Ok(rows
            .into_iter()
            .map(|(chat_id, message_count)| ConversationOverflow {
                chat_id,
                message_count,
            })
            .collect())
    }

    async fn trim_conversation_to(&self, chat_id: i64, keep_most_recent: i64) -> Result<u64> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // Everything at or below the cutoff id is surplus. Messages inserted
        // concurrently get larger ids than the cutoff, so the most recent N
        // always survive.
        let cutoff = chat_messages::table
            .filter(chat_messages::chat_id.eq(chat_id))
            .order(chat_messages::id.desc())
            .offset(keep_most_recent)
            .select(chat_messages::id)
            .first::<i64>(&mut conn)
            .optional()?;

        let Some(cutoff) = cutoff else {
            return Ok(0);
        };

        let deleted = diesel::delete(
            chat_messages::table
                .filter(chat_messages::chat_id.eq(chat_id))
                .filter(chat_messages::id.le(cutoff)),
        )
        .execute(&mut conn)?;

        Ok(deleted as u64)
    }
}
