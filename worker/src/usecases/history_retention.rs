use std::sync::Arc;

use anyhow::Result;
use domain::repositories::chat_history::ChatHistoryRepository;
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct HistoryRetentionParams {
    pub max_entries: i64,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default)]
pub struct HistoryRetentionReport {
    pub conversations_scanned: usize,
    pub conversations_trimmed: usize,
    pub messages_deleted: u64,
    pub trim_failures: usize,
    pub overflowing_chat_ids: Vec<i64>,
}

/// Caps stored chat history per conversation. The AI passthrough keeps
/// appending; this job only ever deletes the oldest surplus.
pub struct HistoryRetentionUseCase {
    history_repo: Arc<dyn ChatHistoryRepository + Send + Sync>,
}

impl HistoryRetentionUseCase {
    pub fn new(history_repo: Arc<dyn ChatHistoryRepository + Send + Sync>) -> Self {
        Self { history_repo }
    }

    pub async fn run(&self, params: HistoryRetentionParams) -> Result<HistoryRetentionReport> {
        let overflowing = self
            .history_repo
            .list_overflowing_conversations(params.max_entries)
            .await
            .map_err(|err| {
                error!(db_error = ?err, "history: failed to list overflowing conversations");
                err
            })?;

        let mut report = HistoryRetentionReport {
            conversations_scanned: overflowing.len(),
            ..Default::default()
        };

        for conversation in overflowing {
            if report.overflowing_chat_ids.len() < 20 {
                report.overflowing_chat_ids.push(conversation.chat_id);
            }
            if params.dry_run {
                continue;
            }

            match self
                .history_repo
                .trim_conversation_to(conversation.chat_id, params.max_entries)
                .await
            {
                Ok(deleted) => {
                    report.conversations_trimmed += 1;
                    report.messages_deleted += deleted;
                }
                Err(err) => {
                    error!(
                        chat_id = conversation.chat_id,
                        error = ?err,
                        "history: failed to trim conversation"
                    );
                    report.trim_failures += 1;
                }
            }
        }

        info!(
            conversations_scanned = report.conversations_scanned,
            conversations_trimmed = report.conversations_trimmed,
            messages_deleted = report.messages_deleted,
            trim_failures = report.trim_failures,
            dry_run = params.dry_run,
            "history: retention pass completed"
        );

        Ok(report)
    }
}
