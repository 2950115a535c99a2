use std::{sync::Arc, time::Duration};

use anyhow::Result;
use infra::telegram::bot_client::TelegramBotClient;
use tracing::{error, info};

use crate::dispatch::handlers::Handlers;

const POLL_TIMEOUT_SECS: u64 = 30;
const POLL_RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Long-poll loop over getUpdates. A failing update handler never takes the
/// loop down; transport errors back off and retry.
pub async fn run_polling_loop(
    client: Arc<TelegramBotClient>,
    handlers: Arc<Handlers>,
) -> Result<()> {
    info!("dispatch: update polling started");

    let mut offset = 0i64;
    loop {
        let updates = match client.get_updates(offset, POLL_TIMEOUT_SECS).await {
            Ok(updates) => updates,
            Err(err) => {
                error!(error = ?err, "dispatch: getUpdates failed; backing off");
                tokio::time::sleep(POLL_RETRY_BACKOFF).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let update_id = update.update_id;

            if let Err(err) = handlers.dispatch(update).await {
                error!(update_id, error = ?err, "dispatch: update handler failed");
            }
        }
    }
}
