use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

use crate::telegram::bot_client::TelegramBotClient;
use domain::{
    repositories::{group_admission::GroupAdmission, notifier::ChatNotifier},
    value_objects::enums::group_roles::GroupRole,
};

#[async_trait]
impl ChatNotifier for TelegramBotClient {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        TelegramBotClient::send_message(self, chat_id, text).await
    }
}

#[async_trait]
impl GroupAdmission for TelegramBotClient {
    async fn create_single_use_invite(
        &self,
        _tg_user_id: i64,
        display_name: &str,
    ) -> Result<String> {
        let link = self
            .create_chat_invite_link(&format!("for {}", display_name))
            .await?;
        Ok(link.invite_link)
    }

    async fn membership_role(&self, tg_user_id: i64) -> Result<GroupRole> {
        let chat_member = match self.get_chat_member(tg_user_id).await {
            Ok(chat_member) => chat_member,
            // Telegram reports users the group has never seen as an error
            // rather than a status; treat them as departed.
            Err(err) if looks_like_unknown_member_error(&err) => return Ok(GroupRole::Left),
            Err(err) => return Err(err),
        };

        Ok(GroupRole::from_str(&chat_member.status).unwrap_or_else(|| {
            warn!(
                %tg_user_id,
                status = %chat_member.status,
                "telegram: unknown chat member status; treating as member"
            );
            GroupRole::Member
        }))
    }

    async fn revoke_membership(&self, tg_user_id: i64) -> Result<()> {
        self.ban_chat_member(tg_user_id).await?;
        // Lift the ban right away; removal is the goal, and a lapsed user
        // who pays again must be able to rejoin with a fresh invite.
        self.unban_chat_member(tg_user_id).await?;
        Ok(())
    }
}

fn looks_like_unknown_member_error(err: &anyhow::Error) -> bool {
    // Only `anyhow::Error` is available at this layer; keep the check
    // conservative and avoid hard-coding Bot API error codes.
    let message = err.to_string().to_ascii_lowercase();
    message.contains("user not found")
        || message.contains("member not found")
        || message.contains("participant_id_invalid")
        || message.contains("user_not_participant")
}
