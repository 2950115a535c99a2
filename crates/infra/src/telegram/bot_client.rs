use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::error;

const API_BASE: &str = "https://api.telegram.org";

/// Minimal Telegram Bot API client built on reqwest.
pub struct TelegramBotClient {
    http: reqwest::Client,
    bot_token: String,
    payment_provider_token: String,
    group_chat_id: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramEnvelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub pre_checkout_query: Option<PreCheckoutQuery>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<TgUser>,
    pub chat: Chat,
    pub text: Option<String>,
    pub successful_payment: Option<SuccessfulPayment>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub type_: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgUser {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

impl TgUser {
    /// Best human-readable name the platform gives us; falls back to the id.
    pub fn display_name(&self) -> String {
        self.username
            .clone()
            .or_else(|| self.first_name.clone())
            .unwrap_or_else(|| self.id.to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct SuccessfulPayment {
    pub currency: String,
    pub total_amount: i64,
    pub invoice_payload: String,
    pub telegram_payment_charge_id: String,
    pub provider_payment_charge_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PreCheckoutQuery {
    pub id: String,
    pub from: TgUser,
    pub currency: String,
    pub total_amount: i64,
    pub invoice_payload: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatInviteLink {
    pub invite_link: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatMember {
    pub status: String,
}

impl TelegramBotClient {
    pub fn new(
        bot_token: String,
        payment_provider_token: String,
        group_chat_id: i64,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            bot_token,
            payment_provider_token,
            group_chat_id,
        })
    }

    pub fn group_chat_id(&self) -> i64 {
        self.group_chat_id
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", API_BASE, self.bot_token, method)
    }

    async fn parse_response<T: DeserializeOwned>(
        resp: reqwest::Response,
        context: &str,
    ) -> Result<T> {
        let status = resp.status();
        let body = resp.text().await?;

        let envelope: TelegramEnvelope<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(err) => {
                error!(
                    status = %status,
                    response_body = %body,
                    context = %context,
                    error = %err,
                    "telegram api response could not be parsed"
                );
                anyhow::bail!("Telegram API response could not be parsed: {}", context);
            }
        };

        if !envelope.ok {
            error!(
                status = %status,
                telegram_error_code = ?envelope.error_code,
                telegram_description = ?envelope.description,
                context = %context,
                "telegram api request failed"
            );
            anyhow::bail!(
                "Telegram API request failed: {} ({})",
                context,
                envelope.description.unwrap_or_default()
            );
        }

        envelope
            .result
            .ok_or_else(|| anyhow::anyhow!("Telegram API response is missing result: {}", context))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let resp = self
            .http
            .post(self.method_url(method))
            .json(body)
            .send()
            .await?;

        Self::parse_response(resp, method).await
    }

    /// Long-polls for updates. The request timeout is stretched beyond the
    /// poll window so the server side closes the poll, not the client.
    pub async fn get_updates(&self, offset: i64, poll_timeout_secs: u64) -> Result<Vec<Update>> {
        let body = json!({
            "offset": offset,
            "timeout": poll_timeout_secs,
            "allowed_updates": ["message", "pre_checkout_query"],
        });

        let resp = self
            .http
            .post(self.method_url("getUpdates"))
            .timeout(Duration::from_secs(poll_timeout_secs + 10))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(resp, "getUpdates").await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let body = json!({ "chat_id": chat_id, "text": text });
        self.call::<serde_json::Value>("sendMessage", &body).await?;
        Ok(())
    }

    /// Creates a single-use invite link to the gated group, labeled so the
    /// admin can tell links apart. https://core.telegram.org/bots/api#createchatinvitelink
    pub async fn create_chat_invite_link(&self, name: &str) -> Result<ChatInviteLink> {
        let body = json!({
            "chat_id": self.group_chat_id,
            "member_limit": 1,
            "creates_join_request": false,
            "name": name,
        });
        self.call("createChatInviteLink", &body).await
    }

    pub async fn get_chat_member(&self, tg_user_id: i64) -> Result<ChatMember> {
        let body = json!({ "chat_id": self.group_chat_id, "user_id": tg_user_id });
        self.call("getChatMember", &body).await
    }

    pub async fn ban_chat_member(&self, tg_user_id: i64) -> Result<()> {
        let body = json!({ "chat_id": self.group_chat_id, "user_id": tg_user_id });
        self.call::<serde_json::Value>("banChatMember", &body)
            .await?;
        Ok(())
    }

    pub async fn unban_chat_member(&self, tg_user_id: i64) -> Result<()> {
        let body = json!({
            "chat_id": self.group_chat_id,
            "user_id": tg_user_id,
            "only_if_banned": true,
        });
        self.call::<serde_json::Value>("unbanChatMember", &body)
            .await?;
        Ok(())
    }

    /// Sends an invoice through the platform's payment provider.
    /// https://core.telegram.org/bots/api#sendinvoice
    pub async fn send_invoice(
        &self,
        chat_id: i64,
        title: &str,
        description: &str,
        payload: &str,
        currency: &str,
        amount_minor: i64,
    ) -> Result<()> {
        let body = json!({
            "chat_id": chat_id,
            "title": title,
            "description": description,
            "payload": payload,
            "provider_token": self.payment_provider_token,
            "currency": currency,
            "prices": [{ "label": title, "amount": amount_minor }],
        });
        self.call::<serde_json::Value>("sendInvoice", &body).await?;
        Ok(())
    }

    pub async fn answer_pre_checkout_query(
        &self,
        pre_checkout_query_id: &str,
        ok: bool,
        error_message: Option<&str>,
    ) -> Result<()> {
        let mut body = json!({ "pre_checkout_query_id": pre_checkout_query_id, "ok": ok });
        if let Some(message) = error_message {
            body["error_message"] = json!(message);
        }
        self.call::<serde_json::Value>("answerPreCheckoutQuery", &body)
            .await?;
        Ok(())
    }
}
