use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use domain::value_objects::{entitlements::EntitlementState, payments::PaymentConfirmation};
use infra::telegram::bot_client::{
    Chat, Message, PreCheckoutQuery, SuccessfulPayment, TelegramBotClient, TgUser, Update,
};
use tracing::{debug, error, info, warn};

use crate::{
    config::config_model::DotEnvyConfig,
    usecases::{
        member_status::MemberStatusUseCase,
        payment_reconciliation::{PaymentError, PaymentReconciliationUseCase},
    },
};

/// Invoice payload marking membership invoices issued by this bot; anything
/// else at pre-checkout is not ours to approve.
pub const INVOICE_PAYLOAD: &str = "membership-subscription";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    ChatId,
    Status,
    Subscribe,
}

/// First token of a message, `/command` or `/command@BotName` form.
pub fn parse_command(text: &str) -> Option<Command> {
    let first = text.split_whitespace().next()?;
    let name = first.strip_prefix('/')?.split('@').next()?;

    match name {
        "start" | "commands" => Some(Command::Start),
        "id" => Some(Command::ChatId),
        "status" => Some(Command::Status),
        "subscribe" => Some(Command::Subscribe),
        _ => None,
    }
}

pub struct Handlers {
    client: Arc<TelegramBotClient>,
    payments: Arc<PaymentReconciliationUseCase>,
    status: Arc<MemberStatusUseCase>,
    config: Arc<DotEnvyConfig>,
}

impl Handlers {
    pub fn new(
        client: Arc<TelegramBotClient>,
        payments: Arc<PaymentReconciliationUseCase>,
        status: Arc<MemberStatusUseCase>,
        config: Arc<DotEnvyConfig>,
    ) -> Self {
        Self {
            client,
            payments,
            status,
            config,
        }
    }

    pub async fn dispatch(&self, update: Update) -> Result<()> {
        if let Some(query) = update.pre_checkout_query {
            return self.handle_pre_checkout(query).await;
        }

        if let Some(message) = update.message {
            return self.handle_message(message).await;
        }

        Ok(())
    }

    async fn handle_message(&self, message: Message) -> Result<()> {
        let Message {
            chat,
            from,
            text,
            successful_payment,
            ..
        } = message;

        if let Some(payment) = successful_payment {
            return self.handle_successful_payment(&chat, from, payment).await;
        }

        let Some(text) = text else {
            return Ok(());
        };

        let Some(command) = parse_command(&text) else {
            // Free-text chat belongs to the AI passthrough, which is not
            // wired into this bot.
            debug!(chat_id = chat.id, "dispatch: ignoring non-command message");
            return Ok(());
        };

        match command {
            Command::Start => self.send_command_list(chat.id).await,
            Command::ChatId => {
                self.client
                    .send_message(
                        chat.id,
                        &format!("💬 Chat ID: {}\n📦 Type: {}", chat.id, chat.type_),
                    )
                    .await
            }
            Command::Status => self.handle_status(chat.id, from).await,
            Command::Subscribe => self.handle_subscribe(chat.id).await,
        }
    }

    async fn send_command_list(&self, chat_id: i64) -> Result<()> {
        let text = format!(
            "Available commands:\n\
             /id — show the id of the current chat\n\
             /status — show your subscription status\n\
             /subscribe — pay for access to {}\n\
             /commands — show this list",
            self.config.telegram.group_name
        );
        self.client.send_message(chat_id, &text).await
    }

    async fn handle_status(&self, chat_id: i64, from: Option<TgUser>) -> Result<()> {
        let Some(from) = from else {
            return Ok(());
        };

        let view = match self.status.status_for(from.id, Utc::now().date_naive()).await {
            Ok(view) => view,
            Err(err) => {
                error!(tg_user_id = from.id, error = ?err, "dispatch: status lookup failed");
                return self
                    .client
                    .send_message(
                        chat_id,
                        "Something went wrong while looking up your subscription. \
                         Please try again.",
                    )
                    .await;
            }
        };

        let group_name = &self.config.telegram.group_name;
        let name = view.display_name.unwrap_or_else(|| from.display_name());

        let text = match (view.state, view.expires_on) {
            (EntitlementState::Active, Some(expires_on)) => format!(
                "Hello, {}! 👋\n\n\
                 Your {} subscription runs until {}.\n\
                 Renewing before it expires stacks another term on top: /subscribe",
                name, group_name, expires_on
            ),
            (EntitlementState::Expired, Some(expires_on)) => format!(
                "Hello, {}! 👋\n\n\
                 You are not currently a member of {}.\n\
                 Your last subscription expired on {}.\n\
                 Use /subscribe to pay and receive a one-time invite link.",
                name, group_name, expires_on
            ),
            _ => format!(
                "Hello, {}! 👋\n\n\
                 You have never subscribed to {}.\n\
                 Want in? Use /subscribe to pay; after a successful payment \
                 you will receive a one-time invite link.",
                name, group_name
            ),
        };

        self.client.send_message(chat_id, &text).await
    }

    async fn handle_subscribe(&self, chat_id: i64) -> Result<()> {
        let subscription = &self.config.subscription;
        self.client
            .send_invoice(
                chat_id,
                &format!("{} membership", self.config.telegram.group_name),
                &format!(
                    "{} days of access to {}",
                    subscription.fresh_days, self.config.telegram.group_name
                ),
                INVOICE_PAYLOAD,
                &subscription.currency,
                subscription.price_minor,
            )
            .await
    }

    async fn handle_pre_checkout(&self, query: PreCheckoutQuery) -> Result<()> {
        let expected = &self.config.subscription;
        let matches_offer = query.invoice_payload == INVOICE_PAYLOAD
            && query.currency == expected.currency
            && query.total_amount == expected.price_minor;

        if matches_offer {
            info!(tg_user_id = query.from.id, "dispatch: pre-checkout approved");
            self.client
                .answer_pre_checkout_query(&query.id, true, None)
                .await
        } else {
            warn!(
                tg_user_id = query.from.id,
                currency = %query.currency,
                total_amount = query.total_amount,
                payload = %query.invoice_payload,
                "dispatch: pre-checkout rejected"
            );
            self.client
                .answer_pre_checkout_query(
                    &query.id,
                    false,
                    Some(
                        "This invoice no longer matches the current subscription \
                         offer. Please run /subscribe again.",
                    ),
                )
                .await
        }
    }

    async fn handle_successful_payment(
        &self,
        chat: &Chat,
        from: Option<TgUser>,
        payment: SuccessfulPayment,
    ) -> Result<()> {
        let Some(from) = from else {
            warn!(chat_id = chat.id, "dispatch: successful payment without a sender; ignoring");
            return Ok(());
        };

        let confirmation = PaymentConfirmation {
            tg_user_id: from.id,
            display_name: from.display_name(),
            amount_minor: payment.total_amount,
            currency: payment.currency.clone(),
            provider_payment_id: payment.telegram_payment_charge_id.clone(),
        };

        match self
            .payments
            .handle_payment(confirmation, Utc::now().date_naive())
            .await
        {
            Ok(_) => Ok(()),
            Err(
                err @ (PaymentError::AmountMismatch { .. } | PaymentError::CurrencyMismatch { .. }),
            ) => {
                self.client
                    .send_message(
                        chat.id,
                        &format!(
                            "⚠️ Your payment could not be matched to the subscription \
                             offer ({}). Please contact support.",
                            err
                        ),
                    )
                    .await
            }
            Err(PaymentError::Internal(err)) => {
                error!(
                    tg_user_id = from.id,
                    error = ?err,
                    "dispatch: payment reconciliation failed"
                );
                self.client
                    .send_message(
                        chat.id,
                        "⚠️ Something went wrong while recording your payment. \
                         Please check /status in a moment or contact support.",
                    )
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_commands() {
        assert_eq!(parse_command("/start"), Some(Command::Start));
        assert_eq!(parse_command("/commands"), Some(Command::Start));
        assert_eq!(parse_command("/id"), Some(Command::ChatId));
        assert_eq!(parse_command("/status"), Some(Command::Status));
        assert_eq!(parse_command("/subscribe"), Some(Command::Subscribe));
    }

    #[test]
    fn parses_commands_addressed_to_the_bot() {
        assert_eq!(parse_command("/status@GateBot"), Some(Command::Status));
        assert_eq!(parse_command("/subscribe@GateBot now"), Some(Command::Subscribe));
    }

    #[test]
    fn rejects_free_text_and_unknown_commands() {
        assert_eq!(parse_command("hello there"), None);
        assert_eq!(parse_command("/unknown"), None);
        assert_eq!(parse_command(""), None);
    }
}
