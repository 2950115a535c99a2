use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber, warn};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use url::Url;

use crate::config::ServiceContext;

/// Forwards matching events to a Discord webhook through a bounded queue so
/// a slow webhook can never stall the traced code path.
pub(crate) struct ErrorNotifyLayer {
    tx: mpsc::Sender<String>,
    service_context: ServiceContext,
    min_level: Level,
}

impl ErrorNotifyLayer {
    pub(crate) fn new(
        webhook_url: Url,
        service_context: ServiceContext,
        min_level: Level,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel::<String>(256);

        tokio::spawn(async move {
            let client = match reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(3))
                .build()
            {
                Ok(client) => client,
                Err(error) => {
                    warn!(error = %error, "Discord notify client could not be built");
                    return;
                }
            };

            while let Some(content) = rx.recv().await {
                let body = serde_json::json!({ "content": content });
                if let Err(error) = client.post(webhook_url.clone()).json(&body).send().await {
                    warn!(error = %error, "Discord webhook delivery failed");
                }
            }
        });

        Self {
            tx,
            service_context,
            min_level,
        }
    }

    fn format_content(
        &self,
        event: &Event<'_>,
        message: Option<String>,
        fields: BTreeMap<String, String>,
    ) -> String {
        let mut lines = Vec::new();

        lines.push(format!(
            "**{}** `{}` `{}` `{}`",
            self.service_context.service_name,
            self.service_context.environment,
            self.service_context.component,
            event.metadata().level().as_str()
        ));

        lines.push(format!(
            "`{}` `{}`{}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            event.metadata().target(),
            match (event.metadata().file(), event.metadata().line()) {
                (Some(file), Some(line)) => format!(" `{}:{}`", file, line),
                _ => String::new(),
            }
        ));

        if let Some(message) = message.filter(|m| !m.trim().is_empty()) {
            lines.push(format!("> {}", message.trim()));
        }

        for (key, value) in fields {
            lines.push(format!("- `{}`: {}", key, value));
        }

        lines.join("\n")
    }
}

impl<S> Layer<S> for ErrorNotifyLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        // tracing orders Level with ERROR lowest; anything more verbose than
        // the configured minimum is skipped.
        if *event.metadata().level() > self.min_level {
            return;
        }

        let mut visitor = FieldMapVisitor::default();
        event.record(&mut visitor);

        let message = visitor
            .values
            .remove("message")
            .map(|raw| unquote_debug_string(&raw));

        let content = self.format_content(event, message, visitor.values);

        match self.tx.try_send(content) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Notification queue full; dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

#[derive(Default)]
struct FieldMapVisitor {
    values: BTreeMap<String, String>,
}

impl Visit for FieldMapVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.values.insert(
            field.name().to_string(),
            redact(field.name(), format!("{value:?}")),
        );
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.values.insert(
            field.name().to_string(),
            redact(field.name(), value.to_string()),
        );
    }
}

fn unquote_debug_string(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        return trimmed[1..trimmed.len() - 1].to_string();
    }
    trimmed.to_string()
}

fn redact(field_name: &str, value: String) -> String {
    if is_sensitive_key(field_name) {
        return "[REDACTED]".to_string();
    }
    value
}

fn is_sensitive_key(field_name: &str) -> bool {
    let field = field_name.to_ascii_lowercase();
    field.contains("webhook")
        || field.contains("secret")
        || field.contains("password")
        || field.contains("token")
        || field.contains("authorization")
}
