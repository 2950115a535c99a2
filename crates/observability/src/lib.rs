mod config;
mod notify;

use anyhow::Result;
use config::ObservabilityConfig;
use notify::ErrorNotifyLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Initializes tracing for a component: RUST_LOG-driven filtering with an
/// `info` default, local-time RFC3339 timestamps, and an optional Discord
/// webhook sink for error events.
pub fn init_observability(component: &str) -> Result<()> {
    let config = ObservabilityConfig::from_env(component);

    let notify_layer = config.discord.as_ref().map(|discord| {
        ErrorNotifyLayer::new(
            discord.webhook_url.clone(),
            config.service_context.clone(),
            discord.min_level,
        )
        .with_filter(tracing_subscriber::filter::LevelFilter::from_level(
            discord.min_level,
        ))
    });

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(notify_layer)
        .with(env_filter)
        .try_init()?;

    if config.discord.is_some() {
        info!(
            service = %config.service_context.service_name,
            environment = %config.service_context.environment,
            component = %config.service_context.component,
            "Discord error notifications enabled"
        );
    } else {
        info!(
            service = %config.service_context.service_name,
            environment = %config.service_context.environment,
            component = %config.service_context.component,
            "Discord error notifications disabled"
        );
    }

    Ok(())
}
