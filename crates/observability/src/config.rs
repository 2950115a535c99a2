use std::env;

use tracing::Level;
use url::Url;

#[derive(Clone)]
pub(crate) struct ServiceContext {
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
}

#[derive(Clone)]
pub(crate) struct DiscordConfig {
    pub(crate) webhook_url: Url,
    pub(crate) min_level: Level,
}

pub(crate) struct ObservabilityConfig {
    pub(crate) service_context: ServiceContext,
    pub(crate) discord: Option<DiscordConfig>,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        let component = component.trim().to_string();

        let service_name = env_string("SERVICE_NAME")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| component.clone());

        let environment = env_string("STAGE")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        Self {
            service_context: ServiceContext {
                service_name,
                environment,
                component,
            },
            discord: discord_from_env(),
        }
    }
}

fn discord_from_env() -> Option<DiscordConfig> {
    if !env_bool("DISCORD_NOTIFY_ENABLED").unwrap_or(true) {
        return None;
    }

    // An unset or unparseable webhook URL disables the sink; the enabled /
    // disabled state is logged once tracing is up.
    let webhook_url = env_string("DISCORD_WEBHOOK_URL")
        .filter(|v| !v.is_empty())
        .and_then(|raw| Url::parse(&raw).ok())?;

    let min_level = env_string("DISCORD_NOTIFY_LEVEL")
        .as_deref()
        .and_then(parse_level)
        .unwrap_or(Level::ERROR);

    Some(DiscordConfig {
        webhook_url,
        min_level,
    })
}

fn parse_level(input: &str) -> Option<Level> {
    match input.trim().to_ascii_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_bool(key: &str) -> Option<bool> {
    let raw = env::var(key).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}
