use anyhow::Result;

use super::config_model::{Database, DotEnvyConfig, Subscription, Telegram};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let telegram = Telegram {
        bot_token: std::env::var("BOT_TOKEN").expect("BOT_TOKEN is invalid"),
        payment_provider_token: std::env::var("PAYMENT_PROVIDER_TOKEN")
            .expect("PAYMENT_PROVIDER_TOKEN is invalid"),
        group_id: std::env::var("GROUP_ID")
            .expect("GROUP_ID is invalid")
            .parse()?,
        group_name: std::env::var("GROUP_NAME").expect("GROUP_NAME is invalid"),
    };

    let database = Database {
        url: std::env::var("DATABASE_URL").expect("DATABASE_URL is invalid"),
    };

    let subscription = Subscription {
        extension_days: std::env::var("SUB_EXTENSION_DAYS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()?,
        fresh_days: std::env::var("SUB_FRESH_DAYS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()?,
        price_minor: std::env::var("SUB_PRICE_MINOR")
            .expect("SUB_PRICE_MINOR is invalid")
            .parse()?,
        currency: std::env::var("SUB_CURRENCY").unwrap_or_else(|_| "USD".to_string()),
    };

    Ok(DotEnvyConfig {
        telegram,
        database,
        subscription,
    })
}
