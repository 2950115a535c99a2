#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub telegram: Telegram,
    pub database: Database,
    pub subscription: Subscription,
}

#[derive(Debug, Clone)]
pub struct Telegram {
    pub bot_token: String,
    pub payment_provider_token: String,
    pub group_id: i64,
    pub group_name: String,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Subscription {
    pub extension_days: i64,
    pub fresh_days: i64,
    pub price_minor: i64,
    pub currency: String,
}
