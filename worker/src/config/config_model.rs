use chrono::{FixedOffset, NaiveTime};

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub worker_server: WorkerServer,
    pub database: Database,
    pub telegram: Telegram,
    pub sweep: Sweep,
    pub history: History,
}

#[derive(Debug, Clone)]
pub struct WorkerServer {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Telegram {
    pub bot_token: String,
    pub payment_provider_token: String,
    pub group_id: i64,
    pub group_name: String,
}

#[derive(Debug, Clone)]
pub struct Sweep {
    /// Daily wall-clock fire time, interpreted in `offset`.
    pub at: NaiveTime,
    pub offset: FixedOffset,
    pub run_on_startup: bool,
    pub batch_size: i64,
    pub reminder_days: Vec<i64>,
    /// Bearer token for the manual trigger routes; unset disables them.
    pub internal_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct History {
    pub max_entries: i64,
    pub trim_interval_secs: u64,
}
