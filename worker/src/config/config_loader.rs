use anyhow::Result;
use chrono::{FixedOffset, NaiveTime};

use super::config_model::{Database, DotEnvyConfig, History, Sweep, Telegram, WorkerServer};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let worker_server = WorkerServer {
        port: std::env::var("SERVER_PORT_WORKER")
            .expect("SERVER_PORT_WORKER is invalid")
            .parse()?,
        body_limit: std::env::var("SERVER_BODY_LIMIT")
            .unwrap_or_else(|_| "1".to_string())
            .parse()?,
        timeout: std::env::var("SERVER_TIMEOUT")
            .unwrap_or_else(|_| "30".to_string())
            .parse()?,
    };

    let database = Database {
        url: std::env::var("DATABASE_URL").expect("DATABASE_URL is invalid"),
    };

    let telegram = Telegram {
        bot_token: std::env::var("BOT_TOKEN").expect("BOT_TOKEN is invalid"),
        payment_provider_token: std::env::var("PAYMENT_PROVIDER_TOKEN")
            .expect("PAYMENT_PROVIDER_TOKEN is invalid"),
        group_id: std::env::var("GROUP_ID")
            .expect("GROUP_ID is invalid")
            .parse()?,
        group_name: std::env::var("GROUP_NAME").expect("GROUP_NAME is invalid"),
    };

    let sweep_hour: u32 = std::env::var("SWEEP_HOUR")
        .unwrap_or_else(|_| "9".to_string())
        .parse()?;
    let sweep_minute: u32 = std::env::var("SWEEP_MINUTE")
        .unwrap_or_else(|_| "0".to_string())
        .parse()?;
    let sweep_offset_hours: i32 = std::env::var("SWEEP_UTC_OFFSET_HOURS")
        .unwrap_or_else(|_| "0".to_string())
        .parse()?;

    let sweep = Sweep {
        at: NaiveTime::from_hms_opt(sweep_hour, sweep_minute, 0)
            .expect("SWEEP_HOUR/SWEEP_MINUTE are invalid"),
        offset: FixedOffset::east_opt(sweep_offset_hours * 3600)
            .expect("SWEEP_UTC_OFFSET_HOURS is invalid"),
        run_on_startup: std::env::var("SWEEP_RUN_ON_STARTUP")
            .unwrap_or_else(|_| "true".to_string())
            .parse()?,
        batch_size: std::env::var("SWEEP_BATCH_SIZE")
            .unwrap_or_else(|_| "500".to_string())
            .parse()?,
        reminder_days: parse_reminder_days(
            &std::env::var("REMINDER_DAYS").unwrap_or_else(|_| "5,1".to_string()),
        )?,
        internal_token: std::env::var("INTERNAL_SWEEP_TOKEN")
            .ok()
            .filter(|v| !v.is_empty()),
    };

    let history = History {
        max_entries: std::env::var("HISTORY_MAX_ENTRIES")
            .unwrap_or_else(|_| "200".to_string())
            .parse()?,
        trim_interval_secs: std::env::var("HISTORY_TRIM_INTERVAL_SECS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()?,
    };

    Ok(DotEnvyConfig {
        worker_server,
        database,
        telegram,
        sweep,
        history,
    })
}

fn parse_reminder_days(raw: &str) -> Result<Vec<i64>> {
    raw.split(',')
        .map(|part| {
            part.trim()
                .parse::<i64>()
                .map_err(|err| anyhow::anyhow!("REMINDER_DAYS entry {part:?} is invalid: {err}"))
        })
        .collect()
}
