use anyhow::Result;
use domain::repositories::{
    chat_history::ChatHistoryRepository, group_admission::GroupAdmission,
    members::MemberRepository, notifier::ChatNotifier,
};
use infra::{
    db::{
        postgres_connection,
        repositories::{chat_history::ChatHistoryPostgres, members::MemberPostgres},
    },
    telegram::bot_client::TelegramBotClient,
};
use std::sync::Arc;
use tracing::{error, info};
use worker::{
    axum_http, config,
    services::scheduler::{self, SweepSchedule},
    usecases::{
        history_retention::HistoryRetentionUseCase, membership_sweep::MembershipSweepUseCase,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(error) = run().await {
        error!("Worker exited with error: {}", error);
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    observability::init_observability("worker")?;

    let dotenvy_env = Arc::new(config::config_loader::load()?);
    info!("ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(&dotenvy_env.database.url)?;
    info!("Postgres connection has been established");

    let db_pool_arc = Arc::new(postgres_pool);

    let telegram_client = Arc::new(TelegramBotClient::new(
        dotenvy_env.telegram.bot_token.clone(),
        dotenvy_env.telegram.payment_provider_token.clone(),
        dotenvy_env.telegram.group_id,
    )?);

    let member_repository: Arc<dyn MemberRepository + Send + Sync> =
        Arc::new(MemberPostgres::new(Arc::clone(&db_pool_arc)));
    let chat_history_repository: Arc<dyn ChatHistoryRepository + Send + Sync> =
        Arc::new(ChatHistoryPostgres::new(Arc::clone(&db_pool_arc)));

    let notifier: Arc<dyn ChatNotifier + Send + Sync> = telegram_client.clone();
    let group: Arc<dyn GroupAdmission + Send + Sync> = telegram_client.clone();

    let sweep_usecase = Arc::new(MembershipSweepUseCase::new(
        Arc::clone(&member_repository),
        notifier,
        group,
        dotenvy_env.sweep.reminder_days.clone(),
        dotenvy_env.telegram.group_name.clone(),
    ));

    let retention_usecase = Arc::new(HistoryRetentionUseCase::new(chat_history_repository));

    let schedule = SweepSchedule {
        at: dotenvy_env.sweep.at,
        offset: dotenvy_env.sweep.offset,
    };
    let sweep_loop = tokio::spawn(scheduler::run_membership_sweep_loop(
        Arc::clone(&sweep_usecase),
        schedule,
        dotenvy_env.sweep.batch_size,
        dotenvy_env.sweep.run_on_startup,
    ));

    let retention_loop = tokio::spawn(scheduler::run_history_retention_loop(
        Arc::clone(&retention_usecase),
        dotenvy_env.history.max_entries,
        dotenvy_env.history.trim_interval_secs,
    ));

    let server_config = Arc::clone(&dotenvy_env);
    let http_server = tokio::spawn(async move {
        axum_http::http_serve::start(server_config, sweep_usecase, retention_usecase).await
    });

    tokio::select! {
        result = sweep_loop => result??,
        result = retention_loop => result??,
        result = http_server => result??,
    };
    Ok(())
}
