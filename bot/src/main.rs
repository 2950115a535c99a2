use anyhow::Result;
use bot::{
    config::config_loader,
    dispatch::{handlers::Handlers, poller},
    usecases::{
        member_status::MemberStatusUseCase, payment_reconciliation::PaymentReconciliationUseCase,
    },
};
use domain::{
    repositories::{
        group_admission::GroupAdmission, members::MemberRepository, notifier::ChatNotifier,
    },
    value_objects::entitlements::SubscriptionTerms,
};
use infra::{
    db::{postgres_connection, repositories::members::MemberPostgres},
    telegram::bot_client::TelegramBotClient,
};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Bot exited with error: {}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    observability::init_observability("bot")?;

    let dotenvy_env = Arc::new(config_loader::load()?);
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

    let notifier: Arc<dyn ChatNotifier + Send + Sync> = telegram_client.clone();
    let group: Arc<dyn GroupAdmission + Send + Sync> = telegram_client.clone();

    let payment_usecase = Arc::new(PaymentReconciliationUseCase::new(
        Arc::clone(&member_repository),
        notifier,
        group,
        SubscriptionTerms {
            extension_days: dotenvy_env.subscription.extension_days,
            fresh_days: dotenvy_env.subscription.fresh_days,
        },
        dotenvy_env.subscription.price_minor,
        dotenvy_env.subscription.currency.clone(),
        dotenvy_env.telegram.group_name.clone(),
    ));

    let status_usecase = Arc::new(MemberStatusUseCase::new(Arc::clone(&member_repository)));

    let handlers = Arc::new(Handlers::new(
        Arc::clone(&telegram_client),
        payment_usecase,
        status_usecase,
        Arc::clone(&dotenvy_env),
    ));

    poller::run_polling_loop(telegram_client, handlers).await
}
