use anyhow::Context;
use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

use converter::app;
use converter::common::{logging, shutdown};
use converter::config::settings::NotifierConfig;
use converter::infrastructure::queue::RabbitMqService;
use converter::state::AppState;
use converter::workers::notifier::start_notifier_worker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    logging::init();

    info!("Starting notifier...");

    let config = NotifierConfig::new().context("Invalid configuration")?;
    let rabbit = RabbitMqService::new(&config.queue.amqp_url).await?;

    let shutdown_token = CancellationToken::new();
    let jobs = TaskTracker::new();
    tokio::spawn(shutdown::cancel_on_signal(shutdown_token.clone()));

    let state = AppState::new("notifier", jobs.clone(), shutdown_token.clone());
    let server = tokio::spawn(app::serve(state, config.server_port));

    let result = start_notifier_worker(&rabbit, &config.queue, shutdown_token.clone(), jobs).await;

    shutdown_token.cancel();
    if let Ok(Err(e)) = server.await {
        error!("Health endpoint failed: {}", e);
    }

    result.context("Notifier stopped")?;
    info!("Notifier shutdown complete");
    Ok(())
}
