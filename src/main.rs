use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

use converter::app;
use converter::common::{logging, shutdown};
use converter::config::settings::AppConfig;
use converter::infrastructure::queue::{QueuePublisher, RabbitMqService};
use converter::infrastructure::storage::StorageService;
use converter::modules::conversion::{ConversionWorker, FfmpegTranscoder};
use converter::state::AppState;
use converter::workers::converter::start_converter_worker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    logging::init();

    info!("Starting converter...");

    let config = AppConfig::new().context("Invalid configuration")?;
    info!("Config: {:?}", config);

    // Everything below must be reachable before the first delivery is taken.
    let ffmpeg = which::which(&config.transcoder.ffmpeg_path)
        .with_context(|| format!("{} not found", config.transcoder.ffmpeg_path.display()))?;
    tokio::fs::create_dir_all(&config.transcoder.scratch_dir)
        .await
        .context("Failed to create scratch directory")?;

    let rabbit = RabbitMqService::new(&config.queue.amqp_url).await?;
    rabbit.declare_queue(&config.queue.mp3_queue).await?;

    let s3 = StorageService::client_for(&config.storage);
    let videos = StorageService::new(s3.clone(), &config.storage.video_bucket).await?;
    let audio = StorageService::new(s3, &config.storage.audio_bucket).await?;

    let worker = Arc::new(ConversionWorker::new(
        Arc::new(videos),
        Arc::new(audio),
        Arc::new(FfmpegTranscoder::new(ffmpeg, config.transcoder.timeout)),
        Arc::new(QueuePublisher::new(rabbit.clone(), config.queue.mp3_queue.clone())),
        config.transcoder.scratch_dir.clone(),
    ));

    let shutdown_token = CancellationToken::new();
    let jobs = TaskTracker::new();
    tokio::spawn(shutdown::cancel_on_signal(shutdown_token.clone()));

    let state = AppState::new("converter", jobs.clone(), shutdown_token.clone());
    let server = tokio::spawn(app::serve(state, config.server_port));

    let result = start_converter_worker(
        &rabbit,
        &config.queue,
        worker,
        shutdown_token.clone(),
        jobs,
    )
    .await;

    shutdown_token.cancel();
    match server.await {
        Ok(Err(e)) => error!("Health endpoint failed: {}", e),
        Err(e) => error!("Health endpoint task failed: {}", e),
        Ok(Ok(())) => {}
    }

    result.context("Converter stopped")?;
    info!("Converter shutdown complete");
    Ok(())
}
