use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

use super::consumer::{consume_queue, DeliveryHandler};
use crate::config::settings::QueueSettings;
use crate::infrastructure::queue::{InboundDelivery, QueueResult, RabbitMqService};
use crate::modules::conversion::ConversionWorker;

#[async_trait]
impl DeliveryHandler for ConversionWorker {
    async fn handle(&self, delivery: InboundDelivery) {
        self.receive(delivery).await;
    }
}

pub async fn start_converter_worker(
    rabbit: &RabbitMqService,
    settings: &QueueSettings,
    worker: Arc<ConversionWorker>,
    shutdown: CancellationToken,
    jobs: TaskTracker,
) -> QueueResult<()> {
    info!("🎥 Converter Worker listening on '{}'", settings.video_queue);

    consume_queue(
        rabbit,
        settings,
        &settings.video_queue,
        "converter",
        worker,
        shutdown,
        jobs,
    )
    .await
}
