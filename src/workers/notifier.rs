use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use super::consumer::{consume_queue, DeliveryHandler};
use crate::config::settings::QueueSettings;
use crate::infrastructure::queue::{InboundDelivery, QueueResult, RabbitMqService};
use crate::modules::notification::Notifier;

#[async_trait]
impl DeliveryHandler for Notifier {
    async fn handle(&self, delivery: InboundDelivery) {
        // Failures are logged and acked inside `receive`.
        if let Ok(notification) = self.receive(delivery).await {
            debug!(mp3_fid = %notification.mp3_fid, "Notification delivered");
        }
    }
}

pub async fn start_notifier_worker(
    rabbit: &RabbitMqService,
    settings: &QueueSettings,
    shutdown: CancellationToken,
    jobs: TaskTracker,
) -> QueueResult<()> {
    info!("🔔 Notifier listening on '{}'", settings.mp3_queue);

    consume_queue(
        rabbit,
        settings,
        &settings.mp3_queue,
        "notifier",
        Arc::new(Notifier::new()),
        shutdown,
        jobs,
    )
    .await
}
