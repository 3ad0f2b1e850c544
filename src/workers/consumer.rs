use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::settings::QueueSettings;
use crate::infrastructure::queue::{InboundDelivery, QueueError, QueueResult, RabbitMqService};

/// Processes one delivery and settles it with the broker.
#[async_trait]
pub trait DeliveryHandler: Send + Sync + 'static {
    async fn handle(&self, delivery: InboundDelivery);
}

/// Feeds deliveries to `handler`, one task per delivery, until `shutdown` is
/// cancelled or the stream ends, then waits for in-flight deliveries.
///
/// The loop itself never awaits a handler, so a slow job does not hold back
/// the deliveries behind it.
pub async fn run_consumer<S, H>(
    deliveries: S,
    handler: Arc<H>,
    shutdown: CancellationToken,
    jobs: TaskTracker,
) -> QueueResult<()>
where
    S: Stream<Item = QueueResult<InboundDelivery>>,
    H: DeliveryHandler + ?Sized,
{
    let mut deliveries = std::pin::pin!(deliveries);

    let result = loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("Shutdown requested, no longer taking deliveries");
                break Ok(());
            }
            next = deliveries.next() => match next {
                Some(Ok(delivery)) => {
                    let handler = Arc::clone(&handler);
                    jobs.spawn(async move { handler.handle(delivery).await });
                }
                Some(Err(e)) => {
                    error!("Delivery stream failed: {}", e);
                    break Err(e);
                }
                None if shutdown.is_cancelled() => break Ok(()),
                None => {
                    warn!("Delivery stream closed by the broker");
                    break Err(QueueError::ConsumeFailed("delivery stream closed".to_string()));
                }
            }
        }
    };

    jobs.close();
    if !jobs.is_empty() {
        info!("Waiting for {} in-flight job(s) to finish", jobs.len());
    }
    jobs.wait().await;

    result
}

/// Consumes `queue` until shutdown, draining in-flight deliveries before the
/// consumer channel is closed.
pub async fn consume_queue<H>(
    rabbit: &RabbitMqService,
    settings: &QueueSettings,
    queue: &str,
    role: &str,
    handler: Arc<H>,
    shutdown: CancellationToken,
    jobs: TaskTracker,
) -> QueueResult<()>
where
    H: DeliveryHandler + ?Sized,
{
    let consumer_tag = format!("{}-{}", role, Uuid::new_v4().simple());
    let (handle, deliveries) = rabbit
        .consume(queue, &consumer_tag, settings.prefetch_count)
        .await?;

    let canceller = {
        let handle = handle.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown.cancelled().await;
            if let Err(e) = handle.cancel().await {
                warn!("{}", e);
            }
        })
    };

    let result = run_consumer(deliveries, handler, shutdown, jobs).await;

    canceller.abort();
    if let Err(e) = handle.close().await {
        warn!("{}", e);
    }

    result
}
