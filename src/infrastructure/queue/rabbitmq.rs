use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use lapin::{
    options::*, types::FieldTable, BasicProperties, Channel, Connection, ConnectionProperties,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{InboundDelivery, MessagePublisher, QueueError, QueueResult};

#[derive(Clone)]
pub struct RabbitMqService {
    url: String,
    conn: Arc<Mutex<Connection>>,
    channel: Arc<Mutex<Channel>>,
}

impl RabbitMqService {
    async fn connect(url: &str) -> QueueResult<(Connection, Channel)> {
        info!("Connecting to RabbitMQ at {}", url);
        let conn = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| QueueError::ConnectionFailed(e.to_string()))?;

        let channel = Self::publish_channel(&conn).await?;

        info!("✅ Connected to RabbitMQ");
        Ok((conn, channel))
    }

    /// Opens a channel in confirm mode, so a publish completes only once the
    /// broker has taken responsibility for the message.
    async fn publish_channel(conn: &Connection) -> QueueResult<Channel> {
        let channel = conn
            .create_channel()
            .await
            .map_err(|e| QueueError::ConnectionFailed(format!("Failed to create channel: {}", e)))?;

        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| QueueError::SetupFailed(format!("Failed to enable confirms: {}", e)))?;

        Ok(channel)
    }

    pub async fn new(url: &str) -> QueueResult<Self> {
        let (conn, channel) = Self::connect(url).await?;

        Ok(Self {
            url: url.to_string(),
            conn: Arc::new(Mutex::new(conn)),
            channel: Arc::new(Mutex::new(channel)),
        })
    }

    async fn reconnect(&self) -> QueueResult<()> {
        let mut conn = self.conn.lock().await;

        // Consumers live on their own channels of this connection; keep it when
        // only the publish channel was lost.
        if conn.status().connected() {
            warn!("RabbitMQ publish channel dropped, reopening...");
            *self.channel.lock().await = Self::publish_channel(&conn).await?;
            return Ok(());
        }

        warn!("RabbitMQ connection dropped, reconnecting...");
        let (new_conn, channel) = Self::connect(&self.url).await?;
        *conn = new_conn;
        *self.channel.lock().await = channel;
        Ok(())
    }

    async fn declare(channel: &Channel, queue: &str) -> QueueResult<()> {
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| QueueError::SetupFailed(format!("Failed to declare queue {}: {}", queue, e)))?;
        Ok(())
    }

    /// Declares `queue` as a durable queue if it does not exist yet.
    pub async fn declare_queue(&self, queue: &str) -> QueueResult<()> {
        let channel = self.current_channel().await;
        Self::declare(&channel, queue).await
    }

    /// Handle on the publish channel. The lock only guards swapping the
    /// channel on reconnect; broker round trips run without it.
    async fn current_channel(&self) -> Channel {
        self.channel.lock().await.clone()
    }

    async fn publish_internal(&self, queue: &str, payload: &[u8]) -> QueueResult<()> {
        let channel = self.current_channel().await;

        let confirm = channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default()
                    .with_delivery_mode(2) // Persistent
                    .with_content_type(mime::APPLICATION_JSON.essence_str().into()),
            )
            .await
            .map_err(|e| QueueError::PublishFailed(e.to_string()))?;

        // The frame is on the wire from here on; the broker may hold the
        // message even if the confirmation never arrives.
        let confirmation = confirm.await.map_err(|e| {
            QueueError::Unconfirmed(format!("Failed to confirm publication: {}", e))
        })?;

        if confirmation.is_nack() {
            return Err(QueueError::PublishFailed(format!(
                "Broker rejected message for {}",
                queue
            )));
        }

        Ok(())
    }

    pub async fn publish(&self, queue: &str, payload: &[u8]) -> QueueResult<()> {
        match self.publish_internal(queue, payload).await {
            Ok(()) => Ok(()),
            Err(e) if e.may_have_been_delivered() => {
                warn!("RabbitMQ publish to {} unconfirmed: {}. Not retrying.", queue, e);
                Err(e)
            }
            Err(e) => {
                warn!("RabbitMQ publish failed: {}. Retrying after reconnect.", e);
                self.reconnect().await?;
                self.publish_internal(queue, payload).await
            }
        }
    }

    /// Starts consuming `queue` with manual acknowledgement on a dedicated
    /// channel. At most `prefetch` deliveries are unacknowledged at a time.
    pub async fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
        prefetch: u16,
    ) -> QueueResult<(
        ConsumerHandle,
        impl Stream<Item = QueueResult<InboundDelivery>> + Send + use<>,
    )> {
        let channel = self
            .conn
            .lock()
            .await
            .create_channel()
            .await
            .map_err(|e| QueueError::ConnectionFailed(format!("Failed to create channel: {}", e)))?;

        channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await
            .map_err(|e| QueueError::SetupFailed(format!("Failed to set prefetch: {}", e)))?;

        Self::declare(&channel, queue).await?;

        let consumer = channel
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| QueueError::ConsumeFailed(format!("Failed to create consumer: {}", e)))?;

        info!("Consuming '{}' as '{}' (prefetch {})", queue, consumer_tag, prefetch);

        let deliveries = consumer.map(|delivery| {
            delivery
                .map(InboundDelivery::from)
                .map_err(|e| QueueError::ConsumeFailed(e.to_string()))
        });

        let handle = ConsumerHandle {
            channel,
            consumer_tag: consumer_tag.to_string(),
        };

        Ok((handle, deliveries))
    }
}

/// Controls a consumer started with [`RabbitMqService::consume`].
#[derive(Clone)]
pub struct ConsumerHandle {
    channel: Channel,
    consumer_tag: String,
}

impl ConsumerHandle {
    /// Asks the broker to stop sending deliveries. Deliveries already received
    /// can still be acknowledged.
    pub async fn cancel(&self) -> QueueResult<()> {
        self.channel
            .basic_cancel(&self.consumer_tag, BasicCancelOptions::default())
            .await
            .map_err(|e| QueueError::ConsumeFailed(format!("Failed to cancel consumer: {}", e)))
    }

    /// Closes the consumer channel. Unacknowledged deliveries go back to the queue.
    pub async fn close(&self) -> QueueResult<()> {
        self.channel
            .close(200, "Bye")
            .await
            .map_err(|e| QueueError::ConnectionFailed(format!("Failed to close channel: {}", e)))
    }
}

/// [`MessagePublisher`] bound to one queue of a [`RabbitMqService`].
#[derive(Clone)]
pub struct QueuePublisher {
    rabbit: RabbitMqService,
    queue: String,
}

impl QueuePublisher {
    pub fn new(rabbit: RabbitMqService, queue: impl Into<String>) -> Self {
        Self {
            rabbit,
            queue: queue.into(),
        }
    }
}

#[async_trait]
impl MessagePublisher for QueuePublisher {
    async fn publish(&self, payload: &[u8]) -> QueueResult<()> {
        self.rabbit.publish(&self.queue, payload).await
    }
}
