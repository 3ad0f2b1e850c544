use async_trait::async_trait;
use thiserror::Error;

pub mod delivery;
pub mod rabbitmq;

pub use delivery::{DeliveryAcker, InboundDelivery};
pub use rabbitmq::{ConsumerHandle, QueuePublisher, RabbitMqService};

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Queue setup failed: {0}")]
    SetupFailed(String),

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Publish unconfirmed: {0}")]
    Unconfirmed(String),

    #[error("Consume failed: {0}")]
    ConsumeFailed(String),

    #[error("Acknowledgement failed: {0}")]
    AckFailed(String),
}

impl QueueError {
    /// The message left this process but the broker never confirmed it, so it
    /// may or may not be on the queue.
    pub fn may_have_been_delivered(&self) -> bool {
        matches!(self, QueueError::Unconfirmed(_))
    }
}

/// Publishes message bodies onto one queue.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(&self, payload: &[u8]) -> QueueResult<()>;
}
