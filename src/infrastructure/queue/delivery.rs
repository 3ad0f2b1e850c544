use std::fmt;

use async_trait::async_trait;
use lapin::acker::Acker;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicNackOptions};

use super::{QueueError, QueueResult};

/// Settles one delivery with the broker.
#[async_trait]
pub trait DeliveryAcker: Send + Sync {
    async fn ack(&self) -> QueueResult<()>;

    async fn nack(&self, requeue: bool) -> QueueResult<()>;
}

#[async_trait]
impl DeliveryAcker for Acker {
    async fn ack(&self) -> QueueResult<()> {
        Acker::ack(self, BasicAckOptions::default())
            .await
            .map(|_| ())
            .map_err(|e| QueueError::AckFailed(e.to_string()))
    }

    async fn nack(&self, requeue: bool) -> QueueResult<()> {
        Acker::nack(
            self,
            BasicNackOptions {
                multiple: false,
                requeue,
            },
        )
        .await
        .map(|_| ())
        .map_err(|e| QueueError::AckFailed(e.to_string()))
    }
}

/// A message handed to this consumer, together with the handle that settles it.
///
/// [`ack`](Self::ack) and [`nack`](Self::nack) take the delivery by value, so a
/// delivery is settled at most once.
pub struct InboundDelivery {
    pub delivery_tag: u64,
    pub redelivered: bool,
    pub data: Vec<u8>,
    acker: Box<dyn DeliveryAcker>,
}

impl InboundDelivery {
    pub fn new(
        delivery_tag: u64,
        redelivered: bool,
        data: Vec<u8>,
        acker: impl DeliveryAcker + 'static,
    ) -> Self {
        Self {
            delivery_tag,
            redelivered,
            data,
            acker: Box::new(acker),
        }
    }

    pub async fn ack(self) -> QueueResult<()> {
        self.acker.ack().await
    }

    pub async fn nack(self, requeue: bool) -> QueueResult<()> {
        self.acker.nack(requeue).await
    }
}

impl From<Delivery> for InboundDelivery {
    fn from(delivery: Delivery) -> Self {
        Self::new(
            delivery.delivery_tag,
            delivery.redelivered,
            delivery.data,
            delivery.acker,
        )
    }
}

impl fmt::Debug for InboundDelivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundDelivery")
            .field("delivery_tag", &self.delivery_tag)
            .field("redelivered", &self.redelivered)
            .field("len", &self.data.len())
            .finish()
    }
}
