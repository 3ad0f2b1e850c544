use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{error, info, info_span, Instrument};

use crate::infrastructure::queue::InboundDelivery;
use crate::modules::conversion::ConversionJob;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Malformed completion message: {0}")]
    Malformed(String),

    #[error("Completion message for {0} carries no mp3_fid")]
    MissingAudio(String),
}

/// What the user is told once their audio is ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub username: String,
    pub mp3_fid: String,
}

impl Notification {
    pub fn from_message(body: &[u8]) -> Result<Self, NotificationError> {
        let job = ConversionJob::from_slice(body)
            .map_err(|e| NotificationError::Malformed(e.to_string()))?;

        if job.mp3_fid.is_empty() {
            return Err(NotificationError::MissingAudio(job.video_fid));
        }

        Ok(Self {
            username: job.username,
            mp3_fid: job.mp3_fid,
        })
    }

    pub fn text(&self) -> String {
        format!(
            "Attention user {}! Your mp3 is ready for download. fid: {}",
            self.username, self.mp3_fid
        )
    }
}

/// Consumer of the mp3 queue.
///
/// Every delivery is acknowledged: a completion message that cannot be read
/// now will not become readable on redelivery.
#[derive(Debug, Default, Clone)]
pub struct Notifier;

impl Notifier {
    pub fn new() -> Self {
        Self
    }

    pub async fn receive(&self, delivery: InboundDelivery) -> Result<Notification, NotificationError> {
        let span = info_span!("notification", delivery_tag = delivery.delivery_tag);

        async move {
            let result = Notification::from_message(&delivery.data);

            match &result {
                Ok(notification) => {
                    let notified_at = OffsetDateTime::now_utc()
                        .format(&Rfc3339)
                        .unwrap_or_default();
                    info!(
                        username = %notification.username,
                        mp3_fid = %notification.mp3_fid,
                        %notified_at,
                        "{}",
                        notification.text()
                    );
                }
                Err(e) => error!("❌ Dropping completion message: {}", e),
            }

            if let Err(e) = delivery.ack().await {
                error!("Failed to ack completion message: {}", e);
            }

            result
        }
        .instrument(span)
        .await
    }
}
