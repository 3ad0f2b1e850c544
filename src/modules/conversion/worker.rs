use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::field::Empty;
use tracing::{Instrument, Span, error, info, info_span, warn};

use crate::infrastructure::queue::{InboundDelivery, MessagePublisher, QueueError};
use crate::infrastructure::storage::BlobStore;

use super::error::{ConversionError, ConversionResult};
use super::job::ConversionJob;
use super::scratch::ScratchFiles;
use super::transcoder::Transcoder;

/// Where a job was when it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Received,
    Downloading,
    Transcoding,
    Uploading,
    Publishing,
    Done,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStage::Received => "received",
            JobStage::Downloading => "downloading",
            JobStage::Transcoding => "transcoding",
            JobStage::Uploading => "uploading",
            JobStage::Publishing => "publishing",
            JobStage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum JobOutcome {
    /// The completion message was published.
    Done(ConversionJob),
    /// The delivery goes back to the queue.
    RetryableFailure {
        stage: JobStage,
        error: ConversionError,
    },
    /// The delivery is dropped.
    PermanentFailure {
        stage: JobStage,
        error: ConversionError,
    },
}

impl JobOutcome {
    fn failed(stage: JobStage, error: ConversionError) -> Self {
        if error.is_retryable() {
            JobOutcome::RetryableFailure { stage, error }
        } else {
            JobOutcome::PermanentFailure { stage, error }
        }
    }

    pub fn stage(&self) -> JobStage {
        match self {
            JobOutcome::Done(_) => JobStage::Done,
            JobOutcome::RetryableFailure { stage, .. } | JobOutcome::PermanentFailure { stage, .. } => {
                *stage
            }
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, JobOutcome::Done(_))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, JobOutcome::RetryableFailure { .. })
    }
}

type StageResult<T> = Result<T, (JobStage, ConversionError)>;

fn at<E: Into<ConversionError>>(stage: JobStage) -> impl FnOnce(E) -> (JobStage, ConversionError) {
    move |e| (stage, e.into())
}

/// Turns video deliveries into audio objects and completion messages.
///
/// Collaborators are injected so the worker holds no global state; one worker
/// is shared by all in-flight jobs.
pub struct ConversionWorker {
    videos: Arc<dyn BlobStore>,
    audio: Arc<dyn BlobStore>,
    transcoder: Arc<dyn Transcoder>,
    publisher: Arc<dyn MessagePublisher>,
    scratch_dir: PathBuf,
}

impl ConversionWorker {
    pub fn new(
        videos: Arc<dyn BlobStore>,
        audio: Arc<dyn BlobStore>,
        transcoder: Arc<dyn Transcoder>,
        publisher: Arc<dyn MessagePublisher>,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            videos,
            audio,
            transcoder,
            publisher,
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Processes one delivery and settles it: acknowledged when done or when
    /// the job can never succeed, requeued when the failure is transient.
    pub async fn receive(&self, delivery: InboundDelivery) -> JobOutcome {
        let span = info_span!(
            "conversion",
            delivery_tag = delivery.delivery_tag,
            redelivered = delivery.redelivered,
            video_fid = Empty,
            username = Empty,
        );

        async move {
            info!("📦 Received conversion job");
            let outcome = self.process(&delivery.data).await;
            Self::resolve(delivery, &outcome).await;
            outcome
        }
        .instrument(span)
        .await
    }

    async fn process(&self, body: &[u8]) -> JobOutcome {
        let job = match ConversionJob::from_slice(body) {
            Ok(job) => job,
            Err(e) => return JobOutcome::failed(JobStage::Received, e),
        };

        let span = Span::current();
        span.record("video_fid", job.video_fid.as_str());
        span.record("username", job.username.as_str());

        if !job.mp3_fid.is_empty() {
            warn!("Inbound job already carries mp3_fid {}, it will be replaced", job.mp3_fid);
        }

        let scratch = match ScratchFiles::create(&self.scratch_dir) {
            Ok(scratch) => scratch,
            Err(e) => return JobOutcome::failed(JobStage::Received, e.into()),
        };

        match self.convert(&job, &scratch).await {
            Ok(done) => JobOutcome::Done(done),
            Err((stage, error)) => JobOutcome::failed(stage, error),
        }
    }

    async fn convert(&self, job: &ConversionJob, scratch: &ScratchFiles) -> StageResult<ConversionJob> {
        info!("⬇️ Downloading video {}", job.video_fid);
        let size = self
            .videos
            .download(&job.video_fid, scratch.video_path())
            .await
            .map_err(at(JobStage::Downloading))?;
        info!("⬇️ Downloaded {} bytes", size);

        info!("🎵 Extracting audio");
        self.transcoder
            .extract_audio(scratch.video_path(), scratch.audio_path())
            .await
            .map_err(at(JobStage::Transcoding))?;

        info!("⬆️ Uploading audio");
        let name = format!("{}.mp3", job.video_fid);
        let mp3_fid = self
            .audio
            .upload(&name, scratch.audio_path())
            .await
            .map_err(at(JobStage::Uploading))?;
        info!("⬆️ Audio uploaded as {}", mp3_fid);

        let done = job.completed(mp3_fid);
        self.publish(&done).await.map_err(at(JobStage::Publishing))?;

        Ok(done)
    }

    async fn publish(&self, done: &ConversionJob) -> ConversionResult<()> {
        let published = match done.to_vec() {
            Ok(payload) => self.publisher.publish(&payload).await,
            Err(e) => Err(QueueError::PublishFailed(e.to_string())),
        };

        match published {
            Ok(()) => Ok(()),
            Err(e) if e.may_have_been_delivered() => {
                // A completion message may already point at this object.
                warn!("Keeping audio {} after unconfirmed publish", done.mp3_fid);
                Err(e.into())
            }
            Err(e) => {
                // Nobody will ever learn about this object; the redelivered
                // job uploads a fresh one.
                if let Err(del) = self.audio.delete(&done.mp3_fid).await {
                    warn!("Failed to remove unpublished audio {}: {}", done.mp3_fid, del);
                }
                Err(e.into())
            }
        }
    }

    async fn resolve(delivery: InboundDelivery, outcome: &JobOutcome) {
        let settled = match outcome {
            JobOutcome::Done(job) => {
                info!(mp3_fid = %job.mp3_fid, "✅ Conversion completed");
                delivery.ack().await
            }
            JobOutcome::PermanentFailure { stage, error } => {
                error!(%stage, %error, "❌ Dropping conversion job that cannot succeed");
                delivery.ack().await
            }
            JobOutcome::RetryableFailure { stage, error } => {
                warn!(%stage, %error, "Conversion failed, requeueing");
                delivery.nack(true).await
            }
        };

        if let Err(e) = settled {
            error!("Failed to settle delivery: {}", e);
        }
    }
}
