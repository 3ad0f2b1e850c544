//! In-memory stand-ins for the blob store, transcoder, publisher and broker.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use converter::infrastructure::queue::{
    DeliveryAcker, InboundDelivery, MessagePublisher, QueueError, QueueResult,
};
use converter::infrastructure::storage::{BlobStore, StorageError, StorageResult};
use converter::modules::conversion::{
    ConversionJob, ConversionWorker, TranscodeError, Transcoder,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Ack,
    Nack { requeue: bool },
}

#[derive(Clone, Default)]
pub struct RecordingAcker {
    settlements: Arc<Mutex<Vec<Settlement>>>,
}

impl RecordingAcker {
    pub fn settlements(&self) -> Vec<Settlement> {
        self.settlements.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryAcker for RecordingAcker {
    async fn ack(&self) -> QueueResult<()> {
        self.settlements.lock().unwrap().push(Settlement::Ack);
        Ok(())
    }

    async fn nack(&self, requeue: bool) -> QueueResult<()> {
        self.settlements.lock().unwrap().push(Settlement::Nack { requeue });
        Ok(())
    }
}

static NEXT_TAG: AtomicUsize = AtomicUsize::new(1);

pub fn delivery(body: &[u8]) -> (InboundDelivery, RecordingAcker) {
    let acker = RecordingAcker::default();
    let tag = NEXT_TAG.fetch_add(1, Ordering::SeqCst) as u64;
    (InboundDelivery::new(tag, false, body.to_vec(), acker.clone()), acker)
}

pub fn job_body(video_fid: &str, username: &str) -> Vec<u8> {
    ConversionJob::new(video_fid, username).to_vec().unwrap()
}

#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    next_ids: Mutex<VecDeque<String>>,
    failing_downloads: AtomicUsize,
    failing_uploads: AtomicUsize,
    uploads: AtomicUsize,
    deleted: Mutex<Vec<String>>,
}

impl MemoryBlobStore {
    pub fn with_object(self, id: &str, data: &[u8]) -> Self {
        self.objects.lock().unwrap().insert(id.to_string(), data.to_vec());
        self
    }

    /// Ids handed out by the next uploads, in order.
    pub fn with_next_ids(self, ids: &[&str]) -> Self {
        self.next_ids
            .lock()
            .unwrap()
            .extend(ids.iter().map(|id| id.to_string()));
        self
    }

    /// The next `n` downloads fail as if the store were unreachable.
    pub fn fail_downloads(&self, n: usize) {
        self.failing_downloads.store(n, Ordering::SeqCst);
    }

    pub fn fail_uploads(&self, n: usize) {
        self.failing_uploads.store(n, Ordering::SeqCst);
    }

    pub fn object(&self, id: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn download(&self, id: &str, dest: &Path) -> StorageResult<u64> {
        if Self::take_failure(&self.failing_downloads) {
            return Err(StorageError::unavailable("connection refused"));
        }
        let data = self.object(id).ok_or_else(|| StorageError::not_found(id))?;
        tokio::fs::write(dest, &data).await?;
        Ok(data.len() as u64)
    }

    async fn upload(&self, _name: &str, src: &Path) -> StorageResult<String> {
        if Self::take_failure(&self.failing_uploads) {
            return Err(StorageError::unavailable("connection refused"));
        }
        let data = tokio::fs::read(src).await?;
        let n = self.uploads.fetch_add(1, Ordering::SeqCst);
        let id = self
            .next_ids
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| format!("audio-{}", n));
        self.objects.lock().unwrap().insert(id.clone(), data);
        Ok(id)
    }

    async fn delete(&self, id: &str) -> StorageResult<()> {
        self.objects.lock().unwrap().remove(id);
        self.deleted.lock().unwrap().push(id.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum TranscodeBehaviour {
    Succeed(Vec<u8>),
    InvalidInput,
    Timeout,
    Crash,
}

/// Transcoder that writes a fixed audio payload, or fails as configured.
pub struct FakeTranscoder {
    behaviours: Mutex<VecDeque<TranscodeBehaviour>>,
    default: TranscodeBehaviour,
    seen: Mutex<Vec<(PathBuf, PathBuf, Vec<u8>)>>,
}

impl FakeTranscoder {
    pub fn succeeding() -> Self {
        Self::always(TranscodeBehaviour::Succeed(b"ID3audio".to_vec()))
    }

    pub fn always(behaviour: TranscodeBehaviour) -> Self {
        Self {
            behaviours: Mutex::new(VecDeque::new()),
            default: behaviour,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Behaviours for the next calls before falling back to the default.
    pub fn then(self, behaviour: TranscodeBehaviour) -> Self {
        self.behaviours.lock().unwrap().push_back(behaviour);
        self
    }

    /// `(video path, audio path, video bytes)` of every call.
    pub fn seen(&self) -> Vec<(PathBuf, PathBuf, Vec<u8>)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn extract_audio(&self, video: &Path, audio: &Path) -> Result<(), TranscodeError> {
        let input = tokio::fs::read(video).await?;
        self.seen
            .lock()
            .unwrap()
            .push((video.to_path_buf(), audio.to_path_buf(), input));

        let behaviour = self
            .behaviours
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone());

        match behaviour {
            TranscodeBehaviour::Succeed(data) => {
                tokio::fs::write(audio, data).await?;
                Ok(())
            }
            TranscodeBehaviour::InvalidInput => Err(TranscodeError::InvalidInput(
                "Invalid data found when processing input".to_string(),
            )),
            TranscodeBehaviour::Timeout => Err(TranscodeError::Timeout(Duration::from_secs(300))),
            TranscodeBehaviour::Crash => Err(TranscodeError::ProcessError {
                code: Some(1),
                stderr: "Cannot allocate memory".to_string(),
            }),
        }
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<Vec<u8>>>,
    failing: AtomicUsize,
    unconfirmed: AtomicUsize,
}

impl RecordingPublisher {
    pub fn fail_next(&self, n: usize) {
        self.failing.store(n, Ordering::SeqCst);
    }

    /// The next `n` publishes reach the broker but are never confirmed.
    pub fn unconfirm_next(&self, n: usize) {
        self.unconfirmed.store(n, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<serde_json::Value> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|body| serde_json::from_slice(body).unwrap())
            .collect()
    }
}

#[async_trait]
impl MessagePublisher for RecordingPublisher {
    async fn publish(&self, payload: &[u8]) -> QueueResult<()> {
        if MemoryBlobStore::take_failure(&self.failing) {
            return Err(QueueError::PublishFailed("channel closed".to_string()));
        }
        self.published.lock().unwrap().push(payload.to_vec());
        if MemoryBlobStore::take_failure(&self.unconfirmed) {
            return Err(QueueError::Unconfirmed("connection reset".to_string()));
        }
        Ok(())
    }
}

/// A worker wired to fakes, with handles on every fake.
pub struct Harness {
    pub videos: Arc<MemoryBlobStore>,
    pub audio: Arc<MemoryBlobStore>,
    pub transcoder: Arc<FakeTranscoder>,
    pub publisher: Arc<RecordingPublisher>,
    pub scratch: tempfile::TempDir,
    pub worker: Arc<ConversionWorker>,
}

impl Harness {
    pub fn new(videos: MemoryBlobStore, audio: MemoryBlobStore, transcoder: FakeTranscoder) -> Self {
        let videos = Arc::new(videos);
        let audio = Arc::new(audio);
        let transcoder = Arc::new(transcoder);
        let publisher = Arc::new(RecordingPublisher::default());
        let scratch = tempfile::tempdir().unwrap();

        let worker = Arc::new(ConversionWorker::new(
            videos.clone(),
            audio.clone(),
            transcoder.clone(),
            publisher.clone(),
            scratch.path(),
        ));

        Self {
            videos,
            audio,
            transcoder,
            publisher,
            scratch,
            worker,
        }
    }

    pub fn scratch_entries(&self) -> usize {
        std::fs::read_dir(self.scratch.path()).unwrap().count()
    }
}
