use serde::{Deserialize, Serialize};
use validator::Validate;

use super::error::ConversionError;

/// Message carried on both the video and the mp3 queue.
///
/// `mp3_fid` is empty while the job waits for conversion and holds the audio
/// object id once the worker publishes it on the mp3 queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ConversionJob {
    #[validate(length(min = 1, message = "video_fid must not be empty"))]
    pub video_fid: String,
    #[serde(default)]
    pub mp3_fid: String,
    #[validate(length(min = 1, message = "username must not be empty"))]
    pub username: String,
}

impl ConversionJob {
    pub fn new(video_fid: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            video_fid: video_fid.into(),
            mp3_fid: String::new(),
            username: username.into(),
        }
    }

    /// Parses and validates a message body.
    pub fn from_slice(body: &[u8]) -> Result<Self, ConversionError> {
        let job: ConversionJob = serde_json::from_slice(body)
            .map_err(|e| ConversionError::MalformedMessage(e.to_string()))?;
        job.validate()
            .map_err(|e| ConversionError::MalformedMessage(e.to_string()))?;
        Ok(job)
    }

    /// The completion message for this job.
    pub fn completed(&self, mp3_fid: impl Into<String>) -> Self {
        Self {
            mp3_fid: mp3_fid.into(),
            ..self.clone()
        }
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
