use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Diagnostics ffmpeg prints when the input itself is unusable. Running the
/// same input again would fail the same way.
const INVALID_INPUT_MARKERS: &[&str] = &[
    "Invalid data found when processing input",
    "matches no streams",
    "does not contain any stream",
    "moov atom not found",
];

const STDERR_TAIL_CHARS: usize = 2048;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transcoder exited with status {code:?}: {stderr}")]
    ProcessError { code: Option<i32>, stderr: String },

    #[error("Failed to run transcoder: {0}")]
    Io(#[from] std::io::Error),
}

/// Extracts the audio track of a local video file into a local audio file.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn extract_audio(&self, video: &Path, audio: &Path) -> Result<(), TranscodeError>;
}

/// [`Transcoder`] backed by an ffmpeg binary.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: PathBuf,
    timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// `-y -v error -i <video> -q:a 0 -map a <audio>`
    pub fn build_args(&self, video: &Path, audio: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-y", "-v", "error", "-i"]
            .iter()
            .map(OsString::from)
            .collect();
        args.push(video.as_os_str().to_owned());
        args.extend(["-q:a", "0", "-map", "a"].iter().map(OsString::from));
        args.push(audio.as_os_str().to_owned());
        args
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn extract_audio(&self, video: &Path, audio: &Path) -> Result<(), TranscodeError> {
        if tokio::fs::metadata(video).await?.len() == 0 {
            return Err(TranscodeError::InvalidInput("input file is empty".to_string()));
        }

        let args = self.build_args(video, audio);
        debug!("Running {} {:?}", self.program.display(), args);

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    "Transcoder timed out after {:?}, killing process",
                    self.timeout
                );
                return Err(TranscodeError::Timeout(self.timeout));
            }
        };

        let stderr = stderr_tail(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            if is_invalid_input(&stderr) {
                return Err(TranscodeError::InvalidInput(stderr));
            }
            return Err(TranscodeError::ProcessError {
                code: output.status.code(),
                stderr,
            });
        }

        if tokio::fs::metadata(audio).await?.len() == 0 {
            return Err(TranscodeError::ProcessError {
                code: output.status.code(),
                stderr: "transcoder produced an empty output file".to_string(),
            });
        }

        Ok(())
    }
}

fn is_invalid_input(stderr: &str) -> bool {
    INVALID_INPUT_MARKERS
        .iter()
        .any(|marker| stderr.contains(marker))
}

fn stderr_tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    let count = trimmed.chars().count();
    if count <= STDERR_TAIL_CHARS {
        return trimmed.to_string();
    }
    trimmed.chars().skip(count - STDERR_TAIL_CHARS).collect()
}
