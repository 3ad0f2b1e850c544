//! Video-to-audio conversion jobs.
//!
//! A job moves through `received → downloading → transcoding → uploading →
//! publishing → done`; any stage may end it early with a retryable or a
//! permanent failure, see [`worker::JobOutcome`].

pub mod error;
pub mod job;
pub mod scratch;
pub mod transcoder;
pub mod worker;

pub use error::{ConversionError, ConversionResult};
pub use job::ConversionJob;
pub use transcoder::{FfmpegTranscoder, TranscodeError, Transcoder};
pub use worker::{ConversionWorker, JobOutcome, JobStage};
