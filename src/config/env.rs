use std::collections::HashMap;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    AmqpUrl,
    VideoQueue,
    Mp3Queue,
    PrefetchCount,
    MinioUrl,
    MinioBucketVideos,
    MinioBucketAudio,
    MinioRegion,
    MinioAccessKey,
    MinioSecretKey,
    FfmpegPath,
    TranscodeTimeoutSecs,
    ScratchDir,
    LogFormat,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::AmqpUrl => "AMQP_URL",
            EnvKey::VideoQueue => "VIDEO_QUEUE",
            EnvKey::Mp3Queue => "MP3_QUEUE",
            EnvKey::PrefetchCount => "PREFETCH_COUNT",
            EnvKey::MinioUrl => "MINIO_ENDPOINT",
            EnvKey::MinioBucketVideos => "MINIO_BUCKET_VIDEOS",
            EnvKey::MinioBucketAudio => "MINIO_BUCKET_AUDIO",
            EnvKey::MinioRegion => "MINIO_REGION",
            EnvKey::MinioAccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::MinioSecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::FfmpegPath => "FFMPEG_PATH",
            EnvKey::TranscodeTimeoutSecs => "TRANSCODE_TIMEOUT_SECS",
            EnvKey::ScratchDir => "SCRATCH_DIR",
            EnvKey::LogFormat => "LOG_FORMAT",
        }
    }
}

/// Where configuration values are read from.
///
/// The process environment in production, a plain map in tests.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

pub fn get(source: &impl EnvSource, key: EnvKey) -> Option<String> {
    source.var(key.as_str()).filter(|v| !v.trim().is_empty())
}

pub fn get_or(source: &impl EnvSource, key: EnvKey, default: &str) -> String {
    get(source, key).unwrap_or_else(|| default.to_string())
}

pub fn get_parsed<T: FromStr>(source: &impl EnvSource, key: EnvKey, default: T) -> T {
    match get(source, key) {
        Some(val) => val.parse::<T>().unwrap_or(default),
        None => default,
    }
}
