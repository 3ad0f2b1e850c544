use std::io;
use std::path::Path;

use tempfile::{Builder, TempPath};

/// The two local files a conversion job works with.
///
/// Both files are deleted when the value is dropped, so every return path of
/// the job cleans up after itself.
#[derive(Debug)]
pub struct ScratchFiles {
    video: TempPath,
    audio: TempPath,
}

impl ScratchFiles {
    pub fn create(dir: &Path) -> io::Result<Self> {
        let video = Builder::new()
            .prefix("video-")
            .tempfile_in(dir)?
            .into_temp_path();
        // ffmpeg picks the output container from the extension.
        let audio = Builder::new()
            .prefix("audio-")
            .suffix(".mp3")
            .tempfile_in(dir)?
            .into_temp_path();

        Ok(Self { video, audio })
    }

    pub fn video_path(&self) -> &Path {
        &self.video
    }

    pub fn audio_path(&self) -> &Path {
        &self.audio
    }
}
