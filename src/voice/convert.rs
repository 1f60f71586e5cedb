//! Voice note format conversion
//!
//! Telegram voice notes arrive as OGG/Opus. Recognition wants uncompressed
//! 16 kHz mono PCM, which `ffmpeg` produces as a WAV file.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;

use super::artifact::{AudioArtifact, Scratch};
use crate::{Error, Result};

/// Sample rate handed to recognizers
pub const RECOGNITION_SAMPLE_RATE: u32 = 16_000;

/// Converts a compressed voice note into a WAV artifact
#[async_trait]
pub trait AudioConverter: Send + Sync {
    /// Convert `input` to WAV inside `scratch`
    ///
    /// `input` is consumed and deleted once conversion finishes, whether or
    /// not it succeeded.
    async fn to_wav(&self, input: AudioArtifact, scratch: &Scratch) -> Result<AudioArtifact>;
}

/// Conversion by spawning `ffmpeg`
#[derive(Debug, Clone)]
pub struct FfmpegConverter {
    program: PathBuf,
}

impl FfmpegConverter {
    /// Use the `ffmpeg` binary at `program`
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfmpegConverter {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl AudioConverter for FfmpegConverter {
    async fn to_wav(&self, input: AudioArtifact, scratch: &Scratch) -> Result<AudioArtifact> {
        let output_path = scratch.file_path("input.wav");
        let rate = RECOGNITION_SAMPLE_RATE.to_string();

        let result = Command::new(&self.program)
            .arg("-nostdin")
            .arg("-y")
            .args(["-loglevel", "error"])
            .arg("-i")
            .arg(input.path())
            .args(["-ar", &rate, "-ac", "1", "-acodec", "pcm_s16le"])
            .arg(&output_path)
            .output()
            .await;

        input.dispose();

        // claim before checking status so a partial file is still cleaned up
        let output = AudioArtifact::claim(output_path, "audio/wav");

        let result = result.map_err(|e| {
            Error::Audio(format!("failed to run {}: {e}", self.program.display()))
        })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            tracing::error!(status = %result.status, stderr = %stderr.trim(), "ffmpeg conversion failed");
            return Err(Error::Audio(format!("ffmpeg conversion failed: {}", stderr.trim())));
        }

        tracing::debug!(path = %output.path().display(), "voice note converted to wav");
        Ok(output)
    }
}
