//! Voice processing module
//!
//! Handles request-scoped audio files, voice note conversion, speech
//! recognition and speech synthesis.

mod artifact;
mod convert;
pub mod stt;
pub mod tts;

pub use artifact::{AudioArtifact, Scratch};
pub use convert::{AudioConverter, FfmpegConverter, RECOGNITION_SAMPLE_RATE};
pub use stt::{
    GoogleSpeechRecognizer, SpeechRecognizer, TranscribeError, Transcriber, WavAudio,
    WhisperRecognizer,
};
pub use tts::{GoogleTtsEngine, SpeechEngine, SpeechSynthesizer, split_for_speech, voice_language};
