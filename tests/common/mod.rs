//! Shared test utilities
//!
//! Scripted stand-ins for every external service so pipeline runs can be
//! exercised without network access or `ffmpeg`.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use lingo_relay::channels::{Channel, OutgoingMessage};
use lingo_relay::language::{LanguageDetector, LanguageIdentifier};
use lingo_relay::reply::{CompletionBackend, ReplyGenerator};
use lingo_relay::translate::{TranslationEngine, Translator};
use lingo_relay::voice::{
    AudioArtifact, AudioConverter, Scratch, SpeechEngine, SpeechRecognizer, SpeechSynthesizer,
    Transcriber, WavAudio,
};
use lingo_relay::{Error, Language, Pipeline, Result};
use tokio::sync::Mutex;

/// A voice reply as seen by the channel
#[derive(Debug, Clone)]
pub struct SentVoice {
    pub chat_id: String,
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

/// Channel that records everything sent through it
#[derive(Default)]
pub struct RecordingChannel {
    pub texts: Mutex<Vec<OutgoingMessage>>,
    pub voices: Mutex<Vec<SentVoice>>,
    pub download: Option<Vec<u8>>,
    pub fail_voice: bool,
}

impl RecordingChannel {
    /// Channel whose downloads return `bytes`
    pub fn with_download(bytes: &[u8]) -> Self {
        Self {
            download: Some(bytes.to_vec()),
            ..Self::default()
        }
    }

    pub async fn texts(&self) -> Vec<String> {
        self.texts.lock().await.iter().map(|m| m.content.clone()).collect()
    }

    pub async fn voices(&self) -> Vec<SentVoice> {
        self.voices.lock().await.clone()
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn send(&self, message: OutgoingMessage) -> Result<()> {
        self.texts.lock().await.push(message);
        Ok(())
    }

    async fn send_voice(&self, chat_id: &str, voice: &AudioArtifact) -> Result<()> {
        if self.fail_voice {
            return Err(Error::Channel("upload rejected".to_string()));
        }
        self.voices.lock().await.push(SentVoice {
            chat_id: chat_id.to_string(),
            path: voice.path().to_path_buf(),
            bytes: voice.read().await?,
        });
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>> {
        self.download
            .clone()
            .ok_or_else(|| Error::Channel(format!("file {file_id} not found")))
    }

    fn is_connected(&self) -> bool {
        true
    }
}

/// Identifier that always answers the same code
pub struct FixedIdentifier(pub Option<&'static str>);

impl LanguageIdentifier for FixedIdentifier {
    fn identify(&self, _text: &str) -> Option<String> {
        self.0.map(String::from)
    }
}

/// Translation engine that tags text with the target code
#[derive(Default)]
pub struct TaggingTranslator {
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl TaggingTranslator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationEngine for TaggingTranslator {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Translate("service unavailable".to_string()));
        }
        Ok(format!("{source}->{target}: {text}"))
    }
}

/// Completion backend with a canned reply
pub struct CannedBackend {
    pub reply: Option<String>,
    pub calls: AtomicUsize,
    pub prompts: std::sync::Mutex<Vec<String>>,
}

impl CannedBackend {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
            prompts: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            calls: AtomicUsize::new(0),
            prompts: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for CannedBackend {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply
            .clone()
            .ok_or_else(|| Error::Reply("missing choices".to_string()))
    }
}

/// Speech engine that encodes the voice language into the audio bytes
#[derive(Default)]
pub struct TaggingSpeech {
    pub fail: bool,
    pub languages: std::sync::Mutex<Vec<Language>>,
}

#[async_trait]
impl SpeechEngine for TaggingSpeech {
    async fn synthesize(&self, text: &str, lang: Language) -> Result<Vec<u8>> {
        if self.fail {
            return Err(Error::Tts("quota exceeded".to_string()));
        }
        self.languages.lock().unwrap().push(lang);
        Ok(format!("MP3[{lang}]{text}").into_bytes())
    }
}

/// Converter that ignores its input and writes a short silent WAV
#[derive(Default)]
pub struct SilentConverter {
    pub inputs: std::sync::Mutex<Vec<PathBuf>>,
    pub fail: bool,
}

#[async_trait]
impl AudioConverter for SilentConverter {
    async fn to_wav(&self, input: AudioArtifact, scratch: &Scratch) -> Result<AudioArtifact> {
        self.inputs.lock().unwrap().push(input.path().to_path_buf());
        input.dispose();
        if self.fail {
            return Err(Error::Audio("ffmpeg conversion failed: invalid data".to_string()));
        }

        let audio = WavAudio {
            samples: vec![0; 1600],
            sample_rate: 16_000,
            channels: 1,
        };
        scratch
            .write("input.wav", "audio/wav", &audio.to_wav_bytes()?)
            .await
    }
}

/// Recognizer with a scripted result
pub enum ScriptedRecognizer {
    Heard(&'static str),
    Nothing,
    Broken,
}

#[async_trait]
impl SpeechRecognizer for ScriptedRecognizer {
    async fn recognize(&self, audio: &WavAudio) -> Result<Option<String>> {
        assert!(!audio.is_empty());
        match self {
            Self::Heard(text) => Ok(Some((*text).to_string())),
            Self::Nothing => Ok(None),
            Self::Broken => Err(Error::Stt("recognition connection failed".to_string())),
        }
    }
}

/// Handles to the fakes behind a test pipeline
pub struct Harness {
    pub pipeline: Pipeline,
    pub translator: Arc<TaggingTranslator>,
    pub backend: Arc<CannedBackend>,
    pub speech: Arc<TaggingSpeech>,
    pub converter: Arc<SilentConverter>,
    pub scratch: tempfile::TempDir,
}

impl Harness {
    pub fn scratch_is_empty(&self) -> bool {
        dir_is_empty(self.scratch.path())
    }
}

/// Whether `dir` has no entries
pub fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).map(|mut it| it.next().is_none()).unwrap_or(true)
}

/// Builder for a pipeline over fakes
pub struct HarnessBuilder {
    pub detected: Option<&'static str>,
    pub translator: TaggingTranslator,
    pub backend: CannedBackend,
    pub speech: TaggingSpeech,
    pub converter: SilentConverter,
    pub recognizer: ScriptedRecognizer,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            detected: Some("en"),
            translator: TaggingTranslator::default(),
            backend: CannedBackend::replying("- Rest well 😴"),
            speech: TaggingSpeech::default(),
            converter: SilentConverter::default(),
            recognizer: ScriptedRecognizer::Heard("i have a fever"),
        }
    }
}

impl HarnessBuilder {
    pub fn build(self) -> Harness {
        let translator = Arc::new(self.translator);
        let backend = Arc::new(self.backend);
        let speech = Arc::new(self.speech);
        let converter = Arc::new(self.converter);
        let scratch = tempfile::tempdir().expect("failed to create scratch dir");

        let pipeline = Pipeline::new(
            LanguageDetector::new(Box::new(FixedIdentifier(self.detected))),
            Translator::new(translator.clone()),
            ReplyGenerator::new(backend.clone()),
            SpeechSynthesizer::new(speech.clone()),
            Transcriber::new(converter.clone(), Arc::new(self.recognizer)),
            scratch.path().to_path_buf(),
        );

        Harness {
            pipeline,
            translator,
            backend,
            speech,
            converter,
            scratch,
        }
    }
}

/// A request captured by [`StubServer`]
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub headers: String,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Minimal HTTP/1.1 server answering canned responses by path suffix
pub struct StubServer {
    pub base_url: String,
    pub requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl StubServer {
    /// Serve `routes` of `(path suffix, status, body)`; unknown paths get 404
    pub async fn start(routes: Vec<(&'static str, u16, String)>) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind stub server");
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&requests);
        let routes = Arc::new(routes);

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let captured = Arc::clone(&captured);
                let routes = Arc::clone(&routes);
                tokio::spawn(async move {
                    let _ = serve_one(stream, &routes, &captured).await;
                });
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
        }
    }

    pub async fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().await.clone()
    }
}

async fn serve_one(
    mut stream: tokio::net::TcpStream,
    routes: &[(&'static str, u16, String)],
    captured: &Mutex<Vec<CapturedRequest>>,
) -> std::io::Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let mut buf = Vec::new();
    let mut chunk = [0_u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let mut request_line = head.lines().next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();
    let bare_path = path.split('?').next().unwrap_or_default().to_string();

    captured.lock().await.push(CapturedRequest {
        method,
        path: path.clone(),
        headers: head.clone(),
        body: buf[header_end..].to_vec(),
    });

    let (status, body) = routes
        .iter()
        .find(|(suffix, _, _)| bare_path.ends_with(suffix))
        .map_or((404, "not found".to_string()), |(_, status, body)| {
            (*status, body.clone())
        });

    let response = format!(
        "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

/// HTTP client that never routes through an environment proxy
pub fn local_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("failed to build test client")
}
