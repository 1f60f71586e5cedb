//! Application assembly and dispatch loop
//!
//! Everything process-wide is built once here: the HTTP client, the
//! Telegram adapter and the pipeline components. Each inbound message is then
//! handed to its own task with a shared reference to the adapter.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::mpsc;

use crate::channels::{Channel, IncomingMessage, TelegramChannel};
use crate::config::{Config, SttProvider};
use crate::language::LanguageDetector;
use crate::pipeline::Pipeline;
use crate::reply::{OpenRouterBackend, ReplyGenerator};
use crate::translate::{GoogleTranslateEngine, Translator};
use crate::voice::{
    FfmpegConverter, GoogleSpeechRecognizer, GoogleTtsEngine, SpeechRecognizer, SpeechSynthesizer,
    Transcriber, WhisperRecognizer,
};
use crate::{Error, Result};

/// Build the shared HTTP client with connect and request timeouts
///
/// # Errors
///
/// Returns error if the TLS backend cannot be initialized
pub fn http_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()?)
}

/// Build the speech recognizer selected in `config`
///
/// # Errors
///
/// Returns error if Whisper is selected without an `OpenAI` key
pub fn build_recognizer(config: &Config, client: &Client) -> Result<Arc<dyn SpeechRecognizer>> {
    Ok(match config.stt.provider {
        SttProvider::Google => Arc::new(GoogleSpeechRecognizer::new(
            client.clone(),
            config.stt.google_api_key.clone(),
            config.stt.language.clone(),
        )),
        SttProvider::Whisper => Arc::new(WhisperRecognizer::new(
            client.clone(),
            config.stt.openai_api_key.clone().unwrap_or_default(),
            config.stt.whisper_model.clone(),
        )?),
    })
}

/// Create the base directory for per-request scratch files
///
/// # Errors
///
/// Returns error if the directory cannot be created
pub fn prepare_scratch_base(config: &Config) -> Result<()> {
    std::fs::create_dir_all(&config.scratch_dir)?;
    tracing::debug!(path = %config.scratch_dir.display(), "scratch base ready");
    Ok(())
}

/// Assemble a pipeline from configuration
///
/// Also creates the scratch base directory so request handling only has to
/// make its own subdirectory.
///
/// # Errors
///
/// Returns error if the completion API key is missing, the recognizer
/// cannot be built, or the scratch base cannot be created
pub fn build_pipeline(config: &Config, client: &Client) -> Result<Pipeline> {
    let backend = OpenRouterBackend::new(config.require_openrouter_key()?.to_string())
        .with_client(client.clone())
        .with_base_url(&config.llm.base_url)
        .with_model(&config.llm.model)
        .with_system_prompt(&config.llm.system_prompt);

    prepare_scratch_base(config)?;

    let transcriber = Transcriber::new(
        Arc::new(FfmpegConverter::new(&config.ffmpeg_path)),
        build_recognizer(config, client)?,
    );

    Ok(Pipeline::new(
        LanguageDetector::default(),
        Translator::new(Arc::new(GoogleTranslateEngine::with_client(client.clone()))),
        ReplyGenerator::new(Arc::new(backend)),
        SpeechSynthesizer::new(Arc::new(GoogleTtsEngine::new(client.clone()))),
        transcriber,
        config.scratch_dir.clone(),
    ))
}

/// The running bot
pub struct Daemon {
    channel: TelegramChannel,
    inbox: mpsc::Receiver<IncomingMessage>,
    pipeline: Arc<Pipeline>,
}

impl Daemon {
    /// Assemble the bot and validate the Telegram token
    ///
    /// # Errors
    ///
    /// Returns error if a credential is missing, a component cannot be
    /// built, or Telegram rejects the token
    pub async fn new(config: &Config) -> Result<Self> {
        let (token, _) = config.credentials()?;
        let client = http_client(config.http_timeout)?;

        let pipeline = build_pipeline(config, &client)?;

        let (channel, inbox) = TelegramChannel::with_receiver(token.to_string(), client);
        let mut channel = channel.with_poll_timeout(config.poll_timeout);
        channel.connect().await?;

        Ok(Self {
            channel,
            inbox,
            pipeline: Arc::new(pipeline),
        })
    }

    /// Poll for messages and handle each in its own task until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if polling cannot be started
    pub async fn run(self) -> Result<()> {
        let Self {
            channel,
            mut inbox,
            pipeline,
        } = self;

        let poller = channel.start_polling()?;
        let channel = Arc::new(channel);
        tracing::info!("bot is running");

        loop {
            tokio::select! {
                msg = inbox.recv() => {
                    let Some(msg) = msg else {
                        break;
                    };
                    dispatch(Arc::clone(&channel), Arc::clone(&pipeline), msg);
                }
                signal = tokio::signal::ctrl_c() => {
                    signal.map_err(Error::Io)?;
                    tracing::info!("shutdown requested");
                    break;
                }
            }
        }

        poller.abort();
        Ok(())
    }
}

/// Run one message through the pipeline in the background
fn dispatch(channel: Arc<TelegramChannel>, pipeline: Arc<Pipeline>, msg: IncomingMessage) {
    tokio::spawn(async move {
        match pipeline.handle(channel.as_ref(), &msg).await {
            Ok(report) => tracing::info!(
                request_id = %report.request_id,
                entry = ?report.entry,
                stage = %report.stage,
                degraded = report.degraded(),
                "message handled"
            ),
            Err(e) => tracing::error!(
                chat_id = %msg.chat_id,
                message_id = %msg.id,
                error = %e,
                "message handling aborted"
            ),
        }
    });
}
