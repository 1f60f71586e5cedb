//! Per-message orchestration
//!
//! One inbound message runs through
//!
//! ```text
//! Received → [Transcribed] → LanguageDetected → TranslatedToPivot → Replied
//!          → TranslatedFromPivot → TextSent → Synthesized → VoiceSent → Done
//! ```
//!
//! Text messages skip transcription. A failed transcription sends its own
//! message and ends the run. Detection, translation and reply generation
//! degrade instead of failing; synthesis and transport failures abort.

use std::fmt;
use std::path::PathBuf;

use tracing::Instrument;
use uuid::Uuid;

use crate::channels::{Channel, IncomingMessage, OutgoingMessage, Payload};
use crate::language::{Language, LanguageDetector};
use crate::outcome::{Degradable, Outcome};
use crate::reply::ReplyGenerator;
use crate::translate::Translator;
use crate::voice::{Scratch, SpeechSynthesizer, Transcriber};
use crate::Result;

/// Reply to the `/start` command
pub const GREETING: &str =
    "👋 Hello! I'm your multilingual AI Health Bot. Send a message or a voice note!";

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Received,
    Transcribed,
    LanguageDetected,
    TranslatedToPivot,
    Replied,
    TranslatedFromPivot,
    TextSent,
    Synthesized,
    VoiceSent,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How a message entered the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPoint {
    Text,
    Voice,
    Command,
}

/// Summary of one pipeline run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Unique id of this run, also embedded in its scratch path
    pub request_id: Uuid,
    /// Which handler ran
    pub entry: EntryPoint,
    /// Last stage reached
    pub stage: Stage,
    /// Text recognized from a voice note
    pub transcript: Option<String>,
    /// User-facing message sent when transcription failed
    pub transcription_error: Option<String>,
    /// Language the reply was localized to
    pub language: Option<Language>,
    /// Outcome of language detection
    pub detection: Option<Outcome>,
    /// Outcome of translating the input to the pivot language
    pub to_pivot: Option<Outcome>,
    /// Outcome of reply generation
    pub reply: Option<Outcome>,
    /// Outcome of translating the reply back
    pub from_pivot: Option<Outcome>,
}

impl RunReport {
    fn new(request_id: Uuid, entry: EntryPoint) -> Self {
        Self {
            request_id,
            entry,
            stage: Stage::Received,
            transcript: None,
            transcription_error: None,
            language: None,
            detection: None,
            to_pivot: None,
            reply: None,
            from_pivot: None,
        }
    }

    fn advance(&mut self, stage: Stage) {
        tracing::debug!(from = %self.stage, to = %stage, "pipeline stage");
        self.stage = stage;
    }

    /// Whether any best-effort step fell back
    #[must_use]
    pub fn degraded(&self) -> bool {
        [&self.detection, &self.to_pivot, &self.reply, &self.from_pivot]
            .into_iter()
            .flatten()
            .any(Outcome::is_degraded)
    }
}

/// Result of the text-only part of the pipeline
#[derive(Debug, Clone)]
pub struct Answer {
    /// Detected language of the input
    pub language: Degradable<Language>,
    /// Input in the pivot language
    pub pivot_text: Degradable<String>,
    /// Reply in the pivot language
    pub reply: Degradable<String>,
    /// Reply in the detected language
    pub localized: Degradable<String>,
}

/// Sequences detection, translation, reply generation and speech
pub struct Pipeline {
    detector: LanguageDetector,
    translator: Translator,
    replies: ReplyGenerator,
    synthesizer: SpeechSynthesizer,
    transcriber: Transcriber,
    scratch_dir: PathBuf,
}

impl Pipeline {
    /// Assemble a pipeline from its components
    #[must_use]
    pub fn new(
        detector: LanguageDetector,
        translator: Translator,
        replies: ReplyGenerator,
        synthesizer: SpeechSynthesizer,
        transcriber: Transcriber,
        scratch_dir: PathBuf,
    ) -> Self {
        Self {
            detector,
            translator,
            replies,
            synthesizer,
            transcriber,
            scratch_dir,
        }
    }

    /// Handle one inbound message and send the results back on `channel`
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or sending fails, or the scratch directory
    /// cannot be created. Nothing is retried.
    pub async fn handle(&self, channel: &dyn Channel, msg: &IncomingMessage) -> Result<RunReport> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "pipeline",
            %request_id,
            chat_id = %msg.chat_id,
            channel = channel.name()
        );

        async {
            match &msg.payload {
                Payload::Command { name, .. } => self.handle_command(channel, msg, request_id, name).await,
                Payload::Text(text) => {
                    let mut report = RunReport::new(request_id, EntryPoint::Text);
                    let scratch = Scratch::new(&self.scratch_dir, request_id)?;
                    self.process_text(channel, msg, text, &scratch, &mut report)
                        .await?;
                    Ok(report)
                }
                Payload::Voice { file_id, .. } => {
                    self.handle_voice(channel, msg, request_id, file_id).await
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn handle_command(
        &self,
        channel: &dyn Channel,
        msg: &IncomingMessage,
        request_id: Uuid,
        name: &str,
    ) -> Result<RunReport> {
        let mut report = RunReport::new(request_id, EntryPoint::Command);

        if name == "start" {
            channel
                .send(OutgoingMessage::text(msg.chat_id.clone(), GREETING.to_string()))
                .await?;
            tracing::info!("greeting sent");
        } else {
            tracing::debug!(command = name, "ignoring unknown command");
        }

        report.advance(Stage::Done);
        Ok(report)
    }

    async fn handle_voice(
        &self,
        channel: &dyn Channel,
        msg: &IncomingMessage,
        request_id: Uuid,
        file_id: &str,
    ) -> Result<RunReport> {
        let mut report = RunReport::new(request_id, EntryPoint::Voice);
        let scratch = Scratch::new(&self.scratch_dir, request_id)?;

        let transcript = match channel.download_file(file_id).await {
            Ok(bytes) => {
                let voice = scratch.write("voice.oga", "audio/ogg", &bytes).await?;
                self.transcriber.transcribe(voice, &scratch).await
            }
            Err(e) => Err(e.into()),
        };

        let text = match transcript {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "voice note not transcribed");
                let message = e.user_message();
                report.transcription_error = Some(message.clone());
                channel
                    .send(OutgoingMessage::text(msg.chat_id.clone(), message))
                    .await?;
                report.advance(Stage::Done);
                return Ok(report);
            }
        };

        tracing::info!(transcript = %text, "voice note transcribed");
        report.transcript = Some(text.clone());
        report.advance(Stage::Transcribed);

        self.process_text(channel, msg, &text, &scratch, &mut report)
            .await?;
        Ok(report)
    }

    /// Detect, translate and generate a reply without sending anything
    pub async fn answer(&self, text: &str) -> Answer {
        let mut report = RunReport::new(Uuid::new_v4(), EntryPoint::Text);
        self.answer_tracked(text, &mut report).await
    }

    async fn answer_tracked(&self, text: &str, report: &mut RunReport) -> Answer {
        let language = self.detector.detect(text);
        log_degraded("detection", &language.outcome);
        tracing::info!(lang = %language.value, "detected language");
        report.language = Some(language.value);
        report.detection = Some(language.outcome.clone());
        report.advance(Stage::LanguageDetected);

        let pivot_text = self
            .translator
            .translate_to_pivot(text, language.value)
            .await;
        log_degraded("translation to pivot", &pivot_text.outcome);
        report.to_pivot = Some(pivot_text.outcome.clone());
        report.advance(Stage::TranslatedToPivot);

        let reply = self.replies.generate_reply(&pivot_text.value).await;
        log_degraded("reply generation", &reply.outcome);
        report.reply = Some(reply.outcome.clone());
        report.advance(Stage::Replied);

        let localized = self
            .translator
            .translate_from_pivot(&reply.value, language.value)
            .await;
        log_degraded("translation from pivot", &localized.outcome);
        report.from_pivot = Some(localized.outcome.clone());
        report.advance(Stage::TranslatedFromPivot);

        Answer {
            language,
            pivot_text,
            reply,
            localized,
        }
    }

    async fn process_text(
        &self,
        channel: &dyn Channel,
        msg: &IncomingMessage,
        text: &str,
        scratch: &Scratch,
        report: &mut RunReport,
    ) -> Result<()> {
        if let Err(e) = channel.send_typing(&msg.chat_id).await {
            tracing::debug!(error = %e, "typing indicator failed");
        }

        let answer = self.answer_tracked(text, report).await;

        let lang = answer.language.value;
        let localized = answer.localized.into_value();

        channel
            .send(OutgoingMessage::text(msg.chat_id.clone(), localized.clone()))
            .await?;
        report.advance(Stage::TextSent);

        let voice = self
            .synthesizer
            .synthesize(&localized, lang.code(), scratch)
            .await?;
        report.advance(Stage::Synthesized);

        let sent = channel.send_voice(&msg.chat_id, &voice).await;
        voice.dispose();
        sent?;
        report.advance(Stage::VoiceSent);

        report.advance(Stage::Done);
        tracing::info!(lang = %lang, degraded = report.degraded(), "reply delivered");
        Ok(())
    }
}

fn log_degraded(step: &str, outcome: &Outcome) {
    if let Outcome::Degraded { reason } = outcome {
        tracing::warn!(step, reason = %reason, "step degraded to fallback");
    }
}
