//! End-to-end pipeline runs over scripted services

mod common;

use common::{
    CannedBackend, HarnessBuilder, RecordingChannel, ScriptedRecognizer, SilentConverter,
    TaggingSpeech, TaggingTranslator,
};
use lingo_relay::channels::IncomingMessage;
use lingo_relay::pipeline::GREETING;
use lingo_relay::reply::APOLOGY;
use lingo_relay::voice::stt::UNRECOGNIZABLE_MESSAGE;
use lingo_relay::{EntryPoint, Language, Stage};

#[tokio::test]
async fn english_text_skips_translation() {
    let harness = HarnessBuilder::default().build();
    let channel = RecordingChannel::default();

    let report = harness
        .pipeline
        .handle(&channel, &IncomingMessage::text("42", "hello"))
        .await
        .unwrap();

    assert_eq!(report.entry, EntryPoint::Text);
    assert_eq!(report.stage, Stage::Done);
    assert_eq!(report.language, Some(Language::English));
    assert!(!report.degraded());

    assert_eq!(harness.translator.calls(), 0);
    assert_eq!(harness.backend.calls(), 1);
    assert_eq!(harness.backend.prompts(), vec!["hello".to_string()]);

    assert_eq!(channel.texts().await, vec!["- Rest well 😴".to_string()]);
    let voices = channel.voices().await;
    assert_eq!(voices.len(), 1);
    assert_eq!(voices[0].chat_id, "42");
    assert_eq!(voices[0].bytes, "MP3[en]- Rest well 😴".as_bytes());
}

#[tokio::test]
async fn hindi_text_round_trips_through_english() {
    let harness = HarnessBuilder {
        detected: Some("hi"),
        ..HarnessBuilder::default()
    }
    .build();
    let channel = RecordingChannel::default();

    let report = harness
        .pipeline
        .handle(&channel, &IncomingMessage::text("7", "मुझे बुखार है"))
        .await
        .unwrap();

    assert_eq!(report.language, Some(Language::Hindi));
    assert_eq!(harness.translator.calls(), 2);
    assert_eq!(harness.backend.prompts(), vec!["hi->en: मुझे बुखार है".to_string()]);

    let expected = "en->hi: - Rest well 😴".to_string();
    assert_eq!(channel.texts().await, vec![expected.clone()]);
    assert_eq!(
        harness.speech.languages.lock().unwrap().clone(),
        vec![Language::Hindi]
    );
    assert_eq!(
        channel.voices().await[0].bytes,
        format!("MP3[hi]{expected}").into_bytes()
    );
}

#[tokio::test]
async fn hindi_adjacent_detection_answers_in_hindi() {
    let harness = HarnessBuilder {
        detected: Some("ur"),
        ..HarnessBuilder::default()
    }
    .build();
    let channel = RecordingChannel::default();

    let report = harness
        .pipeline
        .handle(&channel, &IncomingMessage::text("7", "mujhe bukhar hai"))
        .await
        .unwrap();

    assert_eq!(report.language, Some(Language::Hindi));
    assert!(!report.degraded());
}

#[tokio::test]
async fn unidentified_language_is_degraded_english() {
    let harness = HarnessBuilder {
        detected: None,
        ..HarnessBuilder::default()
    }
    .build();
    let channel = RecordingChannel::default();

    let report = harness
        .pipeline
        .handle(&channel, &IncomingMessage::text("7", "??"))
        .await
        .unwrap();

    assert_eq!(report.language, Some(Language::English));
    assert!(report.detection.as_ref().unwrap().is_degraded());
    assert!(report.degraded());
    assert_eq!(channel.voices().await.len(), 1);
}

#[tokio::test]
async fn translation_failure_passes_text_through() {
    let harness = HarnessBuilder {
        detected: Some("mr"),
        translator: TaggingTranslator {
            fail: true,
            ..TaggingTranslator::default()
        },
        ..HarnessBuilder::default()
    }
    .build();
    let channel = RecordingChannel::default();

    let report = harness
        .pipeline
        .handle(&channel, &IncomingMessage::text("7", "मला ताप आहे"))
        .await
        .unwrap();

    assert_eq!(report.stage, Stage::Done);
    assert!(report.to_pivot.as_ref().unwrap().is_degraded());
    assert!(report.from_pivot.as_ref().unwrap().is_degraded());
    assert_eq!(harness.backend.prompts(), vec!["मला ताप आहे".to_string()]);
    assert_eq!(channel.texts().await, vec!["- Rest well 😴".to_string()]);
}

#[tokio::test]
async fn reply_failure_sends_localized_apology() {
    let harness = HarnessBuilder {
        detected: Some("gu"),
        backend: CannedBackend::failing(),
        ..HarnessBuilder::default()
    }
    .build();
    let channel = RecordingChannel::default();

    let report = harness
        .pipeline
        .handle(&channel, &IncomingMessage::text("7", "મને તાવ છે"))
        .await
        .unwrap();

    assert!(report.reply.as_ref().unwrap().is_degraded());
    assert_eq!(report.stage, Stage::Done);
    assert_eq!(channel.texts().await, vec![format!("en->gu: {APOLOGY}")]);
    assert_eq!(channel.voices().await.len(), 1);
}

#[tokio::test]
async fn recognized_voice_runs_full_pipeline() {
    let harness = HarnessBuilder::default().build();
    let channel = RecordingChannel::with_download(b"OggS fake voice");

    let report = harness
        .pipeline
        .handle(&channel, &IncomingMessage::voice("9", "file-1"))
        .await
        .unwrap();

    assert_eq!(report.entry, EntryPoint::Voice);
    assert_eq!(report.stage, Stage::Done);
    assert_eq!(report.transcript.as_deref(), Some("i have a fever"));
    assert_eq!(harness.backend.prompts(), vec!["i have a fever".to_string()]);
    assert_eq!(channel.texts().await.len(), 1);
    assert_eq!(channel.voices().await.len(), 1);

    let inputs = harness.converter.inputs.lock().unwrap().clone();
    assert_eq!(inputs.len(), 1);
    assert!(inputs[0].ends_with("voice.oga"));
    assert!(!inputs[0].exists());
}

#[tokio::test]
async fn unrecognizable_voice_only_apologizes() {
    let harness = HarnessBuilder {
        recognizer: ScriptedRecognizer::Nothing,
        ..HarnessBuilder::default()
    }
    .build();
    let channel = RecordingChannel::with_download(b"OggS");

    let report = harness
        .pipeline
        .handle(&channel, &IncomingMessage::voice("9", "file-1"))
        .await
        .unwrap();

    assert_eq!(report.stage, Stage::Done);
    assert!(report.transcript.is_none());
    assert_eq!(harness.backend.calls(), 0);
    assert_eq!(harness.translator.calls(), 0);
    assert_eq!(channel.texts().await, vec![UNRECOGNIZABLE_MESSAGE.to_string()]);
    assert!(channel.voices().await.is_empty());
    assert!(harness.scratch_is_empty());
}

#[tokio::test]
async fn failed_recognition_reports_error_text() {
    let harness = HarnessBuilder {
        recognizer: ScriptedRecognizer::Broken,
        ..HarnessBuilder::default()
    }
    .build();
    let channel = RecordingChannel::with_download(b"OggS");

    let report = harness
        .pipeline
        .handle(&channel, &IncomingMessage::voice("9", "file-1"))
        .await
        .unwrap();

    let texts = channel.texts().await;
    assert_eq!(texts.len(), 1);
    assert!(texts[0].starts_with("⚠️ Error: "));
    assert!(texts[0].contains("recognition connection failed"));
    assert_eq!(report.transcription_error.as_ref(), Some(&texts[0]));
    assert_eq!(harness.backend.calls(), 0);
    assert!(harness.scratch_is_empty());
}

#[tokio::test]
async fn failed_conversion_reports_error_text() {
    let harness = HarnessBuilder {
        converter: SilentConverter {
            fail: true,
            ..SilentConverter::default()
        },
        ..HarnessBuilder::default()
    }
    .build();
    let channel = RecordingChannel::with_download(b"not audio");

    harness
        .pipeline
        .handle(&channel, &IncomingMessage::voice("9", "file-1"))
        .await
        .unwrap();

    let texts = channel.texts().await;
    assert_eq!(texts.len(), 1);
    assert!(texts[0].starts_with("⚠️ Error: "));
    assert!(harness.scratch_is_empty());
}

#[tokio::test]
async fn failed_download_reports_error_text() {
    let harness = HarnessBuilder::default().build();
    let channel = RecordingChannel::default();

    let report = harness
        .pipeline
        .handle(&channel, &IncomingMessage::voice("9", "missing"))
        .await
        .unwrap();

    assert_eq!(report.stage, Stage::Done);
    let texts = channel.texts().await;
    assert_eq!(texts.len(), 1);
    assert!(texts[0].starts_with("⚠️ Error: "));
    assert!(harness.converter.inputs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn synthesis_failure_aborts_after_text() {
    let harness = HarnessBuilder {
        speech: TaggingSpeech {
            fail: true,
            ..TaggingSpeech::default()
        },
        ..HarnessBuilder::default()
    }
    .build();
    let channel = RecordingChannel::default();

    let result = harness
        .pipeline
        .handle(&channel, &IncomingMessage::text("3", "hello"))
        .await;

    assert!(result.is_err());
    assert_eq!(channel.texts().await.len(), 1);
    assert!(channel.voices().await.is_empty());
    assert!(harness.scratch_is_empty());
}

#[tokio::test]
async fn voice_upload_failure_still_cleans_up() {
    let harness = HarnessBuilder::default().build();
    let channel = RecordingChannel {
        fail_voice: true,
        ..RecordingChannel::with_download(b"OggS")
    };

    let result = harness
        .pipeline
        .handle(&channel, &IncomingMessage::voice("3", "file-1"))
        .await;

    assert!(result.is_err());
    assert_eq!(channel.texts().await.len(), 1);
    assert!(harness.scratch_is_empty());
}

#[tokio::test]
async fn successful_runs_leave_no_files() {
    let harness = HarnessBuilder::default().build();
    let channel = RecordingChannel::with_download(b"OggS");

    harness
        .pipeline
        .handle(&channel, &IncomingMessage::text("1", "hello"))
        .await
        .unwrap();
    harness
        .pipeline
        .handle(&channel, &IncomingMessage::voice("1", "file-1"))
        .await
        .unwrap();

    let voices = channel.voices().await;
    assert_eq!(voices.len(), 2);
    assert!(voices.iter().all(|v| !v.path.exists()));
    assert!(harness.scratch_is_empty());
}

#[tokio::test]
async fn concurrent_runs_use_separate_scratch() {
    let harness = HarnessBuilder::default().build();
    let channel = RecordingChannel::with_download(b"OggS");

    let first = IncomingMessage::voice("1", "a");
    let second = IncomingMessage::voice("2", "b");
    let (a, b) = tokio::join!(
        harness.pipeline.handle(&channel, &first),
        harness.pipeline.handle(&channel, &second),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_ne!(a.request_id, b.request_id);
    let voices = channel.voices().await;
    assert_eq!(voices.len(), 2);
    assert_ne!(voices[0].path.parent(), voices[1].path.parent());
    assert!(harness.scratch_is_empty());
}

#[tokio::test]
async fn start_command_sends_greeting() {
    let harness = HarnessBuilder::default().build();
    let channel = RecordingChannel::default();
    let mut msg = IncomingMessage::text("5", "/start");
    msg.payload = lingo_relay::channels::Payload::Command {
        name: "start".to_string(),
        args: String::new(),
    };

    let report = harness.pipeline.handle(&channel, &msg).await.unwrap();

    assert_eq!(report.entry, EntryPoint::Command);
    assert_eq!(channel.texts().await, vec![GREETING.to_string()]);
    assert_eq!(harness.backend.calls(), 0);
    assert!(channel.voices().await.is_empty());
}

#[tokio::test]
async fn unknown_command_is_ignored() {
    let harness = HarnessBuilder::default().build();
    let channel = RecordingChannel::default();
    let mut msg = IncomingMessage::text("5", "/help");
    msg.payload = lingo_relay::channels::Payload::Command {
        name: "help".to_string(),
        args: String::new(),
    };

    harness.pipeline.handle(&channel, &msg).await.unwrap();

    assert!(channel.texts().await.is_empty());
    assert_eq!(harness.backend.calls(), 0);
}
