use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use lingo_relay::daemon::{build_pipeline, http_client, prepare_scratch_base};
use lingo_relay::translate::GoogleTranslateEngine;
use lingo_relay::voice::{GoogleTtsEngine, Scratch, SpeechSynthesizer};
use lingo_relay::{Config, Daemon, Language, Translator, detect_language};

/// Lingo Relay - multilingual text and voice relay bot for Telegram
#[derive(Parser)]
#[command(name = "lingo-relay", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the bot (default)
    Run,
    /// Detect the language of a text
    Detect {
        /// Text to inspect
        text: String,
    },
    /// Translate a text through the pivot language
    Translate {
        /// Text to translate
        text: String,
        /// Source language (detected when omitted)
        #[arg(long)]
        from: Option<Language>,
        /// Target language
        #[arg(long, default_value = "en")]
        to: Language,
    },
    /// Synthesize speech to an MP3 file
    Speak {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
        /// Voice language code; unsupported codes use Hindi
        #[arg(short, long, default_value = "en")]
        lang: String,
        /// Output file
        #[arg(short, long, default_value = "reply.mp3")]
        output: PathBuf,
    },
    /// Run the text pipeline once and print the reply
    Ask {
        /// Message to answer
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,lingo_relay=info",
        1 => "info,lingo_relay=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_bot(&config).await,
        Command::Detect { text } => {
            let detected = detect_language(&text);
            println!("{} ({}) - {}", detected.value.name(), detected.value, detected.outcome);
            Ok(())
        }
        Command::Translate { text, from, to } => translate(&config, &text, from, to).await,
        Command::Speak { text, lang, output } => speak(&config, &text, &lang, output).await,
        Command::Ask { text } => ask(&config, &text).await,
    }
}

async fn run_bot(config: &Config) -> anyhow::Result<()> {
    tracing::info!(
        model = %config.llm.model,
        stt = ?config.stt.provider,
        scratch_dir = %config.scratch_dir.display(),
        "starting relay bot"
    );

    let daemon = Daemon::new(config).await?;
    daemon.run().await?;
    Ok(())
}

async fn translate(
    config: &Config,
    text: &str,
    from: Option<Language>,
    to: Language,
) -> anyhow::Result<()> {
    let client = http_client(config.http_timeout)?;
    let translator = Translator::new(Arc::new(GoogleTranslateEngine::with_client(client)));

    let from = from.unwrap_or_else(|| detect_language(text).value);
    let pivot = translator.translate_to_pivot(text, from).await;
    let result = translator.translate_from_pivot(&pivot.value, to).await;

    println!("{}", result.value);
    if pivot.is_degraded() || result.is_degraded() {
        eprintln!("warning: translation degraded ({}, {})", pivot.outcome, result.outcome);
    }
    Ok(())
}

async fn speak(config: &Config, text: &str, lang: &str, output: PathBuf) -> anyhow::Result<()> {
    let client = http_client(config.http_timeout)?;
    let synthesizer = SpeechSynthesizer::new(Arc::new(GoogleTtsEngine::new(client)));

    prepare_scratch_base(config)?;
    let scratch = Scratch::new(&config.scratch_dir, Uuid::new_v4())?;
    let audio = synthesizer.synthesize(text, lang, &scratch).await?;
    tokio::fs::copy(audio.path(), &output).await?;
    audio.dispose();

    println!("wrote {}", output.display());
    Ok(())
}

async fn ask(config: &Config, text: &str) -> anyhow::Result<()> {
    let client = http_client(config.http_timeout)?;
    let pipeline = build_pipeline(config, &client)?;

    let answer = pipeline.answer(text).await;
    println!("[{}] {}", answer.language.value, answer.localized.value);

    for (step, outcome) in [
        ("detection", &answer.language.outcome),
        ("to pivot", &answer.pivot_text.outcome),
        ("reply", &answer.reply.outcome),
        ("from pivot", &answer.localized.outcome),
    ] {
        if outcome.is_degraded() {
            eprintln!("warning: {step} {outcome}");
        }
    }
    Ok(())
}
