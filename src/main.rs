use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use voiceturn::{
    audio, AccessGate, Backend, CaptureConfig, Config, HttpBackend, PlanTier, Recorder,
    SessionContext, TurnEvent, TurnOptions, TurnOrchestrator,
};

#[derive(Parser)]
#[command(name = "voiceturn", about = "Record-transcribe-translate turn client")]
struct Cli {
    /// Config file path, without extension
    #[arg(long, default_value = "config/voiceturn")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one upload-triggered turn on a WAV file
    Turn {
        /// WAV file to transcribe and translate
        file: PathBuf,

        /// Source language override (e.g. "es")
        #[arg(long)]
        source: Option<String>,

        /// Target language override (e.g. "en")
        #[arg(long)]
        target: Option<String>,

        /// Transcription model override
        #[arg(long)]
        transcription_model: Option<String>,

        /// Translation model override
        #[arg(long)]
        translation_model: Option<String>,
    },

    /// Show the capability table for the current role/plan
    Capabilities,

    /// List audio input devices
    Devices,

    /// Create a checkout session for a plan upgrade
    Checkout {
        /// Plan to buy: basic or professional
        plan: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("{} starting", cfg.service.name);

    let backend = Arc::new(HttpBackend::new(
        &cfg.api.base_url,
        Duration::from_secs(cfg.api.request_timeout_secs),
    )?);

    match cli.command {
        Command::Turn {
            file,
            source,
            target,
            transcription_model,
            translation_model,
        } => {
            let options = TurnOptions {
                source_language: source.unwrap_or(cfg.turn.source_language),
                target_language: target.unwrap_or(cfg.turn.target_language),
                transcription_model: transcription_model.unwrap_or(cfg.turn.transcription_model),
                translation_model: translation_model.unwrap_or(cfg.turn.translation_model),
            };

            let context = fetch_context(backend.as_ref()).await;

            let capture = CaptureConfig {
                target_sample_rate: cfg.audio.sample_rate,
                target_channels: cfg.audio.channels,
                buffer_duration_ms: cfg.audio.buffer_duration_ms,
            };
            let recorder = Recorder::new(capture);

            let (orchestrator, mut events) = TurnOrchestrator::new(
                backend,
                recorder,
                context,
                options,
                Duration::from_secs(cfg.api.request_timeout_secs),
            );

            let printer = tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    match event {
                        TurnEvent::TranscriptReady { text } => println!("transcript:  {}", text),
                        TurnEvent::TranslationReady { text } => println!("translation: {}", text),
                        TurnEvent::UpgradeRequired { prompt } => {
                            println!("upgrade required: {}", prompt.message)
                        }
                        TurnEvent::TurnFailed { message } => eprintln!("turn failed: {}", message),
                        TurnEvent::PhaseChanged { phase } => debug!("phase: {:?}", phase),
                    }
                }
            });

            let recording = audio::file::load_wav(&file)?;
            let result = orchestrator.run_upload_turn(recording).await;

            // Let accounting land before the runtime shuts down.
            orchestrator.flush_usage().await;

            drop(orchestrator);
            let _ = printer.await;

            let result = result?;
            info!("turn {} complete", result.turn_id);
        }

        Command::Capabilities => {
            let context = fetch_context(backend.as_ref()).await;

            println!(
                "role={:?} plan={} premium={}",
                context.role, context.plan, context.has_premium_access
            );

            for (capability, required_plan) in AccessGate::table() {
                let allowed = AccessGate::can_use(*capability, context.role, context.plan);
                println!(
                    "{:<32} requires {:<12} {}",
                    capability.id(),
                    required_plan.to_string(),
                    if allowed { "allowed" } else { "locked" }
                );
            }
        }

        Command::Devices => {
            for name in voiceturn::MicBackend::list_input_devices()? {
                println!("{}", name);
            }
        }

        Command::Checkout { plan } => {
            let plan = match plan.as_str() {
                "basic" => PlanTier::Basic,
                "professional" => PlanTier::Professional,
                other => bail!("unknown plan '{}' (expected basic or professional)", other),
            };

            let session_id = backend.create_checkout_session(plan).await?;
            println!("checkout session: {}", session_id);
        }
    }

    Ok(())
}

/// Fetch the role/plan snapshot, falling back to the least-privileged
/// context when the backend is unreachable.
async fn fetch_context(backend: &HttpBackend) -> SessionContext {
    match SessionContext::fetch(backend).await {
        Ok(context) => context,
        Err(e) => {
            tracing::warn!("role-info fetch failed ({}), assuming free plan", e);
            SessionContext::anonymous()
        }
    }
}
