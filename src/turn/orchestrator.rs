use super::events::{TurnEvent, TurnPhase};
use super::options::TurnOptions;
use crate::access::{AccessGate, Capability, PlanTier, SessionContext, UpgradePrompt};
use crate::api::{Backend, TranslateRequest};
use crate::audio::{Recorder, Recording};
use crate::error::TurnError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// The transient result of one turn. Overwritten by the next turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResult {
    pub turn_id: Uuid,
    pub transcript: String,
    /// None when translation failed or was gated; the transcript stands.
    pub translation: Option<String>,
    pub source_language: String,
    pub target_language: String,
}

/// Sequences one user-visible turn: record, transcribe, translate.
///
/// Within a turn, transcription completes before translation begins;
/// across turns no overlap is permitted. The phase field is the busy
/// guard: anything but `Idle` rejects a new start, so two concurrent
/// uploads can never interleave their results in the shared display.
pub struct TurnOrchestrator {
    backend: Arc<dyn Backend>,
    recorder: tokio::sync::Mutex<Recorder>,
    context: Mutex<SessionContext>,
    options: TurnOptions,
    phase: Mutex<TurnPhase>,
    events: mpsc::Sender<TurnEvent>,
    request_timeout: Duration,
    last_result: Mutex<Option<TurnResult>>,
    usage_tasks: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl TurnOrchestrator {
    /// Build an orchestrator and the event stream its status surface reads.
    pub fn new(
        backend: Arc<dyn Backend>,
        recorder: Recorder,
        context: SessionContext,
        options: TurnOptions,
        request_timeout: Duration,
    ) -> (Self, mpsc::Receiver<TurnEvent>) {
        let (events, events_rx) = mpsc::channel(64);

        let orchestrator = Self {
            backend,
            recorder: tokio::sync::Mutex::new(recorder),
            context: Mutex::new(context),
            options,
            phase: Mutex::new(TurnPhase::Idle),
            events,
            request_timeout,
            last_result: Mutex::new(None),
            usage_tasks: Mutex::new(Vec::new()),
        };

        (orchestrator, events_rx)
    }

    pub fn phase(&self) -> TurnPhase {
        *lock_or_recover(&self.phase)
    }

    pub fn last_result(&self) -> Option<TurnResult> {
        lock_or_recover(&self.last_result).clone()
    }

    fn current_context(&self) -> SessionContext {
        *lock_or_recover(&self.context)
    }

    /// The one controlled refresh of the role/plan snapshot.
    pub async fn refresh_context(&self) -> Result<(), TurnError> {
        let fresh = SessionContext::fetch(self.backend.as_ref()).await?;
        *lock_or_recover(&self.context) = fresh;
        Ok(())
    }

    /// Start capturing a new turn.
    ///
    /// Rejected with `Busy` unless the orchestrator is idle. The gate is
    /// consulted for the selected transcription model before the device
    /// opens; denial emits an upgrade prompt and stays idle.
    pub async fn begin_recording(&self) -> Result<(), TurnError> {
        self.enter(TurnPhase::Idle, TurnPhase::Recording).await?;

        let capability = Capability::for_transcription_model(&self.options.transcription_model);
        if let Err(e) = self.check_gate(capability).await {
            self.set_phase(TurnPhase::Idle).await;
            return Err(e);
        }

        let mut recorder = self.recorder.lock().await;
        if let Err(e) = recorder.start().await {
            drop(recorder);
            self.emit(TurnEvent::TurnFailed {
                message: e.to_string(),
            })
            .await;
            self.set_phase(TurnPhase::Idle).await;
            return Err(e);
        }

        Ok(())
    }

    /// Stop capturing and run the transcribe/translate half of the turn.
    pub async fn finish_turn(&self) -> Result<TurnResult, TurnError> {
        self.enter(TurnPhase::Recording, TurnPhase::Transcribing)
            .await
            .map_err(|_| TurnError::NoActiveRecording)?;

        let recording = {
            let mut recorder = self.recorder.lock().await;
            match recorder.stop().await {
                Ok(recording) => recording,
                Err(e) => return Err(self.fail(e).await),
            }
        };

        self.process(recording).await
    }

    /// Stop capturing without submitting anything.
    ///
    /// Cancels only the capture; an in-flight backend call from a previous
    /// turn is never cancelled, the busy guard blocks until it resolves.
    pub async fn cancel_recording(&self) -> Result<(), TurnError> {
        self.enter(TurnPhase::Recording, TurnPhase::Idle)
            .await
            .map_err(|_| TurnError::NoActiveRecording)?;

        let mut recorder = self.recorder.lock().await;
        recorder.cancel().await
    }

    /// Upload-triggered variant: run a turn on existing audio, skipping
    /// the recording phase entirely. Same busy guard, same pipeline.
    pub async fn run_upload_turn(&self, recording: Recording) -> Result<TurnResult, TurnError> {
        self.enter(TurnPhase::Idle, TurnPhase::Transcribing).await?;

        let capability = Capability::for_transcription_model(&self.options.transcription_model);
        if let Err(e) = self.check_gate(capability).await {
            self.set_phase(TurnPhase::Idle).await;
            return Err(e);
        }

        self.process(recording).await
    }

    /// Hand the upgrade prompt's checkout action to the backend; the
    /// returned session id goes to the external payment redirect.
    pub async fn request_upgrade(&self, plan: PlanTier) -> Result<String, TurnError> {
        self.backend.create_checkout_session(plan).await
    }

    /// Transcribe then auto-chain into translation. No user action sits
    /// between the two steps; that keeps turns-per-exchange minimal in a
    /// conversational flow.
    async fn process(&self, recording: Recording) -> Result<TurnResult, TurnError> {
        let turn_id = Uuid::new_v4();
        info!(
            "processing turn {} ({:.1}s audio)",
            turn_id, recording.duration_secs
        );

        let transcribe = self.backend.transcribe(
            &recording,
            &self.options.source_language,
            &self.options.transcription_model,
        );
        let transcript = match with_deadline(self.request_timeout, transcribe).await {
            Ok(text) => text,
            Err(e) => return Err(self.fail(e).await),
        };

        // Translation is attempted iff transcription returned usable text.
        if transcript.trim().is_empty() {
            return Err(self.fail(TurnError::EmptyResult).await);
        }

        self.emit(TurnEvent::TranscriptReady {
            text: transcript.clone(),
        })
        .await;
        self.track_usage("transcription", recording.duration_secs.ceil() as u64);

        let mut result = TurnResult {
            turn_id,
            transcript: transcript.clone(),
            translation: None,
            source_language: self.options.source_language.clone(),
            target_language: self.options.target_language.clone(),
        };

        // Gate the translation step separately; a denial here leaves the
        // transcript rendered, the same as any other translation failure.
        let capability = Capability::for_translation_model(&self.options.translation_model);
        if self.check_gate(capability).await.is_err() {
            self.set_phase(TurnPhase::Idle).await;
            self.store_result(&result);
            return Ok(result);
        }

        self.set_phase(TurnPhase::Translating).await;

        let request = TranslateRequest {
            text: transcript,
            target_language: self.options.target_language.clone(),
            translation_model: self.options.translation_model.clone(),
        };

        match with_deadline(self.request_timeout, self.backend.translate(&request)).await {
            Ok(translation) => {
                self.emit(TurnEvent::TranslationReady {
                    text: translation.text.clone(),
                })
                .await;
                self.track_usage("translation", 1);
                result.translation = Some(translation.text);
            }
            Err(e) => {
                // Partial-failure policy: a failed translation does not
                // roll back the transcription. One attempt, no retry.
                warn!("translation failed: {}", e);
                self.emit(TurnEvent::TurnFailed {
                    message: format!("translation failed: {}", e),
                })
                .await;
            }
        }

        self.set_phase(TurnPhase::Idle).await;
        self.store_result(&result);
        Ok(result)
    }

    /// Gate a step for the current session context; denial emits the
    /// upgrade prompt naming the minimum required plan.
    async fn check_gate(&self, capability: Capability) -> Result<(), TurnError> {
        let context = self.current_context();
        match AccessGate::check(capability, context.role, context.plan) {
            Ok(()) => Ok(()),
            Err(e) => {
                if let TurnError::AccessDenied {
                    capability,
                    required_plan,
                } = &e
                {
                    self.emit(TurnEvent::UpgradeRequired {
                        prompt: UpgradePrompt::new(*capability, *required_plan),
                    })
                    .await;
                }
                Err(e)
            }
        }
    }

    /// Claim the `from -> to` phase transition, or fail with `Busy`.
    /// This is the whole concurrency story: one atomic check-and-set.
    async fn enter(&self, from: TurnPhase, to: TurnPhase) -> Result<(), TurnError> {
        {
            let mut phase = lock_or_recover(&self.phase);
            if *phase != from {
                warn!("phase transition rejected: {:?} (wanted {:?})", *phase, from);
                return Err(TurnError::Busy);
            }
            *phase = to;
        }

        info!("turn phase: {:?} -> {:?}", from, to);
        self.emit(TurnEvent::PhaseChanged { phase: to }).await;
        Ok(())
    }

    /// Terminal failure for this turn: surface it and return to idle.
    async fn fail(&self, error: TurnError) -> TurnError {
        warn!("turn failed: {}", error);
        self.emit(TurnEvent::TurnFailed {
            message: error.to_string(),
        })
        .await;
        self.set_phase(TurnPhase::Idle).await;
        error
    }

    async fn set_phase(&self, phase: TurnPhase) {
        {
            let mut current = lock_or_recover(&self.phase);
            if *current == phase {
                return;
            }
            info!("turn phase: {:?} -> {:?}", *current, phase);
            *current = phase;
        }
        self.emit(TurnEvent::PhaseChanged { phase }).await;
    }

    fn store_result(&self, result: &TurnResult) {
        *lock_or_recover(&self.last_result) = Some(result.clone());
    }

    async fn emit(&self, event: TurnEvent) {
        // A closed status surface is not an error for the turn itself.
        let _ = self.events.send(event).await;
    }

    /// Fire-and-forget accounting; failure never affects the turn. The
    /// handle is kept so a one-shot driver can flush before exit.
    fn track_usage(&self, service_type: &'static str, amount: u64) {
        let backend = Arc::clone(&self.backend);
        let task = tokio::spawn(async move {
            if let Err(e) = backend.track_usage(service_type, amount).await {
                warn!("usage tracking failed ({}): {}", service_type, e);
            }
        });
        lock_or_recover(&self.usage_tasks).push(task);
    }

    /// Wait for in-flight usage accounting to land.
    ///
    /// Long-lived hosts never need this; a process that exits right after a
    /// turn would otherwise cancel the spawned calls at runtime shutdown.
    pub async fn flush_usage(&self) {
        let tasks: Vec<_> = lock_or_recover(&self.usage_tasks).drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
    }
}

/// Take a std mutex, recovering the inner state if a holder panicked.
fn lock_or_recover<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Wrap a backend call in the configured deadline so a hung request fails
/// the turn instead of leaving the UI in Processing indefinitely.
async fn with_deadline<T>(
    deadline: Duration,
    fut: impl Future<Output = Result<T, TurnError>>,
) -> Result<T, TurnError> {
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(TurnError::Timeout),
    }
}
