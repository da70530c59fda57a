// Integration tests for the turn orchestrator: phase guard, auto-chained
// translation, partial-failure policy, gating, and wire-field fidelity.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use voiceturn::{
    AudioFrame, Backend, CaptureBackend, CaptureConfig, PlanTier, Recorder, Recording, RoleInfo,
    Role, SessionContext, TranslateRequest, Translation, TurnError, TurnEvent, TurnOptions,
    TurnOrchestrator, TurnPhase,
};

/// Scripted backend: configurable responses, records every call.
struct MockBackend {
    transcript: Option<String>,
    translation: Option<String>,
    role: Role,
    plan: PlanTier,
    transcribe_calls: AtomicUsize,
    translate_requests: Mutex<Vec<TranslateRequest>>,
    usage_calls: Mutex<Vec<(String, u64)>>,
    /// When set, transcribe blocks until a permit is added.
    transcribe_gate: Option<Arc<Semaphore>>,
    transcribe_delay: Option<Duration>,
}

impl MockBackend {
    fn new(transcript: &str, translation: &str) -> Self {
        Self {
            transcript: Some(transcript.to_string()),
            translation: Some(translation.to_string()),
            role: Role::NormalUser,
            plan: PlanTier::Free,
            transcribe_calls: AtomicUsize::new(0),
            translate_requests: Mutex::new(Vec::new()),
            usage_calls: Mutex::new(Vec::new()),
            transcribe_gate: None,
            transcribe_delay: None,
        }
    }

    fn translate_requests(&self) -> Vec<TranslateRequest> {
        self.translate_requests.lock().unwrap().clone()
    }

    fn usage_calls(&self) -> Vec<(String, u64)> {
        self.usage_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn transcribe(
        &self,
        _audio: &Recording,
        _language: &str,
        _model: &str,
    ) -> Result<String, TurnError> {
        self.transcribe_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.transcribe_gate {
            let permit = gate.acquire().await.expect("gate closed");
            permit.forget();
        }
        if let Some(delay) = self.transcribe_delay {
            tokio::time::sleep(delay).await;
        }

        self.transcript
            .clone()
            .ok_or_else(|| TurnError::Network("transcription unavailable".to_string()))
    }

    async fn translate(&self, request: &TranslateRequest) -> Result<Translation, TurnError> {
        self.translate_requests.lock().unwrap().push(request.clone());

        self.translation
            .clone()
            .map(|text| Translation {
                text,
                performance: None,
            })
            .ok_or_else(|| TurnError::Network("translation unavailable".to_string()))
    }

    async fn role_info(&self) -> Result<RoleInfo, TurnError> {
        Ok(RoleInfo {
            role: self.role,
            plan_type: self.plan,
            has_premium_access: self.plan != PlanTier::Free,
        })
    }

    async fn track_usage(&self, service_type: &str, amount: u64) -> Result<(), TurnError> {
        self.usage_calls
            .lock()
            .unwrap()
            .push((service_type.to_string(), amount));
        Ok(())
    }

    async fn create_checkout_session(&self, plan: PlanTier) -> Result<String, TurnError> {
        Ok(format!("cs_test_{}", plan))
    }
}

/// Capture backend that opens instantly and produces no frames.
struct NullCapture {
    tx: Option<mpsc::Sender<AudioFrame>>,
}

impl NullCapture {
    fn new() -> Self {
        Self { tx: None }
    }
}

#[async_trait]
impl CaptureBackend for NullCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, TurnError> {
        let (tx, rx) = mpsc::channel(8);
        self.tx = Some(tx);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), TurnError> {
        self.tx = None;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.tx.is_some()
    }

    fn name(&self) -> &str {
        "null"
    }
}

fn wav_recording() -> Recording {
    Recording {
        wav_bytes: vec![0u8; 64],
        mime_type: "audio/wav".to_string(),
        duration_secs: 1.2,
        started_at: Utc::now(),
    }
}

fn context(role: Role, plan: PlanTier) -> SessionContext {
    SessionContext {
        role,
        plan,
        has_premium_access: plan != PlanTier::Free,
    }
}

fn orchestrator_with(
    backend: Arc<MockBackend>,
    role: Role,
    plan: PlanTier,
    options: TurnOptions,
) -> (TurnOrchestrator, mpsc::Receiver<TurnEvent>) {
    let recorder = Recorder::with_backend(Box::new(NullCapture::new()), CaptureConfig::default());
    TurnOrchestrator::new(
        backend,
        recorder,
        context(role, plan),
        options,
        Duration::from_secs(5),
    )
}

fn drain(events: &mut mpsc::Receiver<TurnEvent>) -> Vec<TurnEvent> {
    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        collected.push(event);
    }
    collected
}

#[tokio::test]
async fn translate_receives_exact_wire_fields_and_renders_text() {
    let backend = Arc::new(MockBackend::new("hola", "hello"));
    let (orchestrator, mut events) = orchestrator_with(
        Arc::clone(&backend),
        Role::NormalUser,
        PlanTier::Free,
        TurnOptions::default(),
    );

    let result = orchestrator.run_upload_turn(wav_recording()).await.unwrap();

    assert_eq!(result.transcript, "hola");
    assert_eq!(result.translation.as_deref(), Some("hello"));
    assert_eq!(result.target_language, "en");

    let requests = backend.translate_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].text, "hola");
    assert_eq!(requests[0].target_language, "en");
    assert_eq!(requests[0].translation_model, "standard-translation-model");

    let rendered: Vec<String> = drain(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            TurnEvent::TranslationReady { text } => Some(text),
            _ => None,
        })
        .collect();
    assert_eq!(rendered, vec!["hello".to_string()]);

    assert_eq!(orchestrator.phase(), TurnPhase::Idle);
}

#[tokio::test]
async fn empty_transcript_skips_translation() {
    let backend = Arc::new(MockBackend::new("   ", "never"));
    let (orchestrator, mut events) = orchestrator_with(
        Arc::clone(&backend),
        Role::NormalUser,
        PlanTier::Free,
        TurnOptions::default(),
    );

    let err = orchestrator
        .run_upload_turn(wav_recording())
        .await
        .unwrap_err();

    assert!(matches!(err, TurnError::EmptyResult));
    assert!(backend.translate_requests().is_empty());
    assert_eq!(orchestrator.phase(), TurnPhase::Idle);

    let failed = drain(&mut events)
        .into_iter()
        .any(|event| matches!(event, TurnEvent::TurnFailed { .. }));
    assert!(failed, "empty result should surface a status message");
}

#[tokio::test]
async fn failed_translation_leaves_transcript_standing() {
    let backend = Arc::new(MockBackend {
        translation: None,
        ..MockBackend::new("hola", "")
    });
    let (orchestrator, mut events) = orchestrator_with(
        Arc::clone(&backend),
        Role::NormalUser,
        PlanTier::Free,
        TurnOptions::default(),
    );

    let result = orchestrator.run_upload_turn(wav_recording()).await.unwrap();

    // Partial failure: transcript kept, translation absent, no retry.
    assert_eq!(result.transcript, "hola");
    assert!(result.translation.is_none());
    assert_eq!(backend.translate_requests().len(), 1);

    let events = drain(&mut events);
    assert!(events
        .iter()
        .any(|event| matches!(event, TurnEvent::TranscriptReady { .. })));
    assert!(events
        .iter()
        .any(|event| matches!(event, TurnEvent::TurnFailed { .. })));
}

#[tokio::test]
async fn free_user_premium_model_gets_upgrade_prompt() {
    let backend = Arc::new(MockBackend::new("hola", "hello"));
    let options = TurnOptions {
        transcription_model: "premium-transcription-model".to_string(),
        ..TurnOptions::default()
    };
    let (orchestrator, mut events) =
        orchestrator_with(Arc::clone(&backend), Role::NormalUser, PlanTier::Free, options);

    let err = orchestrator
        .run_upload_turn(wav_recording())
        .await
        .unwrap_err();

    let TurnError::AccessDenied { required_plan, .. } = err else {
        panic!("expected AccessDenied");
    };
    assert_eq!(required_plan, PlanTier::Basic);
    assert_eq!(backend.transcribe_calls.load(Ordering::SeqCst), 0);

    let prompt = drain(&mut events)
        .into_iter()
        .find_map(|event| match event {
            TurnEvent::UpgradeRequired { prompt } => Some(prompt),
            _ => None,
        })
        .expect("upgrade prompt should be emitted");
    assert_eq!(prompt.required_plan, PlanTier::Basic);

    assert_eq!(orchestrator.phase(), TurnPhase::Idle);
}

#[tokio::test]
async fn privileged_roles_bypass_model_gating() {
    let backend = Arc::new(MockBackend::new("hola", "hello"));
    let options = TurnOptions {
        transcription_model: "accurate-transcription-model".to_string(),
        translation_model: "premium-translation-model".to_string(),
        ..TurnOptions::default()
    };
    let (orchestrator, _events) =
        orchestrator_with(Arc::clone(&backend), Role::Admin, PlanTier::Free, options);

    let result = orchestrator.run_upload_turn(wav_recording()).await.unwrap();
    assert_eq!(result.translation.as_deref(), Some("hello"));
}

#[tokio::test]
async fn no_second_turn_while_processing() {
    let gate = Arc::new(Semaphore::new(0));
    let backend = Arc::new(MockBackend {
        transcribe_gate: Some(Arc::clone(&gate)),
        ..MockBackend::new("hola", "hello")
    });
    let (orchestrator, _events) = orchestrator_with(
        Arc::clone(&backend),
        Role::NormalUser,
        PlanTier::Free,
        TurnOptions::default(),
    );
    let orchestrator = Arc::new(orchestrator);

    let running = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.run_upload_turn(wav_recording()).await })
    };

    // Wait until the first turn is inside the transcription call.
    while backend.transcribe_calls.load(Ordering::SeqCst) == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(orchestrator.phase(), TurnPhase::Transcribing);

    // Both entry points are rejected while the first turn is processing.
    assert!(matches!(
        orchestrator.begin_recording().await.unwrap_err(),
        TurnError::Busy
    ));
    assert!(matches!(
        orchestrator.run_upload_turn(wav_recording()).await.unwrap_err(),
        TurnError::Busy
    ));

    gate.add_permits(1);
    let result = running.await.unwrap().unwrap();
    assert_eq!(result.transcript, "hola");

    // Exactly one attempt despite the rejected starts.
    assert_eq!(backend.transcribe_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn begin_recording_twice_is_rejected() {
    let backend = Arc::new(MockBackend::new("hola", "hello"));
    let (orchestrator, _events) = orchestrator_with(
        Arc::clone(&backend),
        Role::NormalUser,
        PlanTier::Free,
        TurnOptions::default(),
    );

    orchestrator.begin_recording().await.unwrap();
    assert_eq!(orchestrator.phase(), TurnPhase::Recording);

    assert!(matches!(
        orchestrator.begin_recording().await.unwrap_err(),
        TurnError::Busy
    ));

    let result = orchestrator.finish_turn().await.unwrap();
    assert_eq!(result.transcript, "hola");
    assert_eq!(orchestrator.phase(), TurnPhase::Idle);
}

#[tokio::test]
async fn hung_backend_call_times_out() {
    let backend = Arc::new(MockBackend {
        transcribe_delay: Some(Duration::from_millis(200)),
        ..MockBackend::new("hola", "hello")
    });
    let recorder = Recorder::with_backend(Box::new(NullCapture::new()), CaptureConfig::default());
    let (orchestrator, _events) = TurnOrchestrator::new(
        Arc::clone(&backend) as Arc<dyn Backend>,
        recorder,
        context(Role::NormalUser, PlanTier::Free),
        TurnOptions::default(),
        Duration::from_millis(50),
    );

    let err = orchestrator
        .run_upload_turn(wav_recording())
        .await
        .unwrap_err();
    assert!(matches!(err, TurnError::Timeout));
    assert_eq!(orchestrator.phase(), TurnPhase::Idle);
}

#[tokio::test]
async fn usage_is_tracked_for_both_steps() {
    let backend = Arc::new(MockBackend::new("hola", "hello"));
    let (orchestrator, _events) = orchestrator_with(
        Arc::clone(&backend),
        Role::NormalUser,
        PlanTier::Free,
        TurnOptions::default(),
    );

    orchestrator.run_upload_turn(wav_recording()).await.unwrap();

    // Accounting is fire-and-forget; flushing waits for the spawned calls,
    // so a one-shot driver cannot exit before they reach the backend.
    orchestrator.flush_usage().await;

    let calls = backend.usage_calls();
    assert!(calls.contains(&("transcription".to_string(), 2)));
    assert!(calls.contains(&("translation".to_string(), 1)));
}

#[tokio::test]
async fn cancel_only_affects_the_capture() {
    let backend = Arc::new(MockBackend::new("hola", "hello"));
    let (orchestrator, _events) = orchestrator_with(
        Arc::clone(&backend),
        Role::NormalUser,
        PlanTier::Free,
        TurnOptions::default(),
    );

    orchestrator.begin_recording().await.unwrap();
    orchestrator.cancel_recording().await.unwrap();

    assert_eq!(orchestrator.phase(), TurnPhase::Idle);
    assert_eq!(backend.transcribe_calls.load(Ordering::SeqCst), 0);

    // Cancelling again has nothing to stop.
    assert!(matches!(
        orchestrator.cancel_recording().await.unwrap_err(),
        TurnError::NoActiveRecording
    ));
}
