use super::types::{
    CheckoutRequest, CheckoutResponse, ErrorResponse, RoleInfo, TrackUsageRequest,
    TranscriptionResponse, TranslateRequest, Translation,
};
use crate::access::PlanTier;
use crate::audio::Recording;
use crate::error::TurnError;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use std::time::Duration;
use tracing::{debug, info};

/// Seam between the turn orchestrator and the remote service.
///
/// `HttpBackend` is the production implementation; tests drive the state
/// machine with a scripted one.
#[async_trait]
pub trait Backend: Send + Sync {
    /// `POST /api/transcribe`: multipart audio + language + model.
    async fn transcribe(
        &self,
        audio: &Recording,
        language: &str,
        model: &str,
    ) -> Result<String, TurnError>;

    /// `POST /api/translate`.
    async fn translate(&self, request: &TranslateRequest) -> Result<Translation, TurnError>;

    /// `GET /api/user/role-info`.
    async fn role_info(&self) -> Result<RoleInfo, TurnError>;

    /// `POST /api/track-usage`. Fire-and-forget accounting; callers must
    /// never let a failure here affect the turn outcome.
    async fn track_usage(&self, service_type: &str, amount: u64) -> Result<(), TurnError>;

    /// `POST /payment/create-checkout-session`. Returns the session id to
    /// hand to the external payment redirect.
    async fn create_checkout_session(&self, plan: PlanTier) -> Result<String, TurnError>;
}

/// reqwest-based client for the transcription/translation service.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Build a client against `base_url` with a per-request deadline.
    /// A hung backend call fails with `TurnError::Timeout` instead of
    /// leaving the caller in Processing indefinitely.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, TurnError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Convert a non-success response into `TurnError::Network`, preferring
    /// the backend's structured error body when it has one.
    async fn check_status(response: Response) -> Result<Response, TurnError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let detail = match response.json::<ErrorResponse>().await {
            Ok(body) => body.error,
            Err(_) => format!("status {}", status),
        };

        Err(TurnError::Network(format!("{} ({})", detail, status)))
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn transcribe(
        &self,
        audio: &Recording,
        language: &str,
        model: &str,
    ) -> Result<String, TurnError> {
        let url = self.url("/api/transcribe");
        debug!("transcribe request: {} ({} bytes)", url, audio.wav_bytes.len());

        let part = Part::bytes(audio.wav_bytes.clone())
            .file_name("recording.wav")
            .mime_str(&audio.mime_type)
            .map_err(|e| TurnError::Network(format!("invalid audio part: {}", e)))?;

        let form = Form::new()
            .part("audio", part)
            .text("language", language.to_string())
            .text("model", model.to_string());

        let response = self.client.post(&url).multipart(form).send().await?;
        let response = Self::check_status(response).await?;

        let body: TranscriptionResponse = response.json().await?;
        Ok(body.text)
    }

    async fn translate(&self, request: &TranslateRequest) -> Result<Translation, TurnError> {
        let url = self.url("/api/translate");
        debug!("translate request: {} -> {}", url, request.target_language);

        let response = self.client.post(&url).json(request).send().await?;
        let response = Self::check_status(response).await?;

        Ok(response.json::<Translation>().await?)
    }

    async fn role_info(&self) -> Result<RoleInfo, TurnError> {
        let url = self.url("/api/user/role-info");

        let response = self.client.get(&url).send().await?;
        let response = Self::check_status(response).await?;

        Ok(response.json::<RoleInfo>().await?)
    }

    async fn track_usage(&self, service_type: &str, amount: u64) -> Result<(), TurnError> {
        let url = self.url("/api/track-usage");
        let body = TrackUsageRequest {
            service_type: service_type.to_string(),
            amount,
        };

        let response = self.client.post(&url).json(&body).send().await?;

        // Accounting is best-effort; surface the status but carry no body.
        if response.status().is_success() {
            Ok(())
        } else {
            Err(TurnError::Network(format!(
                "track-usage failed: status {}",
                response.status()
            )))
        }
    }

    async fn create_checkout_session(&self, plan: PlanTier) -> Result<String, TurnError> {
        let url = self.url("/payment/create-checkout-session");
        info!("creating checkout session for plan: {}", plan);

        let body = CheckoutRequest { plan_type: plan };
        let response = self.client.post(&url).json(&body).send().await?;
        let response = Self::check_status(response).await?;

        let body: CheckoutResponse = response.json().await?;
        Ok(body.session_id)
    }
}
