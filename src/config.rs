use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub api: ApiConfig,
    pub audio: AudioConfig,
    pub turn: TurnConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the transcription/translation backend
    pub base_url: String,
    /// Per-request deadline in seconds
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub buffer_duration_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct TurnConfig {
    pub source_language: String,
    pub target_language: String,
    pub transcription_model: String,
    pub translation_model: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .set_default("service.name", "voiceturn")?
            .set_default("api.base_url", "http://localhost:8080")?
            .set_default("api.request_timeout_secs", 30)?
            .set_default("audio.sample_rate", 16000)?
            .set_default("audio.channels", 1)?
            .set_default("audio.buffer_duration_ms", 100)?
            .set_default("turn.source_language", "es")?
            .set_default("turn.target_language", "en")?
            .set_default("turn.transcription_model", "standard-transcription-model")?
            .set_default("turn.translation_model", "standard-translation-model")?
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
