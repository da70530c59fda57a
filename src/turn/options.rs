use serde::{Deserialize, Serialize};

/// Language and model selection for a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOptions {
    /// Language spoken into the microphone (e.g. "es")
    pub source_language: String,
    /// Language to translate into (e.g. "en")
    pub target_language: String,
    /// Transcription model identifier; doubles as its gate capability
    pub transcription_model: String,
    /// Translation model identifier; doubles as its gate capability
    pub translation_model: String,
}

impl Default for TurnOptions {
    fn default() -> Self {
        Self {
            source_language: "es".to_string(),
            target_language: "en".to_string(),
            transcription_model: "standard-transcription-model".to_string(),
            translation_model: "standard-translation-model".to_string(),
        }
    }
}
