use crate::access::UpgradePrompt;
use serde::{Deserialize, Serialize};

/// Where the orchestrator is in the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Idle,
    Recording,
    Transcribing,
    Translating,
}

impl Default for TurnPhase {
    fn default() -> Self {
        Self::Idle
    }
}

/// Events emitted towards the status surface (CLI, UI, tests).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TurnEvent {
    PhaseChanged { phase: TurnPhase },
    /// Transcription succeeded; render the source-language text.
    TranscriptReady { text: String },
    /// Translation succeeded; render the target-language text.
    TranslationReady { text: String },
    /// The gate refused a step; show the upgrade prompt.
    UpgradeRequired { prompt: UpgradePrompt },
    /// The turn (or its translation half) failed; show a status message.
    TurnFailed { message: String },
}
