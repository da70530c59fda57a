use crate::error::TurnError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// User role as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    NormalUser,
    SuperUser,
    Admin,
}

/// Subscription plan tier, ordered from cheapest to most expensive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    Free,
    Basic,
    Professional,
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlanTier::Free => "free",
            PlanTier::Basic => "basic",
            PlanTier::Professional => "professional",
        };
        write!(f, "{}", s)
    }
}

/// A plan/role-gated model or feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    StandardTranscription,
    PremiumTranscription,
    AccurateTranscription,
    StandardTranslation,
    PremiumTranslation,
    TextToSpeech,
}

impl Capability {
    /// Stable wire identifier for this capability.
    pub fn id(&self) -> &'static str {
        match self {
            Capability::StandardTranscription => "standard-transcription-model",
            Capability::PremiumTranscription => "premium-transcription-model",
            Capability::AccurateTranscription => "accurate-transcription-model",
            Capability::StandardTranslation => "standard-translation-model",
            Capability::PremiumTranslation => "premium-translation-model",
            Capability::TextToSpeech => "tts-any-model",
        }
    }

    pub fn from_id(id: &str) -> Option<Capability> {
        match id {
            "standard-transcription-model" => Some(Capability::StandardTranscription),
            "premium-transcription-model" => Some(Capability::PremiumTranscription),
            "accurate-transcription-model" => Some(Capability::AccurateTranscription),
            "standard-translation-model" => Some(Capability::StandardTranslation),
            "premium-translation-model" => Some(Capability::PremiumTranslation),
            "tts-any-model" => Some(Capability::TextToSpeech),
            _ => None,
        }
    }

    /// Map a transcription model name to the capability that gates it.
    /// Unknown model names fall back to the standard (free) tier; the
    /// backend re-checks every call server-side.
    pub fn for_transcription_model(model: &str) -> Capability {
        Capability::from_id(model).unwrap_or(Capability::StandardTranscription)
    }

    /// Map a translation model name to the capability that gates it.
    pub fn for_translation_model(model: &str) -> Capability {
        Capability::from_id(model).unwrap_or(Capability::StandardTranslation)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Data for the upgrade prompt shown when the gate denies an action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradePrompt {
    /// The capability that was refused.
    pub capability: Capability,
    /// Minimum plan that unlocks it; also the plan to hand to checkout.
    pub required_plan: PlanTier,
    /// Human-readable message for the status surface.
    pub message: String,
}

impl UpgradePrompt {
    pub fn new(capability: Capability, required_plan: PlanTier) -> Self {
        let message = format!(
            "{} requires the {} plan or higher",
            capability.id(),
            required_plan
        );
        Self {
            capability,
            required_plan,
            message,
        }
    }
}

/// The one canonical capability table.
///
/// Advisory for UI gating only: the backend re-enforces every check
/// server-side. `Admin` and `SuperUser` bypass the table entirely.
pub struct AccessGate;

/// capability -> minimum plan for normal users
const CAPABILITY_TABLE: &[(Capability, PlanTier)] = &[
    (Capability::StandardTranscription, PlanTier::Free),
    (Capability::StandardTranslation, PlanTier::Free),
    (Capability::PremiumTranscription, PlanTier::Basic),
    (Capability::PremiumTranslation, PlanTier::Basic),
    (Capability::TextToSpeech, PlanTier::Basic),
    (Capability::AccurateTranscription, PlanTier::Professional),
];

impl AccessGate {
    /// Minimum plan a normal user needs for this capability.
    pub fn required_plan(capability: Capability) -> PlanTier {
        CAPABILITY_TABLE
            .iter()
            .find(|(c, _)| *c == capability)
            .map(|(_, p)| *p)
            .unwrap_or(PlanTier::Free)
    }

    /// Pure gating decision. Privileged roles pass regardless of plan;
    /// normal users are checked against the capability table.
    pub fn can_use(capability: Capability, role: Role, plan: PlanTier) -> bool {
        match role {
            Role::Admin | Role::SuperUser => true,
            Role::NormalUser => plan >= Self::required_plan(capability),
        }
    }

    /// Gate check that carries the upgrade-prompt payload on denial.
    pub fn check(capability: Capability, role: Role, plan: PlanTier) -> Result<(), TurnError> {
        if Self::can_use(capability, role, plan) {
            Ok(())
        } else {
            Err(TurnError::AccessDenied {
                capability,
                required_plan: Self::required_plan(capability),
            })
        }
    }

    /// The full capability table, for display surfaces.
    pub fn table() -> &'static [(Capability, PlanTier)] {
        CAPABILITY_TABLE
    }
}
