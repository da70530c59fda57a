use crate::access::{PlanTier, Role};
use serde::{Deserialize, Serialize};

/// Response body of `POST /api/transcribe`.
#[derive(Debug, Deserialize)]
pub struct TranscriptionResponse {
    pub text: String,
}

/// Request body of `POST /api/translate`.
///
/// Field names are part of the wire contract; the backend reads exactly
/// `text`, `target_language` and `translation_model`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateRequest {
    pub text: String,
    pub target_language: String,
    pub translation_model: String,
}

/// Response body of `POST /api/translate`.
///
/// The translation comes back in `text`, not `translation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Translation {
    pub text: String,
    /// Optional backend timing/diagnostic block, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<serde_json::Value>,
}

/// Response body of `GET /api/user/role-info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleInfo {
    pub role: Role,
    pub plan_type: PlanTier,
    pub has_premium_access: bool,
}

/// Request body of `POST /api/track-usage`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TrackUsageRequest {
    pub service_type: String,
    pub amount: u64,
}

/// Request body of `POST /payment/create-checkout-session`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub plan_type: PlanTier,
}

/// Response body of `POST /payment/create-checkout-session`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub session_id: String,
}

/// Error body the backend returns on non-success statuses.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
