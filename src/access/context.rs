use super::gate::{PlanTier, Role};
use crate::api::Backend;
use crate::error::TurnError;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Immutable role/plan snapshot for one page of work.
///
/// Fetched once from the backend and passed explicitly to every call site
/// that gates on it. Refreshing produces a new value; nothing mutates an
/// existing context in place.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SessionContext {
    pub role: Role,
    pub plan: PlanTier,
    pub has_premium_access: bool,
}

impl SessionContext {
    /// Fetch the current role/plan from the backend.
    pub async fn fetch(backend: &dyn Backend) -> Result<Self, TurnError> {
        let info = backend.role_info().await?;

        info!(
            "session context: role={:?} plan={} premium={}",
            info.role, info.plan_type, info.has_premium_access
        );

        Ok(Self {
            role: info.role,
            plan: info.plan_type,
            has_premium_access: info.has_premium_access,
        })
    }

    /// Context for anonymous/offline use: the least-privileged combination.
    pub fn anonymous() -> Self {
        Self {
            role: Role::NormalUser,
            plan: PlanTier::Free,
            has_premium_access: false,
        }
    }
}
