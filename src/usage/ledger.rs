use super::escape::escape_key;
use crate::access::PlanTier;
use crate::error::TurnError;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// Transactional counter storage, the shape the realtime database client
/// exposes. `increment` is atomic per key and returns the new total.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn increment(&self, key: &str, amount: u64) -> Result<u64, TurnError>;
    async fn get(&self, key: &str) -> Result<u64, TurnError>;
}

/// In-memory store used by tests and offline runs.
#[derive(Default)]
pub struct MemoryCounterStore {
    counters: Mutex<HashMap<String, u64>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, key: &str, amount: u64) -> Result<u64, TurnError> {
        let mut counters = self.counters.lock().await;
        let total = counters.entry(key.to_string()).or_insert(0);
        *total = total.saturating_add(amount);
        Ok(*total)
    }

    async fn get(&self, key: &str) -> Result<u64, TurnError> {
        let counters = self.counters.lock().await;
        Ok(counters.get(key).copied().unwrap_or(0))
    }
}

/// Per-user usage counters keyed by escaped user id.
///
/// User identifiers may contain characters that are illegal in database
/// path segments; they are substitution-escaped on write and the same
/// escaping is applied on read, so both sides address the same key.
pub struct UsageLedger<S: CounterStore> {
    store: S,
}

impl<S: CounterStore> UsageLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn key(user_id: &str, service_type: &str) -> String {
        format!("usage/{}/{}", escape_key(user_id), service_type)
    }

    /// Transactionally add `amount` to the user's counter for a service.
    /// Returns the new total.
    pub async fn record(
        &self,
        user_id: &str,
        service_type: &str,
        amount: u64,
    ) -> Result<u64, TurnError> {
        let key = Self::key(user_id, service_type);
        let total = self.store.increment(&key, amount).await?;
        debug!("usage {}: +{} -> {}", key, amount, total);
        Ok(total)
    }

    /// Current total for a user/service pair.
    pub async fn total(&self, user_id: &str, service_type: &str) -> Result<u64, TurnError> {
        self.store.get(&Self::key(user_id, service_type)).await
    }

    /// Remaining allowance under the plan's monthly quota, or `None` when
    /// the plan is unmetered for this service.
    pub async fn remaining(
        &self,
        user_id: &str,
        service_type: &str,
        plan: PlanTier,
    ) -> Result<Option<u64>, TurnError> {
        let Some(allowance) = monthly_allowance(plan, service_type) else {
            return Ok(None);
        };

        let used = self.total(user_id, service_type).await?;
        Ok(Some(allowance.saturating_sub(used)))
    }
}

/// Monthly quota per plan, in service units (seconds of audio for
/// transcription, requests for translation). `None` means unmetered.
pub fn monthly_allowance(plan: PlanTier, service_type: &str) -> Option<u64> {
    match (plan, service_type) {
        (PlanTier::Professional, _) => None,
        (PlanTier::Free, "transcription") => Some(1800),
        (PlanTier::Free, "translation") => Some(100),
        (PlanTier::Basic, "transcription") => Some(18000),
        (PlanTier::Basic, "translation") => Some(2000),
        // Unknown services are treated as metered-but-unlimited rather
        // than silently blocked.
        _ => None,
    }
}
