//! Bounded exponential backoff between failed sync attempts, persisted in
//! the cache's sync-state column family so it survives restarts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use veritas_cache::LocalCacheStore;

use crate::error::SyncError;

pub const BACKOFF_BASE: Duration = Duration::from_secs(5);
pub const BACKOFF_MAX: Duration = Duration::from_secs(15 * 60);

fn state_key(organization_id: &str) -> String {
    format!("backoff/{}", organization_id)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackoffState {
    pub consecutive_failures: u32,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

pub struct Backoff {
    store: Arc<LocalCacheStore>,
    base: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(store: Arc<LocalCacheStore>, base: Duration, max: Duration) -> Self {
        Self { store, base, max }
    }

    /// Delay after `failures` consecutive failures: base, 2x base, 4x base...
    /// capped at the maximum.
    pub fn delay_for(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(failures - 1);
        self.base.saturating_mul(factor).min(self.max)
    }

    pub fn state(&self, organization_id: &str) -> Result<BackoffState, SyncError> {
        Ok(self
            .store
            .get_state(&state_key(organization_id))?
            .unwrap_or_default())
    }

    /// `Err(BackingOff)` while the organization is inside its backoff window.
    pub fn check(&self, organization_id: &str, now: DateTime<Utc>) -> Result<(), SyncError> {
        let state = self.state(organization_id)?;
        match state.next_attempt_at {
            Some(next_attempt_at) if next_attempt_at > now => Err(SyncError::BackingOff {
                failures: state.consecutive_failures,
                next_attempt_at,
            }),
            _ => Ok(()),
        }
    }

    pub fn record_failure(&self, organization_id: &str, error: &str) -> Result<BackoffState, SyncError> {
        let previous = self.state(organization_id)?;
        let failures = previous.consecutive_failures.saturating_add(1);
        let delay = self.delay_for(failures);
        let state = BackoffState {
            consecutive_failures: failures,
            next_attempt_at: chrono::Duration::from_std(delay)
                .ok()
                .map(|d| Utc::now() + d),
            last_error: Some(error.to_string()),
        };
        self.store.put_state(&state_key(organization_id), &state)?;
        tracing::warn!(
            org = organization_id,
            failures,
            delay_secs = delay.as_secs(),
            "sync failed, backing off"
        );
        Ok(state)
    }

    pub fn reset(&self, organization_id: &str) -> Result<(), SyncError> {
        self.store.delete_state(&state_key(organization_id))?;
        Ok(())
    }
}
