//! Background sync worker.
//!
//! A single task owns the schedule. Callers talk to it through
//! [`SyncRequest`] messages, the same way the node's API talks to the node
//! loop. Sync runs are spawned so that status queries never wait behind a
//! slow backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};

use crate::error::SyncError;
use crate::events::SyncEvent;
use crate::service::{CacheSyncService, SyncResult};

const RETRY_BASE_DELAY: Duration = Duration::from_secs(2);

fn default_interval_minutes() -> u64 {
    10
}
fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundSyncOptions {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    /// Extra attempts after a failed triggered or scheduled run.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub organization_id: Option<String>,
}

impl Default for BackgroundSyncOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_minutes: default_interval_minutes(),
            max_retries: default_max_retries(),
            organization_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundSyncStatus {
    pub running: bool,
    pub options: BackgroundSyncOptions,
    pub runs: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub last_result: Option<SyncResult>,
}

/// A message to the background worker.
pub enum SyncRequest {
    Configure(BackgroundSyncOptions),
    Start {
        organization_id: String,
        interval_minutes: Option<u64>,
    },
    Stop,
    /// Run a forced sync now, outside the schedule.
    Trigger {
        organization_id: Option<String>,
        reply: oneshot::Sender<SyncResult>,
    },
    GetStatus {
        reply: oneshot::Sender<BackgroundSyncStatus>,
    },
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn backing_off(sync: &CacheSyncService, organization_id: &str) -> bool {
    sync.backoff_state(organization_id)
        .ok()
        .and_then(|state| state.next_attempt_at)
        .is_some_and(|next| next > Utc::now())
}

/// Sync with up to `max_retries` further attempts, doubling the delay
/// between them. Unforced runs stop retrying once the organization is
/// backing off.
async fn run_with_retries(
    sync: &Arc<CacheSyncService>,
    organization_id: &str,
    max_retries: u32,
    force: bool,
) -> SyncResult {
    let mut result = sync.sync_organization(organization_id, force).await;
    for attempt in 0..max_retries {
        if result.success {
            break;
        }
        if !force && backing_off(sync, organization_id) {
            tracing::debug!(org = organization_id, "background sync backing off, not retrying");
            break;
        }
        let delay = RETRY_BASE_DELAY.saturating_mul(2u32.saturating_pow(attempt));
        tracing::warn!(
            org = organization_id,
            attempt = attempt + 1,
            max_retries,
            error = ?result.error,
            "background sync failed, retrying in {delay:?}"
        );
        tokio::time::sleep(delay).await;
        result = sync.sync_organization(organization_id, force).await;
    }
    result
}

struct Worker {
    sync: Arc<CacheSyncService>,
    status: Arc<Mutex<BackgroundSyncStatus>>,
    ticker: Option<Interval>,
}

impl Worker {
    fn options(&self) -> BackgroundSyncOptions {
        lock(&self.status).options.clone()
    }

    fn schedule(&mut self, interval_minutes: u64) {
        let period = Duration::from_secs(interval_minutes.max(1) * 60);
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
        lock(&self.status).running = true;
        tracing::info!(interval_minutes, "background sync scheduled");
    }

    fn unschedule(&mut self) {
        if self.ticker.take().is_some() {
            tracing::info!("background sync stopped");
        }
        lock(&self.status).running = false;
    }

    fn organization(&self, requested: Option<String>) -> Option<String> {
        requested
            .or_else(|| self.options().organization_id)
            .or_else(|| self.sync.current_organization())
    }

    /// Scheduled runs are unforced so they respect cooldown and backoff.
    fn on_tick(&self) {
        let org = self.organization(None);
        self.spawn_run(org, None, false);
    }

    fn spawn_run(
        &self,
        organization_id: Option<String>,
        reply: Option<oneshot::Sender<SyncResult>>,
        force: bool,
    ) {
        let sync = self.sync.clone();
        let status = self.status.clone();
        let max_retries = self.options().max_retries;
        tokio::spawn(async move {
            let result = match organization_id {
                Some(org) => run_with_retries(&sync, &org, max_retries, force).await,
                None => SyncResult {
                    success: false,
                    items_updated: Default::default(),
                    skipped: false,
                    error: Some("No current organization found".into()),
                },
            };
            {
                let mut status = lock(&status);
                status.runs += 1;
                status.last_run = Some(Utc::now());
                status.last_result = Some(result.clone());
            }
            if let Some(reply) = reply {
                let _ = reply.send(result);
            }
        });
    }

    fn handle(&mut self, request: SyncRequest) {
        match request {
            SyncRequest::Configure(options) => {
                let enabled = options.enabled;
                let interval = options.interval_minutes;
                if let Some(org) = &options.organization_id {
                    self.sync.set_current_organization(org);
                }
                lock(&self.status).options = options;
                if enabled {
                    self.schedule(interval);
                } else {
                    self.unschedule();
                }
            }
            SyncRequest::Start {
                organization_id,
                interval_minutes,
            } => {
                self.sync.set_current_organization(&organization_id);
                let interval = {
                    let mut status = lock(&self.status);
                    status.options.enabled = true;
                    status.options.organization_id = Some(organization_id.clone());
                    if let Some(minutes) = interval_minutes {
                        status.options.interval_minutes = minutes;
                    }
                    status.options.interval_minutes
                };
                self.schedule(interval);
                self.spawn_run(Some(organization_id), None, false);
            }
            SyncRequest::Stop => {
                lock(&self.status).options.enabled = false;
                self.unschedule();
            }
            SyncRequest::Trigger {
                organization_id,
                reply,
            } => {
                let org = self.organization(organization_id);
                self.spawn_run(org, Some(reply), true);
            }
            SyncRequest::GetStatus { reply } => {
                let _ = reply.send(lock(&self.status).clone());
            }
        }
    }

    async fn run(mut self, mut requests: mpsc::Receiver<SyncRequest>) {
        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    Some(request) => self.handle(request),
                    None => {
                        tracing::debug!("background sync channel closed, worker exiting");
                        break;
                    }
                },
                _ = next_tick(&mut self.ticker) => self.on_tick(),
            }
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Handle to the background worker. Dropping it stops the worker.
pub struct BackgroundSyncService {
    requests: mpsc::Sender<SyncRequest>,
    sync: Arc<CacheSyncService>,
    worker: JoinHandle<()>,
}

impl BackgroundSyncService {
    pub fn spawn(sync: Arc<CacheSyncService>, options: BackgroundSyncOptions) -> Self {
        let (requests, rx) = mpsc::channel(32);
        let mut worker = Worker {
            sync: sync.clone(),
            status: Arc::new(Mutex::new(BackgroundSyncStatus::default())),
            ticker: None,
        };
        worker.handle(SyncRequest::Configure(options));
        let worker = tokio::spawn(worker.run(rx));
        Self {
            requests,
            sync,
            worker,
        }
    }

    async fn send(&self, request: SyncRequest) -> Result<(), SyncError> {
        self.requests
            .send(request)
            .await
            .map_err(|_| SyncError::WorkerStopped)
    }

    pub async fn configure(&self, options: BackgroundSyncOptions) -> Result<(), SyncError> {
        self.send(SyncRequest::Configure(options)).await
    }

    /// Schedule periodic syncs of `organization_id` and run one right away.
    pub async fn start(&self, organization_id: &str, interval_minutes: Option<u64>) -> Result<(), SyncError> {
        self.send(SyncRequest::Start {
            organization_id: organization_id.to_string(),
            interval_minutes,
        })
        .await
    }

    pub async fn stop(&self) -> Result<(), SyncError> {
        self.send(SyncRequest::Stop).await
    }

    pub async fn trigger(&self, organization_id: Option<&str>) -> Result<SyncResult, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.send(SyncRequest::Trigger {
            organization_id: organization_id.map(str::to_string),
            reply,
        })
        .await?;
        rx.await.map_err(|_| SyncError::WorkerStopped)
    }

    pub async fn get_status(&self) -> Result<BackgroundSyncStatus, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.send(SyncRequest::GetStatus { reply }).await?;
        rx.await.map_err(|_| SyncError::WorkerStopped)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sync.subscribe()
    }
}

impl Drop for BackgroundSyncService {
    fn drop(&mut self) {
        self.worker.abort();
    }
}
