//! Organization-scoped replace-sync of the local cache.
//!
//! Every public entry point returns a `SyncResult`; failures are reported,
//! counted towards backoff and broadcast as `SyncEvent::SyncError`.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use veritas_cache::LocalCacheStore;
use veritas_core::Connectivity;
use veritas_credentials::{CacheManager, ItemsUpdated};

use crate::backoff::{Backoff, BackoffState, BACKOFF_BASE, BACKOFF_MAX};
use crate::client::BackendClient;
use crate::error::SyncError;
use crate::events::{ConnectivityEvent, SyncEvent};
use crate::network::NetworkService;
use crate::version::{CacheVersionService, DEFAULT_STALE_AFTER};

const METADATA_KEY: &str = "sync_metadata";
const CURRENT_ORG_KEY: &str = "current_organization";

fn attempt_key(organization_id: &str) -> String {
    format!("sync_attempt/{}", organization_id)
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Minimum gap after the last attempt before an unforced sync of the
    /// same organization goes to the network again.
    pub cooldown: Duration,
    pub periodic_interval: Duration,
    /// Bound on a whole attempt: bundle fetch plus cache replacement.
    pub attempt_timeout: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// Age fallback used when cache-info is unreachable.
    pub stale_after: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(10),
            periodic_interval: Duration::from_secs(90),
            attempt_timeout: Duration::from_secs(60),
            backoff_base: BACKOFF_BASE,
            backoff_max: BACKOFF_MAX,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub success: bool,
    pub items_updated: ItemsUpdated,
    /// Nothing was fetched: cooldown active or cache already current.
    #[serde(default)]
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncResult {
    fn updated(items_updated: ItemsUpdated) -> Self {
        Self {
            success: true,
            items_updated,
            skipped: false,
            error: None,
        }
    }

    fn skipped() -> Self {
        Self {
            success: true,
            items_updated: ItemsUpdated::default(),
            skipped: true,
            error: None,
        }
    }

    fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            items_updated: ItemsUpdated::default(),
            skipped: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetadata {
    pub organization_id: String,
    pub last_sync_time: DateTime<Utc>,
    #[serde(default)]
    pub last_sync_version: Option<String>,
    #[serde(default)]
    pub last_items_updated: Option<ItemsUpdated>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A running attempt and whether it was forced.
type InFlight = (bool, Shared<BoxFuture<'static, SyncResult>>);

pub struct CacheSyncService {
    store: Arc<LocalCacheStore>,
    client: BackendClient,
    cache: Arc<CacheManager>,
    versions: CacheVersionService,
    backoff: Backoff,
    network: Arc<NetworkService>,
    options: SyncOptions,
    in_flight: DashMap<String, InFlight>,
    queue: Mutex<BTreeSet<String>>,
    periodic: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<SyncEvent>,
}

impl CacheSyncService {
    pub fn new(
        store: Arc<LocalCacheStore>,
        client: BackendClient,
        cache: Arc<CacheManager>,
        network: Arc<NetworkService>,
        options: SyncOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            versions: CacheVersionService::new(store.clone(), client.clone(), options.stale_after),
            backoff: Backoff::new(store.clone(), options.backoff_base, options.backoff_max),
            store,
            client,
            cache,
            network,
            options,
            in_flight: DashMap::new(),
            queue: Mutex::new(BTreeSet::new()),
            periodic: Mutex::new(None),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn versions(&self) -> &CacheVersionService {
        &self.versions
    }

    pub fn network(&self) -> &Arc<NetworkService> {
        &self.network
    }

    pub fn backoff_state(&self, organization_id: &str) -> Result<BackoffState, SyncError> {
        self.backoff.state(organization_id)
    }

    /// Sync one organization. Concurrent calls for the same organization
    /// share a single attempt. A forced call that joined an unforced
    /// attempt which fetched nothing runs its own attempt afterwards.
    pub async fn sync_organization(self: &Arc<Self>, organization_id: &str, force: bool) -> SyncResult {
        loop {
            let (joined_unforced, attempt) = match self.in_flight.entry(organization_id.to_string()) {
                Entry::Occupied(existing) => {
                    tracing::debug!(org = organization_id, "joining in-flight sync");
                    let (forced, attempt) = existing.get().clone();
                    (force && !forced, attempt)
                }
                Entry::Vacant(slot) => {
                    let this = self.clone();
                    let org = organization_id.to_string();
                    let attempt = async move {
                        let result = this.attempt(&org, force).await;
                        this.in_flight.remove(&org);
                        result
                    }
                    .boxed()
                    .shared();
                    slot.insert((force, attempt.clone()));
                    (false, attempt)
                }
            };
            let result = attempt.await;
            if joined_unforced && (result.skipped || !result.success) {
                tracing::debug!(org = organization_id, "joined attempt was gated, forcing");
                continue;
            }
            return result;
        }
    }

    /// Bypasses cooldown, backoff and the version check.
    pub async fn force_sync(self: &Arc<Self>, organization_id: &str) -> SyncResult {
        self.sync_organization(organization_id, true).await
    }

    pub async fn force_sync_current(self: &Arc<Self>) -> SyncResult {
        match self.current_organization() {
            Some(org) => self.force_sync(&org).await,
            None => SyncResult::failure("No current organization found"),
        }
    }

    async fn attempt(&self, organization_id: &str, force: bool) -> SyncResult {
        if !self.network.is_online() {
            return SyncResult::failure(SyncError::Offline.to_string());
        }

        if !force {
            if let Err(e) = self.backoff.check(organization_id, Utc::now()) {
                tracing::debug!(org = organization_id, error = %e, "sync deferred");
                return SyncResult::failure(e.to_string());
            }
            let last = self
                .get_sync_metadata(organization_id)
                .map(|meta| meta.last_sync_time)
                .into_iter()
                .chain(self.last_attempt(organization_id))
                .max();
            if let Some(last) = last {
                if !NetworkService::should_sync(last, self.options.cooldown) {
                    tracing::debug!(org = organization_id, "sync skipped, cooldown active");
                    return SyncResult::skipped();
                }
            }
        }
        self.record_attempt(organization_id);
        if !force && !self.versions.needs_sync(organization_id).await {
            return SyncResult::skipped();
        }

        let timeout = self.options.attempt_timeout;
        let outcome = match tokio::time::timeout(timeout, self.fetch_and_apply(organization_id)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(SyncError::Timeout(timeout.as_millis() as u64)),
        };

        match outcome {
            Ok((items, version)) => {
                if let Err(e) = self.backoff.reset(organization_id) {
                    tracing::warn!(org = organization_id, error = %e, "failed to reset backoff");
                }
                self.record_sync_metadata(organization_id, items, Some(version));
                tracing::info!(org = organization_id, items = items.total(), forced = force, "sync complete");
                let _ = self.events.send(SyncEvent::SyncComplete {
                    organization_id: organization_id.to_string(),
                    items_updated: items,
                    timestamp: Utc::now(),
                });
                SyncResult::updated(items)
            }
            Err(e) => {
                if e.is_attempt_failure() {
                    if let Err(store_err) = self.backoff.record_failure(organization_id, &e.to_string()) {
                        tracing::warn!(org = organization_id, error = %store_err, "failed to persist backoff");
                    }
                }
                tracing::error!(org = organization_id, error = %e, "sync failed");
                let _ = self.events.send(SyncEvent::SyncError {
                    organization_id: organization_id.to_string(),
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
                SyncResult::failure(e.to_string())
            }
        }
    }

    async fn fetch_and_apply(&self, organization_id: &str) -> Result<(ItemsUpdated, String), SyncError> {
        let bundle = self.client.fetch_bundle(organization_id).await?;
        let items = self
            .cache
            .sync_from_server(bundle.clone(), organization_id)
            .await?;
        let version = self.versions.update_local_version(organization_id, &bundle)?;
        Ok((items, version.content_hash()))
    }

    /// Queue an organization; processed right away when online.
    pub fn queue_sync(self: &Arc<Self>, organization_id: &str) {
        lock(&self.queue).insert(organization_id.to_string());
        if self.network.is_online() {
            let this = self.clone();
            tokio::spawn(async move {
                this.process_queue().await;
            });
        }
    }

    pub fn queued(&self) -> Vec<String> {
        lock(&self.queue).iter().cloned().collect()
    }

    /// Sync every queued organization. Failures go back on the queue.
    pub async fn process_queue(self: &Arc<Self>) -> usize {
        let pending: Vec<String> = std::mem::take(&mut *lock(&self.queue)).into_iter().collect();
        let mut synced = 0;
        for org in pending {
            let result = self.sync_organization(&org, false).await;
            if result.success {
                synced += 1;
            } else {
                tracing::warn!(org = %org, error = ?result.error, "queued sync failed, re-queued");
                lock(&self.queue).insert(org);
            }
        }
        synced
    }

    /// Force-sync the current organization, start periodic syncing and
    /// drain the queue.
    pub async fn on_online(self: &Arc<Self>) {
        self.start_periodic_sync();
        if let Some(org) = self.current_organization() {
            let result = self.force_sync(&org).await;
            if !result.success {
                tracing::warn!(org = %org, error = ?result.error, "reconnect sync failed");
            }
        }
        self.process_queue().await;
    }

    pub fn on_offline(&self) {
        self.stop_periodic_sync();
    }

    /// React to connectivity transitions for as long as the network
    /// service lives.
    pub fn watch_network(self: &Arc<Self>) -> JoinHandle<()> {
        let this = self.clone();
        let mut events = self.network.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(ConnectivityEvent::Online) => this.on_online().await,
                    Ok(ConnectivityEvent::Offline) => this.on_offline(),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(missed = n, "connectivity receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    pub fn start_periodic_sync(self: &Arc<Self>) {
        let mut periodic = lock(&self.periodic);
        if periodic.is_some() {
            return;
        }
        let this = self.clone();
        let interval = self.options.periodic_interval;
        *periodic = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if this.network.is_online() {
                    this.sync_all_organizations().await;
                }
            }
        }));
        tracing::debug!(interval_secs = interval.as_secs(), "periodic sync started");
    }

    pub fn stop_periodic_sync(&self) {
        if let Some(handle) = lock(&self.periodic).take() {
            handle.abort();
            tracing::debug!("periodic sync stopped");
        }
    }

    pub fn is_periodic_running(&self) -> bool {
        lock(&self.periodic).is_some()
    }

    /// The current organization plus every organization synced before.
    pub async fn sync_all_organizations(self: &Arc<Self>) -> Vec<(String, SyncResult)> {
        let mut orgs: BTreeSet<String> = self.all_metadata().into_keys().collect();
        if let Some(current) = self.current_organization() {
            orgs.insert(current);
        }
        let mut results = Vec::new();
        for org in orgs {
            let result = self.sync_organization(&org, false).await;
            results.push((org, result));
        }
        results
    }

    pub fn set_current_organization(&self, organization_id: &str) {
        if let Err(e) = self.store.put_state(CURRENT_ORG_KEY, &organization_id) {
            tracing::warn!(org = organization_id, error = %e, "failed to persist current organization");
        }
    }

    pub fn current_organization(&self) -> Option<String> {
        self.store
            .get_state::<String>(CURRENT_ORG_KEY)
            .ok()
            .flatten()
            .filter(|org| !org.is_empty())
    }

    fn last_attempt(&self, organization_id: &str) -> Option<DateTime<Utc>> {
        self.store
            .get_state(&attempt_key(organization_id))
            .unwrap_or_else(|e| {
                tracing::warn!(org = organization_id, error = %e, "failed to load last attempt time");
                None
            })
    }

    fn record_attempt(&self, organization_id: &str) {
        if let Err(e) = self.store.put_state(&attempt_key(organization_id), &Utc::now()) {
            tracing::warn!(org = organization_id, error = %e, "failed to persist attempt time");
        }
    }

    /// Drop an organization's records together with its version, metadata,
    /// backoff and attempt state, so the next sync refetches everything.
    pub fn clear_organization(&self, organization_id: &str) -> Result<(), SyncError> {
        self.cache.clear_organization(organization_id)?;
        self.versions.clear_local_version(organization_id)?;
        self.backoff.reset(organization_id)?;
        self.store.delete_state(&attempt_key(organization_id))?;
        self.clear_sync_metadata(organization_id);
        Ok(())
    }

    fn all_metadata(&self) -> BTreeMap<String, SyncMetadata> {
        match self.store.get_state(METADATA_KEY) {
            Ok(map) => map.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to load sync metadata");
                BTreeMap::new()
            }
        }
    }

    pub fn get_sync_metadata(&self, organization_id: &str) -> Option<SyncMetadata> {
        self.all_metadata().remove(organization_id)
    }

    pub fn clear_sync_metadata(&self, organization_id: &str) {
        let mut all = self.all_metadata();
        if all.remove(organization_id).is_some() {
            if let Err(e) = self.store.put_state(METADATA_KEY, &all) {
                tracing::warn!(org = organization_id, error = %e, "failed to save sync metadata");
            }
        }
    }

    fn record_sync_metadata(&self, organization_id: &str, items: ItemsUpdated, version: Option<String>) {
        let mut all = self.all_metadata();
        all.insert(
            organization_id.to_string(),
            SyncMetadata {
                organization_id: organization_id.to_string(),
                last_sync_time: Utc::now(),
                last_sync_version: version,
                last_items_updated: Some(items),
            },
        );
        if let Err(e) = self.store.put_state(METADATA_KEY, &all) {
            tracing::warn!(org = organization_id, error = %e, "failed to save sync metadata");
        }
    }
}
