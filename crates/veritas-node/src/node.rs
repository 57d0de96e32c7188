//! The offline verifier node orchestrator.
//!
//! Wires one cache store, one connectivity probe, the verifiers and the sync
//! services together. The HTTP API talks to the main loop through
//! [`NodeCommand`]s; verification and sync work is spawned so one slow
//! request never holds up another.

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use veritas_cache::{Category, LocalCacheStore};
use veritas_core::constants::{
    ERROR_CODE_OFFLINE_DEPENDENCIES_MISSING, ERROR_CODE_VERIFICATION_TIMEOUT,
    ERROR_MESSAGE_OFFLINE_DEPENDENCIES_MISSING, ERROR_MESSAGE_VERIFICATION_TIMEOUT,
};
use veritas_core::{Connectivity, PresentationVerificationResult};
use veritas_credentials::{
    CacheManager, CredentialsVerifier, LdpValidator, LdpVerifier, PresentationOptions,
    PresentationVerifier, RevocationChecker, StatusListLoader,
};
use veritas_identity::{HttpFetcher, OfflineDocumentLoader, PublicKeyService, ResolverRegistry};
use veritas_sync::{BackendClient, BackgroundSyncService, CacheSyncService, NetworkService, SyncEvent};

use crate::commands::{CacheCounts, NodeCommand, StatusResponse, SyncStatusResponse};
use crate::config::OfflineVerifierConfig;
use crate::state::NodeState;

/// Everything a command handler needs, cheap to clone into a task.
#[derive(Clone)]
struct Services {
    config: Arc<OfflineVerifierConfig>,
    network: Arc<NetworkService>,
    credentials: Arc<CredentialsVerifier>,
    presentations: Arc<PresentationVerifier>,
    cache: Arc<CacheManager>,
    sync: Arc<CacheSyncService>,
    background: Arc<BackgroundSyncService>,
    start_time: Instant,
}

pub struct OfflineVerifierNode {
    config: Arc<OfflineVerifierConfig>,
    network: Arc<NetworkService>,
    credentials: Arc<CredentialsVerifier>,
    presentations: Arc<PresentationVerifier>,
    cache: Arc<CacheManager>,
    sync: Arc<CacheSyncService>,
    /// Spawned in `start`, needs a runtime.
    background: Option<Arc<BackgroundSyncService>>,
    tasks: Vec<JoinHandle<()>>,
    node_state: Option<Arc<NodeState>>,
    command_rx: Option<mpsc::Receiver<NodeCommand>>,
    api_addr: Option<SocketAddr>,
}

impl OfflineVerifierNode {
    /// Open the cache and build the service graph. Touches no network.
    pub fn new(config: OfflineVerifierConfig) -> Result<Self> {
        let store = Arc::new(LocalCacheStore::open(&config.storage.data_dir)?);
        tracing::info!(path = %config.storage.data_dir.display(), "cache store opened");

        let client = BackendClient::new(
            &config.backend.url,
            config.backend.token.clone(),
            Duration::from_secs(config.backend.request_timeout_secs),
        )?;
        let network = Arc::new(NetworkService::new(
            client.clone(),
            Duration::from_secs(config.network.probe_timeout_secs),
        ));
        let connectivity: Arc<dyn Connectivity> = network.clone();

        let fetcher = HttpFetcher::new(Duration::from_millis(config.verification.http_timeout_ms))?;
        let registry = Arc::new(ResolverRegistry::with_defaults(fetcher.clone()));
        let keys = Arc::new(PublicKeyService::new(store.clone(), registry, connectivity.clone()));
        let loader = Arc::new(OfflineDocumentLoader::new(
            store.clone(),
            fetcher.clone(),
            connectivity.clone(),
        ));
        let ldp = Arc::new(LdpVerifier::new(keys.clone(), loader));
        let revocation = Arc::new(RevocationChecker::new(
            store.clone(),
            StatusListLoader::new(store.clone(), fetcher.clone(), connectivity.clone()),
            ldp.clone(),
            LdpValidator::new(config.verification.date_tolerance_ms),
            config.verification.status_list_min_bits,
        ));
        let credentials = Arc::new(CredentialsVerifier::new(
            ldp.clone(),
            revocation,
            config.verification.clone(),
        ));
        let presentations = Arc::new(PresentationVerifier::new(ldp, credentials.clone()));
        let cache = Arc::new(CacheManager::new(store.clone(), keys, fetcher, connectivity));
        let sync = Arc::new(CacheSyncService::new(
            store,
            client,
            cache.clone(),
            network.clone(),
            config.sync_options(),
        ));
        if let Some(org) = &config.sync.organization_id {
            sync.set_current_organization(org);
        }

        tracing::info!(
            backend = %config.backend.url,
            org = ?config.sync.organization_id,
            offline = config.network.offline,
            "offline verifier node created"
        );

        Ok(Self {
            config: Arc::new(config),
            network,
            credentials,
            presentations,
            cache,
            sync,
            background: None,
            tasks: Vec::new(),
            node_state: None,
            command_rx: None,
            api_addr: None,
        })
    }

    /// Start connectivity monitoring, background sync and the HTTP API.
    pub async fn start(&mut self) -> Result<()> {
        tracing::info!("starting offline verifier node");

        if self.config.network.offline {
            tracing::warn!("offline mode: backend probing and sync disabled");
        } else {
            // Subscribe before the first probe so its transition is seen.
            self.tasks.push(self.sync.watch_network());
            self.tasks.push(
                self.network
                    .spawn_monitor(Duration::from_secs(self.config.network.probe_interval_secs)),
            );
        }

        self.background = Some(Arc::new(BackgroundSyncService::spawn(
            self.sync.clone(),
            self.config.background_options(),
        )));

        let (command_tx, command_rx) = mpsc::channel::<NodeCommand>(256);
        let node_state = Arc::new(NodeState::new(command_tx));

        let listener = tokio::net::TcpListener::bind(self.config.api_addr()).await?;
        let api_addr = listener.local_addr()?;
        let api_state = node_state.clone();
        self.tasks.push(tokio::spawn(async move {
            if let Err(e) = crate::api::serve(listener, api_state).await {
                tracing::error!(error = %e, "HTTP API server error");
            }
        }));
        tracing::info!(%api_addr, "HTTP API server started");

        self.node_state = Some(node_state);
        self.command_rx = Some(command_rx);
        self.api_addr = Some(api_addr);
        Ok(())
    }

    /// Run the main loop: API commands and sync events.
    pub async fn run(&mut self) -> Result<()> {
        let mut command_rx = self
            .command_rx
            .take()
            .ok_or_else(|| anyhow::anyhow!("node not started"))?;
        let services = self.services()?;
        let mut sync_events = self.sync.subscribe();

        tracing::info!("entering main event loop");

        loop {
            tokio::select! {
                event = sync_events.recv() => {
                    match event {
                        Ok(ev) => Self::handle_sync_event(&ev),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(missed = n, "sync event receiver lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            tracing::info!("sync event channel closed");
                            break;
                        }
                    }
                }
                cmd = command_rx.recv() => {
                    match cmd {
                        Some(c) => Self::handle_api_command(c, &services),
                        None => {
                            tracing::info!("API command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Gracefully shut down the node.
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("shutting down offline verifier node");

        if let Some(background) = self.background.take() {
            if let Err(e) = background.stop().await {
                tracing::debug!(error = %e, "background sync already stopped");
            }
        }
        self.sync.stop_periodic_sync();
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.node_state = None;

        tracing::info!("offline verifier node shut down");
        Ok(())
    }

    /// Address the API is bound to, once started.
    pub fn api_addr(&self) -> Option<SocketAddr> {
        self.api_addr
    }

    pub fn command_sender(&self) -> Option<mpsc::Sender<NodeCommand>> {
        self.node_state.as_ref().map(|s| s.command_tx.clone())
    }

    pub fn sync_service(&self) -> &Arc<CacheSyncService> {
        &self.sync
    }

    fn services(&self) -> Result<Services> {
        let background = self
            .background
            .clone()
            .ok_or_else(|| anyhow::anyhow!("node not started"))?;
        let start_time = self
            .node_state
            .as_ref()
            .map(|s| s.start_time)
            .ok_or_else(|| anyhow::anyhow!("node not started"))?;
        Ok(Services {
            config: self.config.clone(),
            network: self.network.clone(),
            credentials: self.credentials.clone(),
            presentations: self.presentations.clone(),
            cache: self.cache.clone(),
            sync: self.sync.clone(),
            background,
            start_time,
        })
    }

    fn handle_sync_event(event: &SyncEvent) {
        match event {
            SyncEvent::SyncComplete {
                organization_id,
                items_updated,
                timestamp,
            } => {
                tracing::info!(
                    org = %organization_id,
                    public_keys = items_updated.public_keys,
                    contexts = items_updated.contexts,
                    revoked_vcs = items_updated.revoked_vcs,
                    status_lists = items_updated.status_lists,
                    %timestamp,
                    "cache sync complete"
                );
            }
            SyncEvent::SyncError {
                organization_id,
                error,
                timestamp,
            } => {
                tracing::warn!(org = %organization_id, %error, %timestamp, "cache sync failed");
            }
        }
    }

    /// Handle a command from the HTTP API on its own task.
    fn handle_api_command(cmd: NodeCommand, services: &Services) {
        let s = services.clone();
        tokio::spawn(async move {
            match cmd {
                NodeCommand::Verify {
                    credential,
                    format,
                    reply,
                } => {
                    let result = s.credentials.verify(&credential, format).await;
                    let _ = reply.send(Ok(result));
                }
                NodeCommand::VerifyPresentation {
                    presentation,
                    options,
                    reply,
                } => {
                    let _ = reply.send(verify_presentation(&s, &presentation, &options).await);
                }
                NodeCommand::Sync {
                    organization_id,
                    force,
                    reply,
                } => {
                    let result = match organization_id.or_else(|| s.sync.current_organization()) {
                        Some(org) => Ok(s.sync.sync_organization(&org, force).await),
                        None => Err("no organization configured".to_string()),
                    };
                    let _ = reply.send(result);
                }
                NodeCommand::SyncStatus {
                    organization_id,
                    reply,
                } => {
                    let _ = reply.send(sync_status(&s, organization_id).await);
                }
                NodeCommand::PrimeCache { bundle, reply } => {
                    let result = s
                        .cache
                        .prime_from_server(bundle)
                        .await
                        .map_err(|e| format!("cache priming failed: {}", e));
                    let _ = reply.send(result);
                }
                NodeCommand::PrimeFromCredential { credential, reply } => {
                    let result = s
                        .cache
                        .prime_from_vc(&credential)
                        .await
                        .map_err(|e| format!("cache priming failed: {}", e));
                    let _ = reply.send(result);
                }
                NodeCommand::ClearCache {
                    organization_id,
                    reply,
                } => {
                    let result = match organization_id {
                        Some(org) => s.sync.clear_organization(&org).map_err(|e| e.to_string()),
                        None => s.cache.clear_all().map_err(|e| e.to_string()),
                    };
                    let _ = reply.send(result.map_err(|e| format!("cache clear failed: {}", e)));
                }
                NodeCommand::Status { reply } => {
                    let _ = reply.send(status(&s));
                }
            }
        });
    }
}

async fn verify_presentation(
    s: &Services,
    presentation: &str,
    options: &PresentationOptions,
) -> Result<PresentationVerificationResult, String> {
    let timeout = Duration::from_millis(s.config.verification.verify_timeout_ms);
    match tokio::time::timeout(timeout, s.presentations.verify(presentation, options)).await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e)) if e.is_offline() => Err(format!(
            "{}: {}",
            ERROR_CODE_OFFLINE_DEPENDENCIES_MISSING, ERROR_MESSAGE_OFFLINE_DEPENDENCIES_MISSING
        )),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => {
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "presentation verification timed out");
            Err(format!(
                "{}: {}",
                ERROR_CODE_VERIFICATION_TIMEOUT, ERROR_MESSAGE_VERIFICATION_TIMEOUT
            ))
        }
    }
}

async fn sync_status(s: &Services, organization_id: Option<String>) -> Result<SyncStatusResponse, String> {
    let org = organization_id
        .or_else(|| s.sync.current_organization())
        .ok_or_else(|| "no organization configured".to_string())?;
    let backoff = s
        .sync
        .backoff_state(&org)
        .map_err(|e| format!("failed to read backoff state: {}", e))?;
    Ok(SyncStatusResponse {
        metadata: s.sync.get_sync_metadata(&org),
        version: s.sync.versions().get_sync_status(&org),
        backoff,
        background: s.background.get_status().await.ok(),
        organization_id: org,
    })
}

fn status(s: &Services) -> Result<StatusResponse, String> {
    let mut cache = CacheCounts::default();
    let counts = s
        .cache
        .counts()
        .map_err(|e| format!("failed to count cache records: {}", e))?;
    for (category, n) in counts {
        match category {
            Category::PublicKeys => cache.public_keys = n,
            Category::Contexts => cache.contexts = n,
            Category::RevokedVcs => cache.revoked_vcs = n,
            Category::StatusLists => cache.status_lists = n,
        }
    }
    Ok(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        online: s.network.is_online(),
        offline_mode: s.config.network.offline,
        last_online_time: s.network.last_online_time().map(|t| t.to_rfc3339()),
        organization_id: s.sync.current_organization(),
        uptime_secs: s.start_time.elapsed().as_secs(),
        cache,
    })
}
