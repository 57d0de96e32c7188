//! Backend reachability, confirmed by a real probe request rather than
//! trusted from interface state.

use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use veritas_core::Connectivity;

use crate::client::BackendClient;
use crate::events::ConnectivityEvent;

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
pub const PROBE_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_MIN_SYNC_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub struct NetworkService {
    client: BackendClient,
    probe_timeout: Duration,
    online: AtomicBool,
    /// Milliseconds since the epoch, 0 when never online.
    last_online_ms: AtomicI64,
    events: broadcast::Sender<ConnectivityEvent>,
}

impl NetworkService {
    /// Starts offline until the first probe succeeds.
    pub fn new(client: BackendClient, probe_timeout: Duration) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            client,
            probe_timeout,
            online: AtomicBool::new(false),
            last_online_ms: AtomicI64::new(0),
            events,
        }
    }

    /// Probe the backend and record the outcome.
    pub async fn check_connectivity(&self) -> bool {
        let reachable = self.client.health(self.probe_timeout).await;
        self.set_online(reachable);
        reachable
    }

    /// Record a connectivity state. Listeners hear only transitions.
    pub fn set_online(&self, online: bool) {
        if online {
            self.last_online_ms
                .store(Utc::now().timestamp_millis(), Ordering::SeqCst);
        }
        let was_online = self.online.swap(online, Ordering::SeqCst);
        if was_online == online {
            return;
        }
        let event = if online {
            tracing::info!(backend = %self.client.base_url(), "network connection detected");
            ConnectivityEvent::Online
        } else {
            tracing::info!(backend = %self.client.base_url(), "network connection lost");
            ConnectivityEvent::Offline
        };
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    pub fn last_online_time(&self) -> Option<DateTime<Utc>> {
        match self.last_online_ms.load(Ordering::SeqCst) {
            0 => None,
            ms => Utc.timestamp_millis_opt(ms).single(),
        }
    }

    /// Online/offline transitions. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent> {
        self.events.subscribe()
    }

    /// Probe immediately and then every `interval`.
    pub fn spawn_monitor(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                this.check_connectivity().await;
            }
        })
    }

    /// True once more than `min_interval` has passed since `last_sync`.
    pub fn should_sync(last_sync: DateTime<Utc>, min_interval: Duration) -> bool {
        let elapsed = Utc::now().signed_duration_since(last_sync);
        elapsed.num_milliseconds() > min_interval.as_millis() as i64
    }
}

impl Connectivity for NetworkService {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(base: &str) -> NetworkService {
        let client = BackendClient::new(base, None, Duration::from_secs(2)).unwrap();
        NetworkService::new(client, Duration::from_millis(500))
    }

    #[tokio::test]
    async fn test_probe_transitions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let network = service(&server.uri());
        let mut events = network.subscribe();
        assert!(!network.is_online());
        assert!(network.last_online_time().is_none());

        assert!(network.check_connectivity().await);
        assert_eq!(events.recv().await.unwrap(), ConnectivityEvent::Online);
        assert!(network.last_online_time().is_some());

        // Repeated success is not a transition.
        network.check_connectivity().await;
        assert!(events.try_recv().is_err());

        network.set_online(false);
        assert_eq!(events.recv().await.unwrap(), ConnectivityEvent::Offline);
    }

    #[tokio::test]
    async fn test_failed_probe_is_offline() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health/"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let network = service(&server.uri());
        network.set_online(true);
        assert!(!network.check_connectivity().await);
        assert!(!network.is_online());
    }

    #[test]
    fn test_should_sync() {
        let now = Utc::now();
        assert!(!NetworkService::should_sync(now, Duration::from_secs(10)));
        let old = now - chrono::Duration::seconds(11);
        assert!(NetworkService::should_sync(old, Duration::from_secs(10)));
        let recent = now - chrono::Duration::minutes(4);
        assert!(!NetworkService::should_sync(recent, DEFAULT_MIN_SYNC_INTERVAL));
    }
}
