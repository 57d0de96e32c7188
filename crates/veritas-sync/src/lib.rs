//! Veritas Sync — keeps the local cache aligned with the organization
//! backend: reachability probing, change detection, replace-sync with
//! single-flight and durable backoff, and a background scheduler.

pub mod background;
pub mod backoff;
pub mod client;
pub mod error;
pub mod events;
pub mod network;
pub mod service;
pub mod version;

pub use background::{BackgroundSyncOptions, BackgroundSyncService, BackgroundSyncStatus, SyncRequest};
pub use backoff::{Backoff, BackoffState};
pub use client::{BackendClient, ServerCacheInfo};
pub use error::SyncError;
pub use events::{ConnectivityEvent, SyncEvent};
pub use network::NetworkService;
pub use service::{CacheSyncService, SyncMetadata, SyncOptions, SyncResult};
pub use version::{CacheVersion, CacheVersionService, VersionStatus};
