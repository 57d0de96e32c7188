//! Online/offline signal consumed by the resolvers and the sync engine.

use std::sync::atomic::{AtomicBool, Ordering};

/// Reports whether the process currently believes it can reach the network.
///
/// Implementations must be cheap to call; resolvers consult this on every
/// cache miss to decide between a network fetch and an offline failure.
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

/// A connectivity flag set explicitly by the caller.
#[derive(Debug, Default)]
pub struct FixedConnectivity {
    online: AtomicBool,
}

impl FixedConnectivity {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn online() -> Self {
        Self::new(true)
    }

    pub fn offline() -> Self {
        Self::new(false)
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl Connectivity for FixedConnectivity {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}
