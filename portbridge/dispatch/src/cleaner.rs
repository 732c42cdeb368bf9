use crate::Transport;
use api::ChannelId;
use log::{debug, warn};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

static GLOBAL: Lazy<Arc<ResourceCleaner>> = Lazy::new(|| Arc::new(ResourceCleaner::new()));

/// Releases foreign channels when the objects that own them go away.
///
/// [`register`](ResourceCleaner::register) hands back a [`CleanupGuard`];
/// whoever owns the guard owns the registration, and dropping it delivers
/// exactly one `release_channel` to the transport. The owner keeps the guard
/// inside itself, so release happens once the owner is unreachable and
/// never while it can still be invoked.
#[derive(Debug, Default)]
pub struct ResourceCleaner {
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, ChannelId>>,
    released: AtomicU64,
}

impl ResourceCleaner {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cleaner used by factories unless told otherwise.
    pub fn global() -> Arc<ResourceCleaner> {
        Arc::clone(&GLOBAL)
    }

    pub fn register(self: &Arc<Self>, channel: ChannelId, transport: Arc<dyn Transport>) -> CleanupGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock_pending().insert(id, channel);
        debug!("Registered {} for cleanup (registration {})", channel, id);
        CleanupGuard {
            id,
            channel,
            transport,
            cleaner: Arc::clone(self),
        }
    }

    /// Registrations whose owner is still alive.
    pub fn pending(&self) -> usize {
        self.lock_pending().len()
    }

    pub fn is_pending(&self, channel: ChannelId) -> bool {
        self.lock_pending().values().any(|c| *c == channel)
    }

    /// Total release notifications delivered so far.
    pub fn released(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }

    fn fire(&self, id: u64, transport: &dyn Transport) {
        let Some(channel) = self.lock_pending().remove(&id) else {
            return;
        };
        self.released.fetch_add(1, Ordering::Relaxed);
        match transport.release_channel(channel) {
            Ok(()) => debug!("Released {}", channel),
            Err(e) => warn!("Failed to release {}, foreign resources may leak: {}", channel, e),
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<u64, ChannelId>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// One registration with a [`ResourceCleaner`]. Releases its channel on drop.
pub struct CleanupGuard {
    id: u64,
    channel: ChannelId,
    transport: Arc<dyn Transport>,
    cleaner: Arc<ResourceCleaner>,
}

impl CleanupGuard {
    pub fn channel(&self) -> ChannelId {
        self.channel
    }
}

impl std::fmt::Debug for CleanupGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupGuard")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .finish()
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        self.cleaner.fire(self.id, self.transport.as_ref());
    }
}
