use std::{
    collections::HashMap,
    sync::{atomic::AtomicU64, Arc, Mutex, OnceLock},
    time::Duration,
};

use orbit_core::PlanetId;
use tokio::sync::{broadcast, RwLock};

use super::{cache::FlattenCache, invalidation::InvalidationTracker, store::PlanetData};

pub const DEFAULT_JSON_BODY_LIMIT_BYTES: usize = 65_536;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_NOTIFICATION_BUFFER: usize = 1024;
pub(crate) const METRICS_TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub(crate) static METRICS_STATE: OnceLock<MetricsState> = OnceLock::new();

#[derive(Default)]
pub(crate) struct MetricsState {
    pub(crate) permission_checks: Mutex<HashMap<&'static str, u64>>,
    pub(crate) flatten_computations: AtomicU64,
    pub(crate) flatten_cache_hits: AtomicU64,
    pub(crate) cache_evictions: Mutex<HashMap<&'static str, u64>>,
    pub(crate) notifications: Mutex<HashMap<String, u64>>,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub max_body_bytes: usize,
    pub request_timeout: Duration,
    /// Capacity of the outbound change-notification channel.
    pub notification_buffer: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_JSON_BODY_LIMIT_BYTES,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            notification_buffer: DEFAULT_NOTIFICATION_BUFFER,
        }
    }
}

/// One resident planet. Writers to `data` are serialized per planet; the
/// cache and tracker are only touched while `data` is locked.
pub(crate) struct PlanetHandle {
    pub(crate) data: RwLock<PlanetData>,
    pub(crate) cache: FlattenCache,
    pub(crate) tracker: Mutex<InvalidationTracker>,
}

impl PlanetHandle {
    pub(crate) fn new(data: PlanetData) -> Self {
        let tracker = InvalidationTracker::seeded(&data);
        Self {
            data: RwLock::new(data),
            cache: FlattenCache::default(),
            tracker: Mutex::new(tracker),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub(crate) planets: Arc<RwLock<HashMap<PlanetId, Arc<PlanetHandle>>>>,
    pub(crate) notifications: broadcast::Sender<String>,
}

impl AppState {
    #[must_use]
    pub fn new(config: &AppConfig) -> Self {
        let (notifications, _) = broadcast::channel(config.notification_buffer.max(1));
        Self {
            planets: Arc::new(RwLock::new(HashMap::new())),
            notifications,
        }
    }

    /// Encoded change-notification envelopes, for the realtime fan-out layer.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.notifications.subscribe()
    }
}
