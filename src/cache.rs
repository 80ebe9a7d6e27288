//! Injected time-to-live cache for reference data.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::config::ReferenceData;
use crate::error::{Result, check_config};

/// Default time-to-live of a cached snapshot.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Holds the current reference-data snapshot.
pub trait ReferenceCache: Send + Sync {
    /// Current snapshot, expired or not.
    fn get(&self) -> Option<Arc<ReferenceData>>;
    /// Replaces the snapshot.
    fn set(&self, data: Arc<ReferenceData>, fetched_at: Instant);
    /// Whether the snapshot is missing or older than the TTL.
    fn is_expired(&self) -> bool;
}

/// Source of fresh reference data.
pub trait ReferenceProvider {
    /// Fetches a complete snapshot.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the data cannot be read or parsed.
    fn fetch(&self) -> Result<ReferenceData>;
}

struct Entry {
    data: Arc<ReferenceData>,
    fetched_at: Instant,
}

/// In-memory cache whose snapshot is swapped whole on refresh.
pub struct TtlCache {
    ttl: Duration,
    entry: RwLock<Option<Arc<Entry>>>,
}

impl TtlCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: RwLock::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Expiry check against an explicit clock reading.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.entry.read().as_ref() {
            Some(entry) => now.saturating_duration_since(entry.fetched_at) >= self.ttl,
            None => true,
        }
    }
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ReferenceCache for TtlCache {
    fn get(&self) -> Option<Arc<ReferenceData>> {
        self.entry.read().as_ref().map(|e| Arc::clone(&e.data))
    }

    fn set(&self, data: Arc<ReferenceData>, fetched_at: Instant) {
        *self.entry.write() = Some(Arc::new(Entry { data, fetched_at }));
    }

    fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }
}

/// Reads reference data from a TOML file on every fetch.
#[derive(Debug, Clone)]
pub struct TomlFileProvider {
    path: PathBuf,
}

impl TomlFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ReferenceProvider for TomlFileProvider {
    fn fetch(&self) -> Result<ReferenceData> {
        Ok(ReferenceData::from_toml_file(&self.path)?)
    }
}

/// Serves a fixed snapshot, e.g. a preset.
#[derive(Debug, Clone)]
pub struct StaticProvider(pub ReferenceData);

impl ReferenceProvider for StaticProvider {
    fn fetch(&self) -> Result<ReferenceData> {
        Ok(self.0.clone())
    }
}

/// Returns the cached snapshot, refreshing it through `provider` when it is
/// missing or expired.
///
/// Fetched data is validated before it replaces the snapshot. Concurrent
/// callers may both refresh; the later write wins.
///
/// # Errors
///
/// Returns `Configuration` if the provider fails or the data is invalid.
pub fn load_reference(
    cache: &dyn ReferenceCache,
    provider: &dyn ReferenceProvider,
) -> Result<Arc<ReferenceData>> {
    if !cache.is_expired() {
        if let Some(data) = cache.get() {
            return Ok(data);
        }
    }
    debug!("refreshing reference data");
    let data = match provider.fetch().and_then(|d| check_config(d.validate()).map(|()| d)) {
        Ok(data) => Arc::new(data),
        Err(e) => {
            warn!(error = %e, "reference data refresh failed");
            return Err(e);
        }
    };
    cache.set(Arc::clone(&data), Instant::now());
    Ok(data)
}
