use chrono::{DateTime, Duration, Utc};
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Expiry groups. Each category has its own TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheCategory {
    Tide,
    Weather,
    /// Seasonal closure (defeso) evaluations.
    Defeso,
    /// Aggregated probability results.
    Probability,
}

impl CacheCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheCategory::Tide => "tide",
            CacheCategory::Weather => "weather",
            CacheCategory::Defeso => "defeso",
            CacheCategory::Probability => "probability",
        }
    }
}

impl std::fmt::Display for CacheCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Source of "now" for expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CacheTtls {
    pub tide: Duration,
    pub weather: Duration,
    pub defeso: Duration,
    pub probability: Duration,
}

impl CacheTtls {
    pub fn for_category(&self, category: CacheCategory) -> Duration {
        match category {
            CacheCategory::Tide => self.tide,
            CacheCategory::Weather => self.weather,
            CacheCategory::Defeso => self.defeso,
            CacheCategory::Probability => self.probability,
        }
    }
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            tide: Duration::hours(24),
            weather: Duration::hours(1),
            defeso: Duration::days(7),
            probability: Duration::hours(1),
        }
    }
}

struct CacheEntry {
    payload: Arc<dyn Any + Send + Sync>,
    inserted_at: DateTime<Utc>,
}

/// Process-wide key/value store with per-category expiry.
///
/// Created once at startup and shared by `Arc` with every component that
/// fetches data. Lookups only see entries younger than the category TTL;
/// writes sweep the same category of anything older than twice the TTL.
/// Concurrent writers to one key are last-write-wins, and two callers that
/// miss at the same time both fetch.
pub struct TimedCache {
    ttls: CacheTtls,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<CacheCategory, HashMap<String, CacheEntry>>>,
}

impl TimedCache {
    pub fn new(ttls: CacheTtls, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttls,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_system_clock(ttls: CacheTtls) -> Self {
        Self::new(ttls, Arc::new(SystemClock))
    }

    /// Current time according to the cache's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn ttl(&self, category: CacheCategory) -> Duration {
        self.ttls.for_category(category)
    }

    pub fn get<T>(&self, category: CacheCategory, key: &str) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let now = self.clock.now();
        let ttl = self.ttl(category);
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        let entry = entries.get(&category)?.get(key)?;
        if now - entry.inserted_at >= ttl {
            tracing::debug!("Cache expired: {}/{}", category, key);
            return None;
        }

        entry.payload.downcast_ref::<T>().cloned()
    }

    pub fn put<T>(&self, category: CacheCategory, key: impl Into<String>, payload: T)
    where
        T: Send + Sync + 'static,
    {
        let now = self.clock.now();
        let ttl = self.ttl(category);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        let bucket = entries.entry(category).or_default();
        bucket.insert(
            key.into(),
            CacheEntry {
                payload: Arc::new(payload),
                inserted_at: now,
            },
        );

        // Lazy sweep of stale entries in this category only
        let before = bucket.len();
        bucket.retain(|_, entry| now - entry.inserted_at <= ttl * 2);
        let swept = before - bucket.len();
        if swept > 0 {
            tracing::debug!("Swept {} stale {} cache entries", swept, category);
        }
    }

    /// Number of stored entries in a category, expired or not.
    pub fn len(&self, category: CacheCategory) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(&category).map(|b| b.len()).unwrap_or(0)
    }
}
