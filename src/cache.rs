use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default lifetime of a cached ranking table
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

/// A single cached value with an expiry instant
///
/// The value is shared read-only through an `Arc`; once the entry expires the
/// caller reloads it wholesale and stores the fresh value.
#[derive(Debug)]
pub struct TimedCache<T> {
    ttl: Duration,
    entry: Option<CacheEntry<T>>,
}

#[derive(Debug)]
struct CacheEntry<T> {
    value: Arc<T>,
    expires_at: Instant,
}

impl<T> TimedCache<T> {
    pub fn new(ttl: Duration) -> Self {
        TimedCache { ttl, entry: None }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached value, if it has not expired at `now`
    pub fn get(&self, now: Instant) -> Option<Arc<T>> {
        self.entry
            .as_ref()
            .filter(|entry| now < entry.expires_at)
            .map(|entry| Arc::clone(&entry.value))
    }

    /// Replace the entry; it expires `ttl` after `now`
    pub fn store(&mut self, value: T, now: Instant) -> Arc<T> {
        let value = Arc::new(value);
        self.entry = Some(CacheEntry {
            value: Arc::clone(&value),
            expires_at: now + self.ttl,
        });
        value
    }

    pub fn clear(&mut self) {
        self.entry = None;
    }
}

impl<T> Default for TimedCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
