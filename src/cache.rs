//! # Task Identity Cache
//!
//! Remembers `uuid → task name` between a task's `task-received` event and the
//! later lifecycle events that omit the name.
//!
//! Backed by Moka with a cache-wide time-to-live measured from insertion. Reads
//! do not extend an entry's life, and Moka never returns an entry past its
//! TTL even if maintenance has not purged it yet. There is no capacity bound:
//! the TTL is the only thing limiting growth when a broker keeps announcing
//! tasks that never complete.

use std::time::Duration;
use tracing::debug;

/// Default lifetime of a cached identity
pub const DEFAULT_TASK_TTL: Duration = Duration::from_secs(10 * 60);

/// Thread-safe, cheaply cloneable identity cache
#[derive(Clone)]
pub struct TaskIdentityCache {
    cache: moka::sync::Cache<String, String>,
    ttl: Duration,
}

impl std::fmt::Debug for TaskIdentityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskIdentityCache")
            .field("entry_count", &self.cache.entry_count())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl Default for TaskIdentityCache {
    fn default() -> Self {
        Self::new(DEFAULT_TASK_TTL)
    }
}

impl TaskIdentityCache {
    pub fn new(ttl: Duration) -> Self {
        let cache = moka::sync::Cache::builder().time_to_live(ttl).build();

        debug!(ttl_seconds = ttl.as_secs_f64(), "Task identity cache created");

        Self { cache, ttl }
    }

    /// Upsert the name for `uuid` and restart its TTL clock
    pub fn set(&self, uuid: &str, name: &str) {
        self.cache.insert(uuid.to_string(), name.to_string());
    }

    /// Name recorded for `uuid`, or `None` if never set or expired
    pub fn get(&self, uuid: &str) -> Option<String> {
        self.cache.get(uuid)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Approximate number of live entries (includes entries awaiting purge)
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Process pending expirations so `entry_count` reflects them
    pub fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_returns_none_on_miss() {
        let cache = TaskIdentityCache::new(Duration::from_secs(60));
        assert_eq!(cache.get("never-set"), None);
    }

    #[test]
    fn test_set_and_get() {
        let cache = TaskIdentityCache::new(Duration::from_secs(60));
        cache.set("uuid-1", "tasks.add");
        assert_eq!(cache.get("uuid-1"), Some("tasks.add".to_string()));
    }

    #[test]
    fn test_set_is_last_write_wins() {
        let cache = TaskIdentityCache::new(Duration::from_secs(60));
        cache.set("uuid-1", "tasks.add");
        cache.set("uuid-1", "tasks.mul");
        assert_eq!(cache.get("uuid-1"), Some("tasks.mul".to_string()));
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = TaskIdentityCache::new(Duration::from_millis(50));
        cache.set("expiring", "tasks.add");
        assert!(cache.get("expiring").is_some());

        std::thread::sleep(Duration::from_millis(100));

        // Expired entries are invisible before and after maintenance
        assert!(cache.get("expiring").is_none());
        cache.run_pending_tasks();
        assert!(cache.get("expiring").is_none());
        assert_eq!(cache.entry_count(), 0);
    }

    #[test]
    fn test_reads_do_not_extend_lifetime() {
        let cache = TaskIdentityCache::new(Duration::from_millis(150));
        cache.set("uuid-1", "tasks.add");

        for _ in 0..4 {
            std::thread::sleep(Duration::from_millis(25));
            assert!(cache.get("uuid-1").is_some());
        }

        std::thread::sleep(Duration::from_millis(100));
        assert!(cache.get("uuid-1").is_none());
    }

    #[test]
    fn test_upsert_resets_ttl() {
        let cache = TaskIdentityCache::new(Duration::from_millis(150));
        cache.set("uuid-1", "tasks.add");
        std::thread::sleep(Duration::from_millis(100));
        cache.set("uuid-1", "tasks.add");
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(cache.get("uuid-1"), Some("tasks.add".to_string()));
    }

    #[test]
    fn test_debug_format() {
        let cache = TaskIdentityCache::default();
        let debug_str = format!("{:?}", cache);
        assert!(debug_str.contains("TaskIdentityCache"));
        assert!(debug_str.contains("ttl"));
        assert_eq!(cache.ttl(), DEFAULT_TASK_TTL);
    }
}
