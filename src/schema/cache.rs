//! Two-tier cache for reflected column types.
//!
//! Tier one is a process-local DashMap: reflection of the same entity within
//! one process hits memory. Tier two is an optional distributed store shared
//! across processes, abstracted behind [`DistributedCache`] so the host can
//! plug in Redis, memcached, or nothing at all.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::debug;

use super::ColumnTypeMap;

/// Default time-to-live for distributed entries: one hour.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// External cache store shared across processes.
///
/// Values are serialized JSON; the store treats them as opaque strings.
pub trait DistributedCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn put(&self, key: &str, value: &str, ttl: Duration);

    fn forget(&self, key: &str);

    /// Whether the store supports tag-based invalidation.
    fn supports_tags(&self) -> bool {
        false
    }

    /// Invalidate every entry carrying `tag`. Stores without tag support
    /// ignore the call.
    fn invalidate_tag(&self, tag: &str) {
        debug!(tag, "tag invalidation not supported by cache store, skipping");
    }
}

/// The reflector's cache front: local map first, distributed store second.
pub struct SchemaCache {
    local: DashMap<String, ColumnTypeMap>,
    distributed: Option<Arc<dyn DistributedCache>>,
    ttl: Duration,
}

impl SchemaCache {
    pub fn new(distributed: Option<Arc<dyn DistributedCache>>) -> Self {
        Self {
            local: DashMap::new(),
            distributed,
            ttl: DEFAULT_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Cache key for an entity's column type map.
    pub fn key(entity: &str, table: &str) -> String {
        format!("{}_{}_column_types", entity, table)
    }

    /// Look up a column type map, checking local memory before the
    /// distributed store. A distributed hit is pulled into the local tier.
    pub fn get(&self, key: &str) -> Option<ColumnTypeMap> {
        if let Some(hit) = self.local.get(key) {
            return Some(hit.clone());
        }

        let store = self.distributed.as_ref()?;
        let payload = store.get(key)?;
        match serde_json::from_str::<ColumnTypeMap>(&payload) {
            Ok(map) => {
                self.local.insert(key.to_string(), map.clone());
                Some(map)
            }
            Err(err) => {
                // Stale or corrupt payload; drop it and fall through to
                // live reflection.
                debug!(key, %err, "discarding undecodable cache entry");
                store.forget(key);
                None
            }
        }
    }

    /// Store a column type map in both tiers.
    pub fn put(&self, key: &str, map: &ColumnTypeMap) {
        self.local.insert(key.to_string(), map.clone());

        if let Some(store) = &self.distributed {
            match serde_json::to_string(map) {
                Ok(payload) => store.put(key, &payload, self.ttl),
                Err(err) => debug!(key, %err, "failed to serialize cache entry"),
            }
        }
    }

    /// Drop an entry from both tiers.
    pub fn forget(&self, key: &str) {
        self.local.remove(key);
        if let Some(store) = &self.distributed {
            store.forget(key);
        }
    }

    /// Invalidate by tag where the distributed store supports it.
    pub fn invalidate_tag(&self, tag: &str) {
        if let Some(store) = &self.distributed {
            if store.supports_tags() {
                store.invalidate_tag(tag);
                return;
            }
        }
        debug!(tag, "no tag-capable cache store configured");
    }
}
