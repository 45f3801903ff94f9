// 缓存模块
// 列表和统计接口的读缓存，写操作成功后按键删除

pub mod keys;
mod store;

pub use store::{CacheStore, MemoryCacheStore, RedisCacheStore};

use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};

use crate::common::Resource;

#[derive(Clone)]
pub struct DashboardCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    version: Arc<str>,
}

impl DashboardCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration, version: &str) -> Self {
        Self {
            store,
            ttl,
            version: Arc::from(version),
        }
    }

    pub fn list_key(&self, resource: Resource) -> String {
        keys::list_key(resource, &self.version)
    }

    pub fn stats_key(&self) -> String {
        keys::stats_key(&self.version)
    }

    /// 读取失败或反序列化失败都按未命中处理
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.store.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    tracing::debug!(key = %key, "Cache hit");
                    Some(value)
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => {
                tracing::debug!(key = %key, "Cache miss");
                None
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache read failed");
                None
            }
        }
    }

    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to serialize cache entry");
                return;
            }
        };
        if let Err(e) = self.store.set(key, raw, self.ttl).await {
            tracing::warn!(key = %key, error = %e, "Cache write failed");
        }
    }

    /// 删除受影响资源的列表键，以及统计概览键
    pub async fn invalidate(&self, resources: &[Resource]) {
        let mut keys: Vec<String> = resources.iter().map(|r| self.list_key(*r)).collect();
        keys.push(self.stats_key());

        match self.store.delete(&keys).await {
            Ok(()) => tracing::debug!(keys = ?keys, "Cache invalidated"),
            Err(e) => tracing::warn!(keys = ?keys, error = %e, "Cache invalidation failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> (Arc<MemoryCacheStore>, DashboardCache) {
        let store = Arc::new(MemoryCacheStore::new());
        let cache = DashboardCache::new(store.clone(), Duration::from_secs(60), "v1");
        (store, cache)
    }

    #[tokio::test]
    async fn round_trips_json_values() {
        let (_, cache) = cache();
        let key = cache.list_key(Resource::Articles);
        cache.put_json(&key, &vec!["a", "b"]).await;
        let cached: Option<Vec<String>> = cache.get_json(&key).await;
        assert_eq!(cached, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[tokio::test]
    async fn invalidate_drops_list_and_stats_keys_only() {
        let (store, cache) = cache();
        for resource in [Resource::Applications, Resource::Orders] {
            cache.put_json(&cache.list_key(resource), &1).await;
        }
        cache.put_json(&cache.stats_key(), &1).await;

        cache.invalidate(&[Resource::Applications]).await;

        assert!(!store.contains("dashboard:applications:v1"));
        assert!(!store.contains("dashboard:stats:v1"));
        assert!(store.contains("dashboard:orders:v1"));
    }

    #[tokio::test]
    async fn undecodable_entry_is_a_miss() {
        let (store, cache) = cache();
        store
            .set("dashboard:platforms:v1", "not json".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        let cached: Option<Vec<u32>> = cache.get_json("dashboard:platforms:v1").await;
        assert!(cached.is_none());
    }
}
