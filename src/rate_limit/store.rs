use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use redis::{Client as RedisClient, Script};
use tokio::time::Instant;

use super::RateLimitRule;
use crate::error::StoreError;

/// 一次计数后的窗口状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    pub allowed: bool,
    pub count: u32,
    pub reset_in: Duration,
}

/// 限流计数存储
#[async_trait]
pub trait WindowStore: Send + Sync {
    /// 窗口过期则重置；未达上限时计数加一，达到上限时拒绝且不计数
    async fn acquire(&self, key: &str, rule: &RateLimitRule) -> Result<WindowState, StoreError>;
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    started: Instant,
    length: Duration,
}

/// 进程内计数，单进程部署使用
#[derive(Debug, Default)]
pub struct MemoryWindowStore {
    windows: DashMap<String, Window>,
}

impl MemoryWindowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 清理已过期窗口，返回清理数量
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows
            .retain(|_, window| now.duration_since(window.started) < window.length);
        before.saturating_sub(self.windows.len())
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[async_trait]
impl WindowStore for MemoryWindowStore {
    async fn acquire(&self, key: &str, rule: &RateLimitRule) -> Result<WindowState, StoreError> {
        let now = Instant::now();
        // entry 持有分片写锁，读-改-写是原子的
        let mut window = self.windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            started: now,
            length: rule.window,
        });

        if now.duration_since(window.started) >= rule.window {
            window.count = 0;
            window.started = now;
            window.length = rule.window;
        }

        let reset_in = rule.window.saturating_sub(now.duration_since(window.started));
        if window.count >= rule.max_requests {
            return Ok(WindowState {
                allowed: false,
                count: window.count,
                reset_in,
            });
        }

        window.count += 1;
        Ok(WindowState {
            allowed: true,
            count: window.count,
            reset_in,
        })
    }
}

const ACQUIRE_SCRIPT: &str = r#"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
if current >= tonumber(ARGV[1]) then
    return {0, current, redis.call('PTTL', KEYS[1])}
end
current = redis.call('INCR', KEYS[1])
if current == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[2])
end
return {1, current, redis.call('PTTL', KEYS[1])}
"#;

/// Redis 计数，多实例部署共享
pub struct RedisWindowStore {
    redis: Arc<RedisClient>,
    script: Script,
}

impl RedisWindowStore {
    pub fn new(redis: Arc<RedisClient>) -> Self {
        Self {
            redis,
            script: Script::new(ACQUIRE_SCRIPT),
        }
    }
}

#[async_trait]
impl WindowStore for RedisWindowStore {
    async fn acquire(&self, key: &str, rule: &RateLimitRule) -> Result<WindowState, StoreError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let window_ms = rule.window.as_millis() as u64;

        let (allowed, count, ttl_ms): (i64, i64, i64) = self
            .script
            .key(key)
            .arg(rule.max_requests)
            .arg(window_ms)
            .invoke_async(&mut conn)
            .await?;

        // PTTL 为负表示键没有过期时间
        let reset_in = if ttl_ms > 0 {
            Duration::from_millis(ttl_ms as u64)
        } else {
            rule.window
        };

        Ok(WindowState {
            allowed: allowed == 1,
            count: u32::try_from(count).unwrap_or(u32::MAX),
            reset_in,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULE: RateLimitRule = RateLimitRule::new(3, Duration::from_secs(60));

    #[tokio::test(start_paused = true)]
    async fn counts_up_to_max_then_blocks_without_incrementing() {
        let store = MemoryWindowStore::new();

        for expected in 1..=3 {
            let state = store.acquire("k", &RULE).await.unwrap();
            assert!(state.allowed);
            assert_eq!(state.count, expected);
        }

        let blocked = store.acquire("k", &RULE).await.unwrap();
        assert!(!blocked.allowed);
        assert_eq!(blocked.count, 3);

        let still_blocked = store.acquire("k", &RULE).await.unwrap();
        assert_eq!(still_blocked.count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn window_resets_after_elapsing() {
        let store = MemoryWindowStore::new();
        for _ in 0..3 {
            store.acquire("k", &RULE).await.unwrap();
        }

        tokio::time::advance(Duration::from_secs(20)).await;
        let blocked = store.acquire("k", &RULE).await.unwrap();
        assert!(!blocked.allowed);
        assert_eq!(blocked.reset_in, Duration::from_secs(40));

        tokio::time::advance(Duration::from_secs(40)).await;
        let fresh = store.acquire("k", &RULE).await.unwrap();
        assert!(fresh.allowed);
        assert_eq!(fresh.count, 1);
        assert_eq!(fresh.reset_in, Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn purge_drops_only_expired_windows() {
        let store = MemoryWindowStore::new();
        let short = RateLimitRule::new(1, Duration::from_secs(10));
        store.acquire("short", &short).await.unwrap();
        store.acquire("long", &RULE).await.unwrap();

        tokio::time::advance(Duration::from_secs(15)).await;
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
    }
}
