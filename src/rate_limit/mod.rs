//! 固定窗口限流
//!
//! 计数键由 动作 + 客户端 IP + 资源 ID 组成，每个动作有独立的窗口和上限，
//! 删除比编辑更严格。计数存储在 [`WindowStore`] 中（进程内或 Redis）。

mod store;

pub use store::{MemoryWindowStore, RedisWindowStore, WindowState, WindowStore};

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, HeaderName, HeaderValue, header};
use axum::response::{IntoResponseParts, ResponseParts};

use crate::error::AppError;

const KEY_PREFIX: &str = "rate_limit";

pub const LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const WINDOW_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-window");
pub const REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const RESET_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// 被限流的操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Global,
    List,
    Read,
    Create,
    Update,
    Delete,
    Upload,
    Login,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Global => "global",
            Action::List => "list",
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Upload => "upload",
            Action::Login => "login",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 窗口内最多允许的请求数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitRule {
    pub const fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    pub const fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }
}

/// 解析 "次数/秒数"，例如 "10/60"
impl FromStr for RateLimitRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (max, secs) = s
            .split_once('/')
            .ok_or_else(|| format!("expected <max>/<seconds>, got {s:?}"))?;
        let max_requests = max
            .trim()
            .parse::<u32>()
            .map_err(|e| format!("invalid max requests {max:?}: {e}"))?;
        let secs = secs
            .trim()
            .parse::<u64>()
            .map_err(|e| format!("invalid window {secs:?}: {e}"))?;
        if max_requests == 0 || secs == 0 {
            return Err(format!("rate limit rule must be positive, got {s:?}"));
        }
        Ok(Self::new(max_requests, Duration::from_secs(secs)))
    }
}

/// 每个动作一条规则
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRules {
    pub global: RateLimitRule,
    pub list: RateLimitRule,
    pub read: RateLimitRule,
    pub create: RateLimitRule,
    pub update: RateLimitRule,
    pub delete: RateLimitRule,
    pub upload: RateLimitRule,
    pub login: RateLimitRule,
}

impl Default for RateLimitRules {
    fn default() -> Self {
        Self {
            global: RateLimitRule::per_minute(300),
            list: RateLimitRule::per_minute(60),
            read: RateLimitRule::per_minute(120),
            create: RateLimitRule::per_minute(20),
            update: RateLimitRule::per_minute(30),
            delete: RateLimitRule::per_minute(10),
            upload: RateLimitRule::per_minute(10),
            login: RateLimitRule::new(5, Duration::from_secs(300)),
        }
    }
}

impl RateLimitRules {
    pub fn rule(&self, action: Action) -> RateLimitRule {
        match action {
            Action::Global => self.global,
            Action::List => self.list,
            Action::Read => self.read,
            Action::Create => self.create,
            Action::Update => self.update,
            Action::Delete => self.delete,
            Action::Upload => self.upload,
            Action::Login => self.login,
        }
    }

    pub fn set(&mut self, action: Action, rule: RateLimitRule) {
        let slot = match action {
            Action::Global => &mut self.global,
            Action::List => &mut self.list,
            Action::Read => &mut self.read,
            Action::Create => &mut self.create,
            Action::Update => &mut self.update,
            Action::Delete => &mut self.delete,
            Action::Upload => &mut self.upload,
            Action::Login => &mut self.login,
        };
        *slot = rule;
    }
}

/// 生成限流计数键
pub fn rate_limit_key(ip: &str, action: Action, resource_id: Option<&str>) -> String {
    format!(
        "{}:{}:{}:{}",
        KEY_PREFIX,
        action,
        ip,
        resource_id.unwrap_or("*")
    )
}

/// 一次限流检查的结果，同时作为响应头写回
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub action: Action,
    pub allowed: bool,
    pub limit: u32,
    pub window_secs: u64,
    pub remaining: u32,
    pub reset_in_secs: u64,
}

impl RateLimitDecision {
    fn from_state(action: Action, rule: &RateLimitRule, state: &WindowState) -> Self {
        let remaining = if state.allowed {
            rule.max_requests.saturating_sub(state.count)
        } else {
            0
        };
        Self {
            action,
            allowed: state.allowed,
            limit: rule.max_requests,
            window_secs: rule.window.as_secs(),
            remaining,
            reset_in_secs: ceil_secs(state.reset_in),
        }
    }

    /// 存储不可用时放行
    fn unchecked(action: Action, rule: &RateLimitRule) -> Self {
        Self {
            action,
            allowed: true,
            limit: rule.max_requests,
            window_secs: rule.window.as_secs(),
            remaining: rule.max_requests,
            reset_in_secs: rule.window.as_secs(),
        }
    }

    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(LIMIT_HEADER, HeaderValue::from(self.limit));
        headers.insert(WINDOW_HEADER, HeaderValue::from(self.window_secs));
        headers.insert(REMAINING_HEADER, HeaderValue::from(self.remaining));
        headers.insert(RESET_HEADER, HeaderValue::from(self.reset_in_secs));
        if !self.allowed {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(self.reset_in_secs.max(1)));
        }
    }
}

impl IntoResponseParts for RateLimitDecision {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        self.apply(res.headers_mut());
        Ok(res)
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

/// 限流服务，持有计数存储和各动作规则
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn WindowStore>,
    rules: Arc<RateLimitRules>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn WindowStore>, rules: RateLimitRules) -> Self {
        Self {
            store,
            rules: Arc::new(rules),
        }
    }

    /// 超过上限返回 `AppError::RateLimited`，否则计数加一并放行
    pub async fn check(
        &self,
        ip: &str,
        action: Action,
        resource_id: Option<&str>,
    ) -> Result<RateLimitDecision, AppError> {
        let rule = self.rules.rule(action);
        let key = rate_limit_key(ip, action, resource_id);

        match self.store.acquire(&key, &rule).await {
            Ok(state) => {
                let decision = RateLimitDecision::from_state(action, &rule, &state);
                if decision.allowed {
                    tracing::debug!(
                        key = %key,
                        remaining = decision.remaining,
                        "Rate limit check passed"
                    );
                    Ok(decision)
                } else {
                    tracing::warn!(
                        key = %key,
                        limit = decision.limit,
                        retry_after = decision.reset_in_secs,
                        "Rate limit exceeded"
                    );
                    Err(AppError::RateLimited(decision))
                }
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Rate limit store unavailable, allowing request");
                Ok(RateLimitDecision::unchecked(action, &rule))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(rules: RateLimitRules) -> RateLimiter {
        RateLimiter::new(Arc::new(MemoryWindowStore::new()), rules)
    }

    #[test]
    fn parses_rule_strings() {
        let rule: RateLimitRule = "10/60".parse().unwrap();
        assert_eq!(rule, RateLimitRule::per_minute(10));
        assert_eq!(
            " 5 / 300 ".parse::<RateLimitRule>().unwrap(),
            RateLimitRule::new(5, Duration::from_secs(300))
        );
        assert!("10".parse::<RateLimitRule>().is_err());
        assert!("0/60".parse::<RateLimitRule>().is_err());
        assert!("ten/60".parse::<RateLimitRule>().is_err());
    }

    #[test]
    fn key_combines_action_ip_and_resource() {
        assert_eq!(
            rate_limit_key("10.0.0.1", Action::Delete, Some("abc")),
            "rate_limit:delete:10.0.0.1:abc"
        );
        assert_eq!(
            rate_limit_key("10.0.0.1", Action::List, None),
            "rate_limit:list:10.0.0.1:*"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rejects_after_limit_and_recovers_after_window() {
        let mut rules = RateLimitRules::default();
        rules.set(Action::Delete, RateLimitRule::new(2, Duration::from_secs(30)));
        let limiter = limiter(rules);

        let first = limiter.check("1.1.1.1", Action::Delete, Some("a")).await.unwrap();
        assert_eq!(first.remaining, 1);
        let second = limiter.check("1.1.1.1", Action::Delete, Some("a")).await.unwrap();
        assert_eq!(second.remaining, 0);

        match limiter.check("1.1.1.1", Action::Delete, Some("a")).await {
            Err(AppError::RateLimited(decision)) => {
                assert!(!decision.allowed);
                assert_eq!(decision.limit, 2);
                assert!(decision.reset_in_secs <= 30);
            }
            other => panic!("expected rate limit error, got {other:?}"),
        }

        // 其他资源不受影响
        assert!(limiter.check("1.1.1.1", Action::Delete, Some("b")).await.is_ok());
        // 其他 IP 不受影响
        assert!(limiter.check("2.2.2.2", Action::Delete, Some("a")).await.is_ok());

        tokio::time::advance(Duration::from_secs(31)).await;
        let after = limiter.check("1.1.1.1", Action::Delete, Some("a")).await.unwrap();
        assert_eq!(after.remaining, 1);
    }

    #[test]
    fn blocked_decision_sets_retry_after() {
        let decision = RateLimitDecision {
            action: Action::Delete,
            allowed: false,
            limit: 10,
            window_secs: 60,
            remaining: 0,
            reset_in_secs: 42,
        };
        let mut headers = HeaderMap::new();
        decision.apply(&mut headers);
        assert_eq!(headers[LIMIT_HEADER], "10");
        assert_eq!(headers[WINDOW_HEADER], "60");
        assert_eq!(headers[REMAINING_HEADER], "0");
        assert_eq!(headers[header::RETRY_AFTER], "42");
    }

    #[test]
    fn ceil_rounds_partial_seconds_up() {
        assert_eq!(ceil_secs(Duration::from_millis(1500)), 2);
        assert_eq!(ceil_secs(Duration::from_secs(3)), 3);
    }
}
