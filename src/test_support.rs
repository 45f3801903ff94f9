//! 路由测试工具：内存仓储 + 内存缓存/限流 + 记录调用的图片服务

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
    AppState, build_router,
    cache::{DashboardCache, MemoryCacheStore},
    config::Config,
    database::memory::MemoryDb,
    media::{MediaError, MediaStore, UploadedImage},
    rate_limit::{MemoryWindowStore, RateLimitRules, RateLimiter},
    utils::{ADMIN_ROLE, generate_token},
};

pub const TEST_IP: &str = "203.0.113.10";

/// 记录被删除图片的假图片服务
#[derive(Default)]
pub struct RecordingMedia {
    pub destroyed: Mutex<Vec<String>>,
}

#[async_trait]
impl MediaStore for RecordingMedia {
    async fn upload(&self, _file: &str, folder: Option<&str>) -> Result<UploadedImage, MediaError> {
        let public_id = format!("{}/{}", folder.unwrap_or("dashboard"), Uuid::new_v4());
        Ok(UploadedImage {
            url: format!("https://images.example.com/{public_id}.png"),
            public_id,
        })
    }

    async fn destroy(&self, public_id: &str) -> Result<(), MediaError> {
        self.destroyed.lock().unwrap().push(public_id.to_string());
        Ok(())
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub struct TestApp {
    pub db: Arc<MemoryDb>,
    pub cache_store: Arc<MemoryCacheStore>,
    pub media: Arc<RecordingMedia>,
    pub config: Arc<Config>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_rules(RateLimitRules::default())
    }

    pub fn with_rules(rules: RateLimitRules) -> Self {
        let config = Arc::new(Config {
            rate_limits: rules.clone(),
            ..Config::default()
        });
        let db = Arc::new(MemoryDb::new());
        let cache_store = Arc::new(MemoryCacheStore::new());
        let media = Arc::new(RecordingMedia::default());

        let state = AppState {
            config: config.clone(),
            applications: db.clone(),
            articles: db.clone(),
            platforms: db.clone(),
            orders: db.clone(),
            dashboard: db.clone(),
            admins: db.clone(),
            cache: DashboardCache::new(cache_store.clone(), Duration::from_secs(60), "v1"),
            limiter: RateLimiter::new(Arc::new(MemoryWindowStore::new()), rules),
            media: media.clone(),
        };

        Self {
            db,
            cache_store,
            media,
            config,
            router: build_router(state),
        }
    }

    pub fn token_for_role(&self, role: &str) -> String {
        let (token, _) = generate_token(Uuid::new_v4(), "admin@example.com", role, &self.config)
            .expect("token");
        token
    }

    pub fn admin_token(&self) -> String {
        self.token_for_role(ADMIN_ROLE)
    }

    /// 以管理员身份请求
    pub async fn call(&self, method: Method, path: &str, body: Option<Value>) -> TestResponse {
        let token = self.admin_token();
        self.send(method, path, body, Some(&token)).await
    }

    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(format!("/api{path}"))
            .header("x-real-ip", TEST_IP);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        self.execute(request).await
    }

    pub async fn execute(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }
}
