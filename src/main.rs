use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use backend::{
    AppState, build_router,
    cache::{CacheStore, DashboardCache, MemoryCacheStore, RedisCacheStore},
    config::Config,
    database::{
        AdminOperation, AdminRepository, ApplicationOperation, ArticleOperation,
        DashboardOperation, OrderOperation, PlatformOperation,
    },
    media::{DisabledMedia, ImageServiceClient, MediaStore},
    rate_limit::{MemoryWindowStore, RateLimiter, RedisWindowStore, WindowStore},
    routes,
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 内存存储过期清理周期
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Arc::new(Config::from_env().expect("Failed to load configuration"));

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    // 设置数据库连接池
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'dashboard_backend';")
                    .await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    if config.run_migrations {
        sqlx::migrate!()
            .run(&pool)
            .await
            .expect("Failed to run database migrations");
        tracing::info!("Database migrations applied");
    }
    let db = Arc::new(pool);

    // 配置了 Redis 时缓存和限流都走 Redis，否则使用进程内存储
    let (cache_store, window_store, purge_task): (
        Arc<dyn CacheStore>,
        Arc<dyn WindowStore>,
        Option<JoinHandle<()>>,
    ) = match &config.redis_url {
        Some(url) => {
            let redis = Arc::new(
                redis::Client::open(url.as_str()).expect("Failed to create Redis client"),
            );
            tracing::info!("Using Redis for cache and rate limit counters");
            let cache_store: Arc<dyn CacheStore> = Arc::new(RedisCacheStore::new(redis.clone()));
            let window_store: Arc<dyn WindowStore> = Arc::new(RedisWindowStore::new(redis));
            (cache_store, window_store, None)
        }
        None => {
            tracing::info!("REDIS_URL not set, using in-process cache and rate limit counters");
            let memory_cache = Arc::new(MemoryCacheStore::new());
            let memory_windows = Arc::new(MemoryWindowStore::new());
            let purge_task = spawn_purge_task(memory_cache.clone(), memory_windows.clone());
            let cache_store: Arc<dyn CacheStore> = memory_cache;
            let window_store: Arc<dyn WindowStore> = memory_windows;
            (cache_store, window_store, Some(purge_task))
        }
    };

    let media: Arc<dyn MediaStore> = match config.image_service.clone() {
        Some(image_config) => Arc::new(
            ImageServiceClient::new(image_config).expect("Failed to create image service client"),
        ),
        None => {
            tracing::warn!("Image service not configured, uploads are disabled");
            Arc::new(DisabledMedia)
        }
    };

    let admins: Arc<dyn AdminRepository> = Arc::new(AdminOperation::new(db.clone()));
    if let Some(seed) = &config.admin_seed {
        routes::auth::seed_admin(admins.as_ref(), seed)
            .await
            .expect("Failed to seed admin account");
    }

    // 设置应用状态
    let state = AppState {
        config: config.clone(),
        applications: Arc::new(ApplicationOperation::new(db.clone())),
        articles: Arc::new(ArticleOperation::new(db.clone())),
        platforms: Arc::new(PlatformOperation::new(db.clone())),
        orders: Arc::new(OrderOperation::new(db.clone())),
        dashboard: Arc::new(DashboardOperation::new(db.clone())),
        admins,
        cache: DashboardCache::new(cache_store, config.cache_ttl(), &config.cache_version),
        limiter: RateLimiter::new(window_store, config.rate_limits.clone()),
        media,
    };

    let router = build_router(state);

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        // 设置开发环境的CORS，允许所有来源
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    // 启动服务器
    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    // 清理任务随服务器一起结束
    if let Some(task) = purge_task {
        task.abort();
    }
    tracing::info!("Server stopped");
}

fn spawn_purge_task(
    cache_store: Arc<MemoryCacheStore>,
    window_store: Arc<MemoryWindowStore>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let windows = window_store.purge_expired();
            let entries = cache_store.purge_expired();
            if windows + entries > 0 {
                tracing::debug!(windows, entries, "Purged expired in-memory entries");
            }
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
