// 数据库模块
// 仓储接口定义，以及基于 PgPool 的实现

mod admin;
mod application;
mod article;
mod dashboard;
mod order;
mod platform;

#[cfg(test)]
pub mod memory;

pub use admin::AdminOperation;
pub use application::ApplicationOperation;
pub use article::ArticleOperation;
pub use dashboard::DashboardOperation;
pub use order::OrderOperation;
pub use platform::PlatformOperation;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::routes::application::model::{Application, ApplicationPatch, NewApplication};
use crate::routes::article::model::{Article, ArticlePatch, NewArticle};
use crate::routes::auth::model::AdminUser;
use crate::routes::dashboard::model::DashboardStats;
use crate::routes::order::model::{Order, OrderStatus};
use crate::routes::platform::model::{NewPlatform, Platform, PlatformPatch};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BusinessRule(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// 更新结果；图片被替换时带上旧图片的 public id
#[derive(Debug, Clone)]
pub struct Updated<T> {
    pub entity: T,
    pub replaced_image: Option<String>,
}

impl<T> Updated<T> {
    pub fn new(entity: T, previous_image: Option<String>, current_image: Option<&str>) -> Self {
        let replaced_image = previous_image.filter(|old| Some(old.as_str()) != current_image);
        Self {
            entity,
            replaced_image,
        }
    }
}

#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    async fn list(&self) -> RepoResult<Vec<Application>>;
    async fn find(&self, id: Uuid) -> RepoResult<Application>;
    async fn create(&self, new: NewApplication) -> RepoResult<Application>;
    async fn update(&self, id: Uuid, patch: ApplicationPatch) -> RepoResult<Updated<Application>>;
    /// 上架中或有销售记录时拒绝，返回被删除的行
    async fn delete(&self, id: Uuid) -> RepoResult<Application>;
}

#[async_trait]
pub trait ArticleRepository: Send + Sync {
    async fn list(&self) -> RepoResult<Vec<Article>>;
    async fn find(&self, id: Uuid) -> RepoResult<Article>;
    async fn create(&self, new: NewArticle) -> RepoResult<Article>;
    async fn update(&self, id: Uuid, patch: ArticlePatch) -> RepoResult<Updated<Article>>;
    /// 已发布的文章不能删除
    async fn delete(&self, id: Uuid) -> RepoResult<Article>;
}

#[async_trait]
pub trait PlatformRepository: Send + Sync {
    async fn list(&self) -> RepoResult<Vec<Platform>>;
    async fn find(&self, id: Uuid) -> RepoResult<Platform>;
    async fn create(&self, new: NewPlatform) -> RepoResult<Platform>;
    async fn update(&self, id: Uuid, patch: PlatformPatch) -> RepoResult<Updated<Platform>>;
    /// 启用中或有交易记录时拒绝
    async fn delete(&self, id: Uuid) -> RepoResult<Platform>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn list(&self) -> RepoResult<Vec<Order>>;
    async fn find(&self, id: Uuid) -> RepoResult<Order>;
    /// 状态流转与应用销量在同一事务内更新
    async fn update_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        transaction_reference: Option<String>,
    ) -> RepoResult<Order>;
    async fn delete(&self, id: Uuid) -> RepoResult<Order>;
}

#[async_trait]
pub trait DashboardRepository: Send + Sync {
    async fn stats(&self) -> RepoResult<DashboardStats>;
}

#[async_trait]
pub trait AdminRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> RepoResult<Option<AdminUser>>;
    /// 邮箱已存在时不做修改，返回是否新建
    async fn create_if_absent(
        &self,
        email: &str,
        password_hash: &str,
        role: &str,
    ) -> RepoResult<bool>;
}
