//! 测试用的内存仓储，实现全部仓储接口并统计调用次数

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{
    AdminRepository, ApplicationRepository, ArticleRepository, DashboardRepository,
    OrderRepository, PlatformRepository, RepoResult, RepositoryError, Updated,
};
use crate::routes::application::model::{Application, ApplicationPatch, NewApplication};
use crate::routes::article::model::{Article, ArticlePatch, NewArticle};
use crate::routes::auth::model::AdminUser;
use crate::routes::dashboard::model::{ActiveCounts, ArticleCounts, DashboardStats, OrderCounts};
use crate::routes::order::model::{Order, OrderStatus};
use crate::routes::platform::model::{NewPlatform, Platform, PlatformPatch};

#[derive(Default)]
struct Tables {
    applications: HashMap<Uuid, Application>,
    articles: HashMap<Uuid, Article>,
    platforms: HashMap<Uuid, Platform>,
    orders: HashMap<Uuid, Order>,
    admins: Vec<AdminUser>,
}

impl Tables {
    /// 按当前应用和平台名称填充，等同于 SQL 里的 JOIN
    fn joined(&self, mut order: Order) -> Order {
        order.application_name = self
            .applications
            .get(&order.application_id)
            .map(|a| a.name.clone());
        order.platform_name = self.platforms.get(&order.platform_id).map(|p| p.name.clone());
        order
    }
}

#[derive(Default)]
pub struct MemoryDb {
    tables: Mutex<Tables>,
    calls: AtomicUsize,
}

fn newest_first<T, F>(mut rows: Vec<T>, created: F) -> Vec<T>
where
    F: Fn(&T) -> chrono::DateTime<Utc>,
{
    rows.sort_by_key(|row| std::cmp::Reverse(created(row)));
    rows
}

fn unique<'a>(mut taken: impl Iterator<Item = &'a str>, value: &str, what: &str) -> RepoResult<()> {
    if taken.any(|existing| existing == value) {
        return Err(RepositoryError::Conflict(format!(
            "A {what} with the same name already exists"
        )));
    }
    Ok(())
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// 仓储方法被调用的总次数
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tables.lock().unwrap()
    }

    fn seed(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    pub fn seed_application(&self, name: &str, is_active: bool, sales_count: i32) -> Application {
        let now = Utc::now();
        let application = Application {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: String::new(),
            category: "tools".to_string(),
            price_cents: 1_000,
            is_active,
            sales_count,
            image_public_id: None,
            image_url: None,
            created_at: now,
            updated_at: now,
        };
        self.seed()
            .applications
            .insert(application.id, application.clone());
        application
    }

    pub fn seed_article(&self, title: &str, is_active: bool) -> Article {
        let now = Utc::now();
        let article = Article {
            id: Uuid::new_v4(),
            title: title.to_string(),
            excerpt: String::new(),
            content: "Body".to_string(),
            author: "Staff".to_string(),
            reading_minutes: 4,
            is_active,
            image_public_id: None,
            image_url: None,
            created_at: now,
            updated_at: now,
        };
        self.seed().articles.insert(article.id, article.clone());
        article
    }

    pub fn seed_platform(&self, name: &str, is_active: bool) -> Platform {
        let now = Utc::now();
        let platform = Platform {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: String::new(),
            account_name: "Shop Ltd".to_string(),
            account_number: "0011223344".to_string(),
            fee_percent: 2,
            is_active,
            image_public_id: None,
            image_url: None,
            created_at: now,
            updated_at: now,
        };
        self.seed().platforms.insert(platform.id, platform.clone());
        platform
    }

    pub fn seed_order(
        &self,
        application: &Application,
        platform: &Platform,
        status: OrderStatus,
    ) -> Order {
        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            application_id: application.id,
            platform_id: platform.id,
            application_name: Some(application.name.clone()),
            platform_name: Some(platform.name.clone()),
            buyer_name: "Ada".to_string(),
            buyer_email: "ada@example.com".to_string(),
            amount_cents: application.price_cents,
            status,
            transaction_reference: None,
            created_at: now,
            updated_at: now,
        };
        self.seed().orders.insert(order.id, order.clone());
        order
    }

    pub fn seed_admin(&self, email: &str, password_hash: &str, role: &str) -> AdminUser {
        let admin = AdminUser {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role: role.to_string(),
            is_active: true,
            created_at: Utc::now(),
        };
        self.seed().admins.push(admin.clone());
        admin
    }

    pub fn application(&self, id: Uuid) -> Option<Application> {
        self.seed().applications.get(&id).cloned()
    }

    pub fn has_article(&self, id: Uuid) -> bool {
        self.seed().articles.contains_key(&id)
    }

    pub fn has_platform(&self, id: Uuid) -> bool {
        self.seed().platforms.contains_key(&id)
    }

    pub fn has_order(&self, id: Uuid) -> bool {
        self.seed().orders.contains_key(&id)
    }
}

#[async_trait]
impl ApplicationRepository for MemoryDb {
    async fn list(&self) -> RepoResult<Vec<Application>> {
        let rows: Vec<Application> = self.tables().applications.values().cloned().collect();
        Ok(newest_first(rows, |a: &Application| a.created_at))
    }

    async fn find(&self, id: Uuid) -> RepoResult<Application> {
        self.tables()
            .applications
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound("Application"))
    }

    async fn create(&self, new: NewApplication) -> RepoResult<Application> {
        let mut tables = self.tables();
        unique(
            tables.applications.values().map(|a| a.name.as_str()),
            &new.name,
            "application",
        )?;
        let now = Utc::now();
        let application = Application {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            category: new.category,
            price_cents: new.price_cents,
            is_active: new.is_active,
            sales_count: 0,
            image_public_id: new.image_public_id,
            image_url: new.image_url,
            created_at: now,
            updated_at: now,
        };
        tables
            .applications
            .insert(application.id, application.clone());
        Ok(application)
    }

    async fn update(&self, id: Uuid, patch: ApplicationPatch) -> RepoResult<Updated<Application>> {
        let mut tables = self.tables();
        let application = tables
            .applications
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound("Application"))?;
        let previous_image = application.image_public_id.clone();
        patch.apply(application);
        application.updated_at = Utc::now();
        let updated = application.clone();
        let current = updated.image_public_id.clone();
        Ok(Updated::new(updated, previous_image, current.as_deref()))
    }

    async fn delete(&self, id: Uuid) -> RepoResult<Application> {
        let mut tables = self.tables();
        let application = tables
            .applications
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound("Application"))?;
        let order_count = tables
            .orders
            .values()
            .filter(|o| o.application_id == id)
            .count() as i64;
        if let Some(reason) = application.deletion_blocker(order_count) {
            return Err(RepositoryError::BusinessRule(reason));
        }
        tables.applications.remove(&id);
        Ok(application)
    }
}

#[async_trait]
impl ArticleRepository for MemoryDb {
    async fn list(&self) -> RepoResult<Vec<Article>> {
        let rows: Vec<Article> = self.tables().articles.values().cloned().collect();
        Ok(newest_first(rows, |a: &Article| a.created_at))
    }

    async fn find(&self, id: Uuid) -> RepoResult<Article> {
        self.tables()
            .articles
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound("Article"))
    }

    async fn create(&self, new: NewArticle) -> RepoResult<Article> {
        let mut tables = self.tables();
        unique(
            tables.articles.values().map(|a| a.title.as_str()),
            &new.title,
            "article",
        )?;
        let now = Utc::now();
        let article = Article {
            id: Uuid::new_v4(),
            title: new.title,
            excerpt: new.excerpt,
            content: new.content,
            author: new.author,
            reading_minutes: new.reading_minutes,
            is_active: new.is_active,
            image_public_id: new.image_public_id,
            image_url: new.image_url,
            created_at: now,
            updated_at: now,
        };
        tables.articles.insert(article.id, article.clone());
        Ok(article)
    }

    async fn update(&self, id: Uuid, patch: ArticlePatch) -> RepoResult<Updated<Article>> {
        let mut tables = self.tables();
        let article = tables
            .articles
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound("Article"))?;
        let previous_image = article.image_public_id.clone();
        patch.apply(article);
        article.updated_at = Utc::now();
        let updated = article.clone();
        let current = updated.image_public_id.clone();
        Ok(Updated::new(updated, previous_image, current.as_deref()))
    }

    async fn delete(&self, id: Uuid) -> RepoResult<Article> {
        let mut tables = self.tables();
        let article = tables
            .articles
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound("Article"))?;
        if let Some(reason) = article.deletion_blocker() {
            return Err(RepositoryError::BusinessRule(reason));
        }
        tables.articles.remove(&id);
        Ok(article)
    }
}

#[async_trait]
impl PlatformRepository for MemoryDb {
    async fn list(&self) -> RepoResult<Vec<Platform>> {
        let rows: Vec<Platform> = self.tables().platforms.values().cloned().collect();
        Ok(newest_first(rows, |p: &Platform| p.created_at))
    }

    async fn find(&self, id: Uuid) -> RepoResult<Platform> {
        self.tables()
            .platforms
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound("Platform"))
    }

    async fn create(&self, new: NewPlatform) -> RepoResult<Platform> {
        let mut tables = self.tables();
        unique(
            tables.platforms.values().map(|p| p.name.as_str()),
            &new.name,
            "platform",
        )?;
        let now = Utc::now();
        let platform = Platform {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            account_name: new.account_name,
            account_number: new.account_number,
            fee_percent: new.fee_percent,
            is_active: new.is_active,
            image_public_id: new.image_public_id,
            image_url: new.image_url,
            created_at: now,
            updated_at: now,
        };
        tables.platforms.insert(platform.id, platform.clone());
        Ok(platform)
    }

    async fn update(&self, id: Uuid, patch: PlatformPatch) -> RepoResult<Updated<Platform>> {
        let mut tables = self.tables();
        let platform = tables
            .platforms
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound("Platform"))?;
        let previous_image = platform.image_public_id.clone();
        patch.apply(platform);
        platform.updated_at = Utc::now();
        let updated = platform.clone();
        let current = updated.image_public_id.clone();
        Ok(Updated::new(updated, previous_image, current.as_deref()))
    }

    async fn delete(&self, id: Uuid) -> RepoResult<Platform> {
        let mut tables = self.tables();
        let platform = tables
            .platforms
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound("Platform"))?;
        let transactions = tables
            .orders
            .values()
            .filter(|o| o.platform_id == id)
            .count() as i64;
        if let Some(reason) = platform.deletion_blocker(transactions) {
            return Err(RepositoryError::BusinessRule(reason));
        }
        tables.platforms.remove(&id);
        Ok(platform)
    }
}

#[async_trait]
impl OrderRepository for MemoryDb {
    async fn list(&self) -> RepoResult<Vec<Order>> {
        let tables = self.tables();
        let rows: Vec<Order> = tables
            .orders
            .values()
            .map(|o| tables.joined(o.clone()))
            .collect();
        Ok(newest_first(rows, |o: &Order| o.created_at))
    }

    async fn find(&self, id: Uuid) -> RepoResult<Order> {
        let tables = self.tables();
        tables
            .orders
            .get(&id)
            .map(|o| tables.joined(o.clone()))
            .ok_or(RepositoryError::NotFound("Order"))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        transaction_reference: Option<String>,
    ) -> RepoResult<Order> {
        let mut tables = self.tables();
        let order = tables
            .orders
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound("Order"))?;
        if let Some(reason) = order.transition_blocker(status) {
            return Err(RepositoryError::BusinessRule(reason));
        }
        let delta = order.status.sales_delta(status);
        order.status = status;
        if transaction_reference.is_some() {
            order.transaction_reference = transaction_reference;
        }
        order.updated_at = Utc::now();
        let updated = order.clone();

        if let Some(application) = tables.applications.get_mut(&updated.application_id) {
            application.sales_count = (application.sales_count + delta).max(0);
        }
        Ok(tables.joined(updated))
    }

    async fn delete(&self, id: Uuid) -> RepoResult<Order> {
        let mut tables = self.tables();
        let order = tables
            .orders
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound("Order"))?;
        if let Some(reason) = order.deletion_blocker() {
            return Err(RepositoryError::BusinessRule(reason));
        }
        tables.orders.remove(&id);
        Ok(order)
    }
}

#[async_trait]
impl DashboardRepository for MemoryDb {
    async fn stats(&self) -> RepoResult<DashboardStats> {
        let tables = self.tables();
        let count_status = |status: OrderStatus| {
            tables.orders.values().filter(|o| o.status == status).count() as i64
        };
        Ok(DashboardStats {
            applications: ActiveCounts {
                total: tables.applications.len() as i64,
                active: tables.applications.values().filter(|a| a.is_active).count() as i64,
            },
            articles: ArticleCounts {
                total: tables.articles.len() as i64,
                published: tables.articles.values().filter(|a| a.is_active).count() as i64,
            },
            platforms: ActiveCounts {
                total: tables.platforms.len() as i64,
                active: tables.platforms.values().filter(|p| p.is_active).count() as i64,
            },
            orders: OrderCounts {
                total: tables.orders.len() as i64,
                pending: count_status(OrderStatus::Pending),
                completed: count_status(OrderStatus::Completed),
                cancelled: count_status(OrderStatus::Cancelled),
                refunded: count_status(OrderStatus::Refunded),
            },
            revenue_cents: tables
                .orders
                .values()
                .filter(|o| o.status == OrderStatus::Completed)
                .map(|o| o.amount_cents)
                .sum(),
        })
    }
}

#[async_trait]
impl AdminRepository for MemoryDb {
    async fn find_by_email(&self, email: &str) -> RepoResult<Option<AdminUser>> {
        Ok(self
            .tables()
            .admins
            .iter()
            .find(|a| a.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create_if_absent(
        &self,
        email: &str,
        password_hash: &str,
        role: &str,
    ) -> RepoResult<bool> {
        let mut tables = self.tables();
        if tables.admins.iter().any(|a| a.email.eq_ignore_ascii_case(email)) {
            return Ok(false);
        }
        tables.admins.push(AdminUser {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role: role.to_string(),
            is_active: true,
            created_at: Utc::now(),
        });
        Ok(true)
    }
}
