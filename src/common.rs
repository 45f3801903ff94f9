use axum::http::HeaderName;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ENTITY_TYPE_HEADER: HeaderName = HeaderName::from_static("x-entity-type");
pub const CACHE_STATUS_HEADER: HeaderName = HeaderName::from_static("x-cache");

/// 后台管理的资源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Applications,
    Articles,
    Platforms,
    Orders,
}

impl Resource {
    /// 列表接口名，用于缓存键
    pub fn endpoint(&self) -> &'static str {
        match self {
            Resource::Applications => "applications",
            Resource::Articles => "articles",
            Resource::Platforms => "platforms",
            Resource::Orders => "orders",
        }
    }

    /// 单个实体的类型名，写入 X-Entity-Type
    pub fn entity_type(&self) -> &'static str {
        match self {
            Resource::Applications => "application",
            Resource::Articles => "article",
            Resource::Platforms => "platform",
            Resource::Orders => "order",
        }
    }
}

pub fn entity_header(resource: Resource) -> [(HeaderName, &'static str); 1] {
    [(ENTITY_TYPE_HEADER, resource.entity_type())]
}

pub fn cache_header(hit: bool) -> [(HeaderName, &'static str); 1] {
    [(CACHE_STATUS_HEADER, if hit { "HIT" } else { "MISS" })]
}

/// 删除成功后返回的实体标识
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedEntity {
    pub id: Uuid,
    pub name: String,
}
