/// 缓存键模块
/// 所有键由 接口名 + 版本 确定，修改后按键删除
use crate::common::Resource;

/// 后台缓存键前缀
const DASHBOARD_PREFIX: &str = "dashboard";

/// 统计概览接口名
const STATS_ENDPOINT: &str = "stats";

/// 生成列表缓存键
pub fn list_key(resource: Resource, version: &str) -> String {
    format!("{}:{}:{}", DASHBOARD_PREFIX, resource.endpoint(), version)
}

/// 生成统计概览缓存键
pub fn stats_key(version: &str) -> String {
    format!("{}:{}:{}", DASHBOARD_PREFIX, STATS_ENDPOINT, version)
}
