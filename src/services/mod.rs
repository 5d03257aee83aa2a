//! 业务服务模块
//!
//! - `router_service`: 路由规则的增删改查、复制、重排
//! - `validation`: 提交前校验
//! - `priority`: 分区内优先级计算
//! - `bootstrap`: 默认规则补齐
//! - `provider_registry` / `provider_sync`: Provider 列表与删除对账

pub mod bootstrap;
pub mod error;
pub mod priority;
pub mod provider_registry;
pub mod provider_sync;
pub mod router_service;
pub mod validation;

#[cfg(test)]
mod test_support;

pub use error::{LockedAction, RouterError};
pub use provider_registry::{ProviderRegistry, SqliteProviderRegistry, StaticProviderRegistry};
pub use provider_sync::watch_provider_events;
pub use router_service::RouterService;
