//! RouteCast - 路由规则配置与一致性引擎
//!
//! 维护 AI API 代理的路由规则集合：分区内唯一的优先级、受保护的默认规则、
//! 互不重叠的命名空间与安全的重排。调度器通过 [`router::RouteTable`] 消费结果。

pub mod config;
pub mod database;
pub mod logger;
pub mod models;
pub mod router;
pub mod services;

pub use config::RouterConfig;
pub use models::{
    ApiGroup, CreateRuleInput, DefaultRuleInput, InsertPosition, ProviderDeletionPolicy,
    ProviderEvent, ProviderRemoval, ProviderSummary, ReconcileReport, RoutingRule, RuleScope,
    RuleType, UpdateRuleInput,
};
pub use router::{matches, RouteResult, RouteTable};
pub use services::{LockedAction, RouterError, RouterService};
