//! Provider 引用模型
//!
//! 路由核心只读取 Provider 的身份与存在性，Provider 本身由外部注册表维护。

use serde::{Deserialize, Serialize};

/// Provider 摘要
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSummary {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_index: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

impl ProviderSummary {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            sort_index: None,
            created_at: Some(chrono::Utc::now().timestamp()),
        }
    }
}

/// Provider 被删除后，引用它的规则如何处理
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderDeletionPolicy {
    /// 级联删除引用该 Provider 的规则
    #[default]
    Cascade,
    /// 保留规则并标记为悬空，下次编辑时报 UnknownProvider
    Flag,
}

/// Provider 删除指令：由注册表决定需要移除哪些规则
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRemoval {
    pub provider_id: String,
    #[serde(default)]
    pub rules_to_drop: Vec<String>,
}

/// Provider 删除后的对账结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// 已删除的规则 id
    pub dropped: Vec<String>,
    /// 改指向其他 Provider 的默认规则 id
    pub reassigned: Vec<String>,
    /// 仍引用已删除 Provider 的规则 id
    pub dangling: Vec<String>,
}

/// Provider 注册表事件
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ProviderEvent {
    /// 新增 Provider（触发默认规则补齐）
    #[serde(rename_all = "camelCase")]
    Added { provider_id: String },
    /// 删除 Provider
    Deleted(ProviderRemoval),
}
