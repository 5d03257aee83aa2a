//! 路由规则错误类型
//!
//! 所有校验都在修改状态之前完成；错误只影响当前请求的这一次操作。

use crate::database::StorageError;
use std::fmt;
use thiserror::Error;

/// 对锁定规则尝试的操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockedAction {
    EditPattern,
    EditScope,
    Delete,
    Duplicate,
    /// 以锁定规则为锚点插入，会改变其 priority
    Reorder,
    /// 创建与现有默认规则相同的受保护规则
    CreateDefault,
}

impl fmt::Display for LockedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            LockedAction::EditPattern => "修改匹配模式",
            LockedAction::EditScope => "修改分组或类型",
            LockedAction::Delete => "删除",
            LockedAction::Duplicate => "复制",
            LockedAction::Reorder => "调整顺序",
            LockedAction::CreateDefault => "重复创建",
        };
        f.write_str(text)
    }
}

/// 路由规则错误
#[derive(Error, Debug)]
pub enum RouterError {
    /// 规则不存在
    #[error("路由规则不存在: {0}")]
    NotFound(String),

    /// 违反锁定规则保护
    #[error("默认规则不可{action}: {rule_id}")]
    LockedRuleViolation { rule_id: String, action: LockedAction },

    /// Generic 路径规则占用了 OpenAI/Anthropic 命名空间
    #[error("路径模式占用了保留命名空间: {0}")]
    NamespaceCollision(String),

    /// 匹配模式无效
    #[error("无效的匹配模式: {0:?}")]
    InvalidPattern(String),

    /// Provider 不存在
    #[error("Provider 不存在: {0}")]
    UnknownProvider(String),

    /// 尚未配置任何 Provider
    #[error("没有可用的 Provider")]
    NoProviderAvailable,

    /// 持久化失败
    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),
}

impl RouterError {
    pub(crate) fn locked(rule_id: &str, action: LockedAction) -> Self {
        RouterError::LockedRuleViolation {
            rule_id: rule_id.to_string(),
            action,
        }
    }

    /// 获取错误类型字符串
    pub fn error_type(&self) -> &'static str {
        match self {
            RouterError::NotFound(_) => "not_found",
            RouterError::LockedRuleViolation { .. } => "locked_rule_violation",
            RouterError::NamespaceCollision(_) => "namespace_collision",
            RouterError::InvalidPattern(_) => "invalid_pattern",
            RouterError::UnknownProvider(_) => "unknown_provider",
            RouterError::NoProviderAvailable => "no_provider_available",
            RouterError::Storage(_) => "storage_error",
        }
    }

    /// 用户可以直接修正的输入错误
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            RouterError::NotFound(_)
                | RouterError::UnknownProvider(_)
                | RouterError::InvalidPattern(_)
        )
    }

    /// 策略违规：UI 应当提前禁用相关操作
    pub fn is_policy_violation(&self) -> bool {
        matches!(
            self,
            RouterError::LockedRuleViolation { .. } | RouterError::NamespaceCollision(_)
        )
    }

    /// 可在下一次加载时自动恢复
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RouterError::NoProviderAvailable)
    }

    /// 转换为 JSON 错误响应
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "message": self.to_string(),
                "type": self.error_type(),
            }
        })
    }
}
