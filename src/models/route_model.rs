//! 路由规则模型
//!
//! 定义路由规则、API 分组、规则分区以及创建/更新输入结构。
//!
//! 规则按 `(api_group, rule_type)` 分区，priority 只在同一分区内有意义。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// OpenAI 分组的兜底路径规则
pub const OPENAI_CATCH_ALL: &str = "/api/openai/*";
/// Anthropic 分组的兜底路径规则
pub const ANTHROPIC_CATCH_ALL: &str = "/api/anthropic/*";
/// 通用分组的兜底路径规则
pub const GENERIC_CATCH_ALL: &str = "/api/*";

/// 受保护（锁定）的路径模式
pub const PROTECTED_PATTERNS: [&str; 3] = [OPENAI_CATCH_ALL, ANTHROPIC_CATCH_ALL, GENERIC_CATCH_ALL];

/// Generic 路径规则不可占用的命名空间前缀
pub const RESERVED_PATH_PREFIXES: [&str; 2] = ["/api/openai", "/api/anthropic"];

/// 无法解析的枚举取值
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("无法识别的取值: {0}")]
pub struct UnknownVariant(pub String);

/// 规则类型
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
pub enum RuleType {
    /// 匹配请求路径
    #[serde(rename = "path")]
    Path,
    /// 匹配请求中的模型名
    #[serde(rename = "model")]
    #[default]
    Model,
}

impl RuleType {
    pub const ALL: [RuleType; 2] = [RuleType::Path, RuleType::Model];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Path => "path",
            RuleType::Model => "model",
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "path" => Ok(RuleType::Path),
            "model" => Ok(RuleType::Model),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// API 兼容分组
///
/// 分组之间互不干扰：匹配时规则不会跨分组生效（Generic 兜底除外，见 [`crate::router::RouteTable`]）。
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
pub enum ApiGroup {
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "generic")]
    #[default]
    Generic,
}

impl ApiGroup {
    pub const ALL: [ApiGroup; 3] = [ApiGroup::OpenAI, ApiGroup::Anthropic, ApiGroup::Generic];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApiGroup::OpenAI => "openai",
            ApiGroup::Anthropic => "anthropic",
            ApiGroup::Generic => "generic",
        }
    }

    /// 分组保留的兜底路径模式
    pub fn catch_all_pattern(&self) -> &'static str {
        match self {
            ApiGroup::OpenAI => OPENAI_CATCH_ALL,
            ApiGroup::Anthropic => ANTHROPIC_CATCH_ALL,
            ApiGroup::Generic => GENERIC_CATCH_ALL,
        }
    }

    /// 根据请求路径判断所属分组
    ///
    /// - `/api/openai/...` -> OpenAI
    /// - `/api/anthropic/...` -> Anthropic
    /// - 其他 -> Generic
    pub fn from_request_path(path: &str) -> Self {
        if is_under(path, "/api/openai") {
            ApiGroup::OpenAI
        } else if is_under(path, "/api/anthropic") {
            ApiGroup::Anthropic
        } else {
            ApiGroup::Generic
        }
    }
}

fn is_under(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

impl fmt::Display for ApiGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiGroup {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(ApiGroup::OpenAI),
            "anthropic" => Ok(ApiGroup::Anthropic),
            "generic" => Ok(ApiGroup::Generic),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// 规则分区 `(api_group, rule_type)`
///
/// 排序顺序：OpenAI < Anthropic < Generic，同分组内 Path < Model。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct RuleScope {
    pub api_group: ApiGroup,
    pub rule_type: RuleType,
}

impl RuleScope {
    pub fn new(api_group: ApiGroup, rule_type: RuleType) -> Self {
        Self {
            api_group,
            rule_type,
        }
    }
}

impl fmt::Display for RuleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_group, self.rule_type)
    }
}

/// 判断 `(rule_type, match_pattern)` 是否构成受保护的默认规则
///
/// 受保护的规则必须是 Path 类型，且模式为三个保留兜底模式之一。
pub fn is_protected(rule_type: RuleType, match_pattern: &str) -> bool {
    rule_type == RuleType::Path && PROTECTED_PATTERNS.contains(&match_pattern)
}

/// 路由规则
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoutingRule {
    pub id: String,
    #[serde(default)]
    pub rule_type: RuleType,
    #[serde(default)]
    pub api_group: ApiGroup,
    pub provider_id: String,
    /// 匹配模式（`*` 匹配任意字符序列）
    pub match_pattern: String,
    /// 命中后替换的模型名
    pub model_rewrite: Option<String>,
    /// 优先级（数字越小越先匹配）
    pub priority: i32,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RoutingRule {
    /// 创建新的路由规则
    pub fn new(
        provider_id: String,
        match_pattern: String,
        priority: i32,
        rule_type: RuleType,
        api_group: ApiGroup,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            rule_type,
            api_group,
            provider_id,
            match_pattern,
            model_rewrite: None,
            priority,
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn scope(&self) -> RuleScope {
        RuleScope::new(self.api_group, self.rule_type)
    }

    /// 是否为锁定的默认规则
    pub fn is_locked(&self) -> bool {
        is_protected(self.rule_type, &self.match_pattern)
    }
}

/// 新规则的插入位置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum InsertPosition {
    /// 追加到分区末尾
    #[default]
    Last,
    /// 插入到指定规则之前
    #[serde(rename_all = "camelCase")]
    Before { rule_id: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRuleInput {
    #[serde(default)]
    pub rule_type: RuleType,
    #[serde(default)]
    pub api_group: ApiGroup,
    pub provider_id: String,
    pub match_pattern: String,
    pub model_rewrite: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub position: InsertPosition,
}

fn default_enabled() -> bool {
    true
}

impl CreateRuleInput {
    pub fn new(
        api_group: ApiGroup,
        rule_type: RuleType,
        provider_id: &str,
        match_pattern: &str,
    ) -> Self {
        Self {
            rule_type,
            api_group,
            provider_id: provider_id.to_string(),
            match_pattern: match_pattern.to_string(),
            model_rewrite: None,
            enabled: true,
            position: InsertPosition::Last,
        }
    }

    pub fn scope(&self) -> RuleScope {
        RuleScope::new(self.api_group, self.rule_type)
    }
}

/// 规则更新补丁
///
/// `model_rewrite` 传入空字符串表示清除改写。
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRuleInput {
    pub rule_type: Option<RuleType>,
    pub api_group: Option<ApiGroup>,
    pub provider_id: Option<String>,
    pub match_pattern: Option<String>,
    pub model_rewrite: Option<String>,
    pub enabled: Option<bool>,
}

impl UpdateRuleInput {
    /// 将补丁应用到规则上（不修改 priority 和时间戳）
    pub fn apply_to(&self, rule: &mut RoutingRule) {
        if let Some(rule_type) = self.rule_type {
            rule.rule_type = rule_type;
        }
        if let Some(api_group) = self.api_group {
            rule.api_group = api_group;
        }
        if let Some(ref provider_id) = self.provider_id {
            rule.provider_id = provider_id.clone();
        }
        if let Some(ref match_pattern) = self.match_pattern {
            rule.match_pattern = match_pattern.trim().to_string();
        }
        if let Some(ref model_rewrite) = self.model_rewrite {
            rule.model_rewrite = if model_rewrite.trim().is_empty() {
                None
            } else {
                Some(model_rewrite.clone())
            };
        }
        if let Some(enabled) = self.enabled {
            rule.enabled = enabled;
        }
    }
}

/// 默认（锁定）规则的专用编辑入口
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DefaultRuleInput {
    pub provider_id: Option<String>,
    pub enabled: Option<bool>,
}

/// 单条优先级分配
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriorityAssignment {
    pub id: String,
    pub priority: i32,
    pub updated_at: DateTime<Utc>,
}
