//! 路由表
//!
//! 提供调度器消费的物化规则视图：按分区分组、只含已启用规则、按优先级排序。

use crate::models::{ApiGroup, RoutingRule, RuleScope, RuleType};
use crate::router::pattern;
use indexmap::IndexMap;
use serde::Serialize;

/// 路由结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResult {
    /// 命中的规则
    pub rule_id: String,
    /// 目标 Provider
    pub provider_id: String,
    /// 最终发送给上游的模型名
    pub final_model: Option<String>,
    /// 模型名是否被改写
    pub model_rewritten: bool,
    /// 是否由 Generic 分组兜底命中
    pub via_generic: bool,
}

/// 路由表 - 已解析、已校验的规则集合
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    /// 分区 -> 已排序的启用规则
    partitions: IndexMap<RuleScope, Vec<RoutingRule>>,
}

impl RouteTable {
    /// 从规则列表构建路由表
    ///
    /// 每个分区内按 priority 升序排列；受保护的兜底规则始终排在分区末尾，
    /// 避免兜底规则遮蔽更具体的规则。
    pub fn from_rules<'a, I>(rules: I) -> Self
    where
        I: IntoIterator<Item = &'a RoutingRule>,
    {
        let mut partitions: IndexMap<RuleScope, Vec<RoutingRule>> = IndexMap::new();
        for rule in rules.into_iter().filter(|r| r.enabled) {
            partitions.entry(rule.scope()).or_default().push(rule.clone());
        }
        for rules in partitions.values_mut() {
            rules.sort_by_key(|r| (r.is_locked(), r.priority));
        }
        partitions.sort_keys();
        Self { partitions }
    }

    /// 获取分区内的有序规则
    pub fn partition(&self, api_group: ApiGroup, rule_type: RuleType) -> &[RoutingRule] {
        self.partitions
            .get(&RuleScope::new(api_group, rule_type))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// 遍历所有非空分区
    pub fn partitions(&self) -> impl Iterator<Item = (&RuleScope, &[RoutingRule])> {
        self.partitions.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// 启用规则总数
    pub fn len(&self) -> usize {
        self.partitions.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 路由请求
    ///
    /// 按以下顺序匹配：
    /// 1. 请求所属分组内的 Model 规则（仅当请求带模型名）
    /// 2. 请求所属分组内的 Path 规则
    /// 3. 若分组不是 Generic，则在 Generic 分组内重复 1、2
    ///
    /// 无规则命中时返回 `None`，由调度器自行决定后续行为。
    pub fn route(
        &self,
        api_group: ApiGroup,
        request_path: &str,
        model: Option<&str>,
    ) -> Option<RouteResult> {
        let (rule, via_generic) = match self.match_in_group(api_group, request_path, model) {
            Some(rule) => (rule, false),
            None if api_group != ApiGroup::Generic => (
                self.match_in_group(ApiGroup::Generic, request_path, model)?,
                true,
            ),
            None => return None,
        };

        let final_model = model.map(|m| rule.model_rewrite.clone().unwrap_or_else(|| m.to_string()));
        Some(RouteResult {
            rule_id: rule.id.clone(),
            provider_id: rule.provider_id.clone(),
            final_model,
            model_rewritten: rule.model_rewrite.is_some() && model.is_some(),
            via_generic,
        })
    }

    fn match_in_group(
        &self,
        api_group: ApiGroup,
        request_path: &str,
        model: Option<&str>,
    ) -> Option<&RoutingRule> {
        if let Some(model) = model {
            let hit = self
                .partition(api_group, RuleType::Model)
                .iter()
                .find(|r| pattern::matches(&r.match_pattern, model));
            if hit.is_some() {
                return hit;
            }
        }

        self.partition(api_group, RuleType::Path)
            .iter()
            .find(|r| pattern::matches(&r.match_pattern, request_path))
    }
}

#[cfg(test)]
mod route_table_tests {
    use super::*;

    fn rule(group: ApiGroup, rule_type: RuleType, pattern: &str, provider: &str, priority: i32) -> RoutingRule {
        RoutingRule::new(
            provider.to_string(),
            pattern.to_string(),
            priority,
            rule_type,
            group,
        )
    }

    #[test]
    fn test_partition_ordering() {
        let rules = vec![
            rule(ApiGroup::OpenAI, RuleType::Model, "gpt-4*", "p2", 2),
            rule(ApiGroup::OpenAI, RuleType::Model, "gpt-*", "p1", 1),
            rule(ApiGroup::Anthropic, RuleType::Model, "claude-*", "p1", 1),
        ];
        let table = RouteTable::from_rules(&rules);

        let openai = table.partition(ApiGroup::OpenAI, RuleType::Model);
        assert_eq!(openai.len(), 2);
        assert_eq!(openai[0].match_pattern, "gpt-*");
        assert_eq!(openai[1].match_pattern, "gpt-4*");
        assert_eq!(table.len(), 3);
        assert!(table.partition(ApiGroup::Generic, RuleType::Path).is_empty());

        let scopes: Vec<RuleScope> = table.partitions().map(|(s, _)| *s).collect();
        assert_eq!(
            scopes,
            vec![
                RuleScope::new(ApiGroup::OpenAI, RuleType::Model),
                RuleScope::new(ApiGroup::Anthropic, RuleType::Model),
            ]
        );
    }

    #[test]
    fn test_disabled_rules_excluded() {
        let mut disabled = rule(ApiGroup::OpenAI, RuleType::Model, "gpt-*", "p1", 1);
        disabled.enabled = false;
        let table = RouteTable::from_rules(&[disabled]);
        assert!(table.is_empty());
        assert!(table
            .route(ApiGroup::OpenAI, "/api/openai/v1/chat/completions", Some("gpt-4"))
            .is_none());
    }

    #[test]
    fn test_model_rules_before_path_rules() {
        let rules = vec![
            rule(ApiGroup::OpenAI, RuleType::Path, "/api/openai/*", "default", 1),
            rule(ApiGroup::OpenAI, RuleType::Model, "gpt-4*", "fast", 1),
        ];
        let table = RouteTable::from_rules(&rules);

        let result = table
            .route(ApiGroup::OpenAI, "/api/openai/v1/chat/completions", Some("gpt-4-turbo"))
            .unwrap();
        assert_eq!(result.provider_id, "fast");
        assert!(!result.via_generic);

        let result = table
            .route(ApiGroup::OpenAI, "/api/openai/v1/chat/completions", Some("o1"))
            .unwrap();
        assert_eq!(result.provider_id, "default");
    }

    #[test]
    fn test_catch_all_evaluated_last() {
        let rules = vec![
            rule(ApiGroup::OpenAI, RuleType::Path, "/api/openai/*", "default", 1),
            rule(ApiGroup::OpenAI, RuleType::Path, "/api/openai/v1/embeddings", "embed", 2),
        ];
        let table = RouteTable::from_rules(&rules);

        let result = table
            .route(ApiGroup::OpenAI, "/api/openai/v1/embeddings", None)
            .unwrap();
        assert_eq!(result.provider_id, "embed");

        let path_rules = table.partition(ApiGroup::OpenAI, RuleType::Path);
        assert_eq!(path_rules.last().unwrap().match_pattern, "/api/openai/*");
    }

    #[test]
    fn test_lowest_priority_wins() {
        let rules = vec![
            rule(ApiGroup::Anthropic, RuleType::Model, "claude-*", "second", 2),
            rule(ApiGroup::Anthropic, RuleType::Model, "claude-*", "first", 1),
        ];
        let table = RouteTable::from_rules(&rules);
        let result = table
            .route(ApiGroup::Anthropic, "/api/anthropic/v1/messages", Some("claude-opus"))
            .unwrap();
        assert_eq!(result.provider_id, "first");
    }

    #[test]
    fn test_generic_fallback() {
        let rules = vec![
            rule(ApiGroup::Generic, RuleType::Model, "gemini-*", "gemini", 1),
            rule(ApiGroup::Generic, RuleType::Path, "/api/*", "generic", 2),
        ];
        let table = RouteTable::from_rules(&rules);

        let result = table
            .route(ApiGroup::OpenAI, "/api/openai/v1/chat/completions", Some("gemini-2.5-pro"))
            .unwrap();
        assert_eq!(result.provider_id, "gemini");
        assert!(result.via_generic);

        let result = table.route(ApiGroup::Generic, "/api/v1/models", None).unwrap();
        assert_eq!(result.provider_id, "generic");
        assert!(!result.via_generic);

        assert!(table.route(ApiGroup::Generic, "/health", None).is_none());
    }

    #[test]
    fn test_groups_do_not_cross() {
        let rules = vec![rule(ApiGroup::Anthropic, RuleType::Model, "claude-*", "p1", 1)];
        let table = RouteTable::from_rules(&rules);
        assert!(table
            .route(ApiGroup::OpenAI, "/api/openai/v1/chat/completions", Some("claude-opus"))
            .is_none());
    }

    #[test]
    fn test_model_rewrite() {
        let mut rewrite = rule(ApiGroup::OpenAI, RuleType::Model, "gpt-4*", "p1", 1);
        rewrite.model_rewrite = Some("gpt-4o-mini".to_string());
        let table = RouteTable::from_rules(&[rewrite]);

        let result = table
            .route(ApiGroup::OpenAI, "/api/openai/v1/chat/completions", Some("gpt-4-turbo"))
            .unwrap();
        assert_eq!(result.final_model.as_deref(), Some("gpt-4o-mini"));
        assert!(result.model_rewritten);
    }

    #[test]
    fn test_model_rewrite_without_model() {
        let mut rewrite = rule(ApiGroup::OpenAI, RuleType::Path, "/api/openai/*", "p1", 1);
        rewrite.model_rewrite = Some("gpt-4o-mini".to_string());
        let table = RouteTable::from_rules(&[rewrite]);

        let result = table
            .route(ApiGroup::OpenAI, "/api/openai/v1/models", None)
            .unwrap();
        assert_eq!(result.final_model, None);
        assert!(!result.model_rewritten);
    }
}
