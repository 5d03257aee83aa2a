//! 默认规则补齐
//!
//! OpenAI 与 Anthropic 分组各需要一条锁定的兜底路径规则。缺失时使用第一个可用
//! Provider 自动创建；已存在时不做任何事。

use crate::models::{ApiGroup, ProviderSummary, RoutingRule, RuleScope, RuleType};
use crate::services::error::RouterError;
use crate::services::priority::next_priority;

/// 需要自动补齐默认规则的分组
pub const BOOTSTRAP_GROUPS: [ApiGroup; 2] = [ApiGroup::OpenAI, ApiGroup::Anthropic];

/// 分组内是否已有锁定的兜底规则
pub fn has_default_rule(rules: &[RoutingRule], api_group: ApiGroup) -> bool {
    rules.iter().any(|r| {
        r.api_group == api_group
            && r.is_locked()
            && r.match_pattern == api_group.catch_all_pattern()
    })
}

/// 缺少默认规则的分组
pub fn missing_default_groups(rules: &[RoutingRule]) -> Vec<ApiGroup> {
    BOOTSTRAP_GROUPS
        .into_iter()
        .filter(|group| !has_default_rule(rules, *group))
        .collect()
}

/// 计算需要创建的默认规则
///
/// 无需补齐时返回空列表；需要补齐但没有 Provider 时返回 `NoProviderAvailable`。
pub fn plan_bootstrap(
    rules: &[RoutingRule],
    providers: &[ProviderSummary],
) -> Result<Vec<RoutingRule>, RouterError> {
    let missing = missing_default_groups(rules);
    if missing.is_empty() {
        return Ok(Vec::new());
    }

    let provider = providers.first().ok_or(RouterError::NoProviderAvailable)?;

    Ok(missing
        .into_iter()
        .map(|group| {
            let scope = RuleScope::new(group, RuleType::Path);
            RoutingRule::new(
                provider.id.clone(),
                group.catch_all_pattern().to_string(),
                next_priority(rules, scope),
                RuleType::Path,
                group,
            )
        })
        .collect())
}
