//! 规则校验
//!
//! 在每次创建/更新/删除/复制提交之前执行，校验失败时不会产生任何写入。

use crate::models::{
    is_protected, ApiGroup, CreateRuleInput, ProviderSummary, RoutingRule, RuleType,
    UpdateRuleInput, RESERVED_PATH_PREFIXES,
};
use crate::services::error::{LockedAction, RouterError};

/// 校验器，持有当前规则集合与 Provider 列表的只读视图
pub struct ValidationGuard<'a> {
    rules: &'a [RoutingRule],
    providers: &'a [ProviderSummary],
}

impl<'a> ValidationGuard<'a> {
    pub fn new(rules: &'a [RoutingRule], providers: &'a [ProviderSummary]) -> Self {
        Self { rules, providers }
    }

    pub fn check_create(&self, input: &CreateRuleInput) -> Result<(), RouterError> {
        self.check_candidate(
            input.api_group,
            input.rule_type,
            &input.provider_id,
            &input.match_pattern,
            None,
        )
    }

    /// 校验更新补丁，返回应用补丁后的规则（priority 与时间戳未调整）
    pub fn check_update(
        &self,
        existing: &RoutingRule,
        patch: &UpdateRuleInput,
    ) -> Result<RoutingRule, RouterError> {
        if existing.is_locked() {
            if let Some(ref pattern) = patch.match_pattern {
                if pattern.trim() != existing.match_pattern {
                    return Err(RouterError::locked(&existing.id, LockedAction::EditPattern));
                }
            }
            let scope_changed = patch.rule_type.is_some_and(|t| t != existing.rule_type)
                || patch.api_group.is_some_and(|g| g != existing.api_group);
            if scope_changed {
                return Err(RouterError::locked(&existing.id, LockedAction::EditScope));
            }
        }

        let mut candidate = existing.clone();
        patch.apply_to(&mut candidate);
        self.check_candidate(
            candidate.api_group,
            candidate.rule_type,
            &candidate.provider_id,
            &candidate.match_pattern,
            Some(&existing.id),
        )?;
        Ok(candidate)
    }

    pub fn check_delete(&self, rule: &RoutingRule) -> Result<(), RouterError> {
        if rule.is_locked() {
            return Err(RouterError::locked(&rule.id, LockedAction::Delete));
        }
        Ok(())
    }

    pub fn check_duplicate(&self, rule: &RoutingRule) -> Result<(), RouterError> {
        if rule.is_locked() {
            return Err(RouterError::locked(&rule.id, LockedAction::Duplicate));
        }
        self.check_provider(&rule.provider_id)
    }

    pub fn check_provider(&self, provider_id: &str) -> Result<(), RouterError> {
        if self.providers.iter().any(|p| p.id == provider_id) {
            Ok(())
        } else {
            Err(RouterError::UnknownProvider(provider_id.to_string()))
        }
    }

    fn check_candidate(
        &self,
        api_group: ApiGroup,
        rule_type: RuleType,
        provider_id: &str,
        match_pattern: &str,
        exclude_id: Option<&str>,
    ) -> Result<(), RouterError> {
        validate_pattern(match_pattern)?;
        let pattern = match_pattern.trim();
        check_namespace(api_group, rule_type, pattern)?;

        // 每个分组的受保护默认规则只能有一条
        if is_protected(rule_type, pattern) {
            if let Some(existing) = self.rules.iter().find(|r| {
                Some(r.id.as_str()) != exclude_id
                    && r.api_group == api_group
                    && r.is_locked()
                    && r.match_pattern == pattern
            }) {
                return Err(RouterError::locked(&existing.id, LockedAction::CreateDefault));
            }
        }

        self.check_provider(provider_id)
    }
}

/// 匹配模式去除首尾空白后不能为空
pub fn validate_pattern(pattern: &str) -> Result<(), RouterError> {
    if pattern.trim().is_empty() {
        return Err(RouterError::InvalidPattern(pattern.to_string()));
    }
    Ok(())
}

/// Generic 分组的路径规则不能以 `/api/openai` 或 `/api/anthropic` 开头
pub fn check_namespace(
    api_group: ApiGroup,
    rule_type: RuleType,
    pattern: &str,
) -> Result<(), RouterError> {
    if api_group == ApiGroup::Generic
        && rule_type == RuleType::Path
        && RESERVED_PATH_PREFIXES
            .iter()
            .any(|prefix| pattern.starts_with(prefix))
    {
        return Err(RouterError::NamespaceCollision(pattern.to_string()));
    }
    Ok(())
}
