//! 优先级计算
//!
//! priority 只在同一分区 `(api_group, rule_type)` 内比较。
//! - 新建/复制：追加到分区当前最大值之后
//! - 重排：列出的规则按顺序占用分区内最小的空闲值，未列出的规则保持不变
//! - 指定位置插入：锚点及其后的未锁定规则依次后移，跳过锁定规则占用的值
//! - 加载：分区内重复的 priority 重新编号

use crate::models::{PriorityAssignment, RoutingRule, RuleScope};
use crate::services::error::{LockedAction, RouterError};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::collections::HashSet;

/// 分区内下一个追加位置
pub fn next_priority(rules: &[RoutingRule], scope: RuleScope) -> i32 {
    rules
        .iter()
        .filter(|r| r.scope() == scope)
        .map(|r| r.priority)
        .max()
        .unwrap_or(0)
        + 1
}

/// 计算重排结果
///
/// `ids` 中未知的 id 会让整个重排失败；锁定规则会被忽略；重复 id 只计一次。
/// 若一次传入多个分区的规则，各分区独立计算。
pub fn plan_reorder(
    rules: &[RoutingRule],
    ids: &[String],
    now: DateTime<Utc>,
) -> Result<Vec<PriorityAssignment>, RouterError> {
    let mut by_scope: IndexMap<RuleScope, Vec<&RoutingRule>> = IndexMap::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut listed_ids: HashSet<&str> = HashSet::new();

    for id in ids {
        if !seen.insert(id.as_str()) {
            continue;
        }
        let rule = rules
            .iter()
            .find(|r| r.id == *id)
            .ok_or_else(|| RouterError::NotFound(id.clone()))?;
        if rule.is_locked() {
            tracing::debug!(rule_id = %rule.id, "[路由规则] 锁定规则不参与重排，已忽略");
            continue;
        }
        listed_ids.insert(rule.id.as_str());
        by_scope.entry(rule.scope()).or_default().push(rule);
    }

    let mut assignments = Vec::new();
    for (scope, listed) in by_scope {
        let occupied: HashSet<i32> = rules
            .iter()
            .filter(|r| r.scope() == scope && !listed_ids.contains(r.id.as_str()))
            .map(|r| r.priority)
            .collect();

        let mut slot = 0;
        for rule in listed {
            slot += 1;
            while occupied.contains(&slot) {
                slot += 1;
            }
            assignments.push(PriorityAssignment {
                id: rule.id.clone(),
                priority: slot,
                updated_at: now,
            });
        }
    }

    Ok(assignments)
}

/// 计算“插入到锚点之前”所需的优先级
///
/// 返回新规则的 priority 以及需要后移的已有规则。锚点不能是锁定规则；
/// 锁定规则不参与后移，后移的规则会跳过锁定规则占用的值，遇到空隙即停止移动。
pub fn plan_insert_before(
    rules: &[RoutingRule],
    scope: RuleScope,
    anchor_id: &str,
    now: DateTime<Utc>,
) -> Result<(i32, Vec<PriorityAssignment>), RouterError> {
    let anchor = rules
        .iter()
        .find(|r| r.id == anchor_id && r.scope() == scope)
        .ok_or_else(|| RouterError::NotFound(anchor_id.to_string()))?;
    if anchor.is_locked() {
        return Err(RouterError::locked(anchor_id, LockedAction::Reorder));
    }
    let target = anchor.priority;

    let locked: HashSet<i32> = rules
        .iter()
        .filter(|r| r.scope() == scope && r.is_locked())
        .map(|r| r.priority)
        .collect();
    let mut later: Vec<&RoutingRule> = rules
        .iter()
        .filter(|r| r.scope() == scope && !r.is_locked() && r.priority >= target)
        .collect();
    later.sort_by_key(|r| r.priority);

    let mut shifted = Vec::new();
    let mut cursor = target;
    for rule in later {
        let mut next = cursor + 1;
        while locked.contains(&next) {
            next += 1;
        }
        if rule.priority >= next {
            break;
        }
        shifted.push(PriorityAssignment {
            id: rule.id.clone(),
            priority: next,
            updated_at: now,
        });
        cursor = next;
    }

    Ok((target, shifted))
}

/// 消除分区内重复的 priority
///
/// 同值的规则中锁定规则优先保留原值，其次是最早创建的一条，其余依次追加到分区末尾。
/// 无重复时返回空列表。
pub fn plan_tie_break(rules: &[RoutingRule], now: DateTime<Utc>) -> Vec<PriorityAssignment> {
    let mut by_scope: IndexMap<RuleScope, Vec<&RoutingRule>> = IndexMap::new();
    for rule in rules {
        by_scope.entry(rule.scope()).or_default().push(rule);
    }

    let mut assignments = Vec::new();
    for (_, mut partition) in by_scope {
        partition.sort_by_key(|r| (r.priority, !r.is_locked(), r.created_at, r.id.clone()));
        let mut max = partition.iter().map(|r| r.priority).max().unwrap_or(0);
        let mut seen: HashSet<i32> = HashSet::new();
        for rule in partition {
            if seen.insert(rule.priority) {
                continue;
            }
            max += 1;
            assignments.push(PriorityAssignment {
                id: rule.id.clone(),
                priority: max,
                updated_at: now,
            });
        }
    }
    assignments
}

/// 将优先级分配应用到规则集合
pub fn apply_assignments(rules: &mut [RoutingRule], assignments: &[PriorityAssignment]) {
    for assignment in assignments {
        if let Some(rule) = rules.iter_mut().find(|r| r.id == assignment.id) {
            rule.priority = assignment.priority;
            rule.updated_at = assignment.updated_at;
        }
    }
}
