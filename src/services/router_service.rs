//! 路由规则服务
//!
//! 持有规则的内存缓存，所有修改先经过 [`ValidationGuard`] 校验，再写入
//! [`RuleRepository`]，写入成功后才更新缓存。写入失败时缓存保持不变。
//!
//! 修改操作与默认规则补齐由同一把写锁串行化；读取只需要缓存的读锁。

use crate::config::RouterConfig;
use crate::database::migration::migrate_from_json;
use crate::database::repository::{RuleRepository, SqliteRuleRepository};
use crate::database::{init_database, lock};
use crate::models::{
    ApiGroup, CreateRuleInput, DefaultRuleInput, InsertPosition, PriorityAssignment,
    ProviderDeletionPolicy, ProviderSummary, RoutingRule, RuleScope, RuleType, UpdateRuleInput,
};
use crate::router::RouteTable;
use crate::services::bootstrap::plan_bootstrap;
use crate::services::error::RouterError;
use crate::services::priority::{
    apply_assignments, next_priority, plan_insert_before, plan_reorder, plan_tie_break,
};
use crate::services::provider_registry::{ProviderRegistry, SqliteProviderRegistry};
use crate::services::validation::ValidationGuard;
use chrono::Utc;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

pub struct RouterService {
    repository: Arc<dyn RuleRepository>,
    providers: Arc<dyn ProviderRegistry>,
    rules: RwLock<Vec<RoutingRule>>,
    write_lock: Mutex<()>,
    auto_bootstrap: bool,
    deletion_policy: ProviderDeletionPolicy,
}

impl RouterService {
    /// 创建服务（缓存为空，不读取存储）
    pub fn new(repository: Arc<dyn RuleRepository>, providers: Arc<dyn ProviderRegistry>) -> Self {
        Self {
            repository,
            providers,
            rules: RwLock::new(Vec::new()),
            write_lock: Mutex::new(()),
            auto_bootstrap: false,
            deletion_policy: ProviderDeletionPolicy::default(),
        }
    }

    /// 创建服务并从存储加载规则
    ///
    /// `auto_bootstrap` 为 true 时加载后补齐缺失的默认规则；没有 Provider 时推迟到下次加载。
    pub fn load(
        repository: Arc<dyn RuleRepository>,
        providers: Arc<dyn ProviderRegistry>,
        auto_bootstrap: bool,
    ) -> Result<Self, RouterError> {
        let mut service = Self::new(repository, providers);
        service.auto_bootstrap = auto_bootstrap;
        service.reload()?;
        Ok(service)
    }

    /// 按配置打开 SQLite 存储并加载
    pub fn open(config: &RouterConfig) -> Result<Self, RouterError> {
        let db = init_database(config.database_path.as_deref())?;

        if let Some(ref legacy_path) = config.legacy_settings_path {
            let mut conn = lock(&db)?;
            let imported = migrate_from_json(&mut conn, legacy_path)?;
            if imported > 0 {
                tracing::info!("[数据库] 已从 {:?} 导入 {} 条路由规则", legacy_path, imported);
            }
        }

        let repository = Arc::new(SqliteRuleRepository::new(db.clone()));
        let providers = Arc::new(SqliteProviderRegistry::new(db));
        let service = Self::load(repository, providers, config.bootstrap.enabled)?;
        Ok(service.with_deletion_policy(config.provider_deletion))
    }

    pub fn with_deletion_policy(mut self, policy: ProviderDeletionPolicy) -> Self {
        self.deletion_policy = policy;
        self
    }

    pub fn deletion_policy(&self) -> ProviderDeletionPolicy {
        self.deletion_policy
    }

    /// 从存储重新加载规则
    ///
    /// 同一分组下重复的默认规则只保留最早创建的一条，其余从存储中删除。
    pub fn reload(&self) -> Result<(), RouterError> {
        let _guard = self.write_lock.lock();

        let mut rules = self.repository.list_rules()?;
        let result = self
            .drop_duplicate_defaults(&mut rules)
            .and_then(|_| self.renumber_ties(&mut rules));
        *self.rules.write() = rules;
        result?;

        tracing::info!("[路由规则] 已加载 {} 条规则", self.rules.read().len());

        if self.auto_bootstrap {
            match self.bootstrap_locked() {
                Ok(_) => {}
                Err(RouterError::NoProviderAvailable) => {
                    tracing::warn!("[路由规则] 尚无可用 Provider，默认规则将在下次加载时创建");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// 列出规则，按分区和 priority 升序排列
    pub fn list(&self, scope: Option<RuleScope>) -> Vec<RoutingRule> {
        let mut rules: Vec<RoutingRule> = self
            .rules
            .read()
            .iter()
            .filter(|r| scope.map_or(true, |s| r.scope() == s))
            .cloned()
            .collect();
        rules.sort_by(|a, b| {
            (a.scope(), a.priority, a.created_at).cmp(&(b.scope(), b.priority, b.created_at))
        });
        rules
    }

    pub fn get(&self, id: &str) -> Result<RoutingRule, RouterError> {
        self.rules
            .read()
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| RouterError::NotFound(id.to_string()))
    }

    /// 生成供调度器使用的路由表（仅含启用的规则）
    pub fn route_table(&self) -> RouteTable {
        RouteTable::from_rules(self.rules.read().iter())
    }

    /// 创建规则
    pub fn create(&self, input: CreateRuleInput) -> Result<RoutingRule, RouterError> {
        let _guard = self.write_lock.lock();
        let snapshot = self.snapshot();
        let providers = self.list_providers()?;

        if let Err(e) = ValidationGuard::new(&snapshot, &providers).check_create(&input) {
            tracing::warn!(
                api_group = %input.api_group,
                rule_type = %input.rule_type,
                "[路由规则] 拒绝创建: {}",
                e
            );
            return Err(e);
        }

        let scope = input.scope();
        let now = Utc::now();
        let (priority, shifted) = match input.position {
            InsertPosition::Last => (next_priority(&snapshot, scope), Vec::new()),
            InsertPosition::Before { ref rule_id } => {
                match plan_insert_before(&snapshot, scope, rule_id, now) {
                    Ok(planned) => planned,
                    Err(e) => {
                        tracing::warn!(anchor_id = %rule_id, "[路由规则] 拒绝插入: {}", e);
                        return Err(e);
                    }
                }
            }
        };

        let mut rule = RoutingRule::new(
            input.provider_id,
            input.match_pattern.trim().to_string(),
            priority,
            input.rule_type,
            input.api_group,
        );
        rule.model_rewrite = input.model_rewrite.filter(|m| !m.trim().is_empty());
        rule.enabled = input.enabled;

        if !shifted.is_empty() {
            self.persist_assignments(&shifted)?;
        }

        let created = match self.repository.create_rule(&rule) {
            Ok(created) => created,
            Err(e) => {
                if !shifted.is_empty() {
                    self.restore_priorities(&snapshot, &shifted);
                }
                return Err(e.into());
            }
        };
        self.rules.write().push(created.clone());

        tracing::info!(
            rule_id = %created.id,
            api_group = %created.api_group,
            rule_type = %created.rule_type,
            priority = created.priority,
            "[路由规则] 已创建"
        );
        Ok(created)
    }

    /// 更新规则
    ///
    /// 修改分组或类型时规则移动到新分区末尾。
    pub fn update(&self, id: &str, patch: UpdateRuleInput) -> Result<RoutingRule, RouterError> {
        let _guard = self.write_lock.lock();
        let snapshot = self.snapshot();
        let existing = self.find_in(&snapshot, id)?;
        let providers = self.list_providers()?;

        let mut candidate =
            match ValidationGuard::new(&snapshot, &providers).check_update(&existing, &patch) {
                Ok(candidate) => candidate,
                Err(e) => {
                    tracing::warn!(rule_id = %id, "[路由规则] 拒绝更新: {}", e);
                    return Err(e);
                }
            };

        if candidate.scope() != existing.scope() {
            candidate.priority = next_priority(&snapshot, candidate.scope());
        }
        candidate.updated_at = Utc::now();

        let updated = self.persist_update(&candidate)?;
        tracing::info!(
            rule_id = %updated.id,
            api_group = %updated.api_group,
            rule_type = %updated.rule_type,
            priority = updated.priority,
            "[路由规则] 已更新"
        );
        Ok(updated)
    }

    /// 删除规则，不调整其他规则的 priority
    pub fn delete(&self, id: &str) -> Result<(), RouterError> {
        let _guard = self.write_lock.lock();
        let snapshot = self.snapshot();
        let existing = self.find_in(&snapshot, id)?;

        if let Err(e) = ValidationGuard::new(&snapshot, &[]).check_delete(&existing) {
            tracing::warn!(rule_id = %id, "[路由规则] 拒绝删除: {}", e);
            return Err(e);
        }

        self.persist_delete(id)?;
        tracing::info!(
            rule_id = %id,
            api_group = %existing.api_group,
            rule_type = %existing.rule_type,
            "[路由规则] 已删除"
        );
        Ok(())
    }

    /// 复制规则，新规则强制启用并追加到分区末尾
    pub fn duplicate(&self, id: &str) -> Result<RoutingRule, RouterError> {
        let _guard = self.write_lock.lock();
        let snapshot = self.snapshot();
        let source = self.find_in(&snapshot, id)?;
        let providers = self.list_providers()?;

        if let Err(e) = ValidationGuard::new(&snapshot, &providers).check_duplicate(&source) {
            tracing::warn!(rule_id = %id, "[路由规则] 拒绝复制: {}", e);
            return Err(e);
        }

        let mut rule = RoutingRule::new(
            source.provider_id.clone(),
            source.match_pattern.clone(),
            next_priority(&snapshot, source.scope()),
            source.rule_type,
            source.api_group,
        );
        rule.model_rewrite = source.model_rewrite.clone();

        let created = self.repository.create_rule(&rule)?;
        self.rules.write().push(created.clone());

        tracing::info!(
            rule_id = %created.id,
            source_id = %id,
            priority = created.priority,
            "[路由规则] 已复制"
        );
        Ok(created)
    }

    /// 按给定顺序重排规则
    pub fn reorder(&self, ids: &[String]) -> Result<(), RouterError> {
        let _guard = self.write_lock.lock();
        let snapshot = self.snapshot();

        let assignments = match plan_reorder(&snapshot, ids, Utc::now()) {
            Ok(assignments) => assignments,
            Err(e) => {
                tracing::warn!("[路由规则] 拒绝重排: {}", e);
                return Err(e);
            }
        };
        if assignments.is_empty() {
            return Ok(());
        }

        self.persist_assignments(&assignments)?;
        tracing::info!("[路由规则] 已重排 {} 条规则", assignments.len());
        Ok(())
    }

    /// 补齐缺失的默认规则，返回新建的规则
    pub fn bootstrap(&self) -> Result<Vec<RoutingRule>, RouterError> {
        let _guard = self.write_lock.lock();
        self.bootstrap_locked()
    }

    /// 分组的默认（兜底）规则
    pub fn default_rule(&self, api_group: ApiGroup) -> Option<RoutingRule> {
        self.rules
            .read()
            .iter()
            .find(|r| is_default_of(r, api_group))
            .cloned()
    }

    /// 修改分组默认规则的 Provider 或启用状态
    pub fn set_default_rule(
        &self,
        api_group: ApiGroup,
        input: DefaultRuleInput,
    ) -> Result<RoutingRule, RouterError> {
        let _guard = self.write_lock.lock();
        let snapshot = self.snapshot();
        let mut rule = snapshot
            .iter()
            .find(|r| is_default_of(r, api_group))
            .cloned()
            .ok_or_else(|| RouterError::NotFound(api_group.catch_all_pattern().to_string()))?;

        if let Some(provider_id) = input.provider_id {
            let providers = self.list_providers()?;
            ValidationGuard::new(&snapshot, &providers).check_provider(&provider_id)?;
            rule.provider_id = provider_id;
        }
        if let Some(enabled) = input.enabled {
            rule.enabled = enabled;
        }
        rule.updated_at = Utc::now();

        let updated = self.persist_update(&rule)?;
        tracing::info!(
            rule_id = %updated.id,
            api_group = %api_group,
            provider_id = %updated.provider_id,
            enabled = updated.enabled,
            "[路由规则] 已更新默认规则"
        );
        Ok(updated)
    }

    pub(crate) fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock()
    }

    pub(crate) fn snapshot(&self) -> Vec<RoutingRule> {
        self.rules.read().clone()
    }

    pub(crate) fn list_providers(&self) -> Result<Vec<ProviderSummary>, RouterError> {
        Ok(self.providers.list_providers()?)
    }

    /// 调用方需持有写锁
    pub(crate) fn bootstrap_locked(&self) -> Result<Vec<RoutingRule>, RouterError> {
        let snapshot = self.snapshot();
        let providers = self.list_providers()?;
        let planned = plan_bootstrap(&snapshot, &providers)?;

        let mut created = Vec::with_capacity(planned.len());
        for rule in planned {
            let rule = self.repository.create_rule(&rule)?;
            self.rules.write().push(rule.clone());
            tracing::info!(
                rule_id = %rule.id,
                api_group = %rule.api_group,
                provider_id = %rule.provider_id,
                priority = rule.priority,
                "[路由规则] 已创建默认规则"
            );
            created.push(rule);
        }
        Ok(created)
    }

    pub(crate) fn persist_update(&self, rule: &RoutingRule) -> Result<RoutingRule, RouterError> {
        let updated = self.repository.update_rule(&rule.id, rule)?;
        if let Some(slot) = self.rules.write().iter_mut().find(|r| r.id == updated.id) {
            *slot = updated.clone();
        }
        Ok(updated)
    }

    pub(crate) fn persist_delete(&self, id: &str) -> Result<(), RouterError> {
        self.repository.delete_rule(id)?;
        self.rules.write().retain(|r| r.id != id);
        Ok(())
    }

    fn persist_assignments(&self, assignments: &[PriorityAssignment]) -> Result<(), RouterError> {
        self.repository.reorder_rules(assignments)?;
        apply_assignments(&mut self.rules.write(), assignments);
        Ok(())
    }

    /// 插入失败后恢复被后移的规则
    fn restore_priorities(&self, snapshot: &[RoutingRule], shifted: &[PriorityAssignment]) {
        let original: Vec<PriorityAssignment> = shifted
            .iter()
            .filter_map(|a| snapshot.iter().find(|r| r.id == a.id))
            .map(|r| PriorityAssignment {
                id: r.id.clone(),
                priority: r.priority,
                updated_at: r.updated_at,
            })
            .collect();

        if let Err(e) = self.persist_assignments(&original) {
            tracing::error!("[路由规则] 恢复优先级失败: {}", e);
        }
    }

    fn find_in(&self, rules: &[RoutingRule], id: &str) -> Result<RoutingRule, RouterError> {
        rules.iter().find(|r| r.id == id).cloned().ok_or_else(|| {
            tracing::warn!(rule_id = %id, "[路由规则] 规则不存在");
            RouterError::NotFound(id.to_string())
        })
    }

    /// 分区内 priority 重复时重新编号并写回存储
    fn renumber_ties(&self, rules: &mut [RoutingRule]) -> Result<(), RouterError> {
        let assignments = plan_tie_break(rules, Utc::now());
        if assignments.is_empty() {
            return Ok(());
        }
        self.repository.reorder_rules(&assignments)?;
        apply_assignments(rules, &assignments);
        tracing::info!("[路由规则] 已为 {} 条优先级重复的规则重新编号", assignments.len());
        Ok(())
    }

    /// 删除重复的默认规则，`rules` 只移除已成功删除的条目
    fn drop_duplicate_defaults(&self, rules: &mut Vec<RoutingRule>) -> Result<(), RouterError> {
        for id in duplicate_default_ids(rules) {
            self.repository.delete_rule(&id)?;
            rules.retain(|r| r.id != id);
            tracing::info!(rule_id = %id, "[路由规则] 已移除重复的默认规则");
        }
        Ok(())
    }
}

fn is_default_of(rule: &RoutingRule, api_group: ApiGroup) -> bool {
    rule.api_group == api_group
        && rule.rule_type == RuleType::Path
        && rule.match_pattern == api_group.catch_all_pattern()
}

/// 同一分组、同一模式的锁定规则中，除最早创建的一条外的全部 id
fn duplicate_default_ids(rules: &[RoutingRule]) -> Vec<String> {
    let mut kept: HashMap<(ApiGroup, &str), &RoutingRule> = HashMap::new();
    let mut dropped = Vec::new();

    for rule in rules.iter().filter(|r| r.is_locked()) {
        let key = (rule.api_group, rule.match_pattern.as_str());
        match kept.get(&key) {
            Some(current) if (current.created_at, &current.id) <= (rule.created_at, &rule.id) => {
                dropped.push(rule.id.clone());
            }
            Some(current) => {
                dropped.push(current.id.clone());
                kept.insert(key, rule);
            }
            None => {
                kept.insert(key, rule);
            }
        }
    }
    dropped
}
