//! 服务层测试辅助

use crate::database::open_in_memory;
use crate::database::repository::{RuleRepository, SqliteRuleRepository};
use crate::database::StorageError;
use crate::models::{ApiGroup, CreateRuleInput, PriorityAssignment, ProviderSummary, RoutingRule, RuleType};
use crate::services::provider_registry::StaticProviderRegistry;
use crate::services::RouterService;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 存储失败开关
#[derive(Debug, Clone, Default)]
pub struct Faults {
    all: Arc<AtomicBool>,
    create: Arc<AtomicBool>,
}

impl Faults {
    /// 所有存储调用失败
    pub fn fail_all(&self, on: bool) {
        self.all.store(on, Ordering::SeqCst);
    }

    /// 只有 `create_rule` 失败
    pub fn fail_create(&self, on: bool) {
        self.create.store(on, Ordering::SeqCst);
    }
}

fn injected(flag: &AtomicBool) -> Result<(), StorageError> {
    if flag.load(Ordering::SeqCst) {
        return Err(StorageError::Backend("injected failure".to_string()));
    }
    Ok(())
}

/// 可按开关注入写入失败的存储
pub struct FlakyRepository {
    inner: SqliteRuleRepository,
    faults: Faults,
}

impl FlakyRepository {
    fn check(&self) -> Result<(), StorageError> {
        injected(&self.faults.all)
    }
}

impl RuleRepository for FlakyRepository {
    fn list_rules(&self) -> Result<Vec<RoutingRule>, StorageError> {
        self.check()?;
        self.inner.list_rules()
    }

    fn create_rule(&self, rule: &RoutingRule) -> Result<RoutingRule, StorageError> {
        self.check()?;
        injected(&self.faults.create)?;
        self.inner.create_rule(rule)
    }

    fn update_rule(&self, id: &str, rule: &RoutingRule) -> Result<RoutingRule, StorageError> {
        self.check()?;
        self.inner.update_rule(id, rule)
    }

    fn delete_rule(&self, id: &str) -> Result<(), StorageError> {
        self.check()?;
        self.inner.delete_rule(id)
    }

    fn reorder_rules(&self, assignments: &[PriorityAssignment]) -> Result<(), StorageError> {
        self.check()?;
        self.inner.reorder_rules(assignments)
    }
}

fn summaries(ids: &[&str]) -> Vec<ProviderSummary> {
    ids.iter().map(|id| ProviderSummary::new(id, id)).collect()
}

/// 内存 SQLite + 静态 Provider 列表
pub fn service_with_providers(provider_ids: &[&str], auto_bootstrap: bool) -> RouterService {
    let repository = Arc::new(SqliteRuleRepository::new(open_in_memory().unwrap()));
    let registry = Arc::new(StaticProviderRegistry::new(summaries(provider_ids)));
    RouterService::load(repository, registry, auto_bootstrap).unwrap()
}

/// 返回服务以及可修改的 Provider 注册表（自动补齐默认规则）
pub fn provider_registry(provider_ids: &[&str]) -> (RouterService, Arc<StaticProviderRegistry>) {
    let repository = Arc::new(SqliteRuleRepository::new(open_in_memory().unwrap()));
    let registry = Arc::new(StaticProviderRegistry::new(summaries(provider_ids)));
    let service = RouterService::load(repository, registry.clone(), true).unwrap();
    (service, registry)
}

/// 返回服务以及存储失败开关（自动补齐默认规则）
pub fn failing_service(provider_ids: &[&str]) -> (RouterService, Faults) {
    let faults = Faults::default();
    let repository = Arc::new(FlakyRepository {
        inner: SqliteRuleRepository::new(open_in_memory().unwrap()),
        faults: faults.clone(),
    });
    let registry = Arc::new(StaticProviderRegistry::new(summaries(provider_ids)));
    let service = RouterService::load(repository, registry, true).unwrap();
    (service, faults)
}

pub fn openai_model(pattern: &str) -> CreateRuleInput {
    CreateRuleInput::new(ApiGroup::OpenAI, RuleType::Model, "p1", pattern)
}
