//! 规则持久化边界
//!
//! 路由核心只通过 [`RuleRepository`] 访问持久化层；核心负责在调用成功后再更新内存缓存。

use crate::database::dao::routing_rules::RoutingRuleDao;
use crate::database::{lock, DbConnection, StorageError};
use crate::models::{PriorityAssignment, RoutingRule};

/// 规则持久化接口
pub trait RuleRepository: Send + Sync {
    fn list_rules(&self) -> Result<Vec<RoutingRule>, StorageError>;

    fn create_rule(&self, rule: &RoutingRule) -> Result<RoutingRule, StorageError>;

    fn update_rule(&self, id: &str, rule: &RoutingRule) -> Result<RoutingRule, StorageError>;

    fn delete_rule(&self, id: &str) -> Result<(), StorageError>;

    /// 批量写入优先级，要么全部成功，要么全部不生效
    fn reorder_rules(&self, assignments: &[PriorityAssignment]) -> Result<(), StorageError>;
}

/// 基于 SQLite 的规则存储
pub struct SqliteRuleRepository {
    db: DbConnection,
}

impl SqliteRuleRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }
}

impl RuleRepository for SqliteRuleRepository {
    fn list_rules(&self) -> Result<Vec<RoutingRule>, StorageError> {
        let conn = lock(&self.db)?;
        Ok(RoutingRuleDao::get_all(&conn)?)
    }

    fn create_rule(&self, rule: &RoutingRule) -> Result<RoutingRule, StorageError> {
        let conn = lock(&self.db)?;
        RoutingRuleDao::insert(&conn, rule)?;
        Ok(rule.clone())
    }

    fn update_rule(&self, id: &str, rule: &RoutingRule) -> Result<RoutingRule, StorageError> {
        let conn = lock(&self.db)?;
        if RoutingRuleDao::update(&conn, id, rule)? == 0 {
            return Err(StorageError::MissingRecord(id.to_string()));
        }
        RoutingRuleDao::get_by_id(&conn, id)?.ok_or_else(|| StorageError::MissingRecord(id.to_string()))
    }

    fn delete_rule(&self, id: &str) -> Result<(), StorageError> {
        let conn = lock(&self.db)?;
        if RoutingRuleDao::delete(&conn, id)? == 0 {
            return Err(StorageError::MissingRecord(id.to_string()));
        }
        Ok(())
    }

    fn reorder_rules(&self, assignments: &[PriorityAssignment]) -> Result<(), StorageError> {
        let mut conn = lock(&self.db)?;
        let tx = conn.transaction()?;
        for assignment in assignments {
            let changed = RoutingRuleDao::update_priority(
                &tx,
                &assignment.id,
                assignment.priority,
                &assignment.updated_at,
            )?;
            if changed == 0 {
                // tx 在 drop 时回滚
                return Err(StorageError::MissingRecord(assignment.id.clone()));
            }
        }
        tx.commit()?;
        Ok(())
    }
}
