//! Provider 注册表
//!
//! 路由核心只读取 Provider 的 id 与存在性。列表顺序即默认候选顺序：
//! 自动补齐默认规则时使用第一个 Provider。

use crate::database::dao::providers::ProviderDao;
use crate::database::{lock, DbConnection, StorageError};
use crate::models::ProviderSummary;
use parking_lot::RwLock;

pub trait ProviderRegistry: Send + Sync {
    fn list_providers(&self) -> Result<Vec<ProviderSummary>, StorageError>;
}

/// 由宿主应用直接推送 Provider 列表的注册表
#[derive(Debug, Default)]
pub struct StaticProviderRegistry {
    providers: RwLock<Vec<ProviderSummary>>,
}

impl StaticProviderRegistry {
    pub fn new(providers: Vec<ProviderSummary>) -> Self {
        Self {
            providers: RwLock::new(providers),
        }
    }

    /// 整体替换 Provider 列表
    pub fn replace(&self, providers: Vec<ProviderSummary>) {
        *self.providers.write() = providers;
    }

    pub fn add(&self, provider: ProviderSummary) {
        let mut providers = self.providers.write();
        providers.retain(|p| p.id != provider.id);
        providers.push(provider);
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut providers = self.providers.write();
        let before = providers.len();
        providers.retain(|p| p.id != id);
        providers.len() != before
    }
}

impl ProviderRegistry for StaticProviderRegistry {
    fn list_providers(&self) -> Result<Vec<ProviderSummary>, StorageError> {
        Ok(self.providers.read().clone())
    }
}

/// 读取 SQLite `providers` 表的注册表
pub struct SqliteProviderRegistry {
    db: DbConnection,
}

impl SqliteProviderRegistry {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    pub fn get(&self, id: &str) -> Result<Option<ProviderSummary>, StorageError> {
        let conn = lock(&self.db)?;
        Ok(ProviderDao::get_by_id(&conn, id)?)
    }

    pub fn add(&self, provider: &ProviderSummary) -> Result<(), StorageError> {
        let conn = lock(&self.db)?;
        ProviderDao::insert(&conn, provider)?;
        Ok(())
    }

    /// 删除 Provider，返回是否存在
    ///
    /// 只修改注册表；引用它的规则需要通过 `RouterService` 对账。
    pub fn remove(&self, id: &str) -> Result<bool, StorageError> {
        let conn = lock(&self.db)?;
        if ProviderDao::get_by_id(&conn, id)?.is_none() {
            return Ok(false);
        }
        ProviderDao::delete(&conn, id)?;
        Ok(true)
    }
}

impl ProviderRegistry for SqliteProviderRegistry {
    fn list_providers(&self) -> Result<Vec<ProviderSummary>, StorageError> {
        let conn = lock(&self.db)?;
        Ok(ProviderDao::get_all(&conn)?)
    }
}
