pub mod dao;
pub mod migration;
pub mod repository;
pub mod schema;

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

pub type DbConnection = Arc<Mutex<Connection>>;

/// 存储层错误
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("数据库错误: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),
    #[error("数据库连接锁已损坏")]
    LockPoisoned,
    #[error("记录不存在: {0}")]
    MissingRecord(String),
    #[error("存储后端错误: {0}")]
    Backend(String),
}

/// 获取连接锁
pub fn lock(db: &DbConnection) -> Result<MutexGuard<'_, Connection>, StorageError> {
    db.lock().map_err(|_| StorageError::LockPoisoned)
}

/// 获取数据目录 (~/.routecast)
pub fn data_dir() -> Result<PathBuf, StorageError> {
    let home = dirs::home_dir().ok_or_else(|| {
        StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "无法获取主目录",
        ))
    })?;
    Ok(home.join(".routecast"))
}

/// 获取数据库文件路径
pub fn get_db_path() -> Result<PathBuf, StorageError> {
    Ok(data_dir()?.join("routecast.db"))
}

/// 初始化数据库连接
///
/// 未指定路径时使用 `~/.routecast/routecast.db`。
pub fn init_database(path: Option<&Path>) -> Result<DbConnection, StorageError> {
    let db_path = match path {
        Some(path) => path.to_path_buf(),
        None => get_db_path()?,
    };
    if let Some(dir) = db_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let conn = Connection::open(&db_path)?;
    schema::create_tables(&conn)?;
    tracing::info!("[数据库] 已打开 {:?}", db_path);
    Ok(Arc::new(Mutex::new(conn)))
}

/// 打开内存数据库（测试及临时会话使用）
pub fn open_in_memory() -> Result<DbConnection, StorageError> {
    let conn = Connection::open_in_memory()?;
    schema::create_tables(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}
