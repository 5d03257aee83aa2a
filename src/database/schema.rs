use rusqlite::Connection;

/// 创建表结构
pub fn create_tables(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS providers (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            sort_index INTEGER,
            created_at INTEGER
        );

        CREATE TABLE IF NOT EXISTS routing_rules (
            id TEXT PRIMARY KEY,
            rule_type TEXT NOT NULL,
            api_group TEXT NOT NULL,
            provider_id TEXT NOT NULL,
            match_pattern TEXT NOT NULL,
            model_rewrite TEXT,
            priority INTEGER NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        -- priority 不加唯一约束：事务内重排时会短暂重复
        CREATE INDEX IF NOT EXISTS idx_routing_rules_scope
            ON routing_rules (api_group, rule_type, priority);",
    )
}
