use crate::database::dao::providers::ProviderDao;
use crate::database::dao::routing_rules::RoutingRuleDao;
use crate::database::StorageError;
use crate::models::{ProviderSummary, RoutingRule};
use crate::services::validation::{check_namespace, validate_pattern};
use rusqlite::Connection;
use serde::Deserialize;
use std::path::Path;

/// 旧版 settings.json 中与路由相关的部分
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LegacySettings {
    providers: Vec<LegacyProvider>,
    routing_rules: Vec<RoutingRule>,
}

#[derive(Debug, Deserialize)]
struct LegacyProvider {
    id: String,
    name: String,
}

/// 从旧的 JSON 配置迁移 Provider 与路由规则到 SQLite
///
/// 只执行一次；规则表非空时跳过导入但仍标记为已迁移。返回导入的规则数。
pub fn migrate_from_json(conn: &mut Connection, json_path: &Path) -> Result<usize, StorageError> {
    // 检查是否已经迁移过
    let migrated: bool = conn
        .query_row(
            "SELECT value FROM settings WHERE key = 'migrated_from_json'",
            [],
            |row| row.get::<_, String>(0),
        )
        .map(|v| v == "true")
        .unwrap_or(false);

    if migrated {
        tracing::debug!("[迁移] 旧版配置已迁移过，跳过");
        return Ok(0);
    }

    if !json_path.exists() {
        return Ok(0);
    }

    let mut imported = 0;
    if RoutingRuleDao::count(conn)? == 0 {
        let content = std::fs::read_to_string(json_path)?;
        let legacy: LegacySettings = serde_json::from_str(&content)?;

        let tx = conn.transaction()?;
        for (index, provider) in legacy.providers.iter().enumerate() {
            let mut summary = ProviderSummary::new(&provider.id, &provider.name);
            summary.sort_index = Some(index as i32);
            ProviderDao::insert(&tx, &summary)?;
        }
        for rule in &legacy.routing_rules {
            let checked = validate_pattern(&rule.match_pattern).and_then(|_| {
                check_namespace(rule.api_group, rule.rule_type, rule.match_pattern.trim())
            });
            if let Err(e) = checked {
                tracing::warn!(rule_id = %rule.id, "[迁移] 跳过无效的路由规则: {}", e);
                continue;
            }
            let mut rule = rule.clone();
            rule.match_pattern = rule.match_pattern.trim().to_string();
            RoutingRuleDao::insert(&tx, &rule)?;
            imported += 1;
        }
        tx.commit()?;

        tracing::info!(
            "[迁移] 已从 {:?} 导入 {} 个 Provider、{} 条路由规则",
            json_path,
            legacy.providers.len(),
            imported
        );
    } else {
        tracing::warn!("[迁移] 路由规则表非空，跳过旧版配置导入");
    }

    // 标记迁移完成
    conn.execute(
        "INSERT OR REPLACE INTO settings (key, value) VALUES ('migrated_from_json', 'true')",
        [],
    )?;

    Ok(imported)
}
