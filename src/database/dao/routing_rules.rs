use crate::models::{ApiGroup, RoutingRule, RuleType};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};

pub struct RoutingRuleDao;

const SELECT_RULES: &str = "SELECT id, rule_type, api_group, provider_id, match_pattern,
                                   model_rewrite, priority, enabled, created_at, updated_at
                            FROM routing_rules";

impl RoutingRuleDao {
    pub fn get_all(conn: &Connection) -> Result<Vec<RoutingRule>, rusqlite::Error> {
        let mut stmt = conn.prepare(&format!(
            "{SELECT_RULES} ORDER BY api_group, rule_type, priority, created_at"
        ))?;
        let rules = stmt.query_map([], row_to_rule)?;
        rules.collect()
    }

    pub fn get_by_id(conn: &Connection, id: &str) -> Result<Option<RoutingRule>, rusqlite::Error> {
        let mut stmt = conn.prepare(&format!("{SELECT_RULES} WHERE id = ?"))?;
        let result = stmt.query_row([id], row_to_rule);

        match result {
            Ok(rule) => Ok(Some(rule)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn insert(conn: &Connection, rule: &RoutingRule) -> Result<(), rusqlite::Error> {
        conn.execute(
            "INSERT INTO routing_rules (id, rule_type, api_group, provider_id, match_pattern,
                                        model_rewrite, priority, enabled, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                rule.id,
                rule.rule_type.as_str(),
                rule.api_group.as_str(),
                rule.provider_id,
                rule.match_pattern,
                rule.model_rewrite,
                rule.priority,
                if rule.enabled { 1 } else { 0 },
                rule.created_at,
                rule.updated_at,
            ],
        )?;
        Ok(())
    }

    /// 更新规则，返回受影响的行数
    pub fn update(conn: &Connection, id: &str, rule: &RoutingRule) -> Result<usize, rusqlite::Error> {
        conn.execute(
            "UPDATE routing_rules SET rule_type = ?1, api_group = ?2, provider_id = ?3,
                                      match_pattern = ?4, model_rewrite = ?5, priority = ?6,
                                      enabled = ?7, updated_at = ?8
             WHERE id = ?9",
            params![
                rule.rule_type.as_str(),
                rule.api_group.as_str(),
                rule.provider_id,
                rule.match_pattern,
                rule.model_rewrite,
                rule.priority,
                if rule.enabled { 1 } else { 0 },
                rule.updated_at,
                id,
            ],
        )
    }

    pub fn update_priority(
        conn: &Connection,
        id: &str,
        priority: i32,
        updated_at: &DateTime<Utc>,
    ) -> Result<usize, rusqlite::Error> {
        conn.execute(
            "UPDATE routing_rules SET priority = ?1, updated_at = ?2 WHERE id = ?3",
            params![priority, updated_at, id],
        )
    }

    pub fn delete(conn: &Connection, id: &str) -> Result<usize, rusqlite::Error> {
        conn.execute("DELETE FROM routing_rules WHERE id = ?", [id])
    }

    pub fn count(conn: &Connection) -> Result<i64, rusqlite::Error> {
        conn.query_row("SELECT COUNT(*) FROM routing_rules", [], |row| row.get(0))
    }
}

fn row_to_rule(row: &Row<'_>) -> Result<RoutingRule, rusqlite::Error> {
    let rule_type: String = row.get(1)?;
    let api_group: String = row.get(2)?;

    Ok(RoutingRule {
        id: row.get(0)?,
        rule_type: rule_type
            .parse::<RuleType>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?,
        api_group: api_group
            .parse::<ApiGroup>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?,
        provider_id: row.get(3)?,
        match_pattern: row.get(4)?,
        model_rewrite: row.get(5)?,
        priority: row.get(6)?,
        enabled: row.get::<_, i32>(7)? == 1,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_tables(&conn).unwrap();
        conn
    }

    #[test]
    fn test_insert_and_get() {
        let conn = setup();
        let mut rule = RoutingRule::new(
            "p1".to_string(),
            "gpt-4*".to_string(),
            3,
            RuleType::Model,
            ApiGroup::OpenAI,
        );
        rule.model_rewrite = Some("gpt-4o".to_string());
        rule.enabled = false;
        RoutingRuleDao::insert(&conn, &rule).unwrap();

        let loaded = RoutingRuleDao::get_by_id(&conn, &rule.id).unwrap().unwrap();
        assert_eq!(loaded, rule);
        assert!(RoutingRuleDao::get_by_id(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn test_update_and_delete() {
        let conn = setup();
        let mut rule = RoutingRule::new(
            "p1".to_string(),
            "/api/custom/*".to_string(),
            1,
            RuleType::Path,
            ApiGroup::Generic,
        );
        RoutingRuleDao::insert(&conn, &rule).unwrap();

        rule.provider_id = "p2".to_string();
        assert_eq!(RoutingRuleDao::update(&conn, &rule.id, &rule).unwrap(), 1);
        let loaded = RoutingRuleDao::get_by_id(&conn, &rule.id).unwrap().unwrap();
        assert_eq!(loaded.provider_id, "p2");

        assert_eq!(RoutingRuleDao::delete(&conn, &rule.id).unwrap(), 1);
        assert_eq!(RoutingRuleDao::delete(&conn, &rule.id).unwrap(), 0);
        assert_eq!(RoutingRuleDao::count(&conn).unwrap(), 0);
    }

    #[test]
    fn test_corrupt_enum_value() {
        let conn = setup();
        conn.execute(
            "INSERT INTO routing_rules (id, rule_type, api_group, provider_id, match_pattern,
                                        priority, enabled, created_at, updated_at)
             VALUES ('r1', 'regex', 'openai', 'p1', 'x', 1, 1, ?1, ?1)",
            params![Utc::now()],
        )
        .unwrap();

        assert!(RoutingRuleDao::get_all(&conn).is_err());
    }
}
