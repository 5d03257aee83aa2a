use crate::models::ProviderSummary;
use rusqlite::{params, Connection};

pub struct ProviderDao;

impl ProviderDao {
    /// 按 sort_index、created_at 排序返回所有 Provider（第一个即为默认候选）
    pub fn get_all(conn: &Connection) -> Result<Vec<ProviderSummary>, rusqlite::Error> {
        let mut stmt = conn.prepare(
            "SELECT id, name, sort_index, created_at
             FROM providers ORDER BY sort_index IS NULL, sort_index, created_at",
        )?;

        let providers = stmt.query_map([], |row| {
            Ok(ProviderSummary {
                id: row.get(0)?,
                name: row.get(1)?,
                sort_index: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?;

        providers.collect()
    }

    pub fn get_by_id(conn: &Connection, id: &str) -> Result<Option<ProviderSummary>, rusqlite::Error> {
        let mut stmt = conn.prepare(
            "SELECT id, name, sort_index, created_at FROM providers WHERE id = ?",
        )?;

        let result = stmt.query_row([id], |row| {
            Ok(ProviderSummary {
                id: row.get(0)?,
                name: row.get(1)?,
                sort_index: row.get(2)?,
                created_at: row.get(3)?,
            })
        });

        match result {
            Ok(provider) => Ok(Some(provider)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn insert(conn: &Connection, provider: &ProviderSummary) -> Result<(), rusqlite::Error> {
        conn.execute(
            "INSERT OR REPLACE INTO providers (id, name, sort_index, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                provider.id,
                provider.name,
                provider.sort_index,
                provider.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn delete(conn: &Connection, id: &str) -> Result<(), rusqlite::Error> {
        conn.execute("DELETE FROM providers WHERE id = ?", [id])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema;

    #[test]
    fn test_order_by_sort_index() {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_tables(&conn).unwrap();

        let mut late = ProviderSummary::new("late", "Late");
        late.sort_index = Some(2);
        let mut early = ProviderSummary::new("early", "Early");
        early.sort_index = Some(1);
        let unsorted = ProviderSummary::new("unsorted", "Unsorted");

        ProviderDao::insert(&conn, &unsorted).unwrap();
        ProviderDao::insert(&conn, &late).unwrap();
        ProviderDao::insert(&conn, &early).unwrap();

        let ids: Vec<String> = ProviderDao::get_all(&conn)
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["early", "late", "unsorted"]);

        ProviderDao::delete(&conn, "early").unwrap();
        assert!(ProviderDao::get_by_id(&conn, "early").unwrap().is_none());
        assert_eq!(
            ProviderDao::get_by_id(&conn, "late").unwrap().unwrap().name,
            "Late"
        );
    }
}
