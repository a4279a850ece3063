// ==========================================
// 临床轮转排班系统 - 容量规则数据仓储
// ==========================================
// 红线: 每名医师至多一条规则 (upsert 语义, 主键兜底)
// ==========================================

use crate::domain::capacity::CapacityRule;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

fn parse_datetime(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap_or_default()
}

// ==========================================
// CapacityRuleRepository - 容量规则仓储
// ==========================================
pub struct CapacityRuleRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CapacityRuleRepository {
    /// 创建新的容量规则仓储实例
    pub fn new(db_path: String) -> RepositoryResult<Self> {
        let conn = crate::db::open_sqlite_connection(&db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入/覆盖容量规则 (upsert 语义)
    pub fn upsert(&self, rule: &CapacityRule) -> RepositoryResult<()> {
        rule.validate().map_err(RepositoryError::ValidationError)?;

        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO capacity_rule (
                    preceptor_id, max_students_per_day, max_students_per_year, active, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5)
               ON CONFLICT(preceptor_id) DO UPDATE SET
                    max_students_per_day = excluded.max_students_per_day,
                    max_students_per_year = excluded.max_students_per_year,
                    active = excluded.active,
                    updated_at = excluded.updated_at"#,
            params![
                &rule.preceptor_id,
                rule.max_students_per_day,
                &rule.max_students_per_year,
                if rule.active { 1 } else { 0 },
                rule.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;
        Ok(())
    }

    /// 按医师查询规则
    pub fn find_by_preceptor(&self, preceptor_id: &str) -> RepositoryResult<Option<CapacityRule>> {
        let conn = self.get_conn()?;
        let rule = conn
            .query_row(
                r#"SELECT preceptor_id, max_students_per_day, max_students_per_year,
                          active, updated_at
                   FROM capacity_rule WHERE preceptor_id = ?1"#,
                params![preceptor_id],
                Self::map_row,
            )
            .optional()?;
        Ok(rule)
    }

    /// 查询全部生效规则
    pub fn find_all_active(&self) -> RepositoryResult<Vec<CapacityRule>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT preceptor_id, max_students_per_day, max_students_per_year,
                      active, updated_at
               FROM capacity_rule WHERE active = 1 ORDER BY preceptor_id"#,
        )?;
        let rows = stmt.query_map([], Self::map_row)?;
        let mut rules = Vec::new();
        for row in rows {
            rules.push(row?);
        }
        Ok(rules)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CapacityRule> {
        Ok(CapacityRule {
            preceptor_id: row.get(0)?,
            max_students_per_day: row.get(1)?,
            max_students_per_year: row.get(2)?,
            active: row.get::<_, i64>(3)? != 0,
            updated_at: parse_datetime(&row.get::<_, String>(4)?),
        })
    }
}
