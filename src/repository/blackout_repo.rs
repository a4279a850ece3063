// ==========================================
// 临床轮转排班系统 - 停诊日数据仓储
// ==========================================
// 红线: 与锁定排班冲突的停诊日创建被拒绝,
//       绝不静默删除已锁定排班
// ==========================================

use crate::domain::blackout::BlackoutDate;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .unwrap_or_else(|_| NaiveDate::from_ymd_opt(1970, 1, 1).unwrap())
}

fn parse_datetime(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap_or_default()
}

// ==========================================
// BlackoutRepository - 停诊日仓储
// ==========================================
pub struct BlackoutRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BlackoutRepository {
    /// 创建新的停诊日仓储实例
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

    /// 创建停诊日
    ///
    /// 与锁定排班冲突时拒绝 (BusinessRuleViolation),
    /// 由调用方决定先解锁还是放弃
    pub fn create(&self, blackout: &BlackoutDate) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        // 冲突检查: 同日被停诊覆盖的锁定排班
        let locked_count: i64 = conn.query_row(
            r#"SELECT COUNT(*) FROM schedule_assignment
               WHERE date = ?1 AND locked = 1
                 AND (?2 IS NULL OR preceptor_id = ?2)
                 AND (?3 IS NULL OR site_id = ?3)"#,
            params![
                blackout.date.format("%Y-%m-%d").to_string(),
                &blackout.preceptor_id,
                &blackout.site_id,
            ],
            |row| row.get(0),
        )?;

        if locked_count > 0 {
            return Err(RepositoryError::BusinessRuleViolation(format!(
                "停诊日与 {} 条锁定排班冲突: date={}",
                locked_count, blackout.date
            )));
        }

        conn.execute(
            r#"INSERT INTO blackout_date (
                    blackout_id, date, reason, preceptor_id, site_id, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![
                &blackout.blackout_id,
                blackout.date.format("%Y-%m-%d").to_string(),
                &blackout.reason,
                &blackout.preceptor_id,
                &blackout.site_id,
                blackout.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;
        Ok(())
    }

    /// 按日期范围查询停诊日 (闭区间)
    pub fn find_in_range(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> RepositoryResult<Vec<BlackoutDate>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT blackout_id, date, reason, preceptor_id, site_id, created_at
               FROM blackout_date
               WHERE date >= ?1 AND date <= ?2
               ORDER BY date, blackout_id"#,
        )?;
        let rows = stmt.query_map(
            params![
                start_date.format("%Y-%m-%d").to_string(),
                end_date.format("%Y-%m-%d").to_string(),
            ],
            |row| {
                Ok(BlackoutDate {
                    blackout_id: row.get(0)?,
                    date: parse_date(&row.get::<_, String>(1)?),
                    reason: row.get(2)?,
                    preceptor_id: row.get(3)?,
                    site_id: row.get(4)?,
                    created_at: parse_datetime(&row.get::<_, String>(5)?),
                })
            },
        )?;
        let mut blackouts = Vec::new();
        for row in rows {
            blackouts.push(row?);
        }
        Ok(blackouts)
    }

    /// 删除停诊日
    pub fn delete(&self, blackout_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count = conn.execute(
            "DELETE FROM blackout_date WHERE blackout_id = ?1",
            params![blackout_id],
        )?;
        Ok(count)
    }
}
