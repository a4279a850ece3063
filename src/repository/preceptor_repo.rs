// ==========================================
// 临床轮转排班系统 - 带教医师数据仓储
// ==========================================
// 聚合: preceptor + preceptor_site + preceptor_availability
// 红线: Repository 不含排班逻辑
// ==========================================

use crate::domain::preceptor::{Preceptor, PreceptorAvailability};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .unwrap_or_else(|_| NaiveDate::from_ymd_opt(1970, 1, 1).unwrap())
}

fn parse_datetime(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap_or_default()
}

// ==========================================
// PreceptorRepository - 带教医师仓储
// ==========================================
pub struct PreceptorRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PreceptorRepository {
    /// 创建新的带教医师仓储实例
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

    /// 创建带教医师 (医师 + 执业站点, 同一事务)
    ///
    /// # 红线
    /// - 医师至少挂一个站点,否则拒绝
    pub fn create(&self, preceptor: &Preceptor) -> RepositoryResult<()> {
        if preceptor.site_ids.is_empty() {
            return Err(RepositoryError::ValidationError(format!(
                "医师必须至少挂一个站点: preceptor_id={}",
                preceptor.preceptor_id
            )));
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"INSERT INTO preceptor (
                    preceptor_id, name, specialty, health_system_id,
                    max_students, active, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            params![
                &preceptor.preceptor_id,
                &preceptor.name,
                &preceptor.specialty,
                &preceptor.health_system_id,
                preceptor.max_students,
                if preceptor.active { 1 } else { 0 },
                preceptor.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                preceptor.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;

        for site_id in &preceptor.site_ids {
            tx.execute(
                r#"INSERT INTO preceptor_site (preceptor_id, site_id) VALUES (?1, ?2)"#,
                params![&preceptor.preceptor_id, site_id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// 按ID查询医师 (含执业站点)
    pub fn find_by_id(&self, preceptor_id: &str) -> RepositoryResult<Option<Preceptor>> {
        let conn = self.get_conn()?;
        let preceptor = conn
            .query_row(
                r#"SELECT preceptor_id, name, specialty, health_system_id,
                          max_students, active, created_at, updated_at
                   FROM preceptor WHERE preceptor_id = ?1"#,
                params![preceptor_id],
                Self::map_row,
            )
            .optional()?;

        let Some(mut preceptor) = preceptor else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            r#"SELECT site_id FROM preceptor_site WHERE preceptor_id = ?1 ORDER BY site_id"#,
        )?;
        let rows = stmt.query_map(params![preceptor_id], |row| row.get::<_, String>(0))?;
        for row in rows {
            preceptor.site_ids.push(row?);
        }

        Ok(Some(preceptor))
    }

    /// 查询全部在岗医师 (含执业站点, 按ID稳定排序)
    pub fn find_all_active(&self) -> RepositoryResult<Vec<Preceptor>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT preceptor_id, name, specialty, health_system_id,
                      max_students, active, created_at, updated_at
               FROM preceptor WHERE active = 1 ORDER BY preceptor_id"#,
        )?;
        let rows = stmt.query_map([], Self::map_row)?;
        let mut preceptors = Vec::new();
        for row in rows {
            preceptors.push(row?);
        }

        // 一次性取全部站点关联,避免 N+1 查询
        let mut site_stmt =
            conn.prepare(r#"SELECT preceptor_id, site_id FROM preceptor_site ORDER BY site_id"#)?;
        let site_rows = site_stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut site_map: HashMap<String, Vec<String>> = HashMap::new();
        for row in site_rows {
            let (preceptor_id, site_id) = row?;
            site_map.entry(preceptor_id).or_default().push(site_id);
        }

        for p in &mut preceptors {
            if let Some(sites) = site_map.remove(&p.preceptor_id) {
                p.site_ids = sites;
            }
        }

        Ok(preceptors)
    }

    /// 写入/覆盖可用性记录 (upsert 语义)
    pub fn upsert_availability(&self, record: &PreceptorAvailability) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO preceptor_availability (preceptor_id, site_id, date, available)
               VALUES (?1, ?2, ?3, ?4)
               ON CONFLICT(preceptor_id, site_id, date)
               DO UPDATE SET available = excluded.available"#,
            params![
                &record.preceptor_id,
                &record.site_id,
                record.date.format("%Y-%m-%d").to_string(),
                if record.available { 1 } else { 0 },
            ],
        )?;
        Ok(())
    }

    /// 按日期范围查询可用性记录 (闭区间)
    pub fn find_availability_in_range(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> RepositoryResult<Vec<PreceptorAvailability>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT preceptor_id, site_id, date, available
               FROM preceptor_availability
               WHERE date >= ?1 AND date <= ?2
               ORDER BY preceptor_id, site_id, date"#,
        )?;
        let rows = stmt.query_map(
            params![
                start_date.format("%Y-%m-%d").to_string(),
                end_date.format("%Y-%m-%d").to_string(),
            ],
            |row| {
                Ok(PreceptorAvailability {
                    preceptor_id: row.get(0)?,
                    site_id: row.get(1)?,
                    date: parse_date(&row.get::<_, String>(2)?),
                    available: row.get::<_, i64>(3)? != 0,
                })
            },
        )?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Preceptor> {
        Ok(Preceptor {
            preceptor_id: row.get(0)?,
            name: row.get(1)?,
            specialty: row.get(2)?,
            health_system_id: row.get(3)?,
            site_ids: Vec::new(), // 由调用方补全
            max_students: row.get(4)?,
            active: row.get::<_, i64>(5)? != 0,
            created_at: parse_datetime(&row.get::<_, String>(6)?),
            updated_at: parse_datetime(&row.get::<_, String>(7)?),
        })
    }
}
