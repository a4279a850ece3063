// ==========================================
// 临床轮转排班系统 - 轮转数据仓储
// ==========================================
// 聚合: clerkship + elective
// 红线: 非正的 required_days / minimum_days 在写入时拒绝
// ==========================================

use crate::domain::clerkship::{Clerkship, Elective};
use crate::domain::types::ClerkshipType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

fn parse_datetime(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap_or_default()
}

// ==========================================
// ClerkshipRepository - 轮转仓储
// ==========================================
pub struct ClerkshipRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ClerkshipRepository {
    /// 创建新的轮转仓储实例
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

    /// 创建轮转
    pub fn create(&self, clerkship: &Clerkship) -> RepositoryResult<()> {
        clerkship
            .validate()
            .map_err(RepositoryError::ValidationError)?;

        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO clerkship (
                    clerkship_id, name, specialty, required_days, clerkship_type, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![
                &clerkship.clerkship_id,
                &clerkship.name,
                &clerkship.specialty,
                clerkship.required_days,
                clerkship.clerkship_type.to_string(),
                clerkship.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;
        Ok(())
    }

    /// 创建选修方向
    pub fn create_elective(&self, elective: &Elective) -> RepositoryResult<()> {
        elective
            .validate()
            .map_err(RepositoryError::ValidationError)?;

        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO elective (
                    elective_id, clerkship_id, name, minimum_days, is_required, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![
                &elective.elective_id,
                &elective.clerkship_id,
                &elective.name,
                elective.minimum_days,
                if elective.is_required { 1 } else { 0 },
                elective.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;
        Ok(())
    }

    /// 按ID查询轮转
    pub fn find_by_id(&self, clerkship_id: &str) -> RepositoryResult<Option<Clerkship>> {
        let conn = self.get_conn()?;
        let clerkship = conn
            .query_row(
                r#"SELECT clerkship_id, name, specialty, required_days, clerkship_type, created_at
                   FROM clerkship WHERE clerkship_id = ?1"#,
                params![clerkship_id],
                Self::map_row,
            )
            .optional()?;
        Ok(clerkship)
    }

    /// 查询全部轮转 (按ID稳定排序)
    pub fn find_all(&self) -> RepositoryResult<Vec<Clerkship>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT clerkship_id, name, specialty, required_days, clerkship_type, created_at
               FROM clerkship ORDER BY clerkship_id"#,
        )?;
        let rows = stmt.query_map([], Self::map_row)?;
        let mut clerkships = Vec::new();
        for row in rows {
            clerkships.push(row?);
        }
        Ok(clerkships)
    }

    /// 查询全部选修方向 (创建时间升序 = 分配顺序)
    pub fn find_all_electives(&self) -> RepositoryResult<Vec<Elective>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT elective_id, clerkship_id, name, minimum_days, is_required, created_at
               FROM elective ORDER BY created_at, elective_id"#,
        )?;
        let rows = stmt.query_map([], Self::map_elective_row)?;
        let mut electives = Vec::new();
        for row in rows {
            electives.push(row?);
        }
        Ok(electives)
    }

    /// 查询某轮转的选修方向
    pub fn find_electives(&self, clerkship_id: &str) -> RepositoryResult<Vec<Elective>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT elective_id, clerkship_id, name, minimum_days, is_required, created_at
               FROM elective WHERE clerkship_id = ?1 ORDER BY created_at, elective_id"#,
        )?;
        let rows = stmt.query_map(params![clerkship_id], Self::map_elective_row)?;
        let mut electives = Vec::new();
        for row in rows {
            electives.push(row?);
        }
        Ok(electives)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Clerkship> {
        Ok(Clerkship {
            clerkship_id: row.get(0)?,
            name: row.get(1)?,
            specialty: row.get(2)?,
            required_days: row.get(3)?,
            clerkship_type: ClerkshipType::from_str(&row.get::<_, String>(4)?),
            created_at: parse_datetime(&row.get::<_, String>(5)?),
        })
    }

    fn map_elective_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Elective> {
        Ok(Elective {
            elective_id: row.get(0)?,
            clerkship_id: row.get(1)?,
            name: row.get(2)?,
            minimum_days: row.get(3)?,
            is_required: row.get::<_, i64>(4)? != 0,
            created_at: parse_datetime(&row.get::<_, String>(5)?),
        })
    }
}
