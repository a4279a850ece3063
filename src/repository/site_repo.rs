// ==========================================
// 临床轮转排班系统 - 站点数据仓储
// ==========================================
// 层级: HealthSystem -> Site
// 红线: Repository 不含排班逻辑
// ==========================================

use crate::domain::site::{HealthSystem, Site};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

fn parse_datetime(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap_or_default()
}

// ==========================================
// SiteRepository - 站点/医疗系统仓储
// ==========================================
pub struct SiteRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SiteRepository {
    /// 创建新的站点仓储实例
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

    /// 创建医疗系统
    pub fn create_health_system(&self, hs: &HealthSystem) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO health_system (health_system_id, name, created_at)
               VALUES (?1, ?2, ?3)"#,
            params![
                &hs.health_system_id,
                &hs.name,
                hs.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;
        Ok(())
    }

    /// 创建站点
    pub fn create(&self, site: &Site) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO site (site_id, name, health_system_id, daily_capacity, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![
                &site.site_id,
                &site.name,
                &site.health_system_id,
                &site.daily_capacity,
                site.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;
        Ok(())
    }

    /// 按ID查询站点
    pub fn find_by_id(&self, site_id: &str) -> RepositoryResult<Option<Site>> {
        let conn = self.get_conn()?;
        let site = conn
            .query_row(
                r#"SELECT site_id, name, health_system_id, daily_capacity, created_at
                   FROM site WHERE site_id = ?1"#,
                params![site_id],
                Self::map_site_row,
            )
            .optional()?;
        Ok(site)
    }

    /// 查询全部站点
    pub fn find_all(&self) -> RepositoryResult<Vec<Site>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT site_id, name, health_system_id, daily_capacity, created_at
               FROM site ORDER BY site_id"#,
        )?;
        let rows = stmt.query_map([], Self::map_site_row)?;
        let mut sites = Vec::new();
        for row in rows {
            sites.push(row?);
        }
        Ok(sites)
    }

    /// 查询全部医疗系统
    pub fn find_all_health_systems(&self) -> RepositoryResult<Vec<HealthSystem>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT health_system_id, name, created_at
               FROM health_system ORDER BY health_system_id"#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(HealthSystem {
                health_system_id: row.get(0)?,
                name: row.get(1)?,
                created_at: parse_datetime(&row.get::<_, String>(2)?),
            })
        })?;
        let mut systems = Vec::new();
        for row in rows {
            systems.push(row?);
        }
        Ok(systems)
    }

    fn map_site_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Site> {
        Ok(Site {
            site_id: row.get(0)?,
            name: row.get(1)?,
            health_system_id: row.get(2)?,
            daily_capacity: row.get(3)?,
            created_at: parse_datetime(&row.get::<_, String>(4)?),
        })
    }
}
