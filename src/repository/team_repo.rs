// ==========================================
// 临床轮转排班系统 - 带教团队数据仓储
// ==========================================
// 聚合: preceptor_team + preceptor_team_member
// 红线: 团队不变量 (>=2 成员, 无重复医师) 在写入时校验
// ==========================================

use crate::domain::team::{validate_members, PreceptorTeam, PreceptorTeamMember};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

fn parse_datetime(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap_or_default()
}

// ==========================================
// TeamRepository - 带教团队仓储
// ==========================================
pub struct TeamRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TeamRepository {
    /// 创建新的团队仓储实例
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

    /// 创建团队 (团队 + 成员, 同一事务)
    ///
    /// # 红线
    /// - 成员集合违反团队不变量时整体拒绝,不做部分写入
    pub fn create(
        &self,
        team: &PreceptorTeam,
        members: &[PreceptorTeamMember],
    ) -> RepositoryResult<()> {
        validate_members(members).map_err(RepositoryError::ValidationError)?;

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"INSERT INTO preceptor_team (
                    team_id, clerkship_id, name,
                    require_same_health_system, require_same_site, require_same_specialty,
                    requires_admin_approval, admin_approved, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
            params![
                &team.team_id,
                &team.clerkship_id,
                &team.name,
                if team.require_same_health_system { 1 } else { 0 },
                if team.require_same_site { 1 } else { 0 },
                if team.require_same_specialty { 1 } else { 0 },
                if team.requires_admin_approval { 1 } else { 0 },
                if team.admin_approved { 1 } else { 0 },
                team.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;

        for member in members {
            tx.execute(
                r#"INSERT INTO preceptor_team_member (
                        team_id, preceptor_id, priority, role, is_fallback
                    ) VALUES (?1, ?2, ?3, ?4, ?5)"#,
                params![
                    &team.team_id,
                    &member.preceptor_id,
                    member.priority,
                    &member.role,
                    if member.is_fallback { 1 } else { 0 },
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// 查询全部团队及成员
    ///
    /// 团队按 (created_at, team_id) 稳定排序, 即候选排序的决胜键;
    /// 成员按 priority 升序
    pub fn find_all_with_members(
        &self,
    ) -> RepositoryResult<Vec<(PreceptorTeam, Vec<PreceptorTeamMember>)>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT team_id, clerkship_id, name,
                      require_same_health_system, require_same_site, require_same_specialty,
                      requires_admin_approval, admin_approved, created_at
               FROM preceptor_team ORDER BY created_at, team_id"#,
        )?;
        let rows = stmt.query_map([], Self::map_team_row)?;
        let mut teams = Vec::new();
        for row in rows {
            teams.push(row?);
        }

        let mut member_stmt = conn.prepare(
            r#"SELECT team_id, preceptor_id, priority, role, is_fallback
               FROM preceptor_team_member ORDER BY priority, preceptor_id"#,
        )?;
        let member_rows = member_stmt.query_map([], Self::map_member_row)?;
        let mut member_map: HashMap<String, Vec<PreceptorTeamMember>> = HashMap::new();
        for row in member_rows {
            let member = row?;
            member_map.entry(member.team_id.clone()).or_default().push(member);
        }

        Ok(teams
            .into_iter()
            .map(|team| {
                let members = member_map.remove(&team.team_id).unwrap_or_default();
                (team, members)
            })
            .collect())
    }

    /// 查询某轮转的团队及成员
    pub fn find_by_clerkship(
        &self,
        clerkship_id: &str,
    ) -> RepositoryResult<Vec<(PreceptorTeam, Vec<PreceptorTeamMember>)>> {
        let all = self.find_all_with_members()?;
        Ok(all
            .into_iter()
            .filter(|(team, _)| team.clerkship_id == clerkship_id)
            .collect())
    }

    fn map_team_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PreceptorTeam> {
        Ok(PreceptorTeam {
            team_id: row.get(0)?,
            clerkship_id: row.get(1)?,
            name: row.get(2)?,
            require_same_health_system: row.get::<_, i64>(3)? != 0,
            require_same_site: row.get::<_, i64>(4)? != 0,
            require_same_specialty: row.get::<_, i64>(5)? != 0,
            requires_admin_approval: row.get::<_, i64>(6)? != 0,
            admin_approved: row.get::<_, i64>(7)? != 0,
            created_at: parse_datetime(&row.get::<_, String>(8)?),
        })
    }

    fn map_member_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PreceptorTeamMember> {
        Ok(PreceptorTeamMember {
            team_id: row.get(0)?,
            preceptor_id: row.get(1)?,
            priority: row.get(2)?,
            role: row.get(3)?,
            is_fallback: row.get::<_, i64>(4)? != 0,
        })
    }
}
