// ==========================================
// 临床轮转排班系统 - 排班数据仓储
// ==========================================
// 红线: 重排增量 (删除 + 插入) 必须在单一事务中提交,
//       读者永远看不到半重排的排班表
// 红线: UNIQUE(period_id, student_id, date) 兜底 no-double-booking
// ==========================================

use crate::domain::assignment::ScheduleAssignment;
use crate::domain::types::{AssignmentStatus, AssignmentType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, Transaction};
use std::sync::{Arc, Mutex};

fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .unwrap_or_else(|_| NaiveDate::from_ymd_opt(1970, 1, 1).unwrap())
}

fn parse_datetime(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap_or_default()
}

// ==========================================
// AssignmentDelta - 重排增量
// ==========================================
// 由重排引擎 Diffing 阶段产出, Committing 阶段原子提交
#[derive(Debug, Clone, Default)]
pub struct AssignmentDelta {
    pub removals: Vec<String>,               // 待删除的 assignment_id
    pub inserts: Vec<ScheduleAssignment>,    // 待插入的排班
}

impl AssignmentDelta {
    /// 是否为空增量
    pub fn is_empty(&self) -> bool {
        self.removals.is_empty() && self.inserts.is_empty()
    }
}

// ==========================================
// AssignmentRepository - 排班仓储
// ==========================================
pub struct AssignmentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AssignmentRepository {
    /// 创建新的排班仓储实例
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

    /// 批量插入排班 (单一事务)
    pub fn batch_insert(&self, assignments: &[ScheduleAssignment]) -> RepositoryResult<usize> {
        if assignments.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        Self::insert_in_tx(&tx, assignments)?;
        tx.commit()?;
        Ok(assignments.len())
    }

    /// 原子提交重排增量 (删除 + 插入, 单一事务)
    ///
    /// # 返回
    /// - `Ok((removed, inserted))`: 实际删除/插入的行数
    /// - `Err`: 任一步失败则整体回滚,排班表保持原状
    pub fn apply_delta(&self, delta: &AssignmentDelta) -> RepositoryResult<(usize, usize)> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut removed = 0usize;
        {
            let mut stmt = tx.prepare("DELETE FROM schedule_assignment WHERE assignment_id = ?1")?;
            for assignment_id in &delta.removals {
                removed += stmt.execute(params![assignment_id])?;
            }
        }

        Self::insert_in_tx(&tx, &delta.inserts)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok((removed, delta.inserts.len()))
    }

    fn insert_in_tx(tx: &Transaction<'_>, assignments: &[ScheduleAssignment]) -> RepositoryResult<()> {
        let mut stmt = tx.prepare(
            r#"INSERT INTO schedule_assignment (
                    assignment_id, period_id, student_id, preceptor_id, clerkship_id,
                    elective_id, site_id, date, assignment_type, status, locked,
                    notes, created_by_run, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"#,
        )?;

        for a in assignments {
            stmt.execute(params![
                &a.assignment_id,
                &a.period_id,
                &a.student_id,
                &a.preceptor_id,
                &a.clerkship_id,
                &a.elective_id,
                &a.site_id,
                a.date.format("%Y-%m-%d").to_string(),
                a.assignment_type.to_string(),
                a.status.to_string(),
                if a.locked { 1 } else { 0 },
                &a.notes,
                &a.created_by_run,
                a.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                a.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ])?;
        }
        Ok(())
    }

    /// 查询某周期的全部排班 (年度容量统计需要全量口径)
    pub fn find_by_period(&self, period_id: &str) -> RepositoryResult<Vec<ScheduleAssignment>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE period_id = ?1 ORDER BY date, student_id",
            Self::SELECT_BASE
        ))?;
        let rows = stmt.query_map(params![period_id], Self::map_row)?;
        let mut assignments = Vec::new();
        for row in rows {
            assignments.push(row?);
        }
        Ok(assignments)
    }

    /// 查询某周期在日期范围内的排班 (闭区间)
    pub fn find_in_range(
        &self,
        period_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> RepositoryResult<Vec<ScheduleAssignment>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE period_id = ?1 AND date >= ?2 AND date <= ?3 ORDER BY date, student_id",
            Self::SELECT_BASE
        ))?;
        let rows = stmt.query_map(
            params![
                period_id,
                start_date.format("%Y-%m-%d").to_string(),
                end_date.format("%Y-%m-%d").to_string(),
            ],
            Self::map_row,
        )?;
        let mut assignments = Vec::new();
        for row in rows {
            assignments.push(row?);
        }
        Ok(assignments)
    }

    /// 设置/解除锁定标志 (人工编辑入口)
    pub fn set_locked(&self, assignment_id: &str, locked: bool) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count = conn.execute(
            r#"UPDATE schedule_assignment
               SET locked = ?2, updated_at = datetime('now')
               WHERE assignment_id = ?1"#,
            params![assignment_id, if locked { 1 } else { 0 }],
        )?;
        Ok(count)
    }

    /// 删除单条排班 (人工编辑入口)
    pub fn delete(&self, assignment_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count = conn.execute(
            "DELETE FROM schedule_assignment WHERE assignment_id = ?1",
            params![assignment_id],
        )?;
        Ok(count)
    }

    const SELECT_BASE: &'static str = r#"SELECT
            assignment_id, period_id, student_id, preceptor_id, clerkship_id,
            elective_id, site_id, date, assignment_type, status, locked,
            notes, created_by_run, created_at, updated_at
        FROM schedule_assignment"#;

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScheduleAssignment> {
        Ok(ScheduleAssignment {
            assignment_id: row.get(0)?,
            period_id: row.get(1)?,
            student_id: row.get(2)?,
            preceptor_id: row.get(3)?,
            clerkship_id: row.get(4)?,
            elective_id: row.get(5)?,
            site_id: row.get(6)?,
            date: parse_date(&row.get::<_, String>(7)?),
            assignment_type: AssignmentType::from_str(&row.get::<_, String>(8)?),
            status: AssignmentStatus::from_str(&row.get::<_, String>(9)?),
            locked: row.get::<_, i64>(10)? != 0,
            notes: row.get(11)?,
            created_by_run: row.get(12)?,
            created_at: parse_datetime(&row.get::<_, String>(13)?),
            updated_at: parse_datetime(&row.get::<_, String>(14)?),
        })
    }
}
