// ==========================================
// 临床轮转排班系统 - 重排运行数据仓储
// ==========================================
// 聚合: regen_run + run_violation
// 用途: 运行历史回溯, GetViolations 查询, 跨进程并发兜底
// ==========================================

use crate::domain::run::RegenRun;
use crate::domain::types::{RegenMode, RunState, SmartStrategy};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .unwrap_or_else(|_| NaiveDate::from_ymd_opt(1970, 1, 1).unwrap())
}

fn parse_datetime(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap_or_default()
}

// ==========================================
// RunViolationRecord - 约束违反落库记录
// ==========================================
// completion 模式下被接受的提示性违反,按运行留痕
#[derive(Debug, Clone)]
pub struct RunViolationRecord {
    pub constraint_name: String,
    pub student_id: String,
    pub preceptor_id: String,
    pub site_id: String,
    pub date: NaiveDate,
    pub message: String,
}

// ==========================================
// RunRepository - 重排运行仓储
// ==========================================
pub struct RunRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RunRepository {
    /// 创建新的运行仓储实例
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

    /// 创建运行记录
    pub fn create(&self, run: &RegenRun) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO regen_run (
                    run_id, period_id, mode, strategy, state,
                    range_start, range_end, options_json, report_json,
                    error_message, created_at, finished_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"#,
            params![
                &run.run_id,
                &run.period_id,
                run.mode.to_string(),
                run.strategy.map(|s| s.to_string()),
                run.state.to_string(),
                run.range_start.format("%Y-%m-%d").to_string(),
                run.range_end.format("%Y-%m-%d").to_string(),
                &run.options_json,
                &run.report_json,
                &run.error_message,
                run.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                run.finished_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
            ],
        )?;
        Ok(())
    }

    /// 推进运行状态
    pub fn update_state(&self, run_id: &str, state: RunState) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let count = conn.execute(
            "UPDATE regen_run SET state = ?2 WHERE run_id = ?1",
            params![run_id, state.to_string()],
        )?;
        if count == 0 {
            return Err(RepositoryError::NotFound {
                entity: "RegenRun".to_string(),
                id: run_id.to_string(),
            });
        }
        Ok(())
    }

    /// 标记运行完成 (Done) 并写入报告快照
    pub fn mark_done(&self, run_id: &str, report_json: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"UPDATE regen_run
               SET state = 'DONE', report_json = ?2, finished_at = datetime('now')
               WHERE run_id = ?1"#,
            params![run_id, report_json],
        )?;
        Ok(())
    }

    /// 标记运行失败 (Failed) 并记录原因
    pub fn mark_failed(&self, run_id: &str, error_message: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"UPDATE regen_run
               SET state = 'FAILED', error_message = ?2, finished_at = datetime('now')
               WHERE run_id = ?1"#,
            params![run_id, error_message],
        )?;
        Ok(())
    }

    /// 批量写入运行接受的约束违反 (单一事务)
    pub fn insert_violations(
        &self,
        run_id: &str,
        violations: &[RunViolationRecord],
    ) -> RepositoryResult<usize> {
        if violations.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"INSERT INTO run_violation (
                        run_id, seq_no, constraint_name, student_id,
                        preceptor_id, site_id, date, message
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            )?;
            for (seq_no, v) in violations.iter().enumerate() {
                stmt.execute(params![
                    run_id,
                    seq_no as i64,
                    &v.constraint_name,
                    &v.student_id,
                    &v.preceptor_id,
                    &v.site_id,
                    v.date.format("%Y-%m-%d").to_string(),
                    &v.message,
                ])?;
            }
        }
        tx.commit()?;
        Ok(violations.len())
    }

    /// 按ID查询运行记录
    pub fn find_by_id(&self, run_id: &str) -> RepositoryResult<Option<RegenRun>> {
        let conn = self.get_conn()?;
        let run = conn
            .query_row(
                r#"SELECT run_id, period_id, mode, strategy, state,
                          range_start, range_end, options_json, report_json,
                          error_message, created_at, finished_at
                   FROM regen_run WHERE run_id = ?1"#,
                params![run_id],
                Self::map_row,
            )
            .optional()?;
        Ok(run)
    }

    /// 查询某周期当前未到终态的运行 (跨进程并发兜底)
    pub fn find_active_for_period(&self, period_id: &str) -> RepositoryResult<Option<RegenRun>> {
        let conn = self.get_conn()?;
        let run = conn
            .query_row(
                r#"SELECT run_id, period_id, mode, strategy, state,
                          range_start, range_end, options_json, report_json,
                          error_message, created_at, finished_at
                   FROM regen_run
                   WHERE period_id = ?1 AND state NOT IN ('DONE', 'FAILED')
                   ORDER BY created_at DESC LIMIT 1"#,
                params![period_id],
                Self::map_row,
            )
            .optional()?;
        Ok(run)
    }

    /// 查询运行接受的约束违反
    pub fn find_violations(&self, run_id: &str) -> RepositoryResult<Vec<RunViolationRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT constraint_name, student_id, preceptor_id, site_id, date, message
               FROM run_violation WHERE run_id = ?1 ORDER BY seq_no"#,
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok(RunViolationRecord {
                constraint_name: row.get(0)?,
                student_id: row.get(1)?,
                preceptor_id: row.get(2)?,
                site_id: row.get(3)?,
                date: parse_date(&row.get::<_, String>(4)?),
                message: row.get(5)?,
            })
        })?;
        let mut violations = Vec::new();
        for row in rows {
            violations.push(row?);
        }
        Ok(violations)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RegenRun> {
        Ok(RegenRun {
            run_id: row.get(0)?,
            period_id: row.get(1)?,
            mode: RegenMode::from_str(&row.get::<_, String>(2)?).unwrap_or(RegenMode::Completion),
            strategy: row
                .get::<_, Option<String>>(3)?
                .and_then(|s| SmartStrategy::from_str(&s)),
            state: RunState::from_str(&row.get::<_, String>(4)?),
            range_start: parse_date(&row.get::<_, String>(5)?),
            range_end: parse_date(&row.get::<_, String>(6)?),
            options_json: row.get(7)?,
            report_json: row.get(8)?,
            error_message: row.get(9)?,
            created_at: parse_datetime(&row.get::<_, String>(10)?),
            finished_at: row
                .get::<_, Option<String>>(11)?
                .map(|s| parse_datetime(&s)),
        })
    }
}
