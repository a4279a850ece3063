// ==========================================
// 临床轮转排班系统 - 学生数据仓储
// ==========================================
// 红线: Repository 不含排班逻辑
// ==========================================

use crate::domain::student::Student;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

fn parse_datetime(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap_or_default()
}

// ==========================================
// StudentRepository - 学生仓储
// ==========================================
pub struct StudentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StudentRepository {
    /// 创建新的学生仓储实例
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

    /// 创建学生
    pub fn create(&self, student: &Student) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO student (student_id, name, email, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![
                &student.student_id,
                &student.name,
                &student.email,
                student.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                student.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;
        Ok(())
    }

    /// 按ID查询学生
    pub fn find_by_id(&self, student_id: &str) -> RepositoryResult<Option<Student>> {
        let conn = self.get_conn()?;
        let student = conn
            .query_row(
                r#"SELECT student_id, name, email, created_at, updated_at
                   FROM student WHERE student_id = ?1"#,
                params![student_id],
                Self::map_row,
            )
            .optional()?;
        Ok(student)
    }

    /// 查询全部学生 (按ID稳定排序,保证重排确定性)
    pub fn find_all(&self) -> RepositoryResult<Vec<Student>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT student_id, name, email, created_at, updated_at
               FROM student ORDER BY student_id"#,
        )?;
        let rows = stmt.query_map([], Self::map_row)?;
        let mut students = Vec::new();
        for row in rows {
            students.push(row?);
        }
        Ok(students)
    }

    /// 删除学生
    ///
    /// 有排班依赖时由外键约束拒绝 (ForeignKeyViolation),
    /// 绝不静默级联删除排班
    pub fn delete(&self, student_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count = conn.execute("DELETE FROM student WHERE student_id = ?1", params![student_id])?;
        Ok(count)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Student> {
        Ok(Student {
            student_id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            created_at: parse_datetime(&row.get::<_, String>(3)?),
            updated_at: parse_datetime(&row.get::<_, String>(4)?),
        })
    }
}
