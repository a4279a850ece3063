// ==========================================
// 临床轮转排班系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免"部分模块外键开启/部分不开启"
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 提供统一建库入口 init_schema (库与测试共用同一份 DDL)
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
///
/// 说明：
/// - 版本号用于**提示/告警**（不做自动迁移），避免静默在旧库上运行导致隐性错误。
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

// ==========================================
// 建库 DDL
// ==========================================
// 约定:
// - 日期一律 TEXT 'YYYY-MM-DD'
// - 布尔一律 INTEGER 0/1
// - UNIQUE(period_id, student_id, date) 是 no-double-booking
//   的持久化兜底,任何代码路径都绕不过
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_scope (
    scope_id TEXT PRIMARY KEY,
    scope_type TEXT NOT NULL,
    scope_key TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(scope_type, scope_key)
);

INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
VALUES ('global', 'GLOBAL', 'global');

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS health_system (
    health_system_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS site (
    site_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    health_system_id TEXT NOT NULL REFERENCES health_system(health_system_id),
    daily_capacity INTEGER,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS student (
    student_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS preceptor (
    preceptor_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    specialty TEXT NOT NULL,
    health_system_id TEXT NOT NULL REFERENCES health_system(health_system_id),
    max_students INTEGER NOT NULL DEFAULT 1,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS preceptor_site (
    preceptor_id TEXT NOT NULL REFERENCES preceptor(preceptor_id) ON DELETE CASCADE,
    site_id TEXT NOT NULL REFERENCES site(site_id),
    PRIMARY KEY (preceptor_id, site_id)
);

CREATE TABLE IF NOT EXISTS clerkship (
    clerkship_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    specialty TEXT NOT NULL,
    required_days INTEGER NOT NULL CHECK (required_days > 0),
    clerkship_type TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS elective (
    elective_id TEXT PRIMARY KEY,
    clerkship_id TEXT NOT NULL REFERENCES clerkship(clerkship_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    minimum_days INTEGER NOT NULL CHECK (minimum_days > 0),
    is_required INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS preceptor_team (
    team_id TEXT PRIMARY KEY,
    clerkship_id TEXT NOT NULL REFERENCES clerkship(clerkship_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    require_same_health_system INTEGER NOT NULL DEFAULT 0,
    require_same_site INTEGER NOT NULL DEFAULT 0,
    require_same_specialty INTEGER NOT NULL DEFAULT 0,
    requires_admin_approval INTEGER NOT NULL DEFAULT 0,
    admin_approved INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS preceptor_team_member (
    team_id TEXT NOT NULL REFERENCES preceptor_team(team_id) ON DELETE CASCADE,
    preceptor_id TEXT NOT NULL REFERENCES preceptor(preceptor_id),
    priority INTEGER NOT NULL,
    role TEXT NOT NULL DEFAULT '',
    is_fallback INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (team_id, preceptor_id)
);

CREATE TABLE IF NOT EXISTS preceptor_availability (
    preceptor_id TEXT NOT NULL REFERENCES preceptor(preceptor_id) ON DELETE CASCADE,
    site_id TEXT NOT NULL REFERENCES site(site_id),
    date TEXT NOT NULL,
    available INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (preceptor_id, site_id, date)
);

CREATE TABLE IF NOT EXISTS blackout_date (
    blackout_id TEXT PRIMARY KEY,
    date TEXT NOT NULL,
    reason TEXT NOT NULL,
    preceptor_id TEXT REFERENCES preceptor(preceptor_id),
    site_id TEXT REFERENCES site(site_id),
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS capacity_rule (
    preceptor_id TEXT PRIMARY KEY REFERENCES preceptor(preceptor_id) ON DELETE CASCADE,
    max_students_per_day INTEGER NOT NULL CHECK (max_students_per_day > 0),
    max_students_per_year INTEGER CHECK (max_students_per_year IS NULL OR max_students_per_year > 0),
    active INTEGER NOT NULL DEFAULT 1,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS schedule_assignment (
    assignment_id TEXT PRIMARY KEY,
    period_id TEXT NOT NULL,
    student_id TEXT NOT NULL REFERENCES student(student_id),
    preceptor_id TEXT NOT NULL REFERENCES preceptor(preceptor_id),
    clerkship_id TEXT NOT NULL REFERENCES clerkship(clerkship_id),
    elective_id TEXT REFERENCES elective(elective_id),
    site_id TEXT NOT NULL REFERENCES site(site_id),
    date TEXT NOT NULL,
    assignment_type TEXT NOT NULL DEFAULT 'REQUIRED',
    status TEXT NOT NULL DEFAULT 'SCHEDULED',
    locked INTEGER NOT NULL DEFAULT 0,
    notes TEXT,
    created_by_run TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (period_id, student_id, date)
);

CREATE INDEX IF NOT EXISTS idx_assignment_period_date
    ON schedule_assignment(period_id, date);
CREATE INDEX IF NOT EXISTS idx_assignment_preceptor_date
    ON schedule_assignment(preceptor_id, date);

CREATE TABLE IF NOT EXISTS regen_run (
    run_id TEXT PRIMARY KEY,
    period_id TEXT NOT NULL,
    mode TEXT NOT NULL,
    strategy TEXT,
    state TEXT NOT NULL,
    range_start TEXT NOT NULL,
    range_end TEXT NOT NULL,
    options_json TEXT,
    report_json TEXT,
    error_message TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    finished_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_regen_run_period
    ON regen_run(period_id, created_at);

CREATE TABLE IF NOT EXISTS run_violation (
    run_id TEXT NOT NULL REFERENCES regen_run(run_id) ON DELETE CASCADE,
    seq_no INTEGER NOT NULL,
    constraint_name TEXT NOT NULL,
    student_id TEXT NOT NULL,
    preceptor_id TEXT NOT NULL,
    site_id TEXT NOT NULL,
    date TEXT NOT NULL,
    message TEXT NOT NULL,
    PRIMARY KEY (run_id, seq_no)
);

INSERT OR IGNORE INTO schema_version (version) VALUES (1);
"#;

/// 初始化数据库 schema（幂等）
///
/// 库与集成测试共用同一份 DDL，避免两套建表语句漂移
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
