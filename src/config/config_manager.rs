// ==========================================
// 临床轮转排班系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::settings::{EngineSettings, ScoringWeights};
use crate::db::open_sqlite_connection;
use crate::domain::types::WorldPolicy;
use rusqlite::{params, Connection};
use std::error::Error;
use std::sync::{Arc, Mutex};

/// 配置键全集
pub mod config_keys {
    /// 可用性记录缺失语义 ("CLOSED" / "OPEN")
    pub const AVAILABILITY_WORLD_POLICY: &str = "availability.world_policy";
    /// 日容量缺省链的系统默认值
    pub const DEFAULT_MAX_STUDENTS_PER_DAY: &str = "capacity.default_max_students_per_day";
    /// 同站点连续性权重
    pub const SITE_CONTINUITY_WEIGHT: &str = "scoring.site_continuity_weight";
    /// 同医疗系统连续性权重
    pub const HEALTH_SYSTEM_CONTINUITY_WEIGHT: &str = "scoring.health_system_continuity_weight";
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值 (upsert)
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            r#"INSERT INTO config_kv (scope_id, key, value, updated_at)
               VALUES ('global', ?1, ?2, datetime('now'))
               ON CONFLICT(scope_id, key)
               DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at"#,
            params![key, value],
        )?;
        Ok(())
    }

    /// 读取 f64 配置 (缺失或非法时取默认值)
    fn get_f64_or(&self, key: &str, default: f64) -> Result<f64, Box<dyn Error>> {
        let raw = self.get_config_value(key)?;
        Ok(raw
            .as_deref()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .unwrap_or(default))
    }

    /// 读取 i32 配置 (缺失或非法时取默认值)
    fn get_i32_or(&self, key: &str, default: i32) -> Result<i32, Box<dyn Error>> {
        let raw = self.get_config_value(key)?;
        Ok(raw
            .as_deref()
            .and_then(|s| s.trim().parse::<i32>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(default))
    }

    /// 加载引擎参数集合
    ///
    /// 缺省值集中在 EngineSettings::default(), 配置仅做覆写
    pub fn load_engine_settings(&self) -> Result<EngineSettings, Box<dyn Error>> {
        let defaults = EngineSettings::default();

        let world_policy = match self.get_config_value(config_keys::AVAILABILITY_WORLD_POLICY)? {
            Some(raw) => WorldPolicy::from_str(&raw),
            None => defaults.world_policy,
        };

        let default_max_students_per_day = self.get_i32_or(
            config_keys::DEFAULT_MAX_STUDENTS_PER_DAY,
            defaults.default_max_students_per_day,
        )?;

        let weights = ScoringWeights {
            site_continuity_weight: self.get_f64_or(
                config_keys::SITE_CONTINUITY_WEIGHT,
                defaults.weights.site_continuity_weight,
            )?,
            health_system_continuity_weight: self.get_f64_or(
                config_keys::HEALTH_SYSTEM_CONTINUITY_WEIGHT,
                defaults.weights.health_system_continuity_weight,
            )?,
        };

        Ok(EngineSettings {
            world_policy,
            default_max_students_per_day,
            weights,
        })
    }
}
