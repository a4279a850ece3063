// ==========================================
// 临床轮转排班系统 - 重排引擎
// ==========================================
// 职责: 三种重排模式的编排 (冻结集 -> 求解 -> 差分 -> 提交)
// 状态机: Validating -> ComputingFrozenSet -> Solving
//         -> Diffing -> Committing -> Done | Failed
// 红线: 同一周期至多一个在途运行,后到请求直接拒绝不排队
// 红线: 取消后不做任何部分提交
// ==========================================

mod execute;
mod frozen;
mod report;

pub use frozen::FrozenPartition;
pub use report::RunReport;

use crate::config::ConfigManager;
use crate::domain::types::{RegenMode, SmartStrategy};
use crate::engine::constraints::ConstraintSet;
use crate::engine::repositories::EngineRepositories;
use crate::repository::RepositoryError;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

// ==========================================
// RegenError - 重排错误类型
// ==========================================
#[derive(Error, Debug)]
pub enum RegenError {
    /// 参数校验失败: 求解开始前拒绝,不产生任何状态变更
    #[error("参数校验失败: {0}")]
    Validation(String),

    /// 运行冲突: 同周期已有在途运行
    #[error("运行冲突: {0}")]
    Conflict(String),

    /// 协作式取消: 无部分提交
    #[error("运行已取消: {0}")]
    Cancelled(String),

    /// 配置加载失败
    #[error("配置加载失败: {0}")]
    Config(String),

    /// 底层存储错误: 运行标记 Failed,排班保持原状
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

// ==========================================
// ModeOptions - 模式参数 (封闭标签枚举)
// ==========================================
// 边界层把动态入参解析为该枚举后,引擎内部不再见字符串
#[derive(Debug, Clone)]
pub enum ModeOptions {
    /// 全量重建: 破坏性,必须显式确认
    Full { acknowledge_destructive: bool },
    /// 保留过去 + 锁定,按策略处理未来
    Smart {
        cutoff_date: NaiveDate,
        strategy: SmartStrategy,
    },
    /// 只补缺口,可放宽指定约束
    Completion { constraints_to_relax: ConstraintSet },
}

impl ModeOptions {
    /// 对应的重排模式
    pub fn mode(&self) -> RegenMode {
        match self {
            ModeOptions::Full { .. } => RegenMode::Full,
            ModeOptions::Smart { .. } => RegenMode::Smart,
            ModeOptions::Completion { .. } => RegenMode::Completion,
        }
    }

    /// 智能模式策略 (其余模式为 None)
    pub fn strategy(&self) -> Option<SmartStrategy> {
        match self {
            ModeOptions::Smart { strategy, .. } => Some(*strategy),
            _ => None,
        }
    }

    /// 放宽集合 (completion 之外为严格集)
    pub fn constraint_set(&self) -> ConstraintSet {
        match self {
            ModeOptions::Completion {
                constraints_to_relax,
            } => constraints_to_relax.clone(),
            _ => ConstraintSet::strict(),
        }
    }
}

// ==========================================
// RegenRequest - 重排请求
// ==========================================
// 周期ID与日期范围显式入参,不依赖任何环境态
#[derive(Debug, Clone)]
pub struct RegenRequest {
    pub period_id: String,
    pub range_start: NaiveDate,
    pub range_end: NaiveDate,
    pub options: ModeOptions,
}

// ==========================================
// RunGuard - 在途运行守卫
// ==========================================
// 进程内互斥: 同周期第二个请求被拒绝,不排队
#[derive(Default)]
pub struct RunGuard {
    active: Mutex<HashSet<String>>,
}

impl RunGuard {
    /// 占用周期; 已被占用时返回 None
    fn try_acquire(&self, period_id: &str) -> Option<RunToken<'_>> {
        let mut active = self.active.lock().ok()?;
        if !active.insert(period_id.to_string()) {
            return None;
        }
        Some(RunToken {
            guard: self,
            period_id: period_id.to_string(),
        })
    }
}

/// 周期占用凭据, Drop 时释放
struct RunToken<'a> {
    guard: &'a RunGuard,
    period_id: String,
}

impl Drop for RunToken<'_> {
    fn drop(&mut self) {
        if let Ok(mut active) = self.guard.active.lock() {
            active.remove(&self.period_id);
        }
    }
}

// ==========================================
// RegenEngine - 重排引擎
// ==========================================
pub struct RegenEngine {
    repos: EngineRepositories,
    config_manager: Arc<ConfigManager>,
    guard: RunGuard,
    cancel_flags: Mutex<HashMap<String, Arc<AtomicBool>>>,
}

impl RegenEngine {
    /// 创建新的 RegenEngine 实例
    pub fn new(repos: EngineRepositories, config_manager: Arc<ConfigManager>) -> Self {
        Self {
            repos,
            config_manager,
            guard: RunGuard::default(),
            cancel_flags: Mutex::new(HashMap::new()),
        }
    }

    /// 仓储集合 (api 层共享)
    pub fn repositories(&self) -> &EngineRepositories {
        &self.repos
    }

    /// 请求取消某周期的在途运行
    ///
    /// # 返回
    /// - `true`: 信号已送达在途运行
    /// - `false`: 该周期当前无在途运行
    pub fn cancel_run(&self, period_id: &str) -> bool {
        let flags = match self.cancel_flags.lock() {
            Ok(flags) => flags,
            Err(_) => return false,
        };
        match flags.get(period_id) {
            Some(flag) => {
                flag.store(true, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// 注册本次运行的取消标志
    fn register_cancel_flag(&self, period_id: &str) -> Arc<AtomicBool> {
        let flag = Arc::new(AtomicBool::new(false));
        if let Ok(mut flags) = self.cancel_flags.lock() {
            flags.insert(period_id.to_string(), flag.clone());
        }
        flag
    }

    /// 注销取消标志
    fn unregister_cancel_flag(&self, period_id: &str) {
        if let Ok(mut flags) = self.cancel_flags.lock() {
            flags.remove(period_id);
        }
    }
}
