// ==========================================
// 临床轮转排班系统 - 领域类型定义
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// 约束名例外: kebab-case (对外接口的稳定标识)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 轮转类型 (Clerkship Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClerkshipType {
    Inpatient,  // 住院
    Outpatient, // 门诊
}

impl fmt::Display for ClerkshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClerkshipType::Inpatient => write!(f, "INPATIENT"),
            ClerkshipType::Outpatient => write!(f, "OUTPATIENT"),
        }
    }
}

impl ClerkshipType {
    /// 从字符串解析轮转类型
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "INPATIENT" => ClerkshipType::Inpatient,
            "OUTPATIENT" => ClerkshipType::Outpatient,
            _ => ClerkshipType::Outpatient, // 默认值
        }
    }
}

// ==========================================
// 排班类型 (Assignment Type)
// ==========================================
// 红线: 选修日消耗轮转的总日数预算,不额外扩张
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentType {
    Required, // 必修日
    Elective, // 选修日
}

impl fmt::Display for AssignmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignmentType::Required => write!(f, "REQUIRED"),
            AssignmentType::Elective => write!(f, "ELECTIVE"),
        }
    }
}

impl AssignmentType {
    /// 从字符串解析排班类型
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "ELECTIVE" => AssignmentType::Elective,
            _ => AssignmentType::Required, // 默认值
        }
    }
}

// ==========================================
// 排班状态 (Assignment Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    Scheduled, // 已排班
    Completed, // 已完成
    Cancelled, // 已取消
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignmentStatus::Scheduled => write!(f, "SCHEDULED"),
            AssignmentStatus::Completed => write!(f, "COMPLETED"),
            AssignmentStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl AssignmentStatus {
    /// 从字符串解析排班状态
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "COMPLETED" => AssignmentStatus::Completed,
            "CANCELLED" => AssignmentStatus::Cancelled,
            _ => AssignmentStatus::Scheduled, // 默认值
        }
    }
}

// ==========================================
// 重排模式 (Regeneration Mode)
// ==========================================
// full:       全量重建 (破坏性, 需调用方显式确认)
// smart:      保留过去 + 锁定, 重排未来
// completion: 只补缺口, 既有排班全部冻结
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegenMode {
    Full,
    Smart,
    Completion,
}

impl fmt::Display for RegenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegenMode::Full => write!(f, "FULL"),
            RegenMode::Smart => write!(f, "SMART"),
            RegenMode::Completion => write!(f, "COMPLETION"),
        }
    }
}

impl RegenMode {
    /// 从字符串解析重排模式 (未知值返回 None, 由边界层报 ValidationError)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "FULL" => Some(RegenMode::Full),
            "SMART" => Some(RegenMode::Smart),
            "COMPLETION" => Some(RegenMode::Completion),
            _ => None,
        }
    }
}

// ==========================================
// 智能重排策略 (Smart Strategy)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SmartStrategy {
    MinimalChange,  // 尽量保留未来排班,仅替换违反硬约束的部分
    FullReoptimize, // 未冻结的未来排班全部丢弃重排
}

impl fmt::Display for SmartStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmartStrategy::MinimalChange => write!(f, "MINIMAL_CHANGE"),
            SmartStrategy::FullReoptimize => write!(f, "FULL_REOPTIMIZE"),
        }
    }
}

impl SmartStrategy {
    /// 从字符串解析策略 (兼容 kebab-case 入参)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "MINIMAL_CHANGE" => Some(SmartStrategy::MinimalChange),
            "FULL_REOPTIMIZE" => Some(SmartStrategy::FullReoptimize),
            _ => None,
        }
    }
}

// ==========================================
// 重排运行状态 (Run State)
// ==========================================
// 状态机: Validating -> ComputingFrozenSet -> Solving
//         -> Diffing -> Committing -> Done
// 任一状态遇不可恢复错误 -> Failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Validating,
    ComputingFrozenSet,
    Solving,
    Diffing,
    Committing,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Validating => write!(f, "VALIDATING"),
            RunState::ComputingFrozenSet => write!(f, "COMPUTING_FROZEN_SET"),
            RunState::Solving => write!(f, "SOLVING"),
            RunState::Diffing => write!(f, "DIFFING"),
            RunState::Committing => write!(f, "COMMITTING"),
            RunState::Done => write!(f, "DONE"),
            RunState::Failed => write!(f, "FAILED"),
        }
    }
}

impl RunState {
    /// 从字符串解析运行状态
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "VALIDATING" => RunState::Validating,
            "COMPUTING_FROZEN_SET" => RunState::ComputingFrozenSet,
            "SOLVING" => RunState::Solving,
            "DIFFING" => RunState::Diffing,
            "COMMITTING" => RunState::Committing,
            "DONE" => RunState::Done,
            _ => RunState::Failed, // 默认值
        }
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

// ==========================================
// 约束名 (Constraint Name)
// ==========================================
// 红线: 封闭枚举,不接受任意字符串
// 红线: no-double-booking 是数据完整性不变量,永不可放宽
// 对外标识采用 kebab-case,与运行报告/接口入参一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConstraintName {
    PreceptorCapacity,      // 带教医师日容量/年容量
    SiteCapacity,           // 站点日容量
    SpecialtyMatch,         // 专科匹配
    HealthSystemContinuity, // 医疗系统连续性
    BlackoutDate,           // 停诊日
    NoDoubleBooking,        // 学生同日唯一 (不可放宽)
}

impl fmt::Display for ConstraintName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ConstraintName {
    /// 对外稳定标识 (kebab-case)
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintName::PreceptorCapacity => "preceptor-capacity",
            ConstraintName::SiteCapacity => "site-capacity",
            ConstraintName::SpecialtyMatch => "specialty-match",
            ConstraintName::HealthSystemContinuity => "health-system-continuity",
            ConstraintName::BlackoutDate => "blackout-date",
            ConstraintName::NoDoubleBooking => "no-double-booking",
        }
    }

    /// 从字符串解析约束名 (未知值返回 None, 由边界层报 ValidationError)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "preceptor-capacity" => Some(ConstraintName::PreceptorCapacity),
            "site-capacity" => Some(ConstraintName::SiteCapacity),
            "specialty-match" => Some(ConstraintName::SpecialtyMatch),
            "health-system-continuity" => Some(ConstraintName::HealthSystemContinuity),
            "blackout-date" => Some(ConstraintName::BlackoutDate),
            "no-double-booking" => Some(ConstraintName::NoDoubleBooking),
            _ => None,
        }
    }

    /// 是否允许在 completion 模式下降级为提示性约束
    pub fn is_relaxable(&self) -> bool {
        !matches!(self, ConstraintName::NoDoubleBooking)
    }

    /// 全部约束名 (用于校验与报告)
    pub fn all() -> &'static [ConstraintName] {
        &[
            ConstraintName::PreceptorCapacity,
            ConstraintName::SiteCapacity,
            ConstraintName::SpecialtyMatch,
            ConstraintName::HealthSystemContinuity,
            ConstraintName::BlackoutDate,
            ConstraintName::NoDoubleBooking,
        ]
    }
}

// ==========================================
// 可用性世界策略 (Availability World Policy)
// ==========================================
// closed: 无可用性记录 = 不可用 (默认,只会少排不会错排)
// open:   无可用性记录 = 可用,仅显式 available=false 视为不可用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorldPolicy {
    Closed,
    Open,
}

impl fmt::Display for WorldPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorldPolicy::Closed => write!(f, "CLOSED"),
            WorldPolicy::Open => write!(f, "OPEN"),
        }
    }
}

impl WorldPolicy {
    /// 从字符串解析世界策略
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "OPEN" => WorldPolicy::Open,
            _ => WorldPolicy::Closed, // 默认值
        }
    }
}
