// ==========================================
// 临床轮转排班系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 排班与重排引擎 (周边 CRUD/界面是外部协作方)
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 排班规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建库）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    AssignmentStatus, AssignmentType, ClerkshipType, ConstraintName, RegenMode, RunState,
    SmartStrategy, WorldPolicy,
};

// 领域实体
pub use domain::{
    BlackoutDate, CapacityRule, Clerkship, Elective, HealthSystem, Preceptor,
    PreceptorAvailability, PreceptorTeam, PreceptorTeamMember, RegenRun, ScheduleAssignment, Site,
    Student,
};

// 引擎
pub use engine::{
    AssignmentSolver, AvailabilityResolver, CapacityLedger, ConstraintModel, ConstraintSet,
    ConstraintViolation, EngineRepositories, ModeOptions, RegenEngine, RegenRequest, RunReport,
    ScheduleSnapshot, TeamSelector, UnassignedDay,
};

// API
pub use api::{ApiError, ApiResult, RawRegenRequest, ScheduleApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "临床轮转排班系统";

// 数据库版本
pub const DB_VERSION: &str = "v0.1";

// ==========================================
// 预编译检查
// ==========================================
