// ==========================================
// 临床轮转排班系统 - 引擎层仓储聚合
// ==========================================
// 职责: 聚合重排引擎所需的所有 Repository
// 目标: 减少 RegenEngine 的构造函数参数数量，提升可维护性
// ==========================================

use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use crate::repository::{
    AssignmentRepository, BlackoutRepository, CapacityRuleRepository, ClerkshipRepository,
    PreceptorRepository, RunRepository, SiteRepository, StudentRepository, TeamRepository,
};

/// 重排引擎仓储集合
///
/// 聚合重排引擎所需的所有 Repository，简化依赖注入。
/// 共享同一底层连接时,整个运行期间读到的是同一份实体状态。
#[derive(Clone)]
pub struct EngineRepositories {
    /// 学生仓储
    pub student_repo: Arc<StudentRepository>,
    /// 带教医师仓储
    pub preceptor_repo: Arc<PreceptorRepository>,
    /// 站点仓储
    pub site_repo: Arc<SiteRepository>,
    /// 轮转仓储
    pub clerkship_repo: Arc<ClerkshipRepository>,
    /// 团队仓储
    pub team_repo: Arc<TeamRepository>,
    /// 停诊日仓储
    pub blackout_repo: Arc<BlackoutRepository>,
    /// 容量规则仓储
    pub capacity_rule_repo: Arc<CapacityRuleRepository>,
    /// 排班仓储
    pub assignment_repo: Arc<AssignmentRepository>,
    /// 运行仓储
    pub run_repo: Arc<RunRepository>,
}

impl EngineRepositories {
    /// 从共享连接创建全部仓储
    ///
    /// 单连接 = 运行期间的一致性读 (SQLite 同连接串行执行)
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            student_repo: Arc::new(StudentRepository::from_connection(conn.clone())),
            preceptor_repo: Arc::new(PreceptorRepository::from_connection(conn.clone())),
            site_repo: Arc::new(SiteRepository::from_connection(conn.clone())),
            clerkship_repo: Arc::new(ClerkshipRepository::from_connection(conn.clone())),
            team_repo: Arc::new(TeamRepository::from_connection(conn.clone())),
            blackout_repo: Arc::new(BlackoutRepository::from_connection(conn.clone())),
            capacity_rule_repo: Arc::new(CapacityRuleRepository::from_connection(conn.clone())),
            assignment_repo: Arc::new(AssignmentRepository::from_connection(conn.clone())),
            run_repo: Arc::new(RunRepository::from_connection(conn)),
        }
    }
}
