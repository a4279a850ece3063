// ==========================================
// 临床轮转排班系统 - 引擎层
// ==========================================
// 职责: 实现排班规则引擎,不拼 SQL
// 红线: Engine 不拼 SQL, 所有规则必须输出 reason
// 红线: 同一快照 + 同一参数 => 同一排班计划 (确定性)
// ==========================================

pub mod availability;
pub mod constraints;
pub mod ledger;
pub mod regen;
pub mod repositories;
pub mod snapshot;
pub mod solver;
pub mod team_selector;

// 重导出核心引擎
pub use availability::{AvailabilityResolver, SlotCheck};
pub use constraints::{
    CandidateEvaluation, CandidateSlot, ConstraintModel, ConstraintSet, ConstraintViolation,
};
pub use ledger::CapacityLedger;
pub use regen::{FrozenPartition, ModeOptions, RegenEngine, RegenError, RegenRequest, RunReport};
pub use repositories::EngineRepositories;
pub use snapshot::ScheduleSnapshot;
pub use solver::{
    build_demands, compute_unassigned, AssignmentSolver, PlannedAssignment, SolveOutcome,
    StudentDemand, UnassignedDay,
};
pub use team_selector::{CandidateTeam, ExcludedTeam, TeamSelection, TeamSelector};
