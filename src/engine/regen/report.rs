// ==========================================
// 临床轮转排班系统 - 重排运行报告
// ==========================================
// 红线: "改了什么" 与 "没能满足什么" 分开呈现,
//       部分成功永远显式,不做静默
// ==========================================

use crate::domain::types::{RegenMode, RunState, SmartStrategy};
use crate::engine::constraints::ConstraintViolation;
use crate::engine::solver::UnassignedDay;
use crate::engine::team_selector::ExcludedTeam;
use serde::{Deserialize, Serialize};

// ==========================================
// RunReport - 运行报告
// ==========================================
// 持久化为 regen_run.report_json 快照, 同时作为 Regenerate 返回值
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub period_id: String,
    pub mode: RegenMode,
    pub strategy: Option<SmartStrategy>,
    pub state: RunState,

    // ===== 变更统计 =====
    pub created_count: usize, // 本次新建
    pub kept_count: usize,    // 范围内留存 (冻结 + minimal-change 保留)
    pub removed_count: usize, // 本次移除

    // ===== 未满足项 =====
    pub unassigned: Vec<UnassignedDay>,

    // ===== 接受的违反 (仅 completion 模式非空) =====
    pub relaxed_constraints: Vec<String>,
    pub accepted_violations: Vec<ConstraintViolation>,

    // ===== 诊断 =====
    pub excluded_teams: Vec<ExcludedTeam>,
    pub message: String,
}

impl RunReport {
    /// 是否完全覆盖 (无未排缺口)
    pub fn fully_assigned(&self) -> bool {
        self.unassigned.is_empty()
    }
}
