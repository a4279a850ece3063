// ==========================================
// 临床轮转排班系统 - 重排运行领域模型
// ==========================================
// 用途: 运行记录持久化, 历史回溯, GetViolations 查询
// ==========================================

use crate::domain::types::{RegenMode, RunState, SmartStrategy};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// RegenRun - 重排运行记录
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegenRun {
    pub run_id: String,                  // 运行唯一标识 (UUID)
    pub period_id: String,               // 排班周期
    pub mode: RegenMode,                 // 重排模式
    pub strategy: Option<SmartStrategy>, // 智能模式策略
    pub state: RunState,                 // 状态机当前状态
    pub range_start: NaiveDate,          // 日期范围起 (闭区间)
    pub range_end: NaiveDate,            // 日期范围止 (闭区间)
    pub options_json: Option<String>,    // 入参快照 (JSON)
    pub report_json: Option<String>,     // 运行报告快照 (JSON)
    pub error_message: Option<String>,   // 失败原因 (仅 Failed)
    pub created_at: NaiveDateTime,       // 创建时间
    pub finished_at: Option<NaiveDateTime>, // 终态时间
}

impl RegenRun {
    /// 是否已到终态
    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }
}
