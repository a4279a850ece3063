// ==========================================
// 临床轮转排班系统 - 排班 API
// ==========================================
// 职责: 对外暴露重排入口与窄读查询
// 契约: Regenerate(periodId, mode, dateRange, options) -> RunReport
//       GetUnassigned(periodId, dateRange) / GetViolations(runId)
// 任何交互式确认完全是调用方的责任,引擎只返回结构化结果
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator::{validate_regen_request, RawRegenRequest};
use crate::domain::run::RegenRun;
use crate::engine::regen::{RegenEngine, RunReport};
use crate::engine::snapshot::ScheduleSnapshot;
use crate::engine::solver::{compute_unassigned, UnassignedDay};
use crate::repository::run_repo::RunViolationRecord;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::instrument;

// ==========================================
// ScheduleApi - 排班 API
// ==========================================
pub struct ScheduleApi {
    engine: Arc<RegenEngine>,
}

impl ScheduleApi {
    /// 创建新的 ScheduleApi 实例
    pub fn new(engine: Arc<RegenEngine>) -> Self {
        Self { engine }
    }

    /// 执行重排
    ///
    /// # 参数
    /// - `raw`: 外部入参 (模式字符串 + 可选项), 在边界解析为类型化请求
    ///
    /// # 返回
    /// - `Ok(RunReport)`: 变更统计 + 未排缺口 + 接受的违反
    /// - `Err(ApiError)`: 校验失败 / 并发冲突 / 取消 / 内部错误
    #[instrument(skip(self, raw), fields(period_id = %raw.period_id, mode = %raw.mode))]
    pub fn regenerate(&self, raw: &RawRegenRequest) -> ApiResult<RunReport> {
        let request = validate_regen_request(raw)?;
        let report = self.engine.execute(&request)?;
        Ok(report)
    }

    /// 查询当前未排缺口
    ///
    /// 与求解器共用同一需求口径, 不做任何放置
    pub fn get_unassigned(
        &self,
        period_id: &str,
        range_start: NaiveDate,
        range_end: NaiveDate,
    ) -> ApiResult<Vec<UnassignedDay>> {
        if range_start > range_end {
            return Err(ApiError::InvalidInput(format!(
                "日期范围倒置: start={}, end={}",
                range_start, range_end
            )));
        }

        let snapshot =
            ScheduleSnapshot::load(self.engine.repositories(), period_id, range_start, range_end)?;
        let counted: Vec<_> = snapshot.existing_assignments.iter().collect();
        Ok(compute_unassigned(&snapshot, &counted))
    }

    /// 查询某次运行接受的约束违反
    pub fn get_violations(&self, run_id: &str) -> ApiResult<Vec<RunViolationRecord>> {
        let repos = self.engine.repositories();
        if repos.run_repo.find_by_id(run_id)?.is_none() {
            return Err(ApiError::NotFound(format!("运行记录不存在: {}", run_id)));
        }
        Ok(repos.run_repo.find_violations(run_id)?)
    }

    /// 查询运行记录
    pub fn get_run(&self, run_id: &str) -> ApiResult<RegenRun> {
        self.engine
            .repositories()
            .run_repo
            .find_by_id(run_id)?
            .ok_or_else(|| ApiError::NotFound(format!("运行记录不存在: {}", run_id)))
    }

    /// 请求取消某周期的在途运行
    ///
    /// # 返回
    /// - `true`: 信号已送达
    /// - `false`: 该周期无在途运行
    pub fn cancel_run(&self, period_id: &str) -> bool {
        self.engine.cancel_run(period_id)
    }
}
