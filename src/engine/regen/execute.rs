// ==========================================
// 临床轮转排班系统 - 重排执行 (状态机)
// ==========================================
// 红线: 删除 + 插入在单一事务提交,失败则排班保持原状
// 红线: 取消发生时不做任何部分提交
// ==========================================

use super::{FrozenPartition, ModeOptions, RegenEngine, RegenError, RegenRequest, RunReport};
use crate::domain::assignment::ScheduleAssignment;
use crate::domain::run::RegenRun;
use crate::domain::types::{AssignmentStatus, AssignmentType, RunState};
use crate::engine::availability::AvailabilityResolver;
use crate::engine::constraints::{CandidateSlot, ConstraintModel, ConstraintSet};
use crate::engine::ledger::CapacityLedger;
use crate::engine::snapshot::ScheduleSnapshot;
use crate::engine::solver::{build_demands, AssignmentSolver, SolveOutcome};
use crate::repository::assignment_repo::AssignmentDelta;
use crate::repository::run_repo::RunViolationRecord;
use chrono::Utc;
use serde_json::json;
use std::sync::atomic::AtomicBool;
use tracing::{info, instrument, warn};
use uuid::Uuid;

impl RegenEngine {
    /// 执行一次重排运行
    ///
    /// # 参数
    /// - `request`: 周期ID + 日期范围 + 模式参数
    ///
    /// # 返回
    /// - `Ok(RunReport)`: 运行报告 (变更统计 + 未排缺口 + 接受的违反)
    /// - `Err(RegenError)`: 校验失败 / 运行冲突 / 已取消 / 存储错误
    #[instrument(skip(self, request), fields(
        period_id = %request.period_id,
        mode = %request.options.mode()
    ))]
    pub fn execute(&self, request: &RegenRequest) -> Result<RunReport, RegenError> {
        // ===== Validating (入参部分): 拒绝即无任何状态变更 =====
        Self::validate_request(request)?;

        // ===== 并发守卫: 同周期至多一个在途运行 =====
        let _token = self.guard_period(&request.period_id)?;
        if let Some(active) = self
            .repos
            .run_repo
            .find_active_for_period(&request.period_id)?
        {
            return Err(RegenError::Conflict(crate::i18n::t_with_args(
                "regen.concurrent_run",
                &[("period_id", active.period_id.as_str())],
            )));
        }

        // ===== 创建运行记录并走状态机 =====
        let run_id = Uuid::new_v4().to_string();
        let run = RegenRun {
            run_id: run_id.clone(),
            period_id: request.period_id.clone(),
            mode: request.options.mode(),
            strategy: request.options.strategy(),
            state: RunState::Validating,
            range_start: request.range_start,
            range_end: request.range_end,
            options_json: Some(Self::options_snapshot(request).to_string()),
            report_json: None,
            error_message: None,
            created_at: Utc::now().naive_utc(),
            finished_at: None,
        };
        self.repos.run_repo.create(&run)?;

        let cancel = self.register_cancel_flag(&request.period_id);
        let result = self.run_pipeline(&run_id, request, &cancel);

        self.unregister_cancel_flag(&request.period_id);

        match result {
            Ok(report) => Ok(report),
            Err(e) => {
                // 失败终态: 排班保持原状 (提交在单一事务内)
                if let Err(mark_err) = self.repos.run_repo.mark_failed(&run_id, &e.to_string()) {
                    warn!(run_id = %run_id, error = %mark_err, "标记运行失败时出错");
                }
                Err(e)
            }
        }
    }

    /// 占用周期守卫
    fn guard_period<'a>(
        &'a self,
        period_id: &str,
    ) -> Result<impl Drop + 'a, RegenError> {
        self.guard.try_acquire(period_id).ok_or_else(|| {
            RegenError::Conflict(crate::i18n::t_with_args(
                "regen.concurrent_run",
                &[("period_id", period_id)],
            ))
        })
    }

    /// 入参校验 (求解开始前)
    fn validate_request(request: &RegenRequest) -> Result<(), RegenError> {
        if request.range_start > request.range_end {
            return Err(RegenError::Validation(format!(
                "日期范围倒置: start={}, end={}",
                request.range_start, request.range_end
            )));
        }

        match &request.options {
            ModeOptions::Full {
                acknowledge_destructive,
            } => {
                if !acknowledge_destructive {
                    return Err(RegenError::Validation(crate::i18n::t(
                        "regen.destructive_not_acknowledged",
                    )));
                }
            }
            // smart: cutoff 在范围之外也合法 (全部冻结/全部重排)
            ModeOptions::Smart { .. } => {}
            // completion: 放宽集合在边界层解析时已验证
            ModeOptions::Completion { .. } => {}
        }
        Ok(())
    }

    /// 状态机主体: ComputingFrozenSet -> Solving -> Diffing -> Committing -> Done
    fn run_pipeline(
        &self,
        run_id: &str,
        request: &RegenRequest,
        cancel: &AtomicBool,
    ) -> Result<RunReport, RegenError> {
        let settings = self
            .config_manager
            .load_engine_settings()
            .map_err(|e| RegenError::Config(e.to_string()))?;

        let snapshot = ScheduleSnapshot::load(
            &self.repos,
            &request.period_id,
            request.range_start,
            request.range_end,
        )?;

        // ===== ComputingFrozenSet =====
        self.repos
            .run_repo
            .update_state(run_id, RunState::ComputingFrozenSet)?;
        let mut partition = FrozenPartition::compute(
            &snapshot.existing_assignments,
            request.range_start,
            request.range_end,
            &request.options,
        );

        // ===== Solving =====
        self.repos.run_repo.update_state(run_id, RunState::Solving)?;
        let relaxed = request.options.constraint_set();

        // 台账先入账: 范围外 + 冻结 (留存排班占用容量)
        let mut ledger = CapacityLedger::new();
        for a in partition.untouched.iter().chain(partition.frozen.iter()) {
            Self::seed_ledger(&snapshot, &mut ledger, a);
        }

        // minimal-change: 逐条复核待保留排班,违反硬约束的转入移除
        let mut kept: Vec<ScheduleAssignment> = Vec::new();
        {
            let strict = ConstraintSet::strict();
            let resolver = AvailabilityResolver::new(&snapshot, &settings);
            let model = ConstraintModel::new(&snapshot, &settings, &strict);

            for a in std::mem::take(&mut partition.keep_candidates) {
                let check = resolver.is_slot_open(
                    &ledger,
                    &strict,
                    &a.preceptor_id,
                    &a.site_id,
                    a.date,
                );
                let candidate = CandidateSlot {
                    student_id: &a.student_id,
                    clerkship_id: &a.clerkship_id,
                    elective_id: a.elective_id.as_deref(),
                    preceptor_id: &a.preceptor_id,
                    site_id: &a.site_id,
                    date: a.date,
                };
                let eval = model.evaluate(&ledger, candidate);

                if check.open && eval.placeable() {
                    Self::seed_ledger(&snapshot, &mut ledger, &a);
                    kept.push(a);
                } else {
                    partition.removals.push(a);
                }
            }
        }

        // 需求口径: 范围外 + 冻结 + 保留 均冲抵需求
        let counted: Vec<&ScheduleAssignment> = partition
            .untouched
            .iter()
            .chain(partition.frozen.iter())
            .chain(kept.iter())
            .collect();
        let demands = build_demands(&snapshot, &counted);

        // 可放置日期: smart 模式不向 cutoff 之前的已执行区回填
        let solve_dates: Vec<_> = match &request.options {
            ModeOptions::Smart { cutoff_date, .. } => snapshot
                .dates_in_range()
                .into_iter()
                .filter(|date| date >= cutoff_date)
                .collect(),
            _ => snapshot.dates_in_range(),
        };

        let solver = AssignmentSolver::new(&snapshot, &settings, &relaxed);
        let outcome = solver
            .solve(&demands, &solve_dates, &mut ledger, cancel)
            .map_err(|_| {
                RegenError::Cancelled(crate::i18n::t_with_args(
                    "regen.cancelled",
                    &[("period_id", request.period_id.as_str())],
                ))
            })?;

        // ===== Diffing =====
        self.repos.run_repo.update_state(run_id, RunState::Diffing)?;
        let now = Utc::now().naive_utc();
        let inserts: Vec<ScheduleAssignment> = outcome
            .planned
            .iter()
            .map(|p| ScheduleAssignment {
                assignment_id: Uuid::new_v4().to_string(),
                period_id: request.period_id.clone(),
                student_id: p.student_id.clone(),
                preceptor_id: p.preceptor_id.clone(),
                clerkship_id: p.clerkship_id.clone(),
                elective_id: p.elective_id.clone(),
                site_id: p.site_id.clone(),
                date: p.date,
                assignment_type: if p.elective_id.is_some() {
                    AssignmentType::Elective
                } else {
                    AssignmentType::Required
                },
                status: AssignmentStatus::Scheduled,
                locked: false,
                notes: None,
                created_by_run: Some(run_id.to_string()),
                created_at: now,
                updated_at: now,
            })
            .collect();

        let delta = AssignmentDelta {
            removals: partition
                .removals
                .iter()
                .map(|a| a.assignment_id.clone())
                .collect(),
            inserts,
        };

        // ===== Committing =====
        self.repos
            .run_repo
            .update_state(run_id, RunState::Committing)?;
        let (removed, created) = self.repos.assignment_repo.apply_delta(&delta)?;

        let violation_records: Vec<RunViolationRecord> = outcome
            .violations
            .iter()
            .map(|v| RunViolationRecord {
                constraint_name: v.constraint.to_string(),
                student_id: v.student_id.clone(),
                preceptor_id: v.preceptor_id.clone(),
                site_id: v.site_id.clone(),
                date: v.date,
                message: v.message.clone(),
            })
            .collect();
        self.repos
            .run_repo
            .insert_violations(run_id, &violation_records)?;

        // ===== Done =====
        let kept_count = partition.frozen.len() + kept.len();
        let report = Self::build_report(
            run_id,
            request,
            created,
            kept_count,
            removed,
            &relaxed,
            outcome,
        );
        let report_json = serde_json::to_string(&report)
            .map_err(|e| RegenError::Config(format!("报告序列化失败: {}", e)))?;
        self.repos.run_repo.mark_done(run_id, &report_json)?;

        info!(
            run_id = %run_id,
            created = report.created_count,
            kept = report.kept_count,
            removed = report.removed_count,
            unassigned = report.unassigned.len(),
            "重排完成"
        );
        Ok(report)
    }

    /// 留存排班入账 (与求解器同一口径)
    fn seed_ledger(
        snapshot: &ScheduleSnapshot,
        ledger: &mut CapacityLedger,
        a: &ScheduleAssignment,
    ) {
        let hs = snapshot.health_system_of_site(&a.site_id);
        ledger.record(
            &a.student_id,
            &a.clerkship_id,
            &a.preceptor_id,
            &a.site_id,
            hs,
            a.date,
        );
    }

    /// 入参快照 (审计留痕)
    fn options_snapshot(request: &RegenRequest) -> serde_json::Value {
        match &request.options {
            ModeOptions::Full {
                acknowledge_destructive,
            } => json!({
                "mode": "FULL",
                "acknowledge_destructive": acknowledge_destructive,
            }),
            ModeOptions::Smart {
                cutoff_date,
                strategy,
            } => json!({
                "mode": "SMART",
                "cutoff_date": cutoff_date.format("%Y-%m-%d").to_string(),
                "strategy": strategy.to_string(),
            }),
            ModeOptions::Completion {
                constraints_to_relax,
            } => json!({
                "mode": "COMPLETION",
                "constraints_to_relax": constraints_to_relax.relaxed_names(),
            }),
        }
    }

    fn build_report(
        run_id: &str,
        request: &RegenRequest,
        created: usize,
        kept: usize,
        removed: usize,
        relaxed: &ConstraintSet,
        outcome: SolveOutcome,
    ) -> RunReport {
        let message = crate::i18n::t_with_args(
            "regen.done",
            &[
                ("created", created.to_string().as_str()),
                ("kept", kept.to_string().as_str()),
                ("removed", removed.to_string().as_str()),
            ],
        );

        RunReport {
            run_id: run_id.to_string(),
            period_id: request.period_id.clone(),
            mode: request.options.mode(),
            strategy: request.options.strategy(),
            state: RunState::Done,
            created_count: created,
            kept_count: kept,
            removed_count: removed,
            unassigned: outcome.unassigned,
            relaxed_constraints: relaxed.relaxed_names(),
            accepted_violations: outcome.violations,
            excluded_teams: outcome.excluded_teams,
            message,
        }
    }
}
