// ==========================================
// 临床轮转排班系统 - 排班求解器
// ==========================================
// 职责: 贪心 + 确定性排序的逐日放置
// 红线: 不可行不抛错: 永远返回尽力计划 + 显式未排报告
// 红线: 槽位选中即入账,同一运行内后续学生看到扣减后的容量
// 红线: 选修日在必修日之后求解,共用轮转日数预算
// ==========================================

use crate::config::EngineSettings;
use crate::engine::availability::AvailabilityResolver;
use crate::engine::constraints::{
    CandidateSlot, ConstraintModel, ConstraintSet, ConstraintViolation,
};
use crate::engine::ledger::CapacityLedger;
use crate::engine::snapshot::ScheduleSnapshot;
use crate::engine::team_selector::{ExcludedTeam, TeamSelector};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, instrument};

/// 求解取消信号 (协作式, 在学生放置迭代之间检查)
#[derive(Debug, Error)]
#[error("求解已取消")]
pub struct SolveCancelled;

// ==========================================
// PlannedAssignment - 计划排班 (引擎内部)
// ==========================================
// 不含 UUID / 审计字段: 求解器保持纯函数与确定性,
// 落库身份由重排引擎在提交阶段赋予
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAssignment {
    pub student_id: String,
    pub clerkship_id: String,
    pub elective_id: Option<String>,
    pub preceptor_id: String,
    pub site_id: String,
    pub date: NaiveDate,
}

// ==========================================
// UnassignedDay - 未排日报告
// ==========================================
// InfeasibilityWarning: 不是错误,调用方可放宽约束或加容量后重跑
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnassignedDay {
    pub student_id: String,
    pub clerkship_id: String,
    pub elective_id: Option<String>,
    pub missing_days: i64,
    pub reason: String,
}

/// 求解结果
#[derive(Debug, Clone, Default)]
pub struct SolveOutcome {
    pub planned: Vec<PlannedAssignment>,
    pub unassigned: Vec<UnassignedDay>,
    pub violations: Vec<ConstraintViolation>, // 被放宽后接受的违反
    pub excluded_teams: Vec<ExcludedTeam>,
}

// ==========================================
// StudentDemand - 学生需求
// ==========================================
#[derive(Debug, Clone)]
pub struct StudentDemand {
    pub student_id: String,
    pub clerkship_id: String,
    pub required_days: i64,                 // 必修日缺口
    pub elective_days: Vec<(String, i64)>,  // (elective_id, 缺口), 仅必选选修
}

impl StudentDemand {
    /// 总缺口 (排序键)
    pub fn total(&self) -> i64 {
        self.required_days + self.elective_days.iter().map(|(_, d)| d).sum::<i64>()
    }
}

/// 从快照与留存排班计算需求
///
/// 口径:
/// - 每名学生修读周期内全部轮转
/// - required_days 是轮转总日数预算;
///   必选选修先从预算中保留 minimum_days, 余量为必修日缺口
/// - 已持有日数 (冻结 + 保留) 逐类冲抵
/// - 缺口为零的 (学生, 轮转) 直接跳过,不报错
pub fn build_demands(
    snapshot: &ScheduleSnapshot,
    counted: &[&crate::domain::assignment::ScheduleAssignment],
) -> Vec<StudentDemand> {
    // (student, clerkship) -> 已持有总日数
    let mut held_total: HashMap<(String, String), i64> = HashMap::new();
    // (student, elective) -> 已持有选修日数
    let mut held_elective: HashMap<(String, String), i64> = HashMap::new();

    for a in counted {
        *held_total
            .entry((a.student_id.clone(), a.clerkship_id.clone()))
            .or_insert(0) += 1;
        if let Some(elective_id) = &a.elective_id {
            *held_elective
                .entry((a.student_id.clone(), elective_id.clone()))
                .or_insert(0) += 1;
        }
    }

    let mut demands = Vec::new();

    for student in &snapshot.students {
        for clerkship in &snapshot.clerkships {
            let budget = i64::from(clerkship.required_days);
            let held = held_total
                .get(&(student.student_id.clone(), clerkship.clerkship_id.clone()))
                .copied()
                .unwrap_or(0);
            let mut remaining = (budget - held).max(0);
            if remaining == 0 {
                continue; // 预算已满,静默跳过
            }

            // 必选选修按创建顺序从剩余预算保留 minimum_days
            let mut elective_days = Vec::new();
            if let Some(electives) = snapshot
                .electives_by_clerkship
                .get(&clerkship.clerkship_id)
            {
                for e in electives.iter().filter(|e| e.is_required) {
                    let held_e = held_elective
                        .get(&(student.student_id.clone(), e.elective_id.clone()))
                        .copied()
                        .unwrap_or(0);
                    let need = (i64::from(e.minimum_days) - held_e)
                        .max(0)
                        .min(remaining);
                    if need > 0 {
                        elective_days.push((e.elective_id.clone(), need));
                        remaining -= need;
                    }
                }
            }

            demands.push(StudentDemand {
                student_id: student.student_id.clone(),
                clerkship_id: clerkship.clerkship_id.clone(),
                required_days: remaining,
                elective_days,
            });
        }
    }

    // 确定性排序: 总缺口降序, 学生ID, 轮转ID
    demands.sort_by(|a, b| {
        b.total()
            .cmp(&a.total())
            .then_with(|| a.student_id.cmp(&b.student_id))
            .then_with(|| a.clerkship_id.cmp(&b.clerkship_id))
    });

    demands
}

// ==========================================
// AssignmentSolver - 排班求解器
// ==========================================
pub struct AssignmentSolver<'a> {
    snapshot: &'a ScheduleSnapshot,
    settings: &'a EngineSettings,
    relaxed: &'a ConstraintSet,
}

/// 候选医师与其取用序 (团队制: (团队序, 成员序); 个体制: 全员同序)
#[derive(Debug, Clone)]
struct RankedPreceptor {
    preceptor_id: String,
    rank: (usize, usize),
}

impl<'a> AssignmentSolver<'a> {
    pub fn new(
        snapshot: &'a ScheduleSnapshot,
        settings: &'a EngineSettings,
        relaxed: &'a ConstraintSet,
    ) -> Self {
        Self {
            snapshot,
            settings,
            relaxed,
        }
    }

    /// 求解
    ///
    /// # 参数
    /// - `demands`: 需求列表 (已按确定性顺序排序)
    /// - `dates`: 可放置日期 (升序; smart 模式从 cutoff 起,
    ///   不向已执行的过去回填新排班)
    /// - `ledger`: 容量台账 (已预先入账冻结/保留排班)
    /// - `cancel`: 协作式取消信号
    ///
    /// # 返回
    /// - `Ok(SolveOutcome)`: 尽力计划 + 未排报告 + 接受的违反
    /// - `Err(SolveCancelled)`: 收到取消信号,输出不可用
    #[instrument(skip_all, fields(demands = demands.len()))]
    pub fn solve(
        &self,
        demands: &[StudentDemand],
        dates: &[NaiveDate],
        ledger: &mut CapacityLedger,
        cancel: &AtomicBool,
    ) -> Result<SolveOutcome, SolveCancelled> {
        let mut outcome = SolveOutcome::default();

        // 每个轮转的候选医师序计算一次
        let mut rank_cache: BTreeMap<String, Vec<RankedPreceptor>> = BTreeMap::new();
        let selector = TeamSelector::new(self.snapshot);
        for clerkship in &self.snapshot.clerkships {
            let selection = selector.candidate_teams(&clerkship.clerkship_id);
            outcome.excluded_teams.extend(selection.excluded.clone());
            rank_cache.insert(
                clerkship.clerkship_id.clone(),
                self.ranked_preceptors(&selection),
            );
        }

        // ===== Pass 1: 必修日 =====
        for demand in demands {
            if cancel.load(Ordering::Relaxed) {
                return Err(SolveCancelled);
            }
            self.place_days(
                demand,
                None,
                demand.required_days,
                dates,
                rank_cache.get(&demand.clerkship_id).map(Vec::as_slice).unwrap_or(&[]),
                ledger,
                &mut outcome,
            );
        }

        // ===== Pass 2: 选修日 (消耗同一轮转预算的保留部分) =====
        for demand in demands {
            if cancel.load(Ordering::Relaxed) {
                return Err(SolveCancelled);
            }
            for (elective_id, need) in &demand.elective_days {
                self.place_days(
                    demand,
                    Some(elective_id),
                    *need,
                    dates,
                    rank_cache.get(&demand.clerkship_id).map(Vec::as_slice).unwrap_or(&[]),
                    ledger,
                    &mut outcome,
                );
            }
        }

        debug!(
            planned = outcome.planned.len(),
            unassigned = outcome.unassigned.len(),
            violations = outcome.violations.len(),
            "求解完成"
        );
        Ok(outcome)
    }

    /// 团队遴选结果 -> 候选医师序
    ///
    /// 团队制: 按 (团队序, 成员序), 同一医师首个名次生效;
    /// 个体制 (该轮转无有效团队): 全部在岗医师, 名次一致,
    /// 由连续性评分与日期决定取舍
    fn ranked_preceptors(
        &self,
        selection: &crate::engine::team_selector::TeamSelection,
    ) -> Vec<RankedPreceptor> {
        if selection.candidates.is_empty() {
            return self
                .snapshot
                .preceptors
                .keys()
                .map(|preceptor_id| RankedPreceptor {
                    preceptor_id: preceptor_id.clone(),
                    rank: (0, 0),
                })
                .collect();
        }

        let mut seen: HashMap<&str, ()> = HashMap::new();
        let mut ranked = Vec::new();
        for (team_idx, team) in selection.candidates.iter().enumerate() {
            for (member_idx, member) in team.ordered_members.iter().enumerate() {
                if seen.insert(member.preceptor_id.as_str(), ()).is_none() {
                    ranked.push(RankedPreceptor {
                        preceptor_id: member.preceptor_id.clone(),
                        rank: (team_idx, member_idx),
                    });
                }
            }
        }
        ranked
    }

    /// 为一个需求放置 `need` 天
    ///
    /// 贪心: 每天取当前最优开放槽位并立即入账;
    /// 一旦无槽位, 余量整体报未排 (台账只增不减,继续尝试无意义)
    #[allow(clippy::too_many_arguments)]
    fn place_days(
        &self,
        demand: &StudentDemand,
        elective_id: Option<&str>,
        need: i64,
        dates: &[NaiveDate],
        ranked: &[RankedPreceptor],
        ledger: &mut CapacityLedger,
        outcome: &mut SolveOutcome,
    ) {
        if need <= 0 {
            return;
        }

        for placed in 0..need {
            match self.place_one(demand, elective_id, dates, ranked, ledger) {
                Some((assignment, advisory)) => {
                    outcome.violations.extend(advisory);
                    outcome.planned.push(assignment);
                }
                None => {
                    outcome.unassigned.push(UnassignedDay {
                        student_id: demand.student_id.clone(),
                        clerkship_id: demand.clerkship_id.clone(),
                        elective_id: elective_id.map(|s| s.to_string()),
                        missing_days: need - placed,
                        reason: "当前约束下无开放槽位".to_string(),
                    });
                    return;
                }
            }
        }
    }

    /// 放置一天: 在候选名次组内取最优开放槽位
    ///
    /// 组内排序: 连续性评分降序 -> 日期升序 -> 医师ID -> 站点ID;
    /// 名次严格优先: 候补成员只在主力全部无槽位时才会被用到
    fn place_one(
        &self,
        demand: &StudentDemand,
        elective_id: Option<&str>,
        dates: &[NaiveDate],
        ranked: &[RankedPreceptor],
        ledger: &mut CapacityLedger,
    ) -> Option<(PlannedAssignment, Vec<ConstraintViolation>)> {
        let resolver = AvailabilityResolver::new(self.snapshot, self.settings);
        let model = ConstraintModel::new(self.snapshot, self.settings, self.relaxed);

        let mut idx = 0;
        while idx < ranked.len() {
            // 同名次成组比较 (个体制下全员一组)
            let rank = ranked[idx].rank;
            let mut best: Option<(
                f64,
                NaiveDate,
                String,
                String,
                Vec<ConstraintViolation>,
            )> = None;

            while idx < ranked.len() && ranked[idx].rank == rank {
                let preceptor_id = ranked[idx].preceptor_id.as_str();
                let Some(preceptor) = self.snapshot.preceptors.get(preceptor_id) else {
                    idx += 1;
                    continue;
                };

                for site_id in &preceptor.site_ids {
                    for &date in dates {
                        if ledger.student_busy(&demand.student_id, date) {
                            continue;
                        }

                        let check =
                            resolver.is_slot_open(ledger, self.relaxed, preceptor_id, site_id, date);
                        if !check.open {
                            continue;
                        }

                        let candidate = CandidateSlot {
                            student_id: &demand.student_id,
                            clerkship_id: &demand.clerkship_id,
                            elective_id,
                            preceptor_id,
                            site_id,
                            date,
                        };
                        let eval = model.evaluate(ledger, candidate);
                        if !eval.placeable() {
                            continue;
                        }

                        let score = self.continuity_score(
                            ledger,
                            &demand.student_id,
                            &demand.clerkship_id,
                            site_id,
                        );

                        let better = match &best {
                            None => true,
                            Some((best_score, best_date, best_p, best_s, _)) => {
                                match score.total_cmp(best_score) {
                                    std::cmp::Ordering::Greater => true,
                                    std::cmp::Ordering::Less => false,
                                    std::cmp::Ordering::Equal => {
                                        (date, preceptor_id, site_id.as_str())
                                            < (*best_date, best_p.as_str(), best_s.as_str())
                                    }
                                }
                            }
                        };
                        if better {
                            best = Some((
                                score,
                                date,
                                preceptor_id.to_string(),
                                site_id.clone(),
                                eval.advisory,
                            ));
                        }
                    }
                }
                idx += 1;
            }

            if let Some((_score, date, preceptor_id, site_id, advisory)) = best {
                let health_system_id = self
                    .snapshot
                    .health_system_of_site(&site_id)
                    .map(|s| s.to_string());
                ledger.record(
                    &demand.student_id,
                    &demand.clerkship_id,
                    &preceptor_id,
                    &site_id,
                    health_system_id.as_deref(),
                    date,
                );
                return Some((
                    PlannedAssignment {
                        student_id: demand.student_id.clone(),
                        clerkship_id: demand.clerkship_id.clone(),
                        elective_id: elective_id.map(|s| s.to_string()),
                        preceptor_id,
                        site_id,
                        date,
                    },
                    advisory,
                ));
            }
            // 该名次组无开放槽位,落到下一名次 (候补成员)
        }

        None
    }

    /// 连续性评分: 同站点 > 同医疗系统, 权重可配置
    fn continuity_score(
        &self,
        ledger: &CapacityLedger,
        student_id: &str,
        clerkship_id: &str,
        site_id: &str,
    ) -> f64 {
        let mut score = 0.0;

        if ledger
            .sites_used(student_id, clerkship_id)
            .is_some_and(|sites| sites.contains(site_id))
        {
            score += self.settings.weights.site_continuity_weight;
        }

        if let Some(hs) = self.snapshot.health_system_of_site(site_id) {
            if ledger
                .systems_used(student_id, clerkship_id)
                .is_some_and(|systems| systems.contains(hs))
            {
                score += self.settings.weights.health_system_continuity_weight;
            }
        }

        score
    }
}

/// 当前未排缺口 (GetUnassigned 查询口径)
///
/// 与求解器共用同一需求计算, 但不做任何放置
pub fn compute_unassigned(
    snapshot: &ScheduleSnapshot,
    counted: &[&crate::domain::assignment::ScheduleAssignment],
) -> Vec<UnassignedDay> {
    build_demands(snapshot, counted)
        .into_iter()
        .flat_map(|demand| {
            let mut days = Vec::new();
            if demand.required_days > 0 {
                days.push(UnassignedDay {
                    student_id: demand.student_id.clone(),
                    clerkship_id: demand.clerkship_id.clone(),
                    elective_id: None,
                    missing_days: demand.required_days,
                    reason: "必修日缺口".to_string(),
                });
            }
            for (elective_id, need) in demand.elective_days {
                days.push(UnassignedDay {
                    student_id: demand.student_id.clone(),
                    clerkship_id: demand.clerkship_id.clone(),
                    elective_id: Some(elective_id),
                    missing_days: need,
                    reason: "必选选修缺口".to_string(),
                });
            }
            days
        })
        .collect()
}
