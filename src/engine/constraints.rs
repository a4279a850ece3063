// ==========================================
// 临床轮转排班系统 - 约束模型
// ==========================================
// 职责: 可组合的硬/软规则集合,逐项可放宽
// 红线: no-double-booking 永远是硬约束
// 红线: 被放宽的违反必须记入运行报告,不做静默接受
// ==========================================

use crate::config::EngineSettings;
use crate::domain::types::ConstraintName;
use crate::engine::ledger::CapacityLedger;
use crate::engine::snapshot::ScheduleSnapshot;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ==========================================
// ConstraintSet - 放宽集合
// ==========================================
// completion 模式的入参在边界层解析为封闭枚举后落到这里
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    relaxed: HashSet<ConstraintName>,
}

impl ConstraintSet {
    /// 全部约束按硬约束执行
    pub fn strict() -> Self {
        Self::default()
    }

    /// 指定放宽集合
    pub fn with_relaxed(relaxed: HashSet<ConstraintName>) -> Self {
        Self { relaxed }
    }

    /// 从字符串名解析放宽集合
    ///
    /// # 返回
    /// - `Err(reason)`: 未知约束名, 或试图放宽不可放宽的约束
    pub fn from_names(names: &[String]) -> Result<Self, String> {
        let mut relaxed = HashSet::new();
        for raw in names {
            let Some(name) = ConstraintName::from_str(raw) else {
                return Err(format!("未知约束名: {}", raw));
            };
            if !name.is_relaxable() {
                return Err(format!("约束不可放宽: {}", name));
            }
            relaxed.insert(name);
        }
        Ok(Self { relaxed })
    }

    /// 某约束是否被放宽
    pub fn is_relaxed(&self, name: ConstraintName) -> bool {
        // 双保险: 不可放宽的约束即使被塞进集合也不生效
        name.is_relaxable() && self.relaxed.contains(&name)
    }

    /// 放宽集合的稳定名称列表 (报告用)
    pub fn relaxed_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.relaxed.iter().map(|n| n.to_string()).collect();
        names.sort();
        names
    }
}

// ==========================================
// ConstraintViolation - 约束违反
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintViolation {
    pub constraint: ConstraintName,
    pub student_id: String,
    pub preceptor_id: String,
    pub site_id: String,
    pub date: NaiveDate,
    pub message: String,
}

// ==========================================
// CandidateSlot - 候选排班元组
// ==========================================
// 约束谓词的输入: (学生, 医师, 站点, 日期) + 运行内已选排班
#[derive(Debug, Clone, Copy)]
pub struct CandidateSlot<'a> {
    pub student_id: &'a str,
    pub clerkship_id: &'a str,
    pub elective_id: Option<&'a str>,
    pub preceptor_id: &'a str,
    pub site_id: &'a str,
    pub date: NaiveDate,
}

/// 候选评估结果
#[derive(Debug, Clone, Default)]
pub struct CandidateEvaluation {
    pub hard: Vec<ConstraintViolation>,     // 阻断放置
    pub advisory: Vec<ConstraintViolation>, // 被放宽,记录后接受
}

impl CandidateEvaluation {
    /// 是否可放置
    pub fn placeable(&self) -> bool {
        self.hard.is_empty()
    }
}

// ==========================================
// ConstraintModel - 约束模型
// ==========================================
pub struct ConstraintModel<'a> {
    snapshot: &'a ScheduleSnapshot,
    settings: &'a EngineSettings,
    relaxed: &'a ConstraintSet,
}

impl<'a> ConstraintModel<'a> {
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

    /// 评估候选槽位
    ///
    /// 每个约束独立判定; 被放宽的违反进入 advisory,
    /// 否则进入 hard
    pub fn evaluate(
        &self,
        ledger: &CapacityLedger,
        candidate: CandidateSlot<'_>,
    ) -> CandidateEvaluation {
        let mut eval = CandidateEvaluation::default();

        // no-double-booking: 数据完整性不变量,永远硬约束
        if ledger.student_busy(candidate.student_id, candidate.date) {
            eval.hard.push(self.violation(
                ConstraintName::NoDoubleBooking,
                &candidate,
                format!(
                    "学生当日已有排班: student={}, date={}",
                    candidate.student_id, candidate.date
                ),
            ));
        }

        // preceptor-capacity: 日容量 + 年容量
        let daily_cap = self.daily_cap(candidate.preceptor_id);
        if ledger.preceptor_day_count(candidate.preceptor_id, candidate.date) >= daily_cap {
            self.route(
                &mut eval,
                ConstraintName::PreceptorCapacity,
                &candidate,
                format!(
                    "医师日容量已满: preceptor={}, date={}, cap={}",
                    candidate.preceptor_id, candidate.date, daily_cap
                ),
            );
        } else if let Some(yearly_cap) = self.yearly_cap(candidate.preceptor_id) {
            if ledger.preceptor_year_count(candidate.preceptor_id) >= yearly_cap {
                self.route(
                    &mut eval,
                    ConstraintName::PreceptorCapacity,
                    &candidate,
                    format!(
                        "医师年容量已满: preceptor={}, cap={}",
                        candidate.preceptor_id, yearly_cap
                    ),
                );
            }
        }

        // site-capacity: 站点日容量
        if let Some(site) = self.snapshot.sites.get(candidate.site_id) {
            if let Some(site_cap) = site.daily_capacity {
                if ledger.site_day_count(candidate.site_id, candidate.date) >= i64::from(site_cap)
                {
                    self.route(
                        &mut eval,
                        ConstraintName::SiteCapacity,
                        &candidate,
                        format!(
                            "站点日容量已满: site={}, date={}, cap={}",
                            candidate.site_id, candidate.date, site_cap
                        ),
                    );
                }
            }
        }

        // specialty-match: 医师专科须匹配轮转专科
        if let (Some(preceptor), Some(clerkship)) = (
            self.snapshot.preceptors.get(candidate.preceptor_id),
            self.snapshot.clerkship(candidate.clerkship_id),
        ) {
            if preceptor.specialty != clerkship.specialty {
                self.route(
                    &mut eval,
                    ConstraintName::SpecialtyMatch,
                    &candidate,
                    format!(
                        "专科不匹配: preceptor={} ({}), clerkship={} ({})",
                        candidate.preceptor_id,
                        preceptor.specialty,
                        candidate.clerkship_id,
                        clerkship.specialty
                    ),
                );
            }
        }

        // health-system-continuity: 同一轮转不得跨医疗系统
        if let Some(candidate_hs) = self.snapshot.health_system_of_site(candidate.site_id) {
            if let Some(used) = ledger.systems_used(candidate.student_id, candidate.clerkship_id) {
                if !used.is_empty() && !used.contains(candidate_hs) {
                    self.route(
                        &mut eval,
                        ConstraintName::HealthSystemContinuity,
                        &candidate,
                        format!(
                            "医疗系统连续性中断: student={}, clerkship={}, 新系统={}",
                            candidate.student_id, candidate.clerkship_id, candidate_hs
                        ),
                    );
                }
            }
        }

        // blackout-date: 停诊日
        if let Some(blackout) =
            self.snapshot
                .blackout_covering(candidate.preceptor_id, candidate.site_id, candidate.date)
        {
            self.route(
                &mut eval,
                ConstraintName::BlackoutDate,
                &candidate,
                format!("排班落在停诊日: {} ({})", blackout.date, blackout.reason),
            );
        }

        eval
    }

    fn daily_cap(&self, preceptor_id: &str) -> i64 {
        if let Some(rule) = self.snapshot.capacity_rules.get(preceptor_id) {
            return i64::from(rule.max_students_per_day);
        }
        if let Some(p) = self.snapshot.preceptors.get(preceptor_id) {
            if p.max_students > 0 {
                return i64::from(p.max_students);
            }
        }
        i64::from(self.settings.default_max_students_per_day)
    }

    fn yearly_cap(&self, preceptor_id: &str) -> Option<i64> {
        self.snapshot
            .capacity_rules
            .get(preceptor_id)
            .and_then(|rule| rule.max_students_per_year)
            .map(i64::from)
    }

    fn violation(
        &self,
        name: ConstraintName,
        candidate: &CandidateSlot<'_>,
        message: String,
    ) -> ConstraintViolation {
        ConstraintViolation {
            constraint: name,
            student_id: candidate.student_id.to_string(),
            preceptor_id: candidate.preceptor_id.to_string(),
            site_id: candidate.site_id.to_string(),
            date: candidate.date,
            message,
        }
    }

    /// 按放宽集合把违反路由到 hard / advisory
    fn route(
        &self,
        eval: &mut CandidateEvaluation,
        name: ConstraintName,
        candidate: &CandidateSlot<'_>,
        message: String,
    ) {
        let v = self.violation(name, candidate, message);
        if self.relaxed.is_relaxed(name) {
            eval.advisory.push(v);
        } else {
            eval.hard.push(v);
        }
    }
}
