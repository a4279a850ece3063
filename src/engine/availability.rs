// ==========================================
// 临床轮转排班系统 - 可用性判定引擎
// ==========================================
// 职责: 判定 (医师, 站点, 日期) 槽位是否开放
// 输入: 实体快照 + 运行内容量台账
// 红线: 纯查询,不落库; 所有拒绝必须输出 reason
// ==========================================

use crate::config::EngineSettings;
use crate::domain::types::{ConstraintName, WorldPolicy};
use crate::engine::constraints::ConstraintSet;
use crate::engine::ledger::CapacityLedger;
use crate::engine::snapshot::ScheduleSnapshot;
use chrono::NaiveDate;

// ==========================================
// SlotCheck - 槽位判定结果
// ==========================================
#[derive(Debug, Clone)]
pub struct SlotCheck {
    pub open: bool,
    pub reasons: Vec<String>, // 拒绝原因 (开放时为空)
}

impl SlotCheck {
    fn open() -> Self {
        Self {
            open: true,
            reasons: Vec::new(),
        }
    }

    fn closed(reasons: Vec<String>) -> Self {
        Self {
            open: false,
            reasons,
        }
    }
}

// ==========================================
// AvailabilityResolver - 可用性判定引擎
// ==========================================
pub struct AvailabilityResolver<'a> {
    snapshot: &'a ScheduleSnapshot,
    settings: &'a EngineSettings,
}

impl<'a> AvailabilityResolver<'a> {
    pub fn new(snapshot: &'a ScheduleSnapshot, settings: &'a EngineSettings) -> Self {
        Self { snapshot, settings }
    }

    /// 医师日容量 (缺省链: CapacityRule -> Preceptor.max_students -> 系统默认)
    pub fn daily_cap(&self, preceptor_id: &str) -> i64 {
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

    /// 医师年容量 (None = 不限)
    pub fn yearly_cap(&self, preceptor_id: &str) -> Option<i64> {
        self.snapshot
            .capacity_rules
            .get(preceptor_id)
            .and_then(|rule| rule.max_students_per_year)
            .map(i64::from)
    }

    /// 医师当日剩余容量
    pub fn remaining_capacity(
        &self,
        ledger: &CapacityLedger,
        preceptor_id: &str,
        date: NaiveDate,
    ) -> i64 {
        let cap = self.daily_cap(preceptor_id);
        let used = ledger.preceptor_day_count(preceptor_id, date);
        (cap - used).max(0)
    }

    /// 判定槽位是否开放
    ///
    /// 逐项检查:
    /// 1) 医师在岗且在该站点执业
    /// 2) 停诊日 (可经 blackout-date 放宽)
    /// 3) 可用性记录 (按 WorldPolicy, 不可放宽, 无人值守的槽位不存在)
    /// 4) 日容量 / 年容量 (可经 preceptor-capacity 放宽)
    pub fn is_slot_open(
        &self,
        ledger: &CapacityLedger,
        relaxed: &ConstraintSet,
        preceptor_id: &str,
        site_id: &str,
        date: NaiveDate,
    ) -> SlotCheck {
        let mut reasons = Vec::new();

        let Some(preceptor) = self.snapshot.preceptors.get(preceptor_id) else {
            return SlotCheck::closed(vec![format!("医师不存在或已离岗: {}", preceptor_id)]);
        };
        if !preceptor.works_at(site_id) {
            return SlotCheck::closed(vec![format!(
                "医师不在该站点执业: preceptor={}, site={}",
                preceptor_id, site_id
            )]);
        }

        if !relaxed.is_relaxed(ConstraintName::BlackoutDate) {
            if let Some(blackout) = self.snapshot.blackout_covering(preceptor_id, site_id, date) {
                reasons.push(format!("停诊日: {} ({})", blackout.date, blackout.reason));
            }
        }

        let marked = self.snapshot.availability_record(preceptor_id, site_id, date);
        let available = match (self.settings.world_policy, marked) {
            (_, Some(v)) => v,
            (WorldPolicy::Closed, None) => false,
            (WorldPolicy::Open, None) => true,
        };
        if !available {
            reasons.push(format!(
                "无可用性: preceptor={}, site={}, date={}",
                preceptor_id, site_id, date
            ));
        }

        if !relaxed.is_relaxed(ConstraintName::PreceptorCapacity) {
            let daily_cap = self.daily_cap(preceptor_id);
            if ledger.preceptor_day_count(preceptor_id, date) >= daily_cap {
                reasons.push(format!(
                    "日容量已满: preceptor={}, date={}, cap={}",
                    preceptor_id, date, daily_cap
                ));
            }
            if let Some(yearly_cap) = self.yearly_cap(preceptor_id) {
                if ledger.preceptor_year_count(preceptor_id) >= yearly_cap {
                    reasons.push(format!(
                        "年容量已满: preceptor={}, cap={}",
                        preceptor_id, yearly_cap
                    ));
                }
            }
        }

        if reasons.is_empty() {
            SlotCheck::open()
        } else {
            SlotCheck::closed(reasons)
        }
    }
}
