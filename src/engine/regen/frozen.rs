// ==========================================
// 临床轮转排班系统 - 冻结集计算
// ==========================================
// 职责: 按模式把既有排班划分为 冻结 / 待保留 / 待移除
// 红线: 锁定排班对任何模式免疫 (full 也不例外)
// 红线: 范围外排班一律不动
// ==========================================

use crate::domain::assignment::ScheduleAssignment;
use crate::domain::types::SmartStrategy;
use crate::engine::regen::ModeOptions;
use chrono::NaiveDate;

// ==========================================
// FrozenPartition - 既有排班分区
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct FrozenPartition {
    /// 范围外: 不参与本次运行,但计入容量与需求口径
    pub untouched: Vec<ScheduleAssignment>,
    /// 范围内冻结: 无条件留存
    pub frozen: Vec<ScheduleAssignment>,
    /// 范围内待保留 (仅 smart/minimal-change): 逐条复核硬约束后决定去留
    pub keep_candidates: Vec<ScheduleAssignment>,
    /// 范围内待移除
    pub removals: Vec<ScheduleAssignment>,
}

impl FrozenPartition {
    /// 按模式计算分区
    pub fn compute(
        existing: &[ScheduleAssignment],
        range_start: NaiveDate,
        range_end: NaiveDate,
        options: &ModeOptions,
    ) -> Self {
        let mut partition = Self::default();

        for a in existing {
            if !a.in_range(range_start, range_end) {
                partition.untouched.push(a.clone());
                continue;
            }

            match options {
                // full: 范围内全部移除,仅锁定排班免疫
                ModeOptions::Full { .. } => {
                    if a.locked {
                        partition.frozen.push(a.clone());
                    } else {
                        partition.removals.push(a.clone());
                    }
                }

                // smart: 早于 cutoff 或锁定 => 冻结; 其余按策略
                ModeOptions::Smart {
                    cutoff_date,
                    strategy,
                } => {
                    if a.is_frozen_at(*cutoff_date) {
                        partition.frozen.push(a.clone());
                    } else {
                        match strategy {
                            SmartStrategy::MinimalChange => {
                                partition.keep_candidates.push(a.clone())
                            }
                            SmartStrategy::FullReoptimize => partition.removals.push(a.clone()),
                        }
                    }
                }

                // completion: 既有排班全部冻结,只做增量
                ModeOptions::Completion { .. } => {
                    partition.frozen.push(a.clone());
                }
            }
        }

        // 复核顺序确定: 日期 -> 学生 -> 排班ID
        partition.keep_candidates.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| a.student_id.cmp(&b.student_id))
                .then_with(|| a.assignment_id.cmp(&b.assignment_id))
        });

        partition
    }
}
