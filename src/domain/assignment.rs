// ==========================================
// 临床轮转排班系统 - 排班领域模型
// ==========================================
// 红线: 排班只由重排引擎 (或外部人工编辑) 写入,
//       不被无关操作隐式修改
// 红线: 锁定排班对任何重排模式免疫
// ==========================================

use crate::domain::types::{AssignmentStatus, AssignmentType};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// ScheduleAssignment - 排班记录
// ==========================================
// 持久化口径: 每 (学生, 日期) 一行, 带医师/站点/轮转外键
// 这是导出/日历等下游子系统读取的持久契约
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleAssignment {
    // ===== 主键 =====
    pub assignment_id: String, // 排班唯一标识 (UUID)

    // ===== 归属 =====
    pub period_id: String,  // 排班周期
    pub student_id: String, // 学生 (FK)

    // ===== 槽位 =====
    pub preceptor_id: String,        // 带教医师 (FK)
    pub clerkship_id: String,        // 轮转 (FK)
    pub elective_id: Option<String>, // 选修方向 (仅选修日)
    pub site_id: String,             // 站点 (FK)
    pub date: NaiveDate,             // 日期

    // ===== 状态与标志 =====
    pub assignment_type: AssignmentType, // 必修日/选修日
    pub status: AssignmentStatus,        // 已排班/已完成/已取消
    pub locked: bool,                    // 锁定标志 (对任何重排模式免疫)
    pub notes: Option<String>,           // 备注

    // ===== 审计字段 =====
    pub created_by_run: Option<String>, // 产生此排班的运行ID (人工编辑为 None)
    pub created_at: NaiveDateTime,      // 记录创建时间
    pub updated_at: NaiveDateTime,      // 记录更新时间
}

impl ScheduleAssignment {
    /// smart 模式冻结判定: 早于 cutoff 或已锁定
    pub fn is_frozen_at(&self, cutoff_date: NaiveDate) -> bool {
        self.date < cutoff_date || self.locked
    }

    /// 是否落在日期范围内 (闭区间)
    pub fn in_range(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.date >= start && self.date <= end
    }
}
