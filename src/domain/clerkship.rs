// ==========================================
// 临床轮转排班系统 - 轮转领域模型
// ==========================================
// 红线: required_days / minimum_days 非正值在写入时拒绝,
//       不留给求解器处理
// ==========================================

use crate::domain::types::ClerkshipType;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// Clerkship - 轮转定义
// ==========================================
// required_days 是每个学生在该轮转的总日数预算,
// 选修日从该预算中扣除,不额外扩张
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clerkship {
    pub clerkship_id: String,          // 轮转唯一标识
    pub name: String,                  // 名称
    pub specialty: String,             // 专科 (specialty-match 约束输入)
    pub required_days: i32,            // 必需日数 (> 0)
    pub clerkship_type: ClerkshipType, // 轮转类型 (住院/门诊)
    pub created_at: NaiveDateTime,     // 记录创建时间
}

impl Clerkship {
    /// 写入时校验 (数值边界在此拒绝,不进入求解器)
    pub fn validate(&self) -> Result<(), String> {
        if self.required_days <= 0 {
            return Err(format!(
                "required_days 必须为正数: clerkship_id={}, required_days={}",
                self.clerkship_id, self.required_days
            ));
        }
        Ok(())
    }
}

// ==========================================
// Elective - 选修方向
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Elective {
    pub elective_id: String,       // 选修唯一标识
    pub clerkship_id: String,      // 所属轮转 (FK)
    pub name: String,              // 名称
    pub minimum_days: i32,         // 最低日数 (> 0)
    pub is_required: bool,         // 是否必选
    pub created_at: NaiveDateTime, // 记录创建时间 (分配顺序依据)
}

impl Elective {
    /// 写入时校验
    pub fn validate(&self) -> Result<(), String> {
        if self.minimum_days <= 0 {
            return Err(format!(
                "minimum_days 必须为正数: elective_id={}, minimum_days={}",
                self.elective_id, self.minimum_days
            ));
        }
        Ok(())
    }
}
