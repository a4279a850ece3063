// ==========================================
// 临床轮转排班系统 - 容量规则领域模型
// ==========================================
// 红线: 每名医师至多一条生效规则 (upsert 语义)
// 红线: 容量约束优先于排班偏好
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// CapacityRule - 医师容量规则
// ==========================================
// 缺省链: CapacityRule -> Preceptor.max_students -> 系统默认值
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityRule {
    pub preceptor_id: String,               // 医师 (主键, upsert 语义)
    pub max_students_per_day: i32,          // 日容量上限
    pub max_students_per_year: Option<i32>, // 年容量上限 (None = 不限)
    pub active: bool,                       // 是否生效
    pub updated_at: NaiveDateTime,          // 记录更新时间
}

impl CapacityRule {
    /// 写入时校验
    pub fn validate(&self) -> Result<(), String> {
        if self.max_students_per_day <= 0 {
            return Err(format!(
                "max_students_per_day 必须为正数: preceptor_id={}, value={}",
                self.preceptor_id, self.max_students_per_day
            ));
        }
        if let Some(yearly) = self.max_students_per_year {
            if yearly <= 0 {
                return Err(format!(
                    "max_students_per_year 必须为正数: preceptor_id={}, value={}",
                    self.preceptor_id, yearly
                ));
            }
        }
        Ok(())
    }
}
