// ==========================================
// 临床轮转排班系统 - 带教医师领域模型
// ==========================================
// 红线: 可用性记录缺失的语义由 WorldPolicy 显式配置,
//       引擎不得隐式假设 (见 config_keys::AVAILABILITY_WORLD_POLICY)
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// Preceptor - 带教医师
// ==========================================
// 用途: 名册层写入,引擎层只读
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preceptor {
    pub preceptor_id: String,      // 医师唯一标识
    pub name: String,              // 姓名
    pub specialty: String,         // 专科 (specialty-match 约束输入)
    pub health_system_id: String,  // 所属医疗系统 (FK)
    pub site_ids: Vec<String>,     // 执业站点 (一个或多个)
    pub max_students: i32,         // 日容量默认值 (无 CapacityRule 时生效)
    pub active: bool,              // 在岗标志
    pub created_at: NaiveDateTime, // 记录创建时间
    pub updated_at: NaiveDateTime, // 记录更新时间
}

impl Preceptor {
    /// 是否在指定站点执业
    pub fn works_at(&self, site_id: &str) -> bool {
        self.site_ids.iter().any(|s| s == site_id)
    }
}

// ==========================================
// PreceptorAvailability - 医师可用性记录
// ==========================================
// 粒度: (医师, 站点, 日期) -> 是否可用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreceptorAvailability {
    pub preceptor_id: String, // 医师 (FK)
    pub site_id: String,      // 站点 (FK)
    pub date: NaiveDate,      // 日期
    pub available: bool,      // 是否可用
}
