// ==========================================
// 临床轮转排班系统 - 站点领域模型
// ==========================================
// 层级: HealthSystem -> Site (一个站点恰属一个医疗系统)
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// HealthSystem - 医疗系统
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSystem {
    pub health_system_id: String,  // 医疗系统唯一标识
    pub name: String,              // 名称
    pub created_at: NaiveDateTime, // 记录创建时间
}

// ==========================================
// Site - 站点
// ==========================================
// 用途: 排班槽位的地点维度, site-capacity 约束的输入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub site_id: String,             // 站点唯一标识
    pub name: String,                // 名称
    pub health_system_id: String,    // 所属医疗系统 (FK)
    pub daily_capacity: Option<i32>, // 站点日容量 (None = 不限)
    pub created_at: NaiveDateTime,   // 记录创建时间
}
