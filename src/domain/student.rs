// ==========================================
// 临床轮转排班系统 - 学生领域模型
// ==========================================
// 用途: 名册层写入,引擎层只读
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// Student - 学生
// ==========================================
// 红线: 删除学生前必须确认无排班依赖 (由仓储层外键保证)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub student_id: String,        // 学生唯一标识
    pub name: String,              // 姓名
    pub email: String,             // 邮箱
    pub created_at: NaiveDateTime, // 记录创建时间
    pub updated_at: NaiveDateTime, // 记录更新时间
}
