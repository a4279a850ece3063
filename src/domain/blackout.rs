// ==========================================
// 临床轮转排班系统 - 停诊日领域模型
// ==========================================
// 作用域: 全局 (无医师/站点限定) 或限定到医师/站点
// 红线: 与锁定排班冲突的停诊日创建被拒绝,绝不静默删除排班
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// BlackoutDate - 停诊日
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlackoutDate {
    pub blackout_id: String,          // 停诊日唯一标识
    pub date: NaiveDate,              // 日期
    pub reason: String,               // 原因
    pub preceptor_id: Option<String>, // 限定医师 (None = 不限定)
    pub site_id: Option<String>,      // 限定站点 (None = 不限定)
    pub created_at: NaiveDateTime,    // 记录创建时间
}

impl BlackoutDate {
    /// 判定停诊日是否覆盖给定槽位
    ///
    /// 全局停诊日 (无任何限定) 覆盖所有槽位;
    /// 限定字段非空时要求逐项匹配
    pub fn covers(&self, preceptor_id: &str, site_id: &str, date: NaiveDate) -> bool {
        if self.date != date {
            return false;
        }
        if let Some(p) = &self.preceptor_id {
            if p != preceptor_id {
                return false;
            }
        }
        if let Some(s) = &self.site_id {
            if s != site_id {
                return false;
            }
        }
        true
    }

    /// 是否为全局停诊日
    pub fn is_global(&self) -> bool {
        self.preceptor_id.is_none() && self.site_id.is_none()
    }
}
