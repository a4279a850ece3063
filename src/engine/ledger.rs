// ==========================================
// 临床轮转排班系统 - 运行内容量台账
// ==========================================
// 职责: 求解过程中的临时容量/占用计数
// 红线: 槽位选中的瞬间原子入账,同一运行内后续学生
//       看到的是扣减后的容量
// ==========================================

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

// ==========================================
// CapacityLedger - 容量台账
// ==========================================
// 台账只在内存中存在一次运行的时长;
// 提交时的数据库状态必须与台账一致
#[derive(Debug, Default)]
pub struct CapacityLedger {
    preceptor_day: HashMap<(String, NaiveDate), i64>, // 医师日占用
    preceptor_year: HashMap<String, i64>,             // 医师年占用
    site_day: HashMap<(String, NaiveDate), i64>,      // 站点日占用
    student_day: HashSet<(String, NaiveDate)>,        // 学生日占用 (no-double-booking)

    // 连续性追踪: (student, clerkship) -> 已用站点 / 医疗系统
    student_sites: HashMap<(String, String), HashSet<String>>,
    student_systems: HashMap<(String, String), HashSet<String>>,
}

impl CapacityLedger {
    /// 创建空台账
    pub fn new() -> Self {
        Self::default()
    }

    /// 入账一条排班占用
    ///
    /// 冻结排班与新选槽位走同一入口,计数口径一致
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &mut self,
        student_id: &str,
        clerkship_id: &str,
        preceptor_id: &str,
        site_id: &str,
        health_system_id: Option<&str>,
        date: NaiveDate,
    ) {
        *self
            .preceptor_day
            .entry((preceptor_id.to_string(), date))
            .or_insert(0) += 1;
        *self
            .preceptor_year
            .entry(preceptor_id.to_string())
            .or_insert(0) += 1;
        *self
            .site_day
            .entry((site_id.to_string(), date))
            .or_insert(0) += 1;
        self.student_day.insert((student_id.to_string(), date));

        let key = (student_id.to_string(), clerkship_id.to_string());
        self.student_sites
            .entry(key.clone())
            .or_default()
            .insert(site_id.to_string());
        if let Some(hs) = health_system_id {
            self.student_systems
                .entry(key)
                .or_default()
                .insert(hs.to_string());
        }
    }

    /// 医师当日占用数
    pub fn preceptor_day_count(&self, preceptor_id: &str, date: NaiveDate) -> i64 {
        self.preceptor_day
            .get(&(preceptor_id.to_string(), date))
            .copied()
            .unwrap_or(0)
    }

    /// 医师年度占用数
    pub fn preceptor_year_count(&self, preceptor_id: &str) -> i64 {
        self.preceptor_year
            .get(preceptor_id)
            .copied()
            .unwrap_or(0)
    }

    /// 站点当日占用数
    pub fn site_day_count(&self, site_id: &str, date: NaiveDate) -> i64 {
        self.site_day
            .get(&(site_id.to_string(), date))
            .copied()
            .unwrap_or(0)
    }

    /// 学生当日是否已有排班
    pub fn student_busy(&self, student_id: &str, date: NaiveDate) -> bool {
        self.student_day
            .contains(&(student_id.to_string(), date))
    }

    /// 学生在某轮转已使用的站点集合
    pub fn sites_used(&self, student_id: &str, clerkship_id: &str) -> Option<&HashSet<String>> {
        self.student_sites
            .get(&(student_id.to_string(), clerkship_id.to_string()))
    }

    /// 学生在某轮转已使用的医疗系统集合
    pub fn systems_used(&self, student_id: &str, clerkship_id: &str) -> Option<&HashSet<String>> {
        self.student_systems
            .get(&(student_id.to_string(), clerkship_id.to_string()))
    }
}
