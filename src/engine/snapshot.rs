// ==========================================
// 临床轮转排班系统 - 实体快照
// ==========================================
// 职责: 一次性加载一次重排运行所需的全部实体状态
// 红线: 运行期间容量/可用性读取必须一致,
//       引擎只读快照,绝不在求解中途回库查询
// ==========================================

use crate::domain::assignment::ScheduleAssignment;
use crate::domain::blackout::BlackoutDate;
use crate::domain::capacity::CapacityRule;
use crate::domain::clerkship::{Clerkship, Elective};
use crate::domain::preceptor::Preceptor;
use crate::domain::site::{HealthSystem, Site};
use crate::domain::student::Student;
use crate::domain::team::{PreceptorTeam, PreceptorTeamMember};
use crate::engine::repositories::EngineRepositories;
use crate::repository::RepositoryResult;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use tracing::instrument;

// ==========================================
// ScheduleSnapshot - 排班实体快照
// ==========================================
// 有序容器 (BTreeMap / 排序 Vec) 保证遍历顺序确定,
// 同一快照 + 同一参数 => 同一排班计划
pub struct ScheduleSnapshot {
    pub period_id: String,
    pub range_start: NaiveDate,
    pub range_end: NaiveDate,

    pub students: Vec<Student>,                     // student_id 升序
    pub preceptors: BTreeMap<String, Preceptor>,    // 仅在岗医师
    pub sites: BTreeMap<String, Site>,
    pub health_systems: BTreeMap<String, HealthSystem>,
    pub clerkships: Vec<Clerkship>,                 // clerkship_id 升序
    pub electives_by_clerkship: BTreeMap<String, Vec<Elective>>,
    pub teams: Vec<(PreceptorTeam, Vec<PreceptorTeamMember>)>, // (created_at, team_id) 升序

    // 可用性: (preceptor_id, site_id, date) -> 显式记录值
    pub availability: HashMap<(String, String, NaiveDate), bool>,
    pub blackouts: Vec<BlackoutDate>,
    pub capacity_rules: HashMap<String, CapacityRule>, // 仅生效规则

    // 全周期排班 (年度容量统计需要全量口径, 范围过滤由调用方做)
    pub existing_assignments: Vec<ScheduleAssignment>,
}

impl ScheduleSnapshot {
    /// 从仓储加载快照
    #[instrument(skip(repos), fields(period_id = %period_id))]
    pub fn load(
        repos: &EngineRepositories,
        period_id: &str,
        range_start: NaiveDate,
        range_end: NaiveDate,
    ) -> RepositoryResult<Self> {
        let students = repos.student_repo.find_all()?;

        let mut preceptors = BTreeMap::new();
        for p in repos.preceptor_repo.find_all_active()? {
            preceptors.insert(p.preceptor_id.clone(), p);
        }

        let mut sites = BTreeMap::new();
        for s in repos.site_repo.find_all()? {
            sites.insert(s.site_id.clone(), s);
        }

        let mut health_systems = BTreeMap::new();
        for hs in repos.site_repo.find_all_health_systems()? {
            health_systems.insert(hs.health_system_id.clone(), hs);
        }

        let clerkships = repos.clerkship_repo.find_all()?;

        let mut electives_by_clerkship: BTreeMap<String, Vec<Elective>> = BTreeMap::new();
        for e in repos.clerkship_repo.find_all_electives()? {
            electives_by_clerkship
                .entry(e.clerkship_id.clone())
                .or_default()
                .push(e);
        }

        let teams = repos.team_repo.find_all_with_members()?;

        let mut availability = HashMap::new();
        for record in repos
            .preceptor_repo
            .find_availability_in_range(range_start, range_end)?
        {
            availability.insert(
                (record.preceptor_id, record.site_id, record.date),
                record.available,
            );
        }

        let blackouts = repos.blackout_repo.find_in_range(range_start, range_end)?;

        let mut capacity_rules = HashMap::new();
        for rule in repos.capacity_rule_repo.find_all_active()? {
            capacity_rules.insert(rule.preceptor_id.clone(), rule);
        }

        let existing_assignments = repos.assignment_repo.find_by_period(period_id)?;

        Ok(Self {
            period_id: period_id.to_string(),
            range_start,
            range_end,
            students,
            preceptors,
            sites,
            health_systems,
            clerkships,
            electives_by_clerkship,
            teams,
            availability,
            blackouts,
            capacity_rules,
            existing_assignments,
        })
    }

    /// 站点所属医疗系统
    pub fn health_system_of_site(&self, site_id: &str) -> Option<&str> {
        self.sites
            .get(site_id)
            .map(|s| s.health_system_id.as_str())
    }

    /// 某槽位的显式可用性记录值 (None = 无记录, 语义由 WorldPolicy 决定)
    pub fn availability_record(
        &self,
        preceptor_id: &str,
        site_id: &str,
        date: NaiveDate,
    ) -> Option<bool> {
        self.availability
            .get(&(preceptor_id.to_string(), site_id.to_string(), date))
            .copied()
    }

    /// 覆盖某槽位的首个停诊日
    pub fn blackout_covering(
        &self,
        preceptor_id: &str,
        site_id: &str,
        date: NaiveDate,
    ) -> Option<&BlackoutDate> {
        self.blackouts
            .iter()
            .find(|b| b.covers(preceptor_id, site_id, date))
    }

    /// 按ID查询轮转
    pub fn clerkship(&self, clerkship_id: &str) -> Option<&Clerkship> {
        self.clerkships
            .iter()
            .find(|c| c.clerkship_id == clerkship_id)
    }

    /// 日期范围内的全部日期 (升序)
    pub fn dates_in_range(&self) -> Vec<NaiveDate> {
        let mut dates = Vec::new();
        let mut d = self.range_start;
        while d <= self.range_end {
            dates.push(d);
            match d.succ_opt() {
                Some(next) => d = next,
                None => break,
            }
        }
        dates
    }
}
