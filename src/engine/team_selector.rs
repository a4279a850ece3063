// ==========================================
// 临床轮转排班系统 - 团队遴选引擎
// ==========================================
// 职责: 为团队制轮转产出候选团队序列
// 红线: 组建规则漂移的团队排除并标记,不做静默修正
// 红线: 候选顺序确定 (主力最优先级, 创建时间, team_id)
// ==========================================

use crate::domain::team::{order_members, validate_members, PreceptorTeam, PreceptorTeamMember};
use crate::engine::snapshot::ScheduleSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ==========================================
// CandidateTeam - 候选团队
// ==========================================
#[derive(Debug, Clone)]
pub struct CandidateTeam {
    pub team: PreceptorTeam,
    /// 取用顺序: 主力 priority 升序, 候补在全部主力之后
    pub ordered_members: Vec<PreceptorTeamMember>,
}

impl CandidateTeam {
    /// 团队排序键: 最优主力成员的 priority (候补不参与)
    fn best_priority(&self) -> i32 {
        self.ordered_members
            .iter()
            .filter(|m| !m.is_fallback)
            .map(|m| m.priority)
            .min()
            .unwrap_or(i32::MAX)
    }
}

// ==========================================
// ExcludedTeam - 被排除团队 (运行报告可见)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcludedTeam {
    pub team_id: String,
    pub clerkship_id: String,
    pub reason: String,
}

/// 团队遴选结果
#[derive(Debug, Clone, Default)]
pub struct TeamSelection {
    pub candidates: Vec<CandidateTeam>,
    pub excluded: Vec<ExcludedTeam>,
}

// ==========================================
// TeamSelector - 团队遴选引擎
// ==========================================
pub struct TeamSelector<'a> {
    snapshot: &'a ScheduleSnapshot,
}

impl<'a> TeamSelector<'a> {
    pub fn new(snapshot: &'a ScheduleSnapshot) -> Self {
        Self { snapshot }
    }

    /// 某轮转的候选团队 (有序) 与被排除团队 (带原因)
    ///
    /// 快照中的团队已按 (created_at, team_id) 排序;
    /// 此处按最优主力 priority 稳定排序, 创建时间即为决胜键
    pub fn candidate_teams(&self, clerkship_id: &str) -> TeamSelection {
        let mut selection = TeamSelection::default();

        for (team, members) in self
            .snapshot
            .teams
            .iter()
            .filter(|(t, _)| t.clerkship_id == clerkship_id)
        {
            match self.check_team(team, members) {
                Ok(()) => selection.candidates.push(CandidateTeam {
                    team: team.clone(),
                    ordered_members: order_members(members),
                }),
                Err(reason) => selection.excluded.push(ExcludedTeam {
                    team_id: team.team_id.clone(),
                    clerkship_id: clerkship_id.to_string(),
                    reason,
                }),
            }
        }

        // 稳定排序保持 (created_at, team_id) 作为同优先级决胜键
        selection
            .candidates
            .sort_by_key(|c| c.best_priority());

        selection
    }

    /// 对当前成员集合重新校验组建规则
    fn check_team(
        &self,
        team: &PreceptorTeam,
        members: &[PreceptorTeamMember],
    ) -> Result<(), String> {
        validate_members(members)?;

        if team.requires_admin_approval && !team.admin_approved {
            return Err(crate::i18n::t("team.pending_admin_approval"));
        }

        // 所有成员必须仍在岗
        let mut preceptors = Vec::with_capacity(members.len());
        for m in members {
            match self.snapshot.preceptors.get(&m.preceptor_id) {
                Some(p) => preceptors.push(p),
                None => {
                    return Err(format!("成员不存在或已离岗: preceptor_id={}", m.preceptor_id))
                }
            }
        }

        if team.require_same_health_system {
            let systems: HashSet<&str> = preceptors
                .iter()
                .map(|p| p.health_system_id.as_str())
                .collect();
            if systems.len() > 1 {
                return Err(crate::i18n::t("team.health_system_drift"));
            }
        }

        if team.require_same_site {
            let mut common: HashSet<&str> = preceptors[0]
                .site_ids
                .iter()
                .map(|s| s.as_str())
                .collect();
            for p in &preceptors[1..] {
                let sites: HashSet<&str> = p.site_ids.iter().map(|s| s.as_str()).collect();
                common = common.intersection(&sites).copied().collect();
            }
            if common.is_empty() {
                return Err(crate::i18n::t("team.site_drift"));
            }
        }

        if team.require_same_specialty {
            let specialties: HashSet<&str> =
                preceptors.iter().map(|p| p.specialty.as_str()).collect();
            if specialties.len() > 1 {
                return Err(crate::i18n::t("team.specialty_drift"));
            }
        }

        Ok(())
    }
}
