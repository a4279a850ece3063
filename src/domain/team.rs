// ==========================================
// 临床轮转排班系统 - 带教团队领域模型
// ==========================================
// 红线: 团队 >= 2 名成员,同一医师不得重复入队
// 红线: 组建规则漂移的团队被排除并标记,不做静默修正
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ==========================================
// PreceptorTeam - 带教团队
// ==========================================
// 归属: 一个团队恰属一个轮转
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreceptorTeam {
    pub team_id: String,                  // 团队唯一标识
    pub clerkship_id: String,             // 所属轮转 (FK)
    pub name: String,                     // 名称
    pub require_same_health_system: bool, // 组建规则: 成员须同医疗系统
    pub require_same_site: bool,          // 组建规则: 成员须有公共站点
    pub require_same_specialty: bool,     // 组建规则: 成员须同专科
    pub requires_admin_approval: bool,    // 是否需要管理员审批
    pub admin_approved: bool,             // 审批状态
    pub created_at: NaiveDateTime,        // 记录创建时间 (候选排序的稳定决胜键)
}

// ==========================================
// PreceptorTeamMember - 团队成员
// ==========================================
// 排序: priority 升序; fallback 成员排在全部主力成员之后
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreceptorTeamMember {
    pub team_id: String,      // 所属团队 (FK)
    pub preceptor_id: String, // 医师 (FK)
    pub priority: i32,        // 优先级 (升序,不要求连续)
    pub role: String,         // 角色描述
    pub is_fallback: bool,    // 仅作候补 (主力耗尽后才启用)
}

/// 成员集合写入时校验
///
/// # 返回
/// - `Ok(())`: 满足团队不变量
/// - `Err(reason)`: 违反不变量的原因
pub fn validate_members(members: &[PreceptorTeamMember]) -> Result<(), String> {
    if members.len() < 2 {
        return Err(format!("团队成员不足: count={}, 至少需要 2 名", members.len()));
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for m in members {
        if !seen.insert(m.preceptor_id.as_str()) {
            return Err(format!("同一医师重复入队: preceptor_id={}", m.preceptor_id));
        }
    }

    Ok(())
}

/// 按排班取用顺序排序成员: 主力在前 (priority 升序),
/// 候补在后 (priority 升序); 同优先级按 preceptor_id 稳定排序
pub fn order_members(members: &[PreceptorTeamMember]) -> Vec<PreceptorTeamMember> {
    let mut ordered: Vec<PreceptorTeamMember> = members.to_vec();
    ordered.sort_by(|a, b| {
        a.is_fallback
            .cmp(&b.is_fallback)
            .then(a.priority.cmp(&b.priority))
            .then(a.preceptor_id.cmp(&b.preceptor_id))
    });
    ordered
}
