// ==========================================
// 临床轮转排班系统 - 引擎参数
// ==========================================
// 连续性权重可配置: 排序倾向不是硬编码公式
// ==========================================

use crate::domain::types::WorldPolicy;
use serde::{Deserialize, Serialize};

/// 连续性评分权重
///
/// 同站点连续高于同医疗系统连续; 最早日期是评分之后的排序项,
/// 不参与加权
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub site_continuity_weight: f64,          // 同站点连续
    pub health_system_continuity_weight: f64, // 同医疗系统连续
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            site_continuity_weight: 3.0,
            health_system_continuity_weight: 2.0,
        }
    }
}

/// 引擎参数集合
///
/// 从 config_kv 加载, 缺省值在此集中定义
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    pub world_policy: WorldPolicy,         // 可用性记录缺失语义
    pub default_max_students_per_day: i32, // 日容量缺省链的最后一环
    pub weights: ScoringWeights,           // 连续性评分权重
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            world_policy: WorldPolicy::Closed,
            default_max_students_per_day: 1,
            weights: ScoringWeights::default(),
        }
    }
}
