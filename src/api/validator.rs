// ==========================================
// 临床轮转排班系统 - 重排入参校验器
// ==========================================
// 职责: 把外部动态入参解析为封闭的类型化请求
// 红线: 未知约束名 / 不可放宽约束 / 未确认的破坏性操作
//       一律在边界拒绝,不进入引擎
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::types::{RegenMode, SmartStrategy};
use crate::engine::constraints::ConstraintSet;
use crate::engine::regen::{ModeOptions, RegenRequest};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// RawRegenRequest - 外部入参 (未解析)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRegenRequest {
    pub period_id: String,
    pub mode: String,
    pub range_start: NaiveDate,
    pub range_end: NaiveDate,

    // smart 模式
    pub cutoff_date: Option<NaiveDate>,
    pub strategy: Option<String>,

    // completion 模式
    #[serde(default)]
    pub constraints_to_relax: Vec<String>,

    // full 模式: 破坏性确认契约
    #[serde(default)]
    pub acknowledge_destructive: bool,
}

/// 解析并校验重排入参
///
/// # 返回
/// - `Ok(RegenRequest)`: 类型化请求, 引擎内部不再见字符串
/// - `Err(ApiError::InvalidInput)`: 求解开始前拒绝
pub fn validate_regen_request(raw: &RawRegenRequest) -> ApiResult<RegenRequest> {
    if raw.period_id.trim().is_empty() {
        return Err(ApiError::InvalidInput("period_id 不能为空".to_string()));
    }

    if raw.range_start > raw.range_end {
        return Err(ApiError::InvalidInput(format!(
            "日期范围倒置: start={}, end={}",
            raw.range_start, raw.range_end
        )));
    }

    let Some(mode) = RegenMode::from_str(&raw.mode) else {
        return Err(ApiError::InvalidInput(format!("未知重排模式: {}", raw.mode)));
    };

    let options = match mode {
        RegenMode::Full => ModeOptions::Full {
            acknowledge_destructive: raw.acknowledge_destructive,
        },

        RegenMode::Smart => {
            let Some(cutoff_date) = raw.cutoff_date else {
                return Err(ApiError::InvalidInput(
                    "smart 模式必须提供 cutoff_date".to_string(),
                ));
            };
            let strategy = match &raw.strategy {
                Some(s) => SmartStrategy::from_str(s).ok_or_else(|| {
                    ApiError::InvalidInput(format!("未知智能重排策略: {}", s))
                })?,
                None => {
                    return Err(ApiError::InvalidInput(
                        "smart 模式必须提供 strategy".to_string(),
                    ))
                }
            };
            ModeOptions::Smart {
                cutoff_date,
                strategy,
            }
        }

        RegenMode::Completion => {
            let constraints_to_relax = ConstraintSet::from_names(&raw.constraints_to_relax)
                .map_err(ApiError::InvalidInput)?;
            ModeOptions::Completion {
                constraints_to_relax,
            }
        }
    };

    Ok(RegenRequest {
        period_id: raw.period_id.clone(),
        range_start: raw.range_start,
        range_end: raw.range_end,
        options,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_raw(mode: &str) -> RawRegenRequest {
        RawRegenRequest {
            period_id: "2026-FALL".to_string(),
            mode: mode.to_string(),
            range_start: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            range_end: NaiveDate::from_ymd_opt(2026, 12, 18).unwrap(),
            cutoff_date: None,
            strategy: None,
            constraints_to_relax: Vec::new(),
            acknowledge_destructive: false,
        }
    }

    #[test]
    fn test_rejects_inverted_range() {
        let mut raw = base_raw("full");
        raw.acknowledge_destructive = true;
        raw.range_end = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        assert!(matches!(
            validate_regen_request(&raw),
            Err(ApiError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_mode() {
        let raw = base_raw("rebuild");
        assert!(matches!(
            validate_regen_request(&raw),
            Err(ApiError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_smart_requires_cutoff_and_strategy() {
        let mut raw = base_raw("smart");
        assert!(validate_regen_request(&raw).is_err());

        raw.cutoff_date = Some(NaiveDate::from_ymd_opt(2026, 10, 1).unwrap());
        assert!(validate_regen_request(&raw).is_err());

        raw.strategy = Some("minimal-change".to_string());
        assert!(validate_regen_request(&raw).is_ok());
    }

    #[test]
    fn test_completion_rejects_unknown_constraint() {
        let mut raw = base_raw("completion");
        raw.constraints_to_relax = vec!["soft-capacity".to_string()];
        assert!(validate_regen_request(&raw).is_err());
    }

    #[test]
    fn test_completion_rejects_relaxing_double_booking() {
        let mut raw = base_raw("completion");
        raw.constraints_to_relax = vec!["no-double-booking".to_string()];
        assert!(validate_regen_request(&raw).is_err());
    }
}
