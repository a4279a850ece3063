// ==========================================
// Regen Engine 集成测试
// ==========================================
// 测试范围:
// 1. full 模式: 破坏性确认 / 全量重建 / 锁定免疫 / 确定性
// 2. smart 模式: 冻结过去, minimal-change 与 full-reoptimize
// 3. completion 模式: 只增不删, 放宽约束与违反留痕
// 4. 未排缺口查询
// ==========================================


use clerkship_aps::api::{RawRegenRequest, ScheduleApi};
use clerkship_aps::domain::types::RunState;
use clerkship_aps::engine::EngineRepositories;
use clerkship_aps::ApiError;
use std::collections::HashSet;
use test_helpers::*;

const PERIOD: &str = "2026-FALL";

fn raw_full(ack: bool) -> RawRegenRequest {
    RawRegenRequest {
        period_id: PERIOD.to_string(),
        mode: "full".to_string(),
        range_start: d(2026, 9, 1),
        range_end: d(2026, 9, 30),
        cutoff_date: None,
        strategy: None,
        constraints_to_relax: Vec::new(),
        acknowledge_destructive: ack,
    }
}

fn raw_smart(cutoff: chrono::NaiveDate, strategy: &str) -> RawRegenRequest {
    RawRegenRequest {
        period_id: PERIOD.to_string(),
        mode: "smart".to_string(),
        range_start: d(2026, 9, 1),
        range_end: d(2026, 9, 30),
        cutoff_date: Some(cutoff),
        strategy: Some(strategy.to_string()),
        constraints_to_relax: Vec::new(),
        acknowledge_destructive: false,
    }
}

fn raw_completion(relax: &[&str]) -> RawRegenRequest {
    RawRegenRequest {
        period_id: PERIOD.to_string(),
        mode: "completion".to_string(),
        range_start: d(2026, 9, 1),
        range_end: d(2026, 9, 30),
        cutoff_date: None,
        strategy: None,
        constraints_to_relax: relax.iter().map(|s| s.to_string()).collect(),
        acknowledge_destructive: false,
    }
}

/// 标准场景: 单学生单医师, 10 个可用日
fn seed_ten_day_scenario(repos: &EngineRepositories) {
    insert_health_system(repos, "HS1");
    insert_site(repos, "S1", "HS1", None);
    insert_student(repos, "ST1");
    insert_preceptor(repos, "P1", "内科", "HS1", &["S1"], 1);
    insert_capacity_rule(repos, "P1", 1, None);
    insert_clerkship(repos, "CK1", "内科", 10);
    mark_available(repos, "P1", "S1", d(2026, 9, 1), d(2026, 9, 10));
}

fn assignment_tuples(repos: &EngineRepositories) -> HashSet<(String, String, String, String)> {
    repos
        .assignment_repo
        .find_by_period(PERIOD)
        .expect("查询排班失败")
        .into_iter()
        .map(|a| {
            (
                a.student_id,
                a.preceptor_id,
                a.site_id,
                a.date.format("%Y-%m-%d").to_string(),
            )
        })
        .collect()
}

#[test]
fn test_full_mode_requires_acknowledgement() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (repos, engine) = build_engine(conn);
    seed_ten_day_scenario(&repos);

    let api = ScheduleApi::new(engine);
    let err = api.regenerate(&raw_full(false));
    assert!(matches!(err, Err(ApiError::InvalidInput(_))));

    // 校验失败不留任何排班
    assert!(assignment_tuples(&repos).is_empty());
}

#[test]
fn test_full_mode_ten_day_scenario() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (repos, engine) = build_engine(conn);
    seed_ten_day_scenario(&repos);

    let api = ScheduleApi::new(engine);
    let report = api.regenerate(&raw_full(true)).expect("重排失败");

    assert_eq!(report.state, RunState::Done);
    assert_eq!(report.created_count, 10);
    assert_eq!(report.kept_count, 0);
    assert_eq!(report.removed_count, 0);
    assert!(report.unassigned.is_empty());
    assert!(report.accepted_violations.is_empty());

    let tuples = assignment_tuples(&repos);
    assert_eq!(tuples.len(), 10);

    // 运行记录终态 DONE, 报告快照已持久化
    let run = api.get_run(&report.run_id).expect("查询运行失败");
    assert_eq!(run.state, RunState::Done);
    assert!(run.report_json.is_some());
}

#[test]
fn test_full_mode_is_deterministic() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (repos, engine) = build_engine(conn);

    insert_health_system(&repos, "HS1");
    insert_site(&repos, "S1", "HS1", None);
    insert_site(&repos, "S2", "HS1", None);
    for i in 1..=3 {
        insert_student(&repos, &format!("ST{}", i));
    }
    insert_preceptor(&repos, "P1", "内科", "HS1", &["S1"], 2);
    insert_preceptor(&repos, "P2", "内科", "HS1", &["S1", "S2"], 2);
    insert_clerkship(&repos, "CK1", "内科", 3);
    mark_available(&repos, "P1", "S1", d(2026, 9, 1), d(2026, 9, 15));
    mark_available(&repos, "P2", "S1", d(2026, 9, 1), d(2026, 9, 15));
    mark_available(&repos, "P2", "S2", d(2026, 9, 1), d(2026, 9, 15));

    let api = ScheduleApi::new(engine);

    let first = api.regenerate(&raw_full(true)).expect("首次重排失败");
    let plan_a = assignment_tuples(&repos);

    let second = api.regenerate(&raw_full(true)).expect("二次重排失败");
    let plan_b = assignment_tuples(&repos);

    // 同输入同实体状态 => 同计划
    assert_eq!(plan_a, plan_b);
    assert_eq!(first.created_count, second.created_count);
    // 二次运行删掉首轮结果后重建
    assert_eq!(second.removed_count, first.created_count);
}

#[test]
fn test_full_mode_spares_locked_assignments() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (repos, engine) = build_engine(conn);
    seed_ten_day_scenario(&repos);

    // 锁定排班: 占用 9/1
    let locked_id =
        insert_assignment(&repos, PERIOD, "ST1", "P1", "CK1", "S1", d(2026, 9, 1), true);

    let api = ScheduleApi::new(engine);
    let report = api.regenerate(&raw_full(true)).expect("重排失败");

    // 锁定排班留存, 其余 9 天补齐
    assert_eq!(report.kept_count, 1);
    assert_eq!(report.created_count, 9);
    let assignments = repos
        .assignment_repo
        .find_by_period(PERIOD)
        .expect("查询排班失败");
    assert_eq!(assignments.len(), 10);
    assert!(assignments.iter().any(|a| a.assignment_id == locked_id));
}

#[test]
fn test_smart_minimal_change_preserves_past_and_reassigns_broken_future() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (repos, engine) = build_engine(conn);

    insert_health_system(&repos, "HS1");
    insert_site(&repos, "S1", "HS1", None);
    insert_student(&repos, "ST1");
    insert_preceptor(&repos, "P1", "内科", "HS1", &["S1"], 1);
    insert_preceptor(&repos, "P2", "内科", "HS1", &["S1"], 1);
    insert_clerkship(&repos, "CK1", "内科", 2);
    mark_available(&repos, "P1", "S1", d(2026, 9, 1), d(2026, 9, 10));
    mark_available(&repos, "P2", "S1", d(2026, 9, 1), d(2026, 9, 10));

    // 既有排班: 过去 (9/2, P1) + 未来 (9/8, P1)
    let past_id =
        insert_assignment(&repos, PERIOD, "ST1", "P1", "CK1", "S1", d(2026, 9, 2), false);
    let future_id =
        insert_assignment(&repos, PERIOD, "ST1", "P1", "CK1", "S1", d(2026, 9, 8), false);

    // 实体状态变化: P1 在 9/8 不再可用
    mark_unavailable(&repos, "P1", "S1", d(2026, 9, 8));

    let api = ScheduleApi::new(engine);
    let report = api
        .regenerate(&raw_smart(d(2026, 9, 5), "minimal-change"))
        .expect("重排失败");

    let assignments = repos
        .assignment_repo
        .find_by_period(PERIOD)
        .expect("查询排班失败");

    // 过去排班原样留存
    let past = assignments
        .iter()
        .find(|a| a.assignment_id == past_id)
        .expect("过去排班必须留存");
    assert_eq!(past.date, d(2026, 9, 2));
    assert_eq!(past.preceptor_id, "P1");

    // 失效的未来排班被替换, 且替换排班不回填 cutoff 之前
    assert!(assignments.iter().all(|a| a.assignment_id != future_id));
    assert_eq!(report.removed_count, 1);
    assert_eq!(report.created_count, 1);
    assert_eq!(assignments.len(), 2);
    assert!(report.unassigned.is_empty());
    let replacement = assignments
        .iter()
        .find(|a| a.assignment_id != past_id)
        .expect("应有替换排班");
    assert!(replacement.date >= d(2026, 9, 5));
}

#[test]
fn test_smart_minimal_change_keeps_valid_future() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (repos, engine) = build_engine(conn);

    insert_health_system(&repos, "HS1");
    insert_site(&repos, "S1", "HS1", None);
    insert_student(&repos, "ST1");
    insert_preceptor(&repos, "P1", "内科", "HS1", &["S1"], 1);
    insert_clerkship(&repos, "CK1", "内科", 1);
    mark_available(&repos, "P1", "S1", d(2026, 9, 1), d(2026, 9, 10));

    let future_id =
        insert_assignment(&repos, PERIOD, "ST1", "P1", "CK1", "S1", d(2026, 9, 8), false);

    let api = ScheduleApi::new(engine);
    let report = api
        .regenerate(&raw_smart(d(2026, 9, 5), "minimal-change"))
        .expect("重排失败");

    // 仍然有效的未来排班原样保留
    assert_eq!(report.kept_count, 1);
    assert_eq!(report.created_count, 0);
    assert_eq!(report.removed_count, 0);
    let assignments = repos
        .assignment_repo
        .find_by_period(PERIOD)
        .expect("查询排班失败");
    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0].assignment_id, future_id);
}

#[test]
fn test_smart_full_reoptimize_discards_unfrozen_future() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (repos, engine) = build_engine(conn);

    insert_health_system(&repos, "HS1");
    insert_site(&repos, "S1", "HS1", None);
    insert_student(&repos, "ST1");
    insert_preceptor(&repos, "P1", "内科", "HS1", &["S1"], 1);
    insert_clerkship(&repos, "CK1", "内科", 1);
    mark_available(&repos, "P1", "S1", d(2026, 9, 1), d(2026, 9, 10));

    let future_id =
        insert_assignment(&repos, PERIOD, "ST1", "P1", "CK1", "S1", d(2026, 9, 8), false);

    let api = ScheduleApi::new(engine);
    let report = api
        .regenerate(&raw_smart(d(2026, 9, 5), "full-reoptimize"))
        .expect("重排失败");

    // 未冻结的未来排班全部重排 (即使原排班仍有效)
    assert_eq!(report.removed_count, 1);
    assert_eq!(report.created_count, 1);
    let assignments = repos
        .assignment_repo
        .find_by_period(PERIOD)
        .expect("查询排班失败");
    assert_eq!(assignments.len(), 1);
    assert_ne!(assignments[0].assignment_id, future_id);
}

#[test]
fn test_completion_mode_only_adds() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (repos, engine) = build_engine(conn);

    insert_health_system(&repos, "HS1");
    insert_site(&repos, "S1", "HS1", None);
    insert_student(&repos, "ST1");
    insert_preceptor(&repos, "P1", "内科", "HS1", &["S1"], 1);
    insert_clerkship(&repos, "CK1", "内科", 2);
    mark_available(&repos, "P1", "S1", d(2026, 9, 1), d(2026, 9, 10));

    let existing_id =
        insert_assignment(&repos, PERIOD, "ST1", "P1", "CK1", "S1", d(2026, 9, 1), false);

    let api = ScheduleApi::new(engine);
    let report = api.regenerate(&raw_completion(&[])).expect("重排失败");

    // 冻结集超集不变量: 既有排班一条不少, 只有新增
    assert_eq!(report.removed_count, 0);
    assert_eq!(report.kept_count, 1);
    assert_eq!(report.created_count, 1);
    let assignments = repos
        .assignment_repo
        .find_by_period(PERIOD)
        .expect("查询排班失败");
    assert_eq!(assignments.len(), 2);
    assert!(assignments.iter().any(|a| a.assignment_id == existing_id));
}

#[test]
fn test_completion_relaxed_capacity_fills_gap_and_records_violations() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (repos, engine) = build_engine(conn);

    insert_health_system(&repos, "HS1");
    insert_site(&repos, "S1", "HS1", None);
    insert_student(&repos, "ST1");
    insert_student(&repos, "ST2");
    insert_preceptor(&repos, "P1", "内科", "HS1", &["S1"], 1);
    insert_capacity_rule(&repos, "P1", 1, None);
    insert_clerkship(&repos, "CK1", "内科", 1);
    mark_available(&repos, "P1", "S1", d(2026, 9, 1), d(2026, 9, 1));

    // ST1 已占满 P1 的唯一容量
    insert_assignment(&repos, PERIOD, "ST1", "P1", "CK1", "S1", d(2026, 9, 1), false);

    let api = ScheduleApi::new(engine);

    // 不放宽: ST2 无处可排
    let strict_report = api.regenerate(&raw_completion(&[])).expect("重排失败");
    assert_eq!(strict_report.created_count, 0);
    assert_eq!(strict_report.unassigned.len(), 1);

    // 放宽 preceptor-capacity: 缺口被填, 违反被记录
    let relaxed_report = api
        .regenerate(&raw_completion(&["preceptor-capacity"]))
        .expect("重排失败");
    assert_eq!(relaxed_report.created_count, 1);
    assert!(relaxed_report.unassigned.is_empty());
    assert!(!relaxed_report.accepted_violations.is_empty());
    assert_eq!(
        relaxed_report.relaxed_constraints,
        vec!["preceptor-capacity".to_string()]
    );

    // GetViolations 与报告一致
    let violations = api
        .get_violations(&relaxed_report.run_id)
        .expect("查询违反失败");
    assert_eq!(violations.len(), relaxed_report.accepted_violations.len());
    assert_eq!(violations[0].constraint_name, "preceptor-capacity");

    // 超配发生在被放宽的运行中: 同医师同日两条
    let assignments = repos
        .assignment_repo
        .find_by_period(PERIOD)
        .expect("查询排班失败");
    assert_eq!(assignments.len(), 2);
}

#[test]
fn test_get_unassigned_reports_remaining_gaps() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (repos, engine) = build_engine(conn);

    insert_health_system(&repos, "HS1");
    insert_site(&repos, "S1", "HS1", None);
    insert_student(&repos, "ST1");
    insert_preceptor(&repos, "P1", "内科", "HS1", &["S1"], 1);
    insert_clerkship(&repos, "CK1", "内科", 5);
    // 只有 2 个可用日
    mark_available(&repos, "P1", "S1", d(2026, 9, 1), d(2026, 9, 2));

    let api = ScheduleApi::new(engine);
    let report = api.regenerate(&raw_full(true)).expect("重排失败");
    assert_eq!(report.created_count, 2);
    assert_eq!(report.unassigned.len(), 1);
    assert_eq!(report.unassigned[0].missing_days, 3);

    let gaps = api
        .get_unassigned(PERIOD, d(2026, 9, 1), d(2026, 9, 30))
        .expect("查询缺口失败");
    assert_eq!(gaps.len(), 1);
    assert_eq!(gaps[0].student_id, "ST1");
    assert_eq!(gaps[0].missing_days, 3);
}

#[test]
fn test_get_violations_unknown_run_is_not_found() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (_repos, engine) = build_engine(conn);

    let api = ScheduleApi::new(engine);
    assert!(matches!(
        api.get_violations("no-such-run"),
        Err(ApiError::NotFound(_))
    ));
}
