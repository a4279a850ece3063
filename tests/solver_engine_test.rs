// ==========================================
// Assignment Solver 引擎测试
// ==========================================
// 测试范围:
// 1. 标准场景 (10天/单学生, 两学生争单槽位)
// 2. 确定性 (同快照同参数 => 同计划)
// 3. 专科匹配 / no-double-booking 硬约束
// 4. 选修日预算保留
// 5. 连续性评分优先于最早日期
// 6. 团队优先级与候补成员
// ==========================================


use chrono::Utc;
use clerkship_aps::config::EngineSettings;
use clerkship_aps::domain::types::{AssignmentStatus, AssignmentType};
use clerkship_aps::domain::ScheduleAssignment;
use clerkship_aps::engine::{
    build_demands, AssignmentSolver, CapacityLedger, ConstraintSet, EngineRepositories,
    ScheduleSnapshot,
};
use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use test_helpers::*;

fn load_snapshot(repos: &EngineRepositories) -> ScheduleSnapshot {
    ScheduleSnapshot::load(repos, "2026-FALL", d(2026, 9, 1), d(2026, 9, 30))
        .expect("加载快照失败")
}

fn solve_fresh(snapshot: &ScheduleSnapshot) -> clerkship_aps::engine::SolveOutcome {
    let settings = EngineSettings::default();
    let strict = ConstraintSet::strict();
    let demands = build_demands(snapshot, &[]);
    let dates = snapshot.dates_in_range();
    let solver = AssignmentSolver::new(snapshot, &settings, &strict);
    let mut ledger = CapacityLedger::new();
    let cancel = AtomicBool::new(false);
    solver
        .solve(&demands, &dates, &mut ledger, &cancel)
        .expect("求解不应被取消")
}

#[test]
fn test_ten_days_one_student_full_coverage() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (repos, _engine) = build_engine(conn);

    insert_health_system(&repos, "HS1");
    insert_site(&repos, "S1", "HS1", None);
    insert_student(&repos, "ST1");
    insert_preceptor(&repos, "P1", "内科", "HS1", &["S1"], 1);
    insert_capacity_rule(&repos, "P1", 1, None);
    insert_clerkship(&repos, "CK1", "内科", 10);
    mark_available(&repos, "P1", "S1", d(2026, 9, 1), d(2026, 9, 10));

    let snapshot = load_snapshot(&repos);
    let outcome = solve_fresh(&snapshot);

    // 恰好 10 条排班, 每个可用日期一条, 零未排
    assert_eq!(outcome.planned.len(), 10);
    assert!(outcome.unassigned.is_empty());
    let dates: HashSet<_> = outcome.planned.iter().map(|p| p.date).collect();
    assert_eq!(dates.len(), 10);
    assert!(outcome
        .planned
        .iter()
        .all(|p| p.preceptor_id == "P1" && p.site_id == "S1" && p.student_id == "ST1"));
}

#[test]
fn test_two_students_one_slot_never_double_books() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (repos, _engine) = build_engine(conn);

    insert_health_system(&repos, "HS1");
    insert_site(&repos, "S1", "HS1", None);
    insert_student(&repos, "ST1");
    insert_student(&repos, "ST2");
    insert_preceptor(&repos, "P1", "内科", "HS1", &["S1"], 1);
    insert_capacity_rule(&repos, "P1", 1, None);
    insert_clerkship(&repos, "CK1", "内科", 1);
    mark_available(&repos, "P1", "S1", d(2026, 9, 1), d(2026, 9, 1));

    let snapshot = load_snapshot(&repos);
    let outcome = solve_fresh(&snapshot);

    // 一人得槽, 一人显式未排, 绝不超配
    assert_eq!(outcome.planned.len(), 1);
    assert_eq!(outcome.planned[0].date, d(2026, 9, 1));
    assert_eq!(outcome.unassigned.len(), 1);
    assert_eq!(outcome.unassigned[0].missing_days, 1);
    assert_ne!(
        outcome.planned[0].student_id,
        outcome.unassigned[0].student_id
    );
}

#[test]
fn test_deterministic_plan_across_runs() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (repos, _engine) = build_engine(conn);

    insert_health_system(&repos, "HS1");
    insert_site(&repos, "S1", "HS1", None);
    insert_site(&repos, "S2", "HS1", None);
    for i in 1..=4 {
        insert_student(&repos, &format!("ST{}", i));
    }
    insert_preceptor(&repos, "P1", "内科", "HS1", &["S1"], 2);
    insert_preceptor(&repos, "P2", "内科", "HS1", &["S1", "S2"], 2);
    insert_clerkship(&repos, "CK1", "内科", 4);
    mark_available(&repos, "P1", "S1", d(2026, 9, 1), d(2026, 9, 20));
    mark_available(&repos, "P2", "S1", d(2026, 9, 1), d(2026, 9, 20));
    mark_available(&repos, "P2", "S2", d(2026, 9, 1), d(2026, 9, 20));

    let snapshot = load_snapshot(&repos);
    let first = solve_fresh(&snapshot);
    let second = solve_fresh(&snapshot);

    assert_eq!(first.planned, second.planned);
    assert_eq!(first.unassigned.len(), second.unassigned.len());
}

#[test]
fn test_specialty_mismatch_blocks_placement() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (repos, _engine) = build_engine(conn);

    insert_health_system(&repos, "HS1");
    insert_site(&repos, "S1", "HS1", None);
    insert_student(&repos, "ST1");
    insert_preceptor(&repos, "P1", "内科", "HS1", &["S1"], 2);
    insert_clerkship(&repos, "CK1", "外科", 2);
    mark_available(&repos, "P1", "S1", d(2026, 9, 1), d(2026, 9, 10));

    let snapshot = load_snapshot(&repos);
    let outcome = solve_fresh(&snapshot);

    assert!(outcome.planned.is_empty());
    assert_eq!(outcome.unassigned.len(), 1);
    assert_eq!(outcome.unassigned[0].missing_days, 2);
}

#[test]
fn test_single_available_day_two_clerkships_one_placed() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (repos, _engine) = build_engine(conn);

    insert_health_system(&repos, "HS1");
    insert_site(&repos, "S1", "HS1", None);
    insert_student(&repos, "ST1");
    insert_preceptor(&repos, "P1", "内科", "HS1", &["S1"], 2);
    insert_clerkship(&repos, "CK1", "内科", 1);
    insert_clerkship(&repos, "CK2", "内科", 1);
    mark_available(&repos, "P1", "S1", d(2026, 9, 1), d(2026, 9, 1));

    let snapshot = load_snapshot(&repos);
    let outcome = solve_fresh(&snapshot);

    // 同学生同日只能有一条排班: 第二个轮转显式未排
    assert_eq!(outcome.planned.len(), 1);
    assert_eq!(outcome.unassigned.len(), 1);
}

#[test]
fn test_required_elective_reserves_budget() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (repos, _engine) = build_engine(conn);

    insert_health_system(&repos, "HS1");
    insert_site(&repos, "S1", "HS1", None);
    insert_student(&repos, "ST1");
    insert_preceptor(&repos, "P1", "内科", "HS1", &["S1"], 1);
    insert_clerkship(&repos, "CK1", "内科", 5);
    insert_elective(&repos, "E1", "CK1", 2, true);
    insert_elective(&repos, "E2", "CK1", 3, false); // 非必选不自动排
    mark_available(&repos, "P1", "S1", d(2026, 9, 1), d(2026, 9, 10));

    let snapshot = load_snapshot(&repos);
    let outcome = solve_fresh(&snapshot);

    // 总量不超预算 5: 必修 3 + 必选选修 2
    assert_eq!(outcome.planned.len(), 5);
    let elective_days = outcome
        .planned
        .iter()
        .filter(|p| p.elective_id.as_deref() == Some("E1"))
        .count();
    assert_eq!(elective_days, 2);
    let required_days = outcome
        .planned
        .iter()
        .filter(|p| p.elective_id.is_none())
        .count();
    assert_eq!(required_days, 3);
    assert!(outcome.unassigned.is_empty());
}

#[test]
fn test_continuity_outweighs_earliest_date() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (repos, _engine) = build_engine(conn);

    insert_health_system(&repos, "HS1");
    insert_site(&repos, "S1", "HS1", None);
    insert_site(&repos, "S2", "HS1", None);
    insert_student(&repos, "ST1");
    insert_preceptor(&repos, "P1", "内科", "HS1", &["S1"], 1);
    insert_preceptor(&repos, "P2", "内科", "HS1", &["S2"], 1);
    insert_clerkship(&repos, "CK1", "内科", 2);
    // P2 更早可用, P1 较晚
    mark_available(&repos, "P2", "S2", d(2026, 9, 2), d(2026, 9, 2));
    mark_available(&repos, "P1", "S1", d(2026, 9, 3), d(2026, 9, 3));

    // 既有排班: ST1 已在 S1/HS1 跟 P1 轮转过一天
    let held = ScheduleAssignment {
        assignment_id: "A_HELD".to_string(),
        period_id: "2026-FALL".to_string(),
        student_id: "ST1".to_string(),
        preceptor_id: "P1".to_string(),
        clerkship_id: "CK1".to_string(),
        elective_id: None,
        site_id: "S1".to_string(),
        date: d(2026, 9, 1),
        assignment_type: AssignmentType::Required,
        status: AssignmentStatus::Scheduled,
        locked: false,
        notes: None,
        created_by_run: None,
        created_at: Utc::now().naive_utc(),
        updated_at: Utc::now().naive_utc(),
    };

    let snapshot = load_snapshot(&repos);
    let settings = EngineSettings::default();
    let strict = ConstraintSet::strict();
    let counted = vec![&held];
    let demands = build_demands(&snapshot, &counted);
    assert_eq!(demands.len(), 1);
    assert_eq!(demands[0].required_days, 1);

    let mut ledger = CapacityLedger::new();
    ledger.record("ST1", "CK1", "P1", "S1", Some("HS1"), d(2026, 9, 1));

    let dates = snapshot.dates_in_range();
    let solver = AssignmentSolver::new(&snapshot, &settings, &strict);
    let cancel = AtomicBool::new(false);
    let outcome = solver
        .solve(&demands, &dates, &mut ledger, &cancel)
        .expect("求解不应被取消");

    // 同站点连续 (S1 得分更高) 压过最早日期 (S2 的 9/2)
    assert_eq!(outcome.planned.len(), 1);
    assert_eq!(outcome.planned[0].site_id, "S1");
    assert_eq!(outcome.planned[0].date, d(2026, 9, 3));
}

#[test]
fn test_team_priority_and_fallback() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (repos, _engine) = build_engine(conn);

    insert_health_system(&repos, "HS1");
    insert_site(&repos, "S1", "HS1", None);
    insert_student(&repos, "ST1");
    insert_preceptor(&repos, "P1", "内科", "HS1", &["S1"], 1);
    insert_preceptor(&repos, "P2", "内科", "HS1", &["S1"], 1);
    insert_preceptor(&repos, "P3", "内科", "HS1", &["S1"], 1);
    insert_clerkship(&repos, "CK1", "内科", 1);
    insert_team(
        &repos,
        "T1",
        "CK1",
        &[("P1", 1, false), ("P2", 2, false), ("P3", 1, true)],
    );
    mark_available(&repos, "P1", "S1", d(2026, 9, 1), d(2026, 9, 1));
    mark_available(&repos, "P2", "S1", d(2026, 9, 1), d(2026, 9, 1));
    mark_available(&repos, "P3", "S1", d(2026, 9, 1), d(2026, 9, 1));

    let snapshot = load_snapshot(&repos);
    let outcome = solve_fresh(&snapshot);

    // 主力 priority=1 的 P1 优先
    assert_eq!(outcome.planned.len(), 1);
    assert_eq!(outcome.planned[0].preceptor_id, "P1");
}

#[test]
fn test_cancel_signal_aborts_solve() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (repos, _engine) = build_engine(conn);

    insert_health_system(&repos, "HS1");
    insert_site(&repos, "S1", "HS1", None);
    insert_student(&repos, "ST1");
    insert_preceptor(&repos, "P1", "内科", "HS1", &["S1"], 1);
    insert_clerkship(&repos, "CK1", "内科", 3);
    mark_available(&repos, "P1", "S1", d(2026, 9, 1), d(2026, 9, 10));

    let snapshot = load_snapshot(&repos);
    let settings = EngineSettings::default();
    let strict = ConstraintSet::strict();
    let demands = build_demands(&snapshot, &[]);
    let dates = snapshot.dates_in_range();
    let solver = AssignmentSolver::new(&snapshot, &settings, &strict);
    let mut ledger = CapacityLedger::new();

    // 取消信号在放置迭代之间检查: 置位后求解中止
    let cancel = AtomicBool::new(true);
    assert!(solver.solve(&demands, &dates, &mut ledger, &cancel).is_err());
}

#[test]
fn test_fallback_used_only_when_primaries_exhausted() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (repos, _engine) = build_engine(conn);

    insert_health_system(&repos, "HS1");
    insert_site(&repos, "S1", "HS1", None);
    insert_student(&repos, "ST1");
    insert_preceptor(&repos, "P1", "内科", "HS1", &["S1"], 1);
    insert_preceptor(&repos, "P2", "内科", "HS1", &["S1"], 1);
    insert_preceptor(&repos, "P3", "内科", "HS1", &["S1"], 1);
    insert_clerkship(&repos, "CK1", "内科", 1);
    insert_team(
        &repos,
        "T1",
        "CK1",
        &[("P1", 1, false), ("P2", 2, false), ("P3", 1, true)],
    );
    // 主力全部无可用性, 仅候补 P3 可用
    mark_available(&repos, "P3", "S1", d(2026, 9, 1), d(2026, 9, 1));

    let snapshot = load_snapshot(&repos);
    let outcome = solve_fresh(&snapshot);

    assert_eq!(outcome.planned.len(), 1);
    assert_eq!(outcome.planned[0].preceptor_id, "P3");
}
