// ==========================================
// Repository 层集成测试
// ==========================================
// 测试范围:
// 1. 实体CRUD与写入校验
// 2. 容量规则 upsert 语义
// 3. 团队不变量
// 4. 停诊日与锁定排班冲突
// 5. no-double-booking 的 schema 兜底
// 6. 重排增量的事务原子性
// ==========================================


use chrono::Utc;
use clerkship_aps::domain::types::{AssignmentStatus, AssignmentType};
use clerkship_aps::domain::{Clerkship, ClerkshipType, ScheduleAssignment};
use clerkship_aps::repository::assignment_repo::AssignmentDelta;
use clerkship_aps::repository::RepositoryError;
use test_helpers::*;

/// 基础地基: 一个医疗系统 + 一个站点 + 一个学生 + 一个医师 + 一个轮转
fn seed_base(repos: &clerkship_aps::engine::EngineRepositories) {
    insert_health_system(repos, "HS1");
    insert_site(repos, "S1", "HS1", None);
    insert_student(repos, "ST1");
    insert_preceptor(repos, "P1", "内科", "HS1", &["S1"], 2);
    insert_clerkship(repos, "CK1", "内科", 5);
}

#[test]
fn test_student_crud_and_fk_protection() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (repos, _engine) = build_engine(conn);
    seed_base(&repos);

    let found = repos
        .student_repo
        .find_by_id("ST1")
        .expect("查询学生失败")
        .expect("学生应存在");
    assert_eq!(found.student_id, "ST1");

    // 有排班依赖时删除被外键拒绝
    insert_assignment(&repos, "2026-FALL", "ST1", "P1", "CK1", "S1", d(2026, 9, 1), false);
    let err = repos.student_repo.delete("ST1");
    assert!(matches!(err, Err(RepositoryError::ForeignKeyViolation(_))));

    // 无依赖的学生可以删除
    insert_student(&repos, "ST2");
    let deleted = repos.student_repo.delete("ST2").expect("删除学生失败");
    assert_eq!(deleted, 1);
}

#[test]
fn test_clerkship_rejects_non_positive_required_days() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (repos, _engine) = build_engine(conn);

    let bad = Clerkship {
        clerkship_id: "CK_BAD".to_string(),
        name: "非法轮转".to_string(),
        specialty: "内科".to_string(),
        required_days: 0,
        clerkship_type: ClerkshipType::Inpatient,
        created_at: Utc::now().naive_utc(),
    };
    assert!(matches!(
        repos.clerkship_repo.create(&bad),
        Err(RepositoryError::ValidationError(_))
    ));
}

#[test]
fn test_capacity_rule_upsert_keeps_single_row() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (repos, _engine) = build_engine(conn);
    seed_base(&repos);

    insert_capacity_rule(&repos, "P1", 3, Some(100));
    insert_capacity_rule(&repos, "P1", 1, None);

    let rules = repos
        .capacity_rule_repo
        .find_all_active()
        .expect("查询规则失败");
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].max_students_per_day, 1);
    assert_eq!(rules[0].max_students_per_year, None);
}

#[test]
fn test_team_invariants_enforced_on_write() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (repos, _engine) = build_engine(conn);
    seed_base(&repos);
    insert_preceptor(&repos, "P2", "内科", "HS1", &["S1"], 2);

    // 单成员团队被拒绝
    let single = repos.team_repo.create(
        &clerkship_aps::domain::PreceptorTeam {
            team_id: "T_BAD".to_string(),
            clerkship_id: "CK1".to_string(),
            name: "单人团队".to_string(),
            require_same_health_system: false,
            require_same_site: false,
            require_same_specialty: false,
            requires_admin_approval: false,
            admin_approved: false,
            created_at: Utc::now().naive_utc(),
        },
        &[clerkship_aps::domain::PreceptorTeamMember {
            team_id: "T_BAD".to_string(),
            preceptor_id: "P1".to_string(),
            priority: 1,
            role: "ATTENDING".to_string(),
            is_fallback: false,
        }],
    );
    assert!(matches!(single, Err(RepositoryError::ValidationError(_))));

    // 合法团队写入成功
    insert_team(&repos, "T1", "CK1", &[("P1", 1, false), ("P2", 2, false)]);
    let teams = repos
        .team_repo
        .find_by_clerkship("CK1")
        .expect("查询团队失败");
    assert_eq!(teams.len(), 1);
    assert_eq!(teams[0].1.len(), 2);
}

#[test]
fn test_blackout_conflicts_with_locked_assignment() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (repos, _engine) = build_engine(conn);
    seed_base(&repos);

    let date = d(2026, 9, 15);
    let locked_id =
        insert_assignment(&repos, "2026-FALL", "ST1", "P1", "CK1", "S1", date, true);

    // 覆盖锁定排班的停诊日被拒绝
    let err = insert_blackout(&repos, date, None, None);
    assert!(matches!(err, Err(RepositoryError::BusinessRuleViolation(_))));

    // 锁定排班原样存在,未被静默删除
    let assignments = repos
        .assignment_repo
        .find_by_period("2026-FALL")
        .expect("查询排班失败");
    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0].assignment_id, locked_id);

    // 不同医师限定的停诊日不冲突
    insert_preceptor(&repos, "P2", "内科", "HS1", &["S1"], 2);
    insert_blackout(&repos, date, Some("P2"), None).expect("限定停诊日应创建成功");
}

#[test]
fn test_schema_rejects_double_booking() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (repos, _engine) = build_engine(conn);
    seed_base(&repos);
    insert_preceptor(&repos, "P2", "内科", "HS1", &["S1"], 2);

    let date = d(2026, 9, 10);
    insert_assignment(&repos, "2026-FALL", "ST1", "P1", "CK1", "S1", date, false);

    // 同学生同日第二条排班被 UNIQUE 约束拒绝 (即使医师不同)
    let dup = repos.assignment_repo.batch_insert(&[ScheduleAssignment {
        assignment_id: "A_DUP".to_string(),
        period_id: "2026-FALL".to_string(),
        student_id: "ST1".to_string(),
        preceptor_id: "P2".to_string(),
        clerkship_id: "CK1".to_string(),
        elective_id: None,
        site_id: "S1".to_string(),
        date,
        assignment_type: AssignmentType::Required,
        status: AssignmentStatus::Scheduled,
        locked: false,
        notes: None,
        created_by_run: None,
        created_at: Utc::now().naive_utc(),
        updated_at: Utc::now().naive_utc(),
    }]);
    assert!(dup.is_err());
}

#[test]
fn test_apply_delta_rolls_back_on_failure() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (repos, _engine) = build_engine(conn);
    seed_base(&repos);
    insert_student(&repos, "ST2");

    let date = d(2026, 9, 10);
    let existing_id =
        insert_assignment(&repos, "2026-FALL", "ST1", "P1", "CK1", "S1", date, false);
    insert_assignment(&repos, "2026-FALL", "ST2", "P1", "CK1", "S1", date, false);

    // 增量: 删除 ST1 的排班 + 插入一条违反唯一约束的排班 (ST2 同日)
    let now = Utc::now().naive_utc();
    let delta = AssignmentDelta {
        removals: vec![existing_id.clone()],
        inserts: vec![ScheduleAssignment {
            assignment_id: "A_NEW".to_string(),
            period_id: "2026-FALL".to_string(),
            student_id: "ST2".to_string(),
            preceptor_id: "P1".to_string(),
            clerkship_id: "CK1".to_string(),
            elective_id: None,
            site_id: "S1".to_string(),
            date,
            assignment_type: AssignmentType::Required,
            status: AssignmentStatus::Scheduled,
            locked: false,
            notes: None,
            created_by_run: None,
            created_at: now,
            updated_at: now,
        }],
    };
    assert!(repos.assignment_repo.apply_delta(&delta).is_err());

    // 整体回滚: 删除也未生效
    let assignments = repos
        .assignment_repo
        .find_by_period("2026-FALL")
        .expect("查询排班失败");
    assert_eq!(assignments.len(), 2);
    assert!(assignments.iter().any(|a| a.assignment_id == existing_id));
}
