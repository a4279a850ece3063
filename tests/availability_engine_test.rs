// ==========================================
// Availability Resolver 引擎测试
// ==========================================
// 测试范围:
// 1. 世界策略 (closed/open) 对缺失记录的语义
// 2. 停诊日 (全局/限定) 与放宽
// 3. 日容量缺省链与剩余容量
// 4. 年容量上限
// ==========================================


use clerkship_aps::config::EngineSettings;
use clerkship_aps::domain::types::{ConstraintName, WorldPolicy};
use clerkship_aps::engine::{
    AvailabilityResolver, CapacityLedger, ConstraintSet, EngineRepositories, ScheduleSnapshot,
};
use std::collections::HashSet;
use test_helpers::*;

fn seed_base(repos: &EngineRepositories) {
    insert_health_system(repos, "HS1");
    insert_site(repos, "S1", "HS1", None);
    insert_student(repos, "ST1");
    insert_preceptor(repos, "P1", "内科", "HS1", &["S1"], 2);
    insert_clerkship(repos, "CK1", "内科", 5);
}

fn load_snapshot(repos: &EngineRepositories) -> ScheduleSnapshot {
    ScheduleSnapshot::load(repos, "2026-FALL", d(2026, 9, 1), d(2026, 9, 30))
        .expect("加载快照失败")
}

#[test]
fn test_closed_world_requires_explicit_record() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (repos, _engine) = build_engine(conn);
    seed_base(&repos);
    mark_available(&repos, "P1", "S1", d(2026, 9, 1), d(2026, 9, 1));

    let snapshot = load_snapshot(&repos);
    let settings = EngineSettings::default(); // closed world
    let resolver = AvailabilityResolver::new(&snapshot, &settings);
    let ledger = CapacityLedger::new();
    let strict = ConstraintSet::strict();

    // 有记录的日期开放
    assert!(resolver.is_slot_open(&ledger, &strict, "P1", "S1", d(2026, 9, 1)).open);
    // 无记录的日期在封闭世界下关闭
    assert!(!resolver.is_slot_open(&ledger, &strict, "P1", "S1", d(2026, 9, 2)).open);
}

#[test]
fn test_open_world_flips_missing_record_semantics() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (repos, _engine) = build_engine(conn);
    seed_base(&repos);
    mark_unavailable(&repos, "P1", "S1", d(2026, 9, 3));

    let snapshot = load_snapshot(&repos);
    let mut settings = EngineSettings::default();
    settings.world_policy = WorldPolicy::Open;
    let resolver = AvailabilityResolver::new(&snapshot, &settings);
    let ledger = CapacityLedger::new();
    let strict = ConstraintSet::strict();

    // 无记录的日期在开放世界下开放
    assert!(resolver.is_slot_open(&ledger, &strict, "P1", "S1", d(2026, 9, 2)).open);
    // 显式 available=false 仍然关闭
    assert!(!resolver.is_slot_open(&ledger, &strict, "P1", "S1", d(2026, 9, 3)).open);
}

#[test]
fn test_blackout_closes_slot_unless_relaxed() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (repos, _engine) = build_engine(conn);
    seed_base(&repos);
    insert_preceptor(&repos, "P2", "内科", "HS1", &["S1"], 2);
    mark_available(&repos, "P1", "S1", d(2026, 9, 5), d(2026, 9, 6));
    mark_available(&repos, "P2", "S1", d(2026, 9, 5), d(2026, 9, 5));
    // P1 限定停诊
    insert_blackout(&repos, d(2026, 9, 5), Some("P1"), None).expect("创建停诊日失败");

    let snapshot = load_snapshot(&repos);
    let settings = EngineSettings::default();
    let resolver = AvailabilityResolver::new(&snapshot, &settings);
    let ledger = CapacityLedger::new();
    let strict = ConstraintSet::strict();

    // 限定停诊只影响 P1
    let check = resolver.is_slot_open(&ledger, &strict, "P1", "S1", d(2026, 9, 5));
    assert!(!check.open);
    assert!(check.reasons.iter().any(|r| r.contains("停诊")));
    assert!(resolver.is_slot_open(&ledger, &strict, "P2", "S1", d(2026, 9, 5)).open);
    assert!(resolver.is_slot_open(&ledger, &strict, "P1", "S1", d(2026, 9, 6)).open);

    // 放宽 blackout-date 后重新开放
    let mut relaxed_set = HashSet::new();
    relaxed_set.insert(ConstraintName::BlackoutDate);
    let relaxed = ConstraintSet::with_relaxed(relaxed_set);
    assert!(resolver.is_slot_open(&ledger, &relaxed, "P1", "S1", d(2026, 9, 5)).open);
}

#[test]
fn test_daily_cap_chain_and_remaining_capacity() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (repos, _engine) = build_engine(conn);
    seed_base(&repos); // P1.max_students = 2
    mark_available(&repos, "P1", "S1", d(2026, 9, 1), d(2026, 9, 1));

    let snapshot = load_snapshot(&repos);
    let settings = EngineSettings::default();
    let resolver = AvailabilityResolver::new(&snapshot, &settings);
    let mut ledger = CapacityLedger::new();
    let strict = ConstraintSet::strict();

    // 无容量规则时取医师 max_students
    assert_eq!(resolver.daily_cap("P1"), 2);
    assert_eq!(resolver.remaining_capacity(&ledger, "P1", d(2026, 9, 1)), 2);

    ledger.record("ST1", "CK1", "P1", "S1", Some("HS1"), d(2026, 9, 1));
    assert_eq!(resolver.remaining_capacity(&ledger, "P1", d(2026, 9, 1)), 1);

    ledger.record("ST2", "CK1", "P1", "S1", Some("HS1"), d(2026, 9, 1));
    assert_eq!(resolver.remaining_capacity(&ledger, "P1", d(2026, 9, 1)), 0);
    assert!(!resolver.is_slot_open(&ledger, &strict, "P1", "S1", d(2026, 9, 1)).open);
}

#[test]
fn test_capacity_rule_overrides_preceptor_default() {
    let (_tmp, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared_connection(&db_path);
    let (repos, _engine) = build_engine(conn);
    seed_base(&repos);
    insert_capacity_rule(&repos, "P1", 1, Some(2));
    mark_available(&repos, "P1", "S1", d(2026, 9, 1), d(2026, 9, 30));

    let snapshot = load_snapshot(&repos);
    let settings = EngineSettings::default();
    let resolver = AvailabilityResolver::new(&snapshot, &settings);
    let mut ledger = CapacityLedger::new();
    let strict = ConstraintSet::strict();

    // 规则覆盖医师默认值 (2 -> 1)
    assert_eq!(resolver.daily_cap("P1"), 1);

    // 年容量 2: 入账两天后第三天关闭
    ledger.record("ST1", "CK1", "P1", "S1", Some("HS1"), d(2026, 9, 1));
    ledger.record("ST1", "CK1", "P1", "S1", Some("HS1"), d(2026, 9, 2));
    let check = resolver.is_slot_open(&ledger, &strict, "P1", "S1", d(2026, 9, 3));
    assert!(!check.open);
    assert!(check.reasons.iter().any(|r| r.contains("年容量")));
}
