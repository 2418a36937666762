use keepsweep::retention::{
    MembershipFallback, Phase, Retention, RunMode, SchemaDescriptor,
};

use super::store_harness;

#[test]
fn run_removes_everything_unreachable_from_the_keep_set() {
    let (_tmp, path) = store_harness::scenario_db();
    let mut store = store_harness::open(&path);
    let keep = store_harness::keep(&["A", "B"]);
    let descriptor = SchemaDescriptor::synapse();
    let retention = Retention::new(&keep, &descriptor, MembershipFallback::Abort)
        .expect("built-in descriptor should validate");

    let report = retention.run(&mut store).expect("run should commit");

    assert_eq!(report.mode, RunMode::Live);
    assert_eq!(report.rows_for("devices"), 2);
    assert_eq!(report.rows_for("access_tokens"), 1);
    assert_eq!(report.rows_for("events"), 1);
    assert_eq!(report.rows_for("state_events"), 1);
    assert_eq!(report.rows_for("current_state_events"), 1);
    assert_eq!(report.rows_for("room_memberships"), 3);
    assert_eq!(report.rows_for("rooms"), 1);
    assert_eq!(report.rows_for("users"), 2);
    assert_eq!(report.retained.get("room"), Some(&1));

    drop(store);
    assert_eq!(
        store_harness::column(&path, "SELECT name FROM users ORDER BY name"),
        vec!["A", "B"]
    );
    assert_eq!(
        store_harness::column(&path, "SELECT user_id FROM devices"),
        vec!["A"]
    );
    assert_eq!(
        store_harness::column(&path, "SELECT room_id FROM rooms"),
        vec!["E1"]
    );
    assert_eq!(
        store_harness::column(&path, "SELECT event_id FROM events"),
        vec!["C1"]
    );
    assert_eq!(
        store_harness::column(
            &path,
            "SELECT room_id || ':' || user_id FROM room_memberships"
        ),
        vec!["E1:A"]
    );
}

#[test]
fn report_lists_steps_in_cascade_order() {
    let (_tmp, path) = store_harness::scenario_db();
    let mut store = store_harness::open(&path);
    let keep = store_harness::keep(&["A", "B"]);
    let descriptor = SchemaDescriptor::synapse();
    let retention = Retention::new(&keep, &descriptor, MembershipFallback::Abort)
        .expect("built-in descriptor should validate");

    let report = retention.dry_run(&mut store).expect("dry run should succeed");

    let phases: Vec<Phase> = report.steps.iter().map(|step| step.phase).collect();
    assert_eq!(
        phases,
        vec![
            Phase::OwnedRows,
            Phase::OwnedRows,
            Phase::EntityContent,
            Phase::EntityContent,
            Phase::EntityContent,
            Phase::Membership,
            Phase::Entities,
            Phase::Principals,
        ]
    );
    let indexes: Vec<usize> = report.steps.iter().map(|step| step.step).collect();
    assert_eq!(indexes, (1..=8).collect::<Vec<_>>());
    assert_eq!(report.steps.last().map(|step| step.table.as_str()), Some("users"));
}

#[test]
fn census_counts_and_samples_doomed_principals() {
    let (_tmp, path) = store_harness::scenario_db();
    let mut store = store_harness::open(&path);
    let keep = store_harness::keep(&["A", "B", "Z"]);
    let descriptor = SchemaDescriptor::synapse();
    let retention = Retention::new(&keep, &descriptor, MembershipFallback::Abort)
        .expect("built-in descriptor should validate");

    let report = retention.dry_run(&mut store).expect("dry run should succeed");

    assert_eq!(report.census.total, 4);
    assert_eq!(report.census.kept_present, 2);
    assert_eq!(report.census.to_delete, 2);
    assert_eq!(report.census.sample, vec!["C", "D"]);
}

#[test]
fn dry_run_predicts_the_live_run_and_changes_nothing() {
    let (_tmp, path) = store_harness::scenario_db();
    let before = store_harness::snapshot(&path);
    let keep = store_harness::keep(&["A", "B"]);
    let descriptor = SchemaDescriptor::synapse();
    let retention = Retention::new(&keep, &descriptor, MembershipFallback::Abort)
        .expect("built-in descriptor should validate");

    let mut store = store_harness::open(&path);
    let planned = retention.dry_run(&mut store).expect("dry run should succeed");
    assert_eq!(planned.mode, RunMode::DryRun);
    assert!(planned.verification.is_none());
    assert_eq!(store_harness::snapshot(&path), before);

    let live = retention.run(&mut store).expect("run should commit");
    let planned_rows: Vec<(String, u64)> = planned
        .steps
        .iter()
        .map(|step| (step.table.clone(), step.rows))
        .collect();
    let live_rows: Vec<(String, u64)> = live
        .steps
        .iter()
        .map(|step| (step.table.clone(), step.rows))
        .collect();
    assert_eq!(planned_rows, live_rows);
}

#[test]
fn keeping_every_principal_deletes_nothing() {
    let (_tmp, path) = store_harness::scenario_db();
    let before = store_harness::snapshot(&path);
    let mut store = store_harness::open(&path);
    let keep = store_harness::keep(&["A", "B", "C", "D"]);
    let descriptor = SchemaDescriptor::synapse();
    let retention = Retention::new(&keep, &descriptor, MembershipFallback::Abort)
        .expect("built-in descriptor should validate");

    let report = retention.run(&mut store).expect("run should commit");

    assert_eq!(report.total_rows(), 0);
    assert!(report.warnings().is_empty(), "{:?}", report.warnings());
    drop(store);
    assert_eq!(store_harness::snapshot(&path), before);
}

#[test]
fn null_owner_rows_are_left_alone() {
    let (_tmp, path) = store_harness::scenario_db();
    store_harness::exec(
        &path,
        "CREATE TABLE user_ips (user_id TEXT, ip TEXT);
         INSERT INTO user_ips VALUES (NULL, '10.0.0.1'), ('C', '10.0.0.2');",
    );
    let mut store = store_harness::open(&path);
    let keep = store_harness::keep(&["A"]);
    let descriptor = SchemaDescriptor::synapse();
    let retention = Retention::new(&keep, &descriptor, MembershipFallback::Abort)
        .expect("built-in descriptor should validate");

    let report = retention.run(&mut store).expect("run should commit");

    assert_eq!(report.rows_for("user_ips"), 1);
    drop(store);
    assert_eq!(
        store_harness::column(&path, "SELECT ip FROM user_ips"),
        vec!["10.0.0.1"]
    );
}

#[test]
fn backup_captures_the_store_before_the_run() {
    let (tmp, path) = store_harness::scenario_db();
    let before = store_harness::snapshot(&path);
    let backup = tmp.path().join("backup.db");
    let mut store = store_harness::open(&path);

    store.backup_to(&backup).expect("backup should be written");
    assert!(store.backup_to(&backup).is_err(), "existing target is refused");

    let keep = store_harness::keep(&["A"]);
    let descriptor = SchemaDescriptor::synapse();
    Retention::new(&keep, &descriptor, MembershipFallback::Abort)
        .expect("built-in descriptor should validate")
        .run(&mut store)
        .expect("run should commit");

    assert_eq!(store_harness::snapshot(&backup), before);
    assert_ne!(store_harness::snapshot(&path), before);
}
