use keepsweep::SweepError;
use keepsweep::error::SchemaMismatch;
use keepsweep::retention::{MembershipFallback, Retention, SchemaDescriptor};

use super::store_harness;

const DRIFTED_SQL: &str = "
    CREATE TABLE users (name TEXT PRIMARY KEY, admin INTEGER NOT NULL DEFAULT 0);
    CREATE TABLE devices (owner TEXT NOT NULL, device_id TEXT NOT NULL);
    CREATE TABLE rooms (room_id TEXT PRIMARY KEY);
    CREATE TABLE room_memberships (room_id TEXT NOT NULL, user_id TEXT NOT NULL);
    CREATE TABLE events (event_id TEXT PRIMARY KEY, room_id TEXT NOT NULL);
    INSERT INTO users (name) VALUES ('A'), ('C');
    INSERT INTO devices VALUES ('A', 'a1'), ('C', 'c1');
    INSERT INTO rooms VALUES ('E1'), ('E2');
    INSERT INTO room_memberships VALUES ('E1', 'A'), ('E2', 'C');
    INSERT INTO events VALUES ('C1', 'E1'), ('C2', 'E2');
";

#[test]
fn absent_tables_and_columns_are_skipped_and_reported() {
    let (_tmp, path) = store_harness::create_db(DRIFTED_SQL);
    let mut store = store_harness::open(&path);
    let keep = store_harness::keep(&["A"]);
    let descriptor = SchemaDescriptor::synapse();
    let retention = Retention::new(&keep, &descriptor, MembershipFallback::Abort)
        .expect("built-in descriptor should validate");

    let report = retention.run(&mut store).expect("drifted store should still run");

    assert!(report.skipped.contains(&SchemaMismatch::MissingColumn {
        table: "devices".into(),
        column: "user_id".into(),
    }));
    assert!(report.skipped.contains(&SchemaMismatch::MissingTable {
        table: "access_tokens".into(),
    }));
    assert!(report.skipped.contains(&SchemaMismatch::MissingTable {
        table: "state_events".into(),
    }));
    assert!(report.steps.iter().all(|step| step.table != "devices"));

    assert_eq!(report.rows_for("events"), 1);
    assert_eq!(report.rows_for("rooms"), 1);
    assert_eq!(report.rows_for("users"), 1);
    assert!(report.warnings().is_empty(), "{:?}", report.warnings());

    drop(store);
    assert_eq!(store_harness::count(&path, "devices"), 2);
}

#[test]
fn absent_status_columns_are_dropped_from_the_snapshot() {
    let (_tmp, path) = store_harness::create_db(DRIFTED_SQL);
    let mut store = store_harness::open(&path);
    let keep = store_harness::keep(&["A"]);
    let descriptor = SchemaDescriptor::synapse();
    let retention = Retention::new(&keep, &descriptor, MembershipFallback::Abort)
        .expect("built-in descriptor should validate");

    let report = retention.run(&mut store).expect("drifted store should still run");

    let verification = report.verification.expect("live run is verified");
    let principal = &verification.snapshot.principals[0];
    assert_eq!(principal.id, "A");
    assert_eq!(principal.status, vec![("admin".to_string(), "0".to_string())]);
}

#[test]
fn missing_principal_table_fails_before_any_deletion() {
    let (_tmp, path) = store_harness::create_db(
        "CREATE TABLE devices (user_id TEXT NOT NULL);
         INSERT INTO devices VALUES ('A'), ('C');",
    );
    let mut store = store_harness::open(&path);
    let keep = store_harness::keep(&["A"]);
    let descriptor = SchemaDescriptor::synapse();
    let retention = Retention::new(&keep, &descriptor, MembershipFallback::Abort)
        .expect("built-in descriptor should validate");

    let err = retention.run(&mut store).expect_err("principal table is required");

    assert!(matches!(err, SweepError::PrincipalTableMissing { .. }), "{err}");
    drop(store);
    assert_eq!(store_harness::count(&path, "devices"), 2);
}
