use keepsweep::retention::{MembershipFallback, Retention, SchemaDescriptor};

use super::store_harness;

#[test]
fn second_run_deletes_nothing() {
    let (_tmp, path) = store_harness::scenario_db();
    let mut store = store_harness::open(&path);
    let keep = store_harness::keep(&["A", "B"]);
    let descriptor = SchemaDescriptor::synapse();
    let retention = Retention::new(&keep, &descriptor, MembershipFallback::Abort)
        .expect("built-in descriptor should validate");

    let first = retention.run(&mut store).expect("first run should commit");
    assert!(first.total_rows() > 0);
    let after_first = store_harness::snapshot(&path);

    let second = retention.run(&mut store).expect("second run should commit");

    assert_eq!(second.total_rows(), 0);
    assert!(second.steps.iter().all(|step| step.rows == 0));
    assert_eq!(second.census.to_delete, 0);
    assert_eq!(second.retained, first.retained);
    assert_eq!(store_harness::snapshot(&path), after_first);
}

#[test]
fn reopened_store_converges_too() {
    let (_tmp, path) = store_harness::scenario_db();
    let keep = store_harness::keep(&["C"]);
    let descriptor = SchemaDescriptor::synapse();
    let retention = Retention::new(&keep, &descriptor, MembershipFallback::Abort)
        .expect("built-in descriptor should validate");

    retention
        .run(&mut store_harness::open(&path))
        .expect("first run should commit");
    let report = retention
        .run(&mut store_harness::open(&path))
        .expect("second run should commit");

    assert_eq!(report.total_rows(), 0);
    assert_eq!(
        store_harness::column(&path, "SELECT room_id FROM rooms ORDER BY room_id"),
        vec!["E1", "E2"]
    );
}
