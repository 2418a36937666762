use keepsweep::retention::{
    EntityTier, MembershipFallback, MembershipSpec, PrincipalSpec, Retention, SchemaDescriptor,
    TableSpec,
};

use super::store_harness;

fn workshop_descriptor() -> SchemaDescriptor {
    SchemaDescriptor {
        version: "workshop/1".into(),
        principal: PrincipalSpec {
            table: "users".into(),
            column: "uid".into(),
            status_columns: Vec::new(),
        },
        owned: vec![TableSpec::new("sessions", "uid")],
        tiers: vec![EntityTier {
            name: "room".into(),
            table: "rooms".into(),
            column: "rid".into(),
            parent: "principal".into(),
            membership: MembershipSpec {
                table: "members".into(),
                entity_column: "rid".into(),
                owner_column: "uid".into(),
            },
            content: vec![TableSpec::new("events", "rid")],
        }],
    }
}

/// Declared TEXT principals, with integers in every column that has no type.
const MIXED_SQL: &str = "
    CREATE TABLE users (uid TEXT PRIMARY KEY);
    CREATE TABLE sessions (uid, token TEXT);
    CREATE TABLE rooms (rid);
    CREATE TABLE members (rid, uid);
    CREATE TABLE events (rid, body TEXT);

    INSERT INTO users VALUES ('1'), ('2');
    INSERT INTO sessions VALUES (1, 't1'), (2, 't2');
    INSERT INTO rooms VALUES (10), (20);
    INSERT INTO members VALUES (10, '1'), (20, '2');
    INSERT INTO events VALUES (10, 'kept'), (20, 'gone');
";

#[test]
fn integer_ids_in_untyped_columns_survive_a_text_keep_set() {
    let (_tmp, path) = store_harness::create_db(MIXED_SQL);
    let mut store = store_harness::open(&path);
    let keep = store_harness::keep(&["1"]);
    let descriptor = workshop_descriptor();
    let retention = Retention::new(&keep, &descriptor, MembershipFallback::Abort)
        .expect("workshop descriptor should validate");

    let report = retention.run(&mut store).expect("run should commit");

    assert_eq!(report.retained.get("room"), Some(&1));
    assert_eq!(report.census.kept_present, 1);
    assert_eq!(report.rows_for("rooms"), 1);
    assert_eq!(report.rows_for("events"), 1);
    assert_eq!(report.rows_for("sessions"), 1);
    assert!(report.warnings().is_empty(), "{:?}", report.warnings());

    drop(store);
    assert_eq!(store_harness::column(&path, "SELECT uid FROM users"), vec!["1"]);
    assert_eq!(store_harness::column(&path, "SELECT token FROM sessions"), vec!["t1"]);
    assert_eq!(store_harness::column(&path, "SELECT rid FROM rooms"), vec!["10"]);
    assert_eq!(store_harness::column(&path, "SELECT body FROM events"), vec!["kept"]);
    assert_eq!(
        store_harness::column(&path, "SELECT rid || ':' || uid FROM members"),
        vec!["10:1"]
    );
}

#[test]
fn integer_principals_match_their_decimal_keep_ids() {
    let (_tmp, path) = store_harness::create_db(
        "CREATE TABLE users (uid);
         CREATE TABLE sessions (uid, token TEXT);
         CREATE TABLE rooms (rid);
         CREATE TABLE members (rid, uid);
         CREATE TABLE events (rid, body TEXT);
         INSERT INTO users VALUES (1), (2);
         INSERT INTO sessions VALUES (1, 't1'), (2, 't2');
         INSERT INTO rooms VALUES (10);
         INSERT INTO members VALUES (10, 1);
         INSERT INTO events VALUES (10, 'kept');",
    );
    let mut store = store_harness::open(&path);
    let keep = store_harness::keep(&["1"]);
    let descriptor = workshop_descriptor();
    let retention = Retention::new(&keep, &descriptor, MembershipFallback::Abort)
        .expect("workshop descriptor should validate");

    let report = retention.run(&mut store).expect("run should commit");

    assert_eq!(report.census.total, 2);
    assert_eq!(report.census.to_delete, 1);
    assert_eq!(report.rows_for("users"), 1);
    assert_eq!(report.rows_for("rooms"), 0);
    assert!(report.warnings().is_empty(), "{:?}", report.warnings());

    drop(store);
    assert_eq!(store_harness::column(&path, "SELECT uid FROM users"), vec!["1"]);
    assert_eq!(store_harness::count(&path, "events"), 1);
}

#[test]
fn blob_principals_are_matched_by_their_text_form() {
    let (_tmp, path) = store_harness::create_db(
        "CREATE TABLE users (uid BLOB);
         CREATE TABLE sessions (uid, token TEXT);
         CREATE TABLE rooms (rid TEXT);
         CREATE TABLE members (rid TEXT, uid);
         CREATE TABLE events (rid TEXT, body TEXT);
         INSERT INTO users VALUES (x'41'), (x'42');
         INSERT INTO sessions VALUES (x'41', 'ta'), (x'42', 'tb');
         INSERT INTO rooms VALUES ('R1'), ('R2');
         INSERT INTO members VALUES ('R1', x'41'), ('R2', x'42');
         INSERT INTO events VALUES ('R1', 'kept'), ('R2', 'gone');",
    );
    let mut store = store_harness::open(&path);
    let keep = store_harness::keep(&["A"]);
    let descriptor = workshop_descriptor();
    let retention = Retention::new(&keep, &descriptor, MembershipFallback::Abort)
        .expect("workshop descriptor should validate");

    let report = retention.run(&mut store).expect("run should commit");

    assert_eq!(report.retained.get("room"), Some(&1));
    assert!(report.warnings().is_empty(), "{:?}", report.warnings());

    drop(store);
    assert_eq!(
        store_harness::column(&path, "SELECT CAST(uid AS TEXT) FROM users"),
        vec!["A"]
    );
    assert_eq!(store_harness::column(&path, "SELECT token FROM sessions"), vec!["ta"]);
    assert_eq!(store_harness::column(&path, "SELECT rid FROM rooms"), vec!["R1"]);
    assert_eq!(store_harness::column(&path, "SELECT body FROM events"), vec!["kept"]);
}
