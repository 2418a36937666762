use keepsweep::retention::{
    EntityTier, MembershipFallback, MembershipSpec, Phase, PrincipalSpec, Retention,
    SchemaDescriptor, TableSpec,
};

use super::store_harness;

/// Principals belong to spaces, spaces contain rooms, rooms hold events.
fn workspace_descriptor() -> SchemaDescriptor {
    SchemaDescriptor {
        version: "workspace/1".into(),
        principal: PrincipalSpec {
            table: "accounts".into(),
            column: "account_id".into(),
            status_columns: Vec::new(),
        },
        owned: vec![TableSpec::new("sessions", "account_id")],
        tiers: vec![
            EntityTier {
                name: "space".into(),
                table: "spaces".into(),
                column: "space_id".into(),
                parent: "principal".into(),
                membership: MembershipSpec {
                    table: "space_members".into(),
                    entity_column: "space_id".into(),
                    owner_column: "account_id".into(),
                },
                content: vec![TableSpec::new("space_settings", "space_id")],
            },
            EntityTier {
                name: "room".into(),
                table: "rooms".into(),
                column: "room_id".into(),
                parent: "space".into(),
                membership: MembershipSpec {
                    table: "space_rooms".into(),
                    entity_column: "room_id".into(),
                    owner_column: "space_id".into(),
                },
                content: vec![TableSpec::new("messages", "room_id")],
            },
        ],
    }
}

const WORKSPACE_SQL: &str = "
    CREATE TABLE accounts (account_id TEXT PRIMARY KEY);
    CREATE TABLE sessions (account_id TEXT REFERENCES accounts(account_id));
    CREATE TABLE spaces (space_id TEXT PRIMARY KEY);
    CREATE TABLE space_members (
        space_id TEXT REFERENCES spaces(space_id),
        account_id TEXT REFERENCES accounts(account_id)
    );
    CREATE TABLE space_settings (space_id TEXT REFERENCES spaces(space_id), k TEXT);
    CREATE TABLE rooms (room_id TEXT PRIMARY KEY);
    CREATE TABLE space_rooms (
        room_id TEXT REFERENCES rooms(room_id),
        space_id TEXT REFERENCES spaces(space_id)
    );
    CREATE TABLE messages (room_id TEXT REFERENCES rooms(room_id), body TEXT);

    INSERT INTO accounts VALUES ('A'), ('C');
    INSERT INTO sessions VALUES ('A'), ('C');
    INSERT INTO spaces VALUES ('S1'), ('S2');
    INSERT INTO space_members VALUES ('S1', 'A'), ('S1', 'C'), ('S2', 'C');
    INSERT INTO space_settings VALUES ('S1', 'topic'), ('S2', 'topic');
    INSERT INTO rooms VALUES ('R1'), ('R2'), ('R3');
    INSERT INTO space_rooms VALUES ('R1', 'S1'), ('R2', 'S2'), ('R3', 'S1'), ('R3', 'S2');
    INSERT INTO messages VALUES ('R1', 'hi'), ('R2', 'hi'), ('R3', 'hi');
";

#[test]
fn nested_tiers_resolve_top_down_and_delete_bottom_up() {
    let (_tmp, path) = store_harness::create_db(WORKSPACE_SQL);
    let mut store = store_harness::open(&path);
    let keep = store_harness::keep(&["A"]);
    let descriptor = workspace_descriptor();
    let retention = Retention::new(&keep, &descriptor, MembershipFallback::Abort)
        .expect("workspace descriptor should validate");

    let report = retention.run(&mut store).expect("run should commit");

    assert_eq!(report.retained.get("space"), Some(&1));
    assert_eq!(report.retained.get("room"), Some(&2));

    let order: Vec<(&str, Phase)> = report
        .steps
        .iter()
        .map(|step| (step.table.as_str(), step.phase))
        .collect();
    assert_eq!(
        order,
        vec![
            ("sessions", Phase::OwnedRows),
            ("messages", Phase::EntityContent),
            ("space_rooms", Phase::Membership),
            ("rooms", Phase::Entities),
            ("space_settings", Phase::EntityContent),
            ("space_members", Phase::Membership),
            ("spaces", Phase::Entities),
            ("accounts", Phase::Principals),
        ]
    );

    assert_eq!(report.rows_for("messages"), 1);
    assert_eq!(report.rows_for("space_rooms"), 2);
    assert_eq!(report.rows_for("rooms"), 1);
    assert_eq!(report.rows_for("space_members"), 2);
    assert_eq!(report.rows_for("spaces"), 1);
    assert_eq!(report.rows_for("accounts"), 1);
    assert!(report.warnings().is_empty(), "{:?}", report.warnings());

    drop(store);
    assert_eq!(
        store_harness::column(&path, "SELECT room_id FROM rooms ORDER BY room_id"),
        vec!["R1", "R3"]
    );
    assert_eq!(
        store_harness::column(
            &path,
            "SELECT room_id || ':' || space_id FROM space_rooms ORDER BY room_id"
        ),
        vec!["R1:S1", "R3:S1"]
    );
}

#[test]
fn tier_declared_before_its_parent_is_rejected() {
    let keep = store_harness::keep(&["A"]);
    let mut descriptor = workspace_descriptor();
    descriptor.tiers.reverse();

    assert!(Retention::new(&keep, &descriptor, MembershipFallback::Abort).is_err());
}
