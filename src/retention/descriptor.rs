//! Versioned description of the ownership graph a run operates on.
//!
//! The descriptor is declared data: the principal table, the tables owned
//! directly by principals, and zero or more entity tiers. Each tier hangs
//! off a parent (the principal or an earlier tier) through a membership
//! relation, which makes the declaration order a topological order of the
//! ownership DAG.

use crate::error::DescriptorError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

pub const PRINCIPAL_SCOPE: &str = "principal";

/// Who owns a row: the principal itself or an entity of a named tier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Owner {
    Principal,
    Tier(String),
}

impl Owner {
    pub fn from_parent(parent: &str) -> Self {
        if parent == PRINCIPAL_SCOPE {
            Self::Principal
        } else {
            Self::Tier(parent.to_string())
        }
    }

    /// Key under which this owner's retained ids are staged in the session.
    pub fn scope_key(&self) -> String {
        match self {
            Self::Principal => PRINCIPAL_SCOPE.to_string(),
            Self::Tier(name) => format!("tier:{name}"),
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Principal => f.write_str(PRINCIPAL_SCOPE),
            Self::Tier(name) => f.write_str(name),
        }
    }
}

/// `(table, column)`: rows of `table` are owned through `column`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    pub table: String,
    pub column: String,
}

impl TableSpec {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalSpec {
    pub table: String,
    pub column: String,
    /// Extra columns echoed next to each surviving principal in the report.
    #[serde(default)]
    pub status_columns: Vec<String>,
}

/// Relation binding tier entities to the owners of the parent tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipSpec {
    pub table: String,
    pub entity_column: String,
    pub owner_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTier {
    pub name: String,
    pub table: String,
    pub column: String,
    #[serde(default = "default_parent")]
    pub parent: String,
    pub membership: MembershipSpec,
    #[serde(default)]
    pub content: Vec<TableSpec>,
}

fn default_parent() -> String {
    PRINCIPAL_SCOPE.into()
}

impl EntityTier {
    pub fn owner(&self) -> Owner {
        Owner::Tier(self.name.clone())
    }

    pub fn parent_owner(&self) -> Owner {
        Owner::from_parent(&self.parent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub version: String,
    pub principal: PrincipalSpec,
    #[serde(default)]
    pub owned: Vec<TableSpec>,
    #[serde(default)]
    pub tiers: Vec<EntityTier>,
}

impl Default for SchemaDescriptor {
    fn default() -> Self {
        Self::synapse()
    }
}

impl SchemaDescriptor {
    /// Matrix Synapse homeserver database, SQLite flavour.
    pub fn synapse() -> Self {
        const OWNED: &[(&str, &str)] = &[
            ("user_ips", "user_id"),
            ("user_directory_search", "user_id"),
            ("user_directory", "user_id"),
            ("user_daily_visits", "user_id"),
            ("user_stats_current", "user_id"),
            ("user_filters", "user_id"),
            ("users_who_share_private_rooms", "user_id"),
            ("users_in_public_rooms", "user_id"),
            ("profiles", "full_user_id"),
            ("presence_stream", "user_id"),
            ("devices", "user_id"),
            ("device_lists_stream", "user_id"),
            ("device_lists_changes_in_room", "user_id"),
            ("device_inbox", "user_id"),
            ("e2e_device_keys_json", "user_id"),
            ("e2e_one_time_keys_json", "user_id"),
            ("e2e_fallback_keys_json", "user_id"),
            ("e2e_cross_signing_keys", "user_id"),
            ("e2e_cross_signing_signatures", "user_id"),
            ("e2e_room_keys_versions", "user_id"),
            ("account_data", "user_id"),
            ("room_account_data", "user_id"),
            ("access_tokens", "user_id"),
            ("refresh_tokens", "user_id"),
            ("open_id_tokens", "user_id"),
            ("receipts_linearized", "user_id"),
            ("receipts_graph", "user_id"),
            ("event_push_actions", "user_id"),
            ("event_push_summary", "user_id"),
            ("local_current_membership", "user_id"),
            ("sliding_sync_membership_snapshots", "user_id"),
            ("sliding_sync_joined_rooms", "user_id"),
        ];

        Self {
            version: "synapse-sqlite/1".into(),
            principal: PrincipalSpec {
                table: "users".into(),
                column: "name".into(),
                status_columns: vec!["admin".into(), "deactivated".into()],
            },
            owned: OWNED
                .iter()
                .map(|(table, column)| TableSpec::new(*table, *column))
                .collect(),
            tiers: vec![EntityTier {
                name: "room".into(),
                table: "rooms".into(),
                column: "room_id".into(),
                parent: PRINCIPAL_SCOPE.into(),
                membership: MembershipSpec {
                    table: "room_memberships".into(),
                    entity_column: "room_id".into(),
                    owner_column: "user_id".into(),
                },
                content: vec![
                    TableSpec::new("events", "room_id"),
                    TableSpec::new("state_events", "room_id"),
                    TableSpec::new("current_state_events", "room_id"),
                ],
            }],
        }
    }

    pub fn tier(&self, name: &str) -> Option<&EntityTier> {
        self.tiers.iter().find(|tier| tier.name == name)
    }

    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.version.trim().is_empty() {
            return Err(DescriptorError::MissingVersion);
        }

        check_ident(&self.principal.table)?;
        check_ident(&self.principal.column)?;
        for column in &self.principal.status_columns {
            check_ident(column)?;
        }
        for spec in &self.owned {
            check_ident(&spec.table)?;
            check_ident(&spec.column)?;
        }

        let mut declared: HashSet<&str> = HashSet::new();
        for tier in &self.tiers {
            if tier.name == PRINCIPAL_SCOPE {
                return Err(DescriptorError::ReservedTier(tier.name.clone()));
            }
            check_ident(&tier.name)?;
            if declared.contains(tier.name.as_str()) {
                return Err(DescriptorError::DuplicateTier(tier.name.clone()));
            }
            if tier.parent != PRINCIPAL_SCOPE && !declared.contains(tier.parent.as_str()) {
                return Err(DescriptorError::UnknownParent {
                    tier: tier.name.clone(),
                    parent: tier.parent.clone(),
                });
            }
            for ident in [
                &tier.table,
                &tier.column,
                &tier.membership.table,
                &tier.membership.entity_column,
                &tier.membership.owner_column,
            ] {
                check_ident(ident)?;
            }
            for spec in &tier.content {
                check_ident(&spec.table)?;
                check_ident(&spec.column)?;
            }
            declared.insert(tier.name.as_str());
        }
        Ok(())
    }
}

fn check_ident(ident: &str) -> Result<(), DescriptorError> {
    let valid = !ident.is_empty()
        && !ident.starts_with(|c: char| c.is_ascii_digit())
        && ident.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(DescriptorError::InvalidIdentifier(ident.to_string()))
    }
}

/// Quote an SQL identifier. Descriptors are validated, so this never has to
/// escape anything in practice.
pub(crate) fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
