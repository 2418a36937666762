//! Set-membership predicates over staged retained sets.
//!
//! Retained ids are never spliced into SQL. A session stages each set into
//! a TEMP table keyed by scope, and predicates compare against a subquery
//! on that table with the scope bound as a parameter. Statement size stays
//! constant however large the keep set grows.
//!
//! The staged `id` column is declared without a type, so it has no
//! affinity: a value keeps the storage class it had in the table it was
//! copied from, and comparisons apply the affinity of the column on the
//! other side exactly as a join between the two tables would.

use super::descriptor::{Owner, TableSpec, quote_ident};

pub(crate) const STAGE_TABLE: &str = "temp.keepsweep_retained";

pub(crate) const CREATE_STAGE_SQL: &str = "CREATE TEMP TABLE IF NOT EXISTS keepsweep_retained (
        scope TEXT NOT NULL,
        id    NOT NULL,
        PRIMARY KEY (scope, id)
    ) WITHOUT ROWID";

fn staged(scope_param: &str) -> String {
    format!("(SELECT id FROM {STAGE_TABLE} WHERE scope = {scope_param})")
}

/// Rows of `table` whose `column` value is not in the retained set of `owner`.
///
/// NULL ownership values never match: they are not provably absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotRetained {
    pub table: String,
    pub column: String,
    pub owner: Owner,
}

impl NotRetained {
    pub fn new(table: impl Into<String>, column: impl Into<String>, owner: Owner) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            owner,
        }
    }

    fn where_clause(&self) -> String {
        format!(
            "{column} IS NOT NULL AND {column} NOT IN {set}",
            column = quote_ident(&self.column),
            set = staged("?1"),
        )
    }

    pub(crate) fn count_sql(&self) -> String {
        format!(
            "SELECT COUNT(*) FROM {table} WHERE {clause}",
            table = quote_ident(&self.table),
            clause = self.where_clause(),
        )
    }

    /// Rows the retained set does cover.
    pub(crate) fn retained_count_sql(&self) -> String {
        format!(
            "SELECT COUNT(*) FROM {table} WHERE {column} IN {set}",
            table = quote_ident(&self.table),
            column = quote_ident(&self.column),
            set = staged("?1"),
        )
    }

    pub(crate) fn delete_sql(&self) -> String {
        format!(
            "DELETE FROM {table} WHERE {clause}",
            table = quote_ident(&self.table),
            clause = self.where_clause(),
        )
    }

    /// Ordered sample of matching ownership values, bound `?2` as the limit.
    pub(crate) fn sample_sql(&self) -> String {
        format!(
            "SELECT DISTINCT {column} FROM {table} WHERE {clause} ORDER BY {column} LIMIT ?2",
            column = quote_ident(&self.column),
            table = quote_ident(&self.table),
            clause = self.where_clause(),
        )
    }

    pub(crate) fn scope(&self) -> String {
        self.owner.scope_key()
    }
}

/// Membership rows of `tier` whose owner is in the retained set of `parent`.
///
/// Binds `?1` to the tier scope and `?2` to the parent scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetainedMembers {
    pub tier: Owner,
    pub table: String,
    pub entity_column: String,
    pub owner_column: String,
    pub parent: Owner,
}

impl RetainedMembers {
    fn owned_by_parent(&self, alias: &str) -> String {
        format!(
            "{alias}.{owner} IN {set}",
            owner = quote_ident(&self.owner_column),
            set = staged("?2"),
        )
    }

    /// Copy every referenced entity id, as the membership table stores it.
    pub(crate) fn stage_from_membership_sql(&self) -> String {
        format!(
            "INSERT OR IGNORE INTO {STAGE_TABLE} (scope, id)
             SELECT DISTINCT ?1, m.{entity} FROM {table} AS m
             WHERE m.{entity} IS NOT NULL AND {owned}",
            entity = quote_ident(&self.entity_column),
            table = quote_ident(&self.table),
            owned = self.owned_by_parent("m"),
        )
    }

    /// Copy every matching entity id, as the entity table stores it.
    pub(crate) fn stage_from_entity_sql(&self, entity: &TableSpec) -> String {
        format!(
            "INSERT OR IGNORE INTO {STAGE_TABLE} (scope, id)
             SELECT DISTINCT ?1, e.{column} FROM {table} AS e
             WHERE e.{column} IS NOT NULL AND EXISTS (
                 SELECT 1 FROM {members} AS m
                 WHERE m.{entity_column} = e.{column} AND {owned}
             )",
            column = quote_ident(&entity.column),
            table = quote_ident(&entity.table),
            members = quote_ident(&self.table),
            entity_column = quote_ident(&self.entity_column),
            owned = self.owned_by_parent("m"),
        )
    }

    /// Distinct retained entities as seen from the membership table.
    pub(crate) fn count_sql(&self) -> String {
        format!(
            "SELECT COUNT(DISTINCT m.{entity}) FROM {table} AS m
             WHERE m.{entity} IS NOT NULL AND {owned}",
            entity = quote_ident(&self.entity_column),
            table = quote_ident(&self.table),
            owned = self.owned_by_parent("m"),
        )
    }

    /// Retained entity rows no membership row ties to a retained owner any more.
    pub(crate) fn unbacked_sql(&self, entity: &TableSpec) -> String {
        format!(
            "SELECT COUNT(*) FROM {table} AS e
             WHERE e.{column} IN {set} AND NOT EXISTS (
                 SELECT 1 FROM {members} AS m
                 WHERE m.{entity_column} = e.{column} AND {owned}
             )",
            column = quote_ident(&entity.column),
            table = quote_ident(&entity.table),
            set = staged("?1"),
            members = quote_ident(&self.table),
            entity_column = quote_ident(&self.entity_column),
            owned = self.owned_by_parent("m"),
        )
    }

    pub(crate) fn scopes(&self) -> (String, String) {
        (self.tier.scope_key(), self.parent.scope_key())
    }
}

/// Rows of `child` whose reference has no matching row in `parent`.
///
/// Compares the two columns directly, independent of any staged set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Orphans {
    pub child: TableSpec,
    pub parent: TableSpec,
}

impl Orphans {
    pub(crate) fn count_sql(&self) -> String {
        format!(
            "SELECT COUNT(*) FROM {child} AS c
             WHERE c.{column} IS NOT NULL AND NOT EXISTS (
                 SELECT 1 FROM {parent} AS p WHERE p.{parent_column} = c.{column}
             )",
            child = quote_ident(&self.child.table),
            column = quote_ident(&self.child.column),
            parent = quote_ident(&self.parent.table),
            parent_column = quote_ident(&self.parent.column),
        )
    }
}

/// Stage every stored principal value whose text form is a staged keep id.
pub(crate) fn stage_principals_sql(principal: &TableSpec) -> String {
    format!(
        "INSERT OR IGNORE INTO {STAGE_TABLE} (scope, id)
         SELECT DISTINCT ?1, p.{column} FROM {table} AS p
         WHERE p.{column} IS NOT NULL
           AND CAST(p.{column} AS TEXT) IN (SELECT CAST(id AS TEXT) FROM {STAGE_TABLE} WHERE scope = ?1)",
        column = quote_ident(&principal.column),
        table = quote_ident(&principal.table),
    )
}
