use super::descriptor::{MembershipSpec, Owner, PrincipalSpec, SchemaDescriptor, TableSpec};
use super::session::Session;
use crate::error::{SchemaMismatch, StoreError, SweepError};
use serde::Serialize;
use std::collections::HashMap;

/// The part of a descriptor the live store actually has.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedSchema {
    pub version: String,
    pub principal: PrincipalSpec,
    pub owned: Vec<TableSpec>,
    pub tiers: Vec<ResolvedTier>,
    pub skipped: Vec<SchemaMismatch>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedTier {
    pub name: String,
    pub owner: Owner,
    pub parent: Owner,
    /// `None` when the entity table or id column is absent.
    pub entity: Option<TableSpec>,
    /// Declared membership table, reported even when absent.
    pub membership_table: String,
    /// `None` when the membership relation is absent.
    pub membership: Option<MembershipSpec>,
    pub content: Vec<TableSpec>,
}

fn has_column(columns: &[String], wanted: &str) -> bool {
    columns.iter().any(|column| column.eq_ignore_ascii_case(wanted))
}

struct Catalog<'s, S> {
    session: &'s S,
    columns: HashMap<String, Option<Vec<String>>>,
}

impl<'s, S: Session> Catalog<'s, S> {
    fn new(session: &'s S) -> Self {
        Self {
            session,
            columns: HashMap::new(),
        }
    }

    /// SQLite resolves identifiers case-insensitively, so the cache does too.
    fn columns_of(&mut self, table: &str) -> Result<Option<&[String]>, StoreError> {
        let key = table.to_ascii_lowercase();
        if !self.columns.contains_key(&key) {
            let columns = if self.session.table_exists(table)? {
                Some(self.session.table_columns(table)?)
            } else {
                None
            };
            self.columns.insert(key.clone(), columns);
        }
        Ok(self.columns.get(&key).and_then(|c| c.as_deref()))
    }

    /// `Ok(None)` when `table` has every one of `required`.
    fn check(&mut self, table: &str, required: &[&str]) -> Result<Option<SchemaMismatch>, StoreError> {
        let Some(columns) = self.columns_of(table)? else {
            return Ok(Some(SchemaMismatch::MissingTable {
                table: table.to_string(),
            }));
        };
        Ok(required
            .iter()
            .find(|column| !has_column(columns, column))
            .map(|column| SchemaMismatch::MissingColumn {
                table: table.to_string(),
                column: (*column).to_string(),
            }))
    }

    fn keep_spec(
        &mut self,
        spec: &TableSpec,
        skipped: &mut Vec<SchemaMismatch>,
    ) -> Result<bool, StoreError> {
        match self.check(&spec.table, &[spec.column.as_str()])? {
            None => Ok(true),
            Some(mismatch) => {
                tracing::warn!("skipping {}.{}: {mismatch}", spec.table, spec.column);
                skipped.push(mismatch);
                Ok(false)
            }
        }
    }
}

/// Match the descriptor against the live store.
///
/// Missing owned/content tables, entity tables and membership relations are
/// recorded and skipped. A missing principal table is fatal.
pub fn introspect<S: Session>(
    session: &S,
    descriptor: &SchemaDescriptor,
) -> Result<ResolvedSchema, SweepError> {
    let store = |err| SweepError::before_plan(err, "schema introspection");
    let mut catalog = Catalog::new(session);
    let mut skipped = Vec::new();

    let principal = &descriptor.principal;
    let Some(present) = catalog.columns_of(&principal.table).map_err(store)? else {
        return Err(SweepError::PrincipalTableMissing {
            table: principal.table.clone(),
            column: principal.column.clone(),
        });
    };
    if !has_column(present, &principal.column) {
        return Err(SweepError::PrincipalTableMissing {
            table: principal.table.clone(),
            column: principal.column.clone(),
        });
    }
    let status_columns: Vec<String> = principal
        .status_columns
        .iter()
        .filter(|column| has_column(present, column))
        .cloned()
        .collect();
    if status_columns.len() < principal.status_columns.len() {
        tracing::debug!(
            "principal status columns reduced to {:?} for this store",
            status_columns
        );
    }

    let mut owned = Vec::new();
    for spec in &descriptor.owned {
        if catalog.keep_spec(spec, &mut skipped).map_err(store)? {
            owned.push(spec.clone());
        }
    }

    let mut tiers = Vec::new();
    for tier in &descriptor.tiers {
        let entity = match catalog
            .check(&tier.table, &[tier.column.as_str()])
            .map_err(store)?
        {
            None => Some(TableSpec::new(&tier.table, &tier.column)),
            Some(mismatch) => {
                tracing::warn!("tier {}: entity rows will not be swept: {mismatch}", tier.name);
                skipped.push(mismatch);
                None
            }
        };

        let required = [
            tier.membership.entity_column.as_str(),
            tier.membership.owner_column.as_str(),
        ];
        let membership = match catalog
            .check(&tier.membership.table, &required)
            .map_err(store)?
        {
            None => Some(tier.membership.clone()),
            Some(mismatch) => {
                tracing::warn!("tier {}: membership relation unavailable: {mismatch}", tier.name);
                skipped.push(mismatch);
                None
            }
        };

        let mut content = Vec::new();
        for spec in &tier.content {
            if catalog.keep_spec(spec, &mut skipped).map_err(store)? {
                content.push(spec.clone());
            }
        }

        tiers.push(ResolvedTier {
            name: tier.name.clone(),
            owner: tier.owner(),
            parent: tier.parent_owner(),
            entity,
            membership_table: tier.membership.table.clone(),
            membership,
            content,
        });
    }

    Ok(ResolvedSchema {
        version: descriptor.version.clone(),
        principal: PrincipalSpec {
            table: principal.table.clone(),
            column: principal.column.clone(),
            status_columns,
        },
        owned,
        tiers,
        skipped,
    })
}
