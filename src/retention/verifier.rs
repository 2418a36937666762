//! Post-commit diagnostics.
//!
//! The verifier runs after the transaction is durable, so nothing it finds
//! can be undone here. It only reports: warnings never fail a run and never
//! change the exit status.

use super::descriptor::{Owner, TableSpec};
use super::introspect::{ResolvedSchema, ResolvedTier};
use super::keepset::KeepSet;
use super::predicate::{NotRetained, Orphans, RetainedMembers};
use super::report::{Snapshot, Verification};
use super::resolver::RetainedSets;
use super::session::Session;
use crate::error::StoreError;
use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerificationWarning {
    #[error("principal {id} remains but is not in the keep set")]
    UnexpectedPrincipal { id: String },

    #[error("kept principal {id} is absent from the store")]
    KeptPrincipalAbsent { id: String },

    #[error("{table}.{column}: {rows} rows still reference a non-retained {owner}")]
    DanglingRows {
        table: String,
        column: String,
        owner: String,
        rows: u64,
    },

    #[error("{table}.{column}: {rows} rows reference a missing {parent} row")]
    OrphanedRows {
        table: String,
        column: String,
        parent: String,
        rows: u64,
    },

    #[error("tier {tier}: {count} retained entities no longer have a retained member")]
    UnbackedEntities { tier: String, count: u64 },

    #[error("tier {tier}: membership relation was missing; every entity was treated as unreferenced")]
    MembershipFallback { tier: String },

    #[error("verification could not read the store: {cause}")]
    Unavailable { cause: String },
}

/// Re-read the store and compare it with what the run intended.
pub fn verify<S: Session>(
    session: &S,
    schema: &ResolvedSchema,
    keep: &KeepSet,
    retained: &RetainedSets,
) -> Result<Verification, StoreError> {
    retained.stage_into(session)?;

    let mut warnings = Vec::new();
    let mut snapshot = Snapshot::default();

    for tier in retained.fallbacks() {
        warnings.push(VerificationWarning::MembershipFallback { tier: tier.clone() });
    }

    let principals = session.principal_rows(&schema.principal, &schema.principal.status_columns)?;
    let present: BTreeSet<&str> = principals.iter().map(|row| row.id.as_str()).collect();
    for row in &principals {
        if !keep.contains(&row.id) {
            warnings.push(VerificationWarning::UnexpectedPrincipal { id: row.id.clone() });
        }
    }
    for principal in keep.iter() {
        if !present.contains(principal.as_str()) {
            warnings.push(VerificationWarning::KeptPrincipalAbsent {
                id: principal.to_string(),
            });
        }
    }
    snapshot.principals = principals;

    for spec in &schema.owned {
        check_dangling(
            session,
            &NotRetained::new(&spec.table, &spec.column, Owner::Principal),
            &mut warnings,
        )?;
    }

    for tier in &schema.tiers {
        for spec in &tier.content {
            snapshot
                .content
                .push((spec.table.clone(), session.count_rows(&spec.table)?));
            check_dangling(
                session,
                &NotRetained::new(&spec.table, &spec.column, tier.owner.clone()),
                &mut warnings,
            )?;
        }

        if let Some(membership) = &tier.membership {
            check_dangling(
                session,
                &NotRetained::new(
                    &membership.table,
                    &membership.owner_column,
                    tier.parent.clone(),
                ),
                &mut warnings,
            )?;

            if let Some(entity) = &tier.entity {
                let members = RetainedMembers {
                    tier: tier.owner.clone(),
                    table: membership.table.clone(),
                    entity_column: membership.entity_column.clone(),
                    owner_column: membership.owner_column.clone(),
                    parent: tier.parent.clone(),
                };
                let unbacked = session.count_unbacked(&members, entity)?;
                if unbacked > 0 {
                    warnings.push(VerificationWarning::UnbackedEntities {
                        tier: tier.name.clone(),
                        count: unbacked,
                    });
                }
            }
        }

        if let Some(entity) = &tier.entity {
            snapshot
                .entities
                .insert(tier.name.clone(), session.count_rows(&entity.table)?);
            check_dangling(
                session,
                &NotRetained::new(&entity.table, &entity.column, tier.owner.clone()),
                &mut warnings,
            )?;
            check_references(session, schema, tier, entity, &mut warnings)?;
        }
    }

    for warning in &warnings {
        tracing::warn!("verification: {warning}");
    }

    Ok(Verification { snapshot, warnings })
}

/// Every reference into `entity`, and the membership's reference to its
/// parent, must land on a row that exists.
fn check_references<S: Session>(
    session: &S,
    schema: &ResolvedSchema,
    tier: &ResolvedTier,
    entity: &TableSpec,
    warnings: &mut Vec<VerificationWarning>,
) -> Result<(), StoreError> {
    let mut edges: Vec<(TableSpec, TableSpec)> = tier
        .content
        .iter()
        .map(|spec| (spec.clone(), entity.clone()))
        .collect();

    if let Some(membership) = &tier.membership {
        edges.push((
            TableSpec::new(&membership.table, &membership.entity_column),
            entity.clone(),
        ));
        let parent = match &tier.parent {
            Owner::Principal => Some(TableSpec::new(
                &schema.principal.table,
                &schema.principal.column,
            )),
            Owner::Tier(name) => schema
                .tiers
                .iter()
                .find(|candidate| &candidate.name == name)
                .and_then(|candidate| candidate.entity.clone()),
        };
        if let Some(parent) = parent {
            edges.push((
                TableSpec::new(&membership.table, &membership.owner_column),
                parent,
            ));
        }
    }

    for (child, parent) in edges {
        let orphans = Orphans { child, parent };
        let rows = session.count_orphans(&orphans)?;
        if rows > 0 {
            warnings.push(VerificationWarning::OrphanedRows {
                table: orphans.child.table,
                column: orphans.child.column,
                parent: format!("{}.{}", orphans.parent.table, orphans.parent.column),
                rows,
            });
        }
    }
    Ok(())
}

fn check_dangling<S: Session>(
    session: &S,
    predicate: &NotRetained,
    warnings: &mut Vec<VerificationWarning>,
) -> Result<(), StoreError> {
    let rows = session.count_matching(predicate)?;
    if rows > 0 {
        warnings.push(VerificationWarning::DanglingRows {
            table: predicate.table.clone(),
            column: predicate.column.clone(),
            owner: predicate.owner.to_string(),
            rows,
        });
    }
    Ok(())
}
