use super::descriptor::Owner;
use super::introspect::ResolvedSchema;
use super::keepset::KeepSet;
use super::predicate::RetainedMembers;
use super::session::Session;
use crate::error::{StoreError, SweepError};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What to do with a tier whose membership relation is absent from the store.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MembershipFallback {
    /// Fail the run before anything is deleted.
    #[default]
    Abort,
    /// Treat every entity of the tier as unreferenced and delete it.
    Purge,
}

/// Retained sets as staged in the session that resolved them.
///
/// Ids are held as the values the store itself returned, so a later session
/// can restage them without changing their storage class.
#[derive(Debug, Clone, Default)]
pub struct RetainedSets {
    counts: BTreeMap<String, u64>,
    staged: Vec<(Owner, Vec<Value>)>,
    fallbacks: Vec<String>,
}

impl RetainedSets {
    /// Distinct retained entities of `tier`.
    pub fn count(&self, tier: &str) -> Option<u64> {
        self.counts.get(tier).copied()
    }

    pub fn counts(&self) -> BTreeMap<String, u64> {
        self.counts.clone()
    }

    /// Tiers resolved to an empty set because their membership was missing.
    pub fn fallbacks(&self) -> &[String] {
        &self.fallbacks
    }

    /// Stage the keep set and every tier set into `session`.
    pub fn stage_into<S: Session>(&self, session: &S) -> Result<(), StoreError> {
        for (owner, values) in &self.staged {
            session.restage(owner, values)?;
        }
        Ok(())
    }
}

/// Compute the retained set of every tier, parents first.
///
/// An entity is retained when at least one membership row ties it to a
/// retained owner of the parent tier. Each set is staged as soon as it is
/// known so child tiers can join against it.
pub fn resolve<S: Session>(
    session: &S,
    schema: &ResolvedSchema,
    keep: &KeepSet,
    fallback: MembershipFallback,
) -> Result<RetainedSets, SweepError> {
    let store = |err| SweepError::before_plan(err, "dependency resolution");

    session
        .stage_keep(&schema.principal, &keep.ids())
        .map_err(store)?;

    let mut sets = RetainedSets::default();
    sets.staged.push((
        Owner::Principal,
        session.staged(&Owner::Principal).map_err(store)?,
    ));

    for tier in &schema.tiers {
        let retained = if let Some(membership) = &tier.membership {
            let members = RetainedMembers {
                tier: tier.owner.clone(),
                table: membership.table.clone(),
                entity_column: membership.entity_column.clone(),
                owner_column: membership.owner_column.clone(),
                parent: tier.parent.clone(),
            };
            session
                .stage_members(&members, tier.entity.as_ref())
                .map_err(store)?
        } else {
            let has_rows_at_stake = tier.entity.is_some() || !tier.content.is_empty();
            if has_rows_at_stake {
                match fallback {
                    MembershipFallback::Abort => {
                        return Err(SweepError::MissingMembership {
                            tier: tier.name.clone(),
                            table: tier.membership_table.clone(),
                        });
                    }
                    MembershipFallback::Purge => {
                        tracing::warn!(
                            "tier {}: membership missing, every {} entity is treated as unreferenced",
                            tier.name,
                            tier.name
                        );
                        sets.fallbacks.push(tier.name.clone());
                    }
                }
            }
            session.restage(&tier.owner, &[]).map_err(store)?;
            0
        };

        tracing::info!("tier {}: {} entities retained", tier.name, retained);
        sets.staged
            .push((tier.owner.clone(), session.staged(&tier.owner).map_err(store)?));
        sets.counts.insert(tier.name.clone(), retained);
    }

    Ok(sets)
}
