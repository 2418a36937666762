use super::descriptor::Owner;
use super::introspect::ResolvedSchema;
use super::predicate::NotRetained;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    OwnedRows,
    EntityContent,
    Membership,
    Entities,
    Principals,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionStep {
    /// 1-based position in the plan.
    pub index: usize,
    pub phase: Phase,
    pub predicate: NotRetained,
}

impl DeletionStep {
    pub fn table(&self) -> &str {
        &self.predicate.table
    }
}

impl fmt::Display for DeletionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "step {} [{}] {}.{} not retained by {}",
            self.index,
            self.phase,
            self.predicate.table,
            self.predicate.column,
            self.predicate.owner
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionPlan {
    steps: Vec<DeletionStep>,
}

impl DeletionPlan {
    pub fn steps(&self) -> &[DeletionStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn push(&mut self, phase: Phase, table: &str, column: &str, owner: Owner) {
        self.steps.push(DeletionStep {
            index: self.steps.len() + 1,
            phase,
            predicate: NotRetained::new(table, column, owner),
        });
    }
}

/// Order every deletion so children go before parents.
///
/// Principal-owned rows first, then for each tier (deepest first) its
/// content, its membership rows and its entity rows, and the principal rows
/// last. Within a phase the descriptor's declaration order is kept, so the
/// same schema always yields the same plan.
pub fn plan(schema: &ResolvedSchema) -> DeletionPlan {
    let mut plan = DeletionPlan::default();

    for spec in &schema.owned {
        plan.push(Phase::OwnedRows, &spec.table, &spec.column, Owner::Principal);
    }

    for tier in schema.tiers.iter().rev() {
        for spec in &tier.content {
            plan.push(
                Phase::EntityContent,
                &spec.table,
                &spec.column,
                tier.owner.clone(),
            );
        }
        if let Some(membership) = &tier.membership {
            plan.push(
                Phase::Membership,
                &membership.table,
                &membership.owner_column,
                tier.parent.clone(),
            );
        }
        if let Some(entity) = &tier.entity {
            plan.push(
                Phase::Entities,
                &entity.table,
                &entity.column,
                tier.owner.clone(),
            );
        }
    }

    plan.push(
        Phase::Principals,
        &schema.principal.table,
        &schema.principal.column,
        Owner::Principal,
    );

    plan
}
