//! Selective retention: delete every row not reachable from a keep set.
//!
//! A run moves strictly downward through the components:
//! introspect the store against the descriptor, resolve which tier entities
//! stay reachable, plan the cascade, execute it in one transaction, then
//! verify the committed state.

pub mod descriptor;
pub mod executor;
pub mod introspect;
pub mod keepset;
pub mod planner;
pub mod predicate;
pub mod report;
pub mod resolver;
pub mod session;
pub mod verifier;


pub use descriptor::{
    EntityTier, MembershipSpec, Owner, PrincipalSpec, SchemaDescriptor, TableSpec,
};
pub use executor::{ExecutionMode, execute};
pub use introspect::{ResolvedSchema, ResolvedTier, introspect};
pub use keepset::{KeepSet, Principal};
pub use planner::{DeletionPlan, DeletionStep, Phase, plan};
pub use report::{
    PrincipalCensus, RunMode, RunReport, Snapshot, StepOutcome, Verification,
};
pub use resolver::{MembershipFallback, RetainedSets, resolve};
pub use session::{PrincipalRow, Session, SqliteSession, SqliteStore, StoreOptions};
pub use verifier::{VerificationWarning, verify};

use crate::error::SweepError;
use chrono::Utc;
use predicate::NotRetained;

const CENSUS_SAMPLE: usize = 10;

/// One configured retention run: a keep set against a descriptor.
#[derive(Debug, Clone)]
pub struct Retention<'a> {
    keep: &'a KeepSet,
    descriptor: &'a SchemaDescriptor,
    fallback: MembershipFallback,
}

impl<'a> Retention<'a> {
    pub fn new(
        keep: &'a KeepSet,
        descriptor: &'a SchemaDescriptor,
        fallback: MembershipFallback,
    ) -> Result<Self, SweepError> {
        descriptor.validate()?;
        Ok(Self {
            keep,
            descriptor,
            fallback,
        })
    }

    /// Delete, commit, then verify.
    ///
    /// Verification problems are reported in the returned report and never
    /// turn a committed run into an error.
    pub fn run(&self, store: &mut SqliteStore) -> Result<RunReport, SweepError> {
        let session = store.begin().map_err(|err| SweepError::Connectivity {
            last_completed: "nothing (could not begin transaction)".into(),
            cause: err.to_string(),
        })?;
        let (mut report, schema, retained) = self.sweep(session, ExecutionMode::Delete)?;

        let verification = store
            .begin_read()
            .and_then(|read| {
                let verification = verify(&read, &schema, self.keep, &retained);
                read.rollback()?;
                verification
            })
            .unwrap_or_else(|err| {
                tracing::warn!("verification skipped: {err}");
                Verification {
                    warnings: vec![VerificationWarning::Unavailable {
                        cause: err.to_string(),
                    }],
                    ..Verification::default()
                }
            });
        report.verification = Some(verification);
        report.finished_at = Utc::now();
        Ok(report)
    }

    /// Count what a run would delete without changing anything.
    pub fn dry_run(&self, store: &mut SqliteStore) -> Result<RunReport, SweepError> {
        let session = store.begin_read().map_err(|err| SweepError::Connectivity {
            last_completed: "nothing (could not begin transaction)".into(),
            cause: err.to_string(),
        })?;
        let (report, _, _) = self.sweep(session, ExecutionMode::CountOnly)?;
        Ok(report)
    }

    /// Run the verifier against the store as it is now.
    pub fn verify_only(&self, store: &mut SqliteStore) -> Result<Verification, SweepError> {
        let read = store
            .begin_read()
            .map_err(|err| SweepError::before_plan(err, "verification"))?;
        let schema = introspect(&read, self.descriptor)?;
        let retained = resolve(&read, &schema, self.keep, self.fallback)?;
        let verification = verify(&read, &schema, self.keep, &retained)
            .map_err(|err| SweepError::before_plan(err, "verification"))?;
        read.rollback()
            .map_err(|err| SweepError::before_plan(err, "verification"))?;
        Ok(verification)
    }

    /// The whole pipeline inside one session. The session is consumed:
    /// committed or rolled back by the executor, or dropped (and so rolled
    /// back) on an early error.
    pub fn sweep<S: Session>(
        &self,
        session: S,
        mode: ExecutionMode,
    ) -> Result<(RunReport, ResolvedSchema, RetainedSets), SweepError> {
        let started_at = Utc::now();

        let schema = introspect(&session, self.descriptor)?;
        let retained = resolve(&session, &schema, self.keep, self.fallback)?;
        let census = census(&session, &schema)?;
        tracing::info!(
            "principals: {} total, {} kept, {} to delete",
            census.total,
            census.kept_present,
            census.to_delete
        );

        let plan = plan(&schema);
        tracing::debug!("deletion plan has {} steps", plan.len());
        let steps = execute(session, &plan, mode)?;

        let report = RunReport {
            schema_version: schema.version.clone(),
            mode: match mode {
                ExecutionMode::Delete => RunMode::Live,
                ExecutionMode::CountOnly => RunMode::DryRun,
            },
            started_at,
            finished_at: Utc::now(),
            keep: self.keep.iter().map(ToString::to_string).collect(),
            census,
            skipped: schema.skipped.clone(),
            retained: retained.counts(),
            membership_fallbacks: retained.fallbacks().to_vec(),
            steps,
            verification: None,
        };
        if report.total_rows() == 0 {
            tracing::info!("nothing to delete, store already matches the keep set");
        }
        Ok((report, schema, retained))
    }
}

/// Principal census; expects the keep set to be staged already.
fn census<S: Session>(session: &S, schema: &ResolvedSchema) -> Result<PrincipalCensus, SweepError> {
    let store = |err| SweepError::before_plan(err, "principal census");
    let doomed = NotRetained::new(
        &schema.principal.table,
        &schema.principal.column,
        Owner::Principal,
    );
    let total = session
        .count_rows(&schema.principal.table)
        .map_err(store)?;
    let to_delete = session.count_matching(&doomed).map_err(store)?;
    let kept_present = session.count_retained(&doomed).map_err(store)?;
    let sample = session
        .sample_matching(&doomed, CENSUS_SAMPLE)
        .map_err(store)?;
    Ok(PrincipalCensus {
        total,
        kept_present,
        to_delete,
        sample,
    })
}
