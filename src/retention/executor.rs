use super::planner::{DeletionPlan, DeletionStep};
use super::report::StepOutcome;
use super::session::Session;
use crate::error::{StoreError, SweepError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Delete and commit once after the last step.
    Delete,
    /// Count what each step would delete, then roll back.
    CountOnly,
}

/// Run `plan` inside `session`, which must be an open transaction.
///
/// Either every step succeeds and the session commits once, or the session
/// is rolled back and the failing step is reported. In count-only mode the
/// session is always rolled back.
pub fn execute<S: Session>(
    session: S,
    plan: &DeletionPlan,
    mode: ExecutionMode,
) -> Result<Vec<StepOutcome>, SweepError> {
    let mut outcomes = Vec::with_capacity(plan.len());
    let mut last_completed = String::from("transaction start");

    for step in plan.steps() {
        let result = match mode {
            ExecutionMode::Delete => session.delete_matching(&step.predicate),
            ExecutionMode::CountOnly => session.count_matching(&step.predicate),
        };

        let rows = match result {
            Ok(rows) => rows,
            Err(err) => {
                tracing::error!("{step} failed: {err}");
                abort(session);
                return Err(step_failure(err, step, &last_completed));
            }
        };

        match mode {
            ExecutionMode::Delete if rows > 0 => {
                tracing::info!("✓ {}: deleted {rows} rows", step.table());
            }
            ExecutionMode::CountOnly if rows > 0 => {
                tracing::info!("{}: {rows} rows would be deleted", step.table());
            }
            _ => tracing::debug!("{}: nothing to delete", step.table()),
        }

        outcomes.push(StepOutcome {
            step: step.index,
            phase: step.phase,
            table: step.predicate.table.clone(),
            column: step.predicate.column.clone(),
            rows,
        });
        last_completed = step.to_string();
    }

    match mode {
        ExecutionMode::Delete => {
            session.commit().map_err(|err| SweepError::Connectivity {
                last_completed: format!("{last_completed} (commit failed)"),
                cause: err.to_string(),
            })?;
            tracing::info!("committed {} steps", outcomes.len());
        }
        ExecutionMode::CountOnly => {
            if let Err(err) = session.rollback() {
                tracing::warn!("dry run rollback reported: {err}");
            }
        }
    }

    Ok(outcomes)
}

fn abort<S: Session>(session: S) {
    match session.rollback() {
        Ok(()) => tracing::warn!("transaction rolled back, store unchanged"),
        // The transaction is discarded with the connection either way.
        Err(err) => tracing::warn!("rollback reported: {err}"),
    }
}

fn step_failure(err: StoreError, step: &DeletionStep, last_completed: &str) -> SweepError {
    match err {
        StoreError::Rejected(cause) => SweepError::ConstraintViolation {
            step: step.index,
            table: step.table().to_string(),
            cause,
        },
        StoreError::Unavailable(cause) => SweepError::Connectivity {
            last_completed: last_completed.to_string(),
            cause: format!("{step}: {cause}"),
        },
    }
}
