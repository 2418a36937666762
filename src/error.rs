use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Errors that end a retention run.
///
/// Every variant is fatal: the transaction (if one was opened) has been
/// rolled back by the time the caller sees it. Recoverable conditions are
/// modelled separately as [`SchemaMismatch`] (skipped specs) and
/// [`crate::retention::VerificationWarning`] (post-commit diagnostics).
#[derive(Debug, Error)]
pub enum SweepError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Schema descriptor ───────────────────────────────────────────────
    #[error("descriptor: {0}")]
    Descriptor(#[from] DescriptorError),

    // ── Keep set ────────────────────────────────────────────────────────
    #[error("keep set: {0}")]
    KeepSet(#[from] KeepSetError),

    // ── Store rejected a deletion ───────────────────────────────────────
    #[error("constraint violation at step {step} ({table}): {cause}")]
    ConstraintViolation {
        step: usize,
        table: String,
        cause: String,
    },

    // ── Session lost / store unreachable ────────────────────────────────
    #[error("connectivity failure (last completed: {last_completed}): {cause}")]
    Connectivity {
        last_completed: String,
        cause: String,
    },

    // ── Schema preconditions ────────────────────────────────────────────
    #[error("principal table {table}.{column} not found in store")]
    PrincipalTableMissing { table: String, column: String },

    #[error(
        "membership relation {table} for tier {tier} is missing; \
         refusing to treat every {tier} entity as unreferenced \
         (set membership_fallback = \"purge\" to override)"
    )]
    MissingMembership { tier: String, table: String },

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SweepError {
    /// Wrap a store failure raised before any deletion step ran.
    pub(crate) fn before_plan(err: StoreError, stage: &str) -> Self {
        match err {
            StoreError::Unavailable(cause) => Self::Connectivity {
                last_completed: stage.to_string(),
                cause,
            },
            StoreError::Rejected(cause) => Self::ConstraintViolation {
                step: 0,
                table: stage.to_string(),
                cause,
            },
        }
    }
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Descriptor errors ───────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("schema version must not be empty")]
    MissingVersion,

    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),

    #[error("duplicate tier name {0:?}")]
    DuplicateTier(String),

    #[error("tier name {0:?} is reserved")]
    ReservedTier(String),

    #[error("tier {tier:?} references unknown or later-declared parent {parent:?}")]
    UnknownParent { tier: String, parent: String },
}

// ─── Keep set errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeepSetError {
    #[error("keep set must name at least one principal")]
    Empty,

    #[error("principal identifiers must not be blank")]
    BlankPrincipal,
}

// ─── Store errors ────────────────────────────────────────────────────────────

/// Failure raised by a [`crate::retention::Session`] implementation.
///
/// The split mirrors the run-level taxonomy: `Unavailable` means the
/// session itself is unusable, `Rejected` means the store refused one
/// statement.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store rejected statement: {0}")]
    Rejected(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match &err {
            rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
                ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::SystemIoFailure
                | ErrorCode::CannotOpen
                | ErrorCode::NotADatabase
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::PermissionDenied
                | ErrorCode::ReadOnly
                | ErrorCode::OutOfMemory
                | ErrorCode::DiskFull => Self::Unavailable(err.to_string()),
                _ => Self::Rejected(err.to_string()),
            },
            _ => Self::Rejected(err.to_string()),
        }
    }
}

// ─── Schema mismatches (recoverable) ─────────────────────────────────────────

/// A declared table or column that the live store does not have.
///
/// Never fatal for owned and content specs: the spec is skipped for this run.
#[derive(Debug, Error, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaMismatch {
    #[error("table {table} does not exist")]
    MissingTable { table: String },

    #[error("column {table}.{column} does not exist")]
    MissingColumn { table: String, column: String },
}

impl SchemaMismatch {
    pub fn table(&self) -> &str {
        match self {
            Self::MissingTable { table } | Self::MissingColumn { table, .. } => table,
        }
    }
}
