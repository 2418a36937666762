use super::descriptor::{Owner, PrincipalSpec, TableSpec, quote_ident};
use super::predicate::{
    CREATE_STAGE_SQL, NotRetained, Orphans, RetainedMembers, STAGE_TABLE, stage_principals_sql,
};
use crate::error::StoreError;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection, OpenFlags, Transaction, TransactionBehavior, params};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A surviving principal with the status columns the descriptor asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrincipalRow {
    pub id: String,
    pub status: Vec<(String, String)>,
}

/// Transactional view of a store, handed explicitly to every component.
///
/// Everything a run does to the store goes through this trait. Dropping an
/// implementation without calling [`Session::commit`] must discard all of
/// its changes.
pub trait Session {
    fn table_exists(&self, table: &str) -> Result<bool, StoreError>;

    fn table_columns(&self, table: &str) -> Result<Vec<String>, StoreError>;

    /// Replace the principal set with the keep ids and every stored
    /// principal value they name.
    fn stage_keep(&self, principal: &PrincipalSpec, ids: &BTreeSet<String>) -> Result<(), StoreError>;

    /// Replace the set of `members.tier` with the entities that membership
    /// ties to a retained parent, staged as both tables store them. Returns
    /// how many distinct entities that is.
    fn stage_members(
        &self,
        members: &RetainedMembers,
        entity: Option<&TableSpec>,
    ) -> Result<u64, StoreError>;

    /// Exact stored values staged for `owner`.
    fn staged(&self, owner: &Owner) -> Result<Vec<Value>, StoreError>;

    /// Replace the set of `owner` with previously staged values.
    fn restage(&self, owner: &Owner, values: &[Value]) -> Result<(), StoreError>;

    fn count_rows(&self, table: &str) -> Result<u64, StoreError>;

    fn count_matching(&self, predicate: &NotRetained) -> Result<u64, StoreError>;

    fn count_retained(&self, predicate: &NotRetained) -> Result<u64, StoreError>;

    fn delete_matching(&self, predicate: &NotRetained) -> Result<u64, StoreError>;

    fn sample_matching(
        &self,
        predicate: &NotRetained,
        limit: usize,
    ) -> Result<Vec<String>, StoreError>;

    fn count_unbacked(&self, members: &RetainedMembers, entity: &TableSpec) -> Result<u64, StoreError>;

    fn count_orphans(&self, orphans: &Orphans) -> Result<u64, StoreError>;

    fn principal_rows(
        &self,
        spec: &PrincipalSpec,
        status_columns: &[String],
    ) -> Result<Vec<PrincipalRow>, StoreError>;

    fn commit(self) -> Result<(), StoreError>
    where
        Self: Sized;

    fn rollback(self) -> Result<(), StoreError>
    where
        Self: Sized;
}

#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    pub busy_timeout: Duration,
    pub enforce_foreign_keys: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_millis(5_000),
            enforce_foreign_keys: true,
        }
    }
}

/// An existing SQLite database file.
pub struct SqliteStore {
    conn: Connection,
    path: PathBuf,
}

impl SqliteStore {
    /// Open an existing database. Never creates one: a missing file is a
    /// connectivity failure, not an empty store.
    pub fn open(path: &Path, options: StoreOptions) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|err| StoreError::Unavailable(format!("{}: {err}", path.display())))?;
        conn.busy_timeout(options.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", options.enforce_foreign_keys)?;
        // Fail here rather than mid-run if the file is not a database.
        conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        })
        .map_err(|err| StoreError::Unavailable(format!("{}: {err}", path.display())))?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot the whole database into `dest` with `VACUUM INTO`.
    pub fn backup_to(&self, dest: &Path) -> Result<(), StoreError> {
        if dest.exists() {
            return Err(StoreError::Rejected(format!(
                "backup target {} already exists",
                dest.display()
            )));
        }
        self.conn
            .execute("VACUUM INTO ?1", params![dest.to_string_lossy()])?;
        Ok(())
    }

    /// Begin the write transaction a run executes in. Takes the write lock
    /// up front so the run cannot fail halfway on lock upgrade.
    pub fn begin(&mut self) -> Result<SqliteSession<'_>, StoreError> {
        self.begin_with(TransactionBehavior::Immediate)
    }

    /// Begin a read session; it is always rolled back.
    pub fn begin_read(&mut self) -> Result<SqliteSession<'_>, StoreError> {
        self.begin_with(TransactionBehavior::Deferred)
    }

    fn begin_with(&mut self, behavior: TransactionBehavior) -> Result<SqliteSession<'_>, StoreError> {
        let tx = self
            .conn
            .transaction_with_behavior(behavior)
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;
        tx.execute_batch(CREATE_STAGE_SQL)?;
        Ok(SqliteSession { tx })
    }
}

pub struct SqliteSession<'c> {
    tx: Transaction<'c>,
}

impl SqliteSession<'_> {
    fn clear(&self, scope: &str) -> Result<(), StoreError> {
        self.tx.execute(
            &format!("DELETE FROM {STAGE_TABLE} WHERE scope = ?1"),
            params![scope],
        )?;
        Ok(())
    }

    /// Add the integer twin of every canonical integer text id and the text
    /// twin of every integer id, so columns without affinity match either.
    fn widen(&self, scope: &str) -> Result<(), StoreError> {
        self.tx.execute(
            &format!(
                "INSERT OR IGNORE INTO {STAGE_TABLE} (scope, id)
                 SELECT scope, CAST(id AS INTEGER) FROM {STAGE_TABLE}
                 WHERE scope = ?1 AND typeof(id) = 'text'
                   AND CAST(CAST(id AS INTEGER) AS TEXT) = id"
            ),
            params![scope],
        )?;
        self.tx.execute(
            &format!(
                "INSERT OR IGNORE INTO {STAGE_TABLE} (scope, id)
                 SELECT scope, CAST(id AS TEXT) FROM {STAGE_TABLE}
                 WHERE scope = ?1 AND typeof(id) = 'integer'"
            ),
            params![scope],
        )?;
        Ok(())
    }
}

fn value_to_id(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(n) => Some(n.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

fn to_count(raw: i64) -> u64 {
    u64::try_from(raw).unwrap_or(0)
}

impl Session for SqliteSession<'_> {
    fn table_exists(&self, table: &str) -> Result<bool, StoreError> {
        let count: i64 = self.tx.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
            params![table],
            |row| row.get(0),
        )?;
        Ok(count == 1)
    }

    fn table_columns(&self, table: &str) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .tx
            .prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
        let mut columns = Vec::new();
        for row in rows {
            columns.push(row?);
        }
        Ok(columns)
    }

    fn stage_keep(&self, principal: &PrincipalSpec, ids: &BTreeSet<String>) -> Result<(), StoreError> {
        let scope = Owner::Principal.scope_key();
        self.clear(&scope)?;
        {
            let mut insert = self.tx.prepare_cached(&format!(
                "INSERT OR IGNORE INTO {STAGE_TABLE} (scope, id) VALUES (?1, ?2)"
            ))?;
            for id in ids {
                insert.execute(params![scope, id])?;
            }
        }
        let spec = TableSpec::new(&principal.table, &principal.column);
        self.tx.execute(&stage_principals_sql(&spec), params![scope])?;
        self.widen(&scope)
    }

    fn stage_members(
        &self,
        members: &RetainedMembers,
        entity: Option<&TableSpec>,
    ) -> Result<u64, StoreError> {
        let (scope, parent) = members.scopes();
        self.clear(&scope)?;
        self.tx
            .execute(&members.stage_from_membership_sql(), params![scope, parent])?;
        if let Some(entity) = entity {
            self.tx
                .execute(&members.stage_from_entity_sql(entity), params![scope, parent])?;
        }
        self.widen(&scope)?;
        let count: i64 = self
            .tx
            .query_row(&members.count_sql(), params![scope, parent], |row| row.get(0))?;
        Ok(to_count(count))
    }

    fn staged(&self, owner: &Owner) -> Result<Vec<Value>, StoreError> {
        let mut stmt = self.tx.prepare(&format!(
            "SELECT id FROM {STAGE_TABLE} WHERE scope = ?1"
        ))?;
        let rows = stmt.query_map(params![owner.scope_key()], |row| row.get::<_, Value>(0))?;
        let mut values = Vec::new();
        for row in rows {
            values.push(row?);
        }
        Ok(values)
    }

    fn restage(&self, owner: &Owner, values: &[Value]) -> Result<(), StoreError> {
        let scope = owner.scope_key();
        self.clear(&scope)?;
        let mut insert = self.tx.prepare_cached(&format!(
            "INSERT OR IGNORE INTO {STAGE_TABLE} (scope, id) VALUES (?1, ?2)"
        ))?;
        for value in values {
            insert.execute(params![scope, value])?;
        }
        Ok(())
    }

    fn count_rows(&self, table: &str) -> Result<u64, StoreError> {
        let count: i64 = self.tx.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
            [],
            |row| row.get(0),
        )?;
        Ok(to_count(count))
    }

    fn count_matching(&self, predicate: &NotRetained) -> Result<u64, StoreError> {
        let count: i64 = self.tx.query_row(
            &predicate.count_sql(),
            params![predicate.scope()],
            |row| row.get(0),
        )?;
        Ok(to_count(count))
    }

    fn count_retained(&self, predicate: &NotRetained) -> Result<u64, StoreError> {
        let count: i64 = self.tx.query_row(
            &predicate.retained_count_sql(),
            params![predicate.scope()],
            |row| row.get(0),
        )?;
        Ok(to_count(count))
    }

    fn delete_matching(&self, predicate: &NotRetained) -> Result<u64, StoreError> {
        let affected = self
            .tx
            .execute(&predicate.delete_sql(), params![predicate.scope()])?;
        Ok(u64::try_from(affected).unwrap_or(0))
    }

    fn sample_matching(
        &self,
        predicate: &NotRetained,
        limit: usize,
    ) -> Result<Vec<String>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.tx.prepare(&predicate.sample_sql())?;
        let mut rows = stmt.query(params![predicate.scope(), limit])?;
        let mut sample = Vec::new();
        while let Some(row) = rows.next()? {
            if let Some(id) = value_to_id(row.get_ref(0)?) {
                sample.push(id);
            }
        }
        Ok(sample)
    }

    fn count_unbacked(&self, members: &RetainedMembers, entity: &TableSpec) -> Result<u64, StoreError> {
        let (scope, parent) = members.scopes();
        let count: i64 = self.tx.query_row(
            &members.unbacked_sql(entity),
            params![scope, parent],
            |row| row.get(0),
        )?;
        Ok(to_count(count))
    }

    fn count_orphans(&self, orphans: &Orphans) -> Result<u64, StoreError> {
        let count: i64 = self
            .tx
            .query_row(&orphans.count_sql(), [], |row| row.get(0))?;
        Ok(to_count(count))
    }

    fn principal_rows(
        &self,
        spec: &PrincipalSpec,
        status_columns: &[String],
    ) -> Result<Vec<PrincipalRow>, StoreError> {
        let mut select = vec![quote_ident(&spec.column)];
        select.extend(status_columns.iter().map(|column| quote_ident(column)));
        let sql = format!(
            "SELECT {} FROM {} ORDER BY {}",
            select.join(", "),
            quote_ident(&spec.table),
            quote_ident(&spec.column),
        );

        let mut stmt = self.tx.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut principals = Vec::new();
        while let Some(row) = rows.next()? {
            let Some(id) = value_to_id(row.get_ref(0)?) else {
                continue;
            };
            let mut status = Vec::with_capacity(status_columns.len());
            for (offset, column) in status_columns.iter().enumerate() {
                let value = value_to_id(row.get_ref(offset + 1)?).unwrap_or_else(|| "null".into());
                status.push((column.clone(), value));
            }
            principals.push(PrincipalRow { id, status });
        }
        Ok(principals)
    }

    fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .map_err(|err| StoreError::Unavailable(err.to_string()))
    }

    fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback()?;
        Ok(())
    }
}
