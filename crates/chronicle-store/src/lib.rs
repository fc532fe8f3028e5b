//! Chronicle Storage Layer
//!
//! Implements the [`GraphStore`] trait on SQLite. Domain entities live in
//! `nodes`/`edges`; the provenance history lives in `commits`, `actions`,
//! `entity_versions` and `edge_facts` (see `schema.sql`).
//!
//! Queries use SQLite syntax with named `:param` placeholders. Parameters
//! the statement does not reference are ignored; parameters it references but
//! the caller did not supply are an error.
//!
//! # Examples
//!
//! ```no_run
//! use chronicle_domain::{params, AccessMode, GraphStore};
//! use chronicle_store::SqliteGraphStore;
//!
//! let store = SqliteGraphStore::in_memory().unwrap();
//! let rows = store
//!     .run("SELECT id FROM nodes WHERE org_id = :org_id", params!(), AccessMode::Read, Some("o1"))
//!     .unwrap();
//! assert!(rows.is_empty());
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod retry;

pub use config::{ConfigError, RetryConfig, StoreConfig};
pub use error::StoreError;
pub use retry::RetryingStore;

use chronicle_domain::{AccessMode, GraphStore, Params, Record, RecordSet, Statement, TxOutcome};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, TransactionBehavior};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite-based implementation of [`GraphStore`]
///
/// The connection sits behind a mutex so one store can be shared between the
/// ledger, the rule engine and orchestrator workers.
pub struct SqliteGraphStore {
    conn: Mutex<Connection>,
}

impl SqliteGraphStore {
    /// Open (or create) a store at the given database path
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Fresh in-memory store
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    /// Open a store as described by configuration
    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        let conn = if config.path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(&config.path)?
        };
        conn.busy_timeout(config.busy_timeout())?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<(), StoreError> {
        let schema = include_str!("schema.sql");
        self.lock()?.execute_batch(schema)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Lock)
    }

    /// Merge the tenant id into the parameter map
    fn scoped_params(mut params: Params, org_id: Option<&str>) -> Params {
        if let Some(org_id) = org_id {
            params
                .entry("org_id")
                .or_insert_with(|| Value::String(org_id.to_string()));
        }
        params
    }

    /// Prepare, bind and step one statement, collecting every row
    fn execute_statement(
        conn: &Connection,
        query: &str,
        params: &Params,
        mode: AccessMode,
    ) -> Result<RecordSet, StoreError> {
        let mut stmt = conn.prepare(query)?;

        if mode == AccessMode::Read && !stmt.readonly() {
            return Err(StoreError::AccessMode(query.trim().to_string()));
        }

        for index in 1..=stmt.parameter_count() {
            let name = stmt
                .parameter_name(index)
                .ok_or_else(|| StoreError::InvalidData(format!("Positional parameter {} not supported", index)))?
                .to_string();
            let value = params
                .get(name.trim_start_matches([':', '$', '@']))
                .ok_or_else(|| StoreError::MissingParameter(name.clone()))?;
            stmt.raw_bind_parameter(index, Self::to_sql_value(value))?;
        }

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.raw_query();
        let mut records = Vec::new();

        while let Some(row) = rows.next()? {
            let mut record = Record::new();
            for (index, column) in columns.iter().enumerate() {
                record.insert(column.clone(), Self::from_sql_ref(row.get_ref(index)?));
            }
            records.push(record);
        }

        Ok(RecordSet::new(records))
    }

    /// Convert a JSON parameter into an SQLite value
    ///
    /// Arrays and objects are stored as JSON text.
    fn to_sql_value(value: &Value) -> SqlValue {
        match value {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlValue::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    SqlValue::Real(f)
                } else {
                    SqlValue::Text(n.to_string())
                }
            }
            Value::String(s) => SqlValue::Text(s.clone()),
            other => SqlValue::Text(other.to_string()),
        }
    }

    /// Convert an SQLite column value into JSON
    fn from_sql_ref(value: ValueRef<'_>) -> Value {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::from(i),
            ValueRef::Real(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
        }
    }
}

impl GraphStore for SqliteGraphStore {
    type Error = StoreError;

    fn run(
        &self,
        query: &str,
        params: Params,
        mode: AccessMode,
        org_id: Option<&str>,
    ) -> Result<RecordSet, Self::Error> {
        let params = Self::scoped_params(params, org_id);
        let conn = self.lock()?;
        Self::execute_statement(&conn, query, &params, mode)
    }

    fn run_in_transaction(
        &self,
        statements: Vec<Statement>,
        org_id: Option<&str>,
    ) -> Result<TxOutcome, Self::Error> {
        let mut conn = self.lock()?;
        // Take the write lock up front so concurrent writers serialize here
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut results = Vec::with_capacity(statements.len());

        for (index, statement) in statements.into_iter().enumerate() {
            let params = Self::scoped_params(statement.params, org_id);
            let set = Self::execute_statement(&tx, &statement.query, &params, AccessMode::Write)?;

            if statement.require_rows && set.is_empty() {
                tx.rollback()?;
                tracing::debug!("Transaction aborted by guard statement {}", index);
                return Ok(TxOutcome::Aborted { statement: index });
            }
            results.push(set);
        }

        tx.commit()?;
        Ok(TxOutcome::Committed(results))
    }
}
