//! SQLite implementation of the dashboard backend interface.
//!
//! Queries run on the blocking pool against a shared connection; the schema
//! is the one created by `run_migrations` (patients, appointments and the
//! `appointment_details` view).

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde_json::{Number, Value};

use super::{open_database, DatabaseError};
use crate::backend::{BackendError, DashboardBackend, Filter, Query, Row};

#[derive(Clone)]
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    /// Wrap an already-migrated connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Open (and migrate) the database file at `path`.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::new(open_database(path)?))
    }

    /// Run a closure against the underlying connection (seeding, maintenance).
    pub fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }

    async fn run_blocking<T, F>(&self, f: F) -> Result<T, BackendError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, BackendError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
            f(&guard)
        })
        .await
        .map_err(|e| BackendError::Task(e.to_string()))?
    }
}

impl DashboardBackend for SqliteBackend {
    async fn select(&self, query: &Query) -> Result<Vec<Row>, BackendError> {
        query.validate()?;
        let query = query.clone();
        self.run_blocking(move |conn| select_rows(conn, &query)).await
    }

    async fn count(&self, query: &Query) -> Result<u64, BackendError> {
        query.validate()?;
        let query = query.clone();
        self.run_blocking(move |conn| count_rows(conn, &query)).await
    }
}

// ---------------------------------------------------------------------------
// SQL rendering
// ---------------------------------------------------------------------------

fn quote(ident: &str) -> String {
    format!("\"{ident}\"")
}

/// WHERE clause and its bound parameters.
fn where_clause(query: &Query) -> (String, Vec<SqlValue>) {
    let mut clauses = Vec::new();
    let mut params = Vec::new();

    for filter in &query.filters {
        match filter {
            Filter::NotNull(col) => clauses.push(format!("{} IS NOT NULL", quote(col))),
            Filter::Eq(col, value) => {
                params.push(to_sql_value(value));
                clauses.push(format!("{} = ?{}", quote(col), params.len()));
            }
        }
    }

    if clauses.is_empty() {
        (String::new(), params)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), params)
    }
}

pub(crate) fn select_sql(query: &Query) -> (String, Vec<SqlValue>) {
    let projection = if query.columns.is_empty() {
        "*".to_string()
    } else {
        query
            .columns
            .iter()
            .map(|c| quote(c))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let (filters, params) = where_clause(query);
    let mut sql = format!("SELECT {projection} FROM {}{filters}", quote(&query.table));

    if !query.order.is_empty() {
        let order = query
            .order
            .iter()
            .map(|o| {
                format!(
                    "{} {}",
                    quote(&o.column),
                    if o.descending { "DESC" } else { "ASC" }
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&format!(" ORDER BY {order}"));
    }

    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    (sql, params)
}

pub(crate) fn count_sql(query: &Query) -> (String, Vec<SqlValue>) {
    let target = match query.columns.first() {
        Some(col) => format!("COUNT(DISTINCT {})", quote(col)),
        None => "COUNT(*)".to_string(),
    };
    let (filters, params) = where_clause(query);
    (
        format!("SELECT {target} FROM {}{filters}", quote(&query.table)),
        params,
    )
}

fn select_rows(conn: &Connection, query: &Query) -> Result<Vec<Row>, BackendError> {
    let (sql, params) = select_sql(query);
    let mut stmt = conn.prepare(&sql)?;
    let names: Vec<String> = stmt.column_names().iter().map(|n| n.to_string()).collect();

    let rows = stmt.query_map(params_from_iter(params), |row| {
        let mut out = Row::new();
        for (idx, name) in names.iter().enumerate() {
            out.insert(name.clone(), to_json(row.get_ref(idx)?));
        }
        Ok(out)
    })?;

    rows.collect::<Result<Vec<_>, _>>().map_err(BackendError::from)
}

fn count_rows(conn: &Connection, query: &Query) -> Result<u64, BackendError> {
    let (sql, params) = count_sql(query);
    let count: i64 = conn.query_row(&sql, params_from_iter(params), |row| row.get(0))?;
    Ok(count.max(0) as u64)
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}
