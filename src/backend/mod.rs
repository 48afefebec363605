//! Backend read interface: the query boundary between the dashboard core
//! and whatever relational service holds patient and appointment rows.
//!
//! A `Query` describes a projection over one table or view with `not null`
//! and equality filters, multi-key ordering, and a row limit. Backends
//! execute it either as a row fetch (`select`) or as a distinct count
//! (`count`). Two implementations ship with the crate:
//! - `postgrest::PostgrestBackend`: hosted PostgREST / Supabase project
//! - `db::SqliteBackend`: local SQLite file or in-memory database

pub mod postgrest;

use std::future::Future;

use serde_json::Value;
use thiserror::Error;

use crate::db::DatabaseError;

pub use postgrest::PostgrestBackend;

/// One result row: column name → JSON value.
pub type Row = serde_json::Map<String, Value>;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Response decoding failed: {0}")]
    Decode(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<rusqlite::Error> for BackendError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::from(e))
    }
}

// ---------------------------------------------------------------------------
// Query description
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    NotNull(String),
    Eq(String, Value),
}

impl Filter {
    pub fn column(&self) -> &str {
        match self {
            Self::NotNull(c) | Self::Eq(c, _) => c,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    pub columns: Vec<String>,
    pub filters: Vec<Filter>,
    pub order: Vec<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn not_null(mut self, column: impl Into<String>) -> Self {
        self.filters.push(Filter::NotNull(column.into()));
        self
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(column.into(), value.into()));
        self
    }

    pub fn order_desc(mut self, column: impl Into<String>) -> Self {
        self.order.push(OrderBy {
            column: column.into(),
            descending: true,
        });
        self
    }

    pub fn order_asc(mut self, column: impl Into<String>) -> Self {
        self.order.push(OrderBy {
            column: column.into(),
            descending: false,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Reject identifiers that cannot be passed through to a backend verbatim.
    pub fn validate(&self) -> Result<(), BackendError> {
        validate_identifier(&self.table)?;
        for column in &self.columns {
            validate_identifier(column)?;
        }
        for filter in &self.filters {
            validate_identifier(filter.column())?;
        }
        for order in &self.order {
            validate_identifier(&order.column)?;
        }
        Ok(())
    }
}

/// Identifiers must match `[A-Za-z_][A-Za-z0-9_]*`.
pub fn validate_identifier(name: &str) -> Result<(), BackendError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(BackendError::InvalidQuery(format!("invalid identifier '{name}'")))
    }
}

// ---------------------------------------------------------------------------
// Backend trait
// ---------------------------------------------------------------------------

/// Read-only access to the dashboard's source tables.
pub trait DashboardBackend: Send + Sync + 'static {
    /// Fetch rows matching the query, honoring projection, filters, order and limit.
    fn select(&self, query: &Query) -> impl Future<Output = Result<Vec<Row>, BackendError>> + Send;

    /// Count the filtered rows keyed by the query's first projected column.
    ///
    /// Callers project a key column (one distinct value per row), so a row
    /// count and a distinct count agree. Implementations may return either.
    /// Order and limit are ignored.
    fn count(&self, query: &Query) -> impl Future<Output = Result<u64, BackendError>> + Send;
}
