//! Error taxonomy for the search backend.
//!
//! Every failure crossing the public boundary is a typed domain error; raw
//! store driver errors are wrapped so callers stay store-agnostic.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("unknown field: {0}")]
    InvalidField(String),
    #[error("field '{field}' cannot be used here: a {expected} field is required")]
    InvalidFieldType { field: String, expected: &'static str },
    #[error("invalid operator '{operator}' for field '{field}'")]
    InvalidOperator { field: String, operator: String },
    #[error("failed to index item '{item_id}': {message}")]
    Indexing { item_id: String, message: String },
    #[error("backend error: {0}")]
    Backend(String),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A non-fatal problem detected while building or running a query.
///
/// Warnings accumulate on the result set and never abort a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub message: String,
}

impl Warning {
    pub fn new(message: impl Into<String>) -> Self {
        Warning {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}
