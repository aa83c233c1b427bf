//! Index and field configuration.
//!
//! An index owns a logical field set; the physical table layout is derived
//! from it by the schema manager. Configuration structs are serializable so
//! they can be persisted alongside the layout metadata.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SearchError;

/// Declared type of an indexed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Fulltext,
    String,
    Integer,
    Decimal,
    Boolean,
    Date,
}

impl FieldType {
    pub fn is_fulltext(self) -> bool {
        self == FieldType::Fulltext
    }

    /// SQL column type used for this field's denormalized column and, for
    /// non-fulltext fields, the value column of its dedicated table.
    /// The fulltext column only holds a short excerpt of the first value.
    pub(crate) fn sql_type(self) -> &'static str {
        match self {
            FieldType::Fulltext => "VARCHAR(30)",
            FieldType::String => "VARCHAR(255)",
            FieldType::Integer => "INTEGER",
            FieldType::Decimal => "NUMERIC(10, 5)",
            FieldType::Boolean => "INTEGER",
            FieldType::Date => "INTEGER",
        }
    }
}

/// Configuration of a single field within an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Relevance multiplier, only applied to fulltext fields.
    #[serde(default = "default_boost")]
    pub boost: f64,
}

fn default_boost() -> f64 {
    1.0
}

impl FieldConfig {
    pub fn new(field_type: FieldType) -> Self {
        FieldConfig {
            field_type,
            boost: default_boost(),
        }
    }

    pub fn with_boost(mut self, boost: f64) -> Self {
        self.boost = boost;
        self
    }
}

/// How keyword terms are matched against stored words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Exact word match.
    Words,
    /// The stored word starts with the term.
    Prefix,
    /// The term occurs anywhere within the stored word.
    Partial,
}

impl Default for MatchMode {
    fn default() -> Self {
        MatchMode::Words
    }
}

/// Index-level options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexOptions {
    /// Minimum word length; shorter tokens are neither indexed nor searched.
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
    #[serde(default)]
    pub matching: MatchMode,
}

fn default_min_chars() -> usize {
    1
}

impl Default for IndexOptions {
    fn default() -> Self {
        IndexOptions {
            min_chars: default_min_chars(),
            matching: MatchMode::default(),
        }
    }
}

/// Logical configuration of a search index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub id: String,
    /// Field ID to configuration. A BTreeMap keeps DDL generation and
    /// compiled queries deterministic.
    pub fields: BTreeMap<String, FieldConfig>,
    #[serde(default)]
    pub options: IndexOptions,
}

impl IndexConfig {
    pub fn new(id: impl Into<String>) -> Self {
        IndexConfig {
            id: id.into(),
            fields: BTreeMap::new(),
            options: IndexOptions::default(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, config: FieldConfig) -> Self {
        self.fields.insert(name.into(), config);
        self
    }

    pub fn options(mut self, options: IndexOptions) -> Self {
        self.options = options;
        self
    }

    /// IDs of all fulltext fields, in deterministic order.
    pub fn fulltext_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(_, f)| f.field_type.is_fulltext())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        if self.id.trim().is_empty() {
            return Err(SearchError::Backend("index id must not be empty".into()));
        }
        if !(1..=6).contains(&self.options.min_chars) {
            return Err(SearchError::Backend(format!(
                "minimum word length must be between 1 and 6, got {}",
                self.options.min_chars
            )));
        }
        for (name, field) in &self.fields {
            if name.trim().is_empty() {
                return Err(SearchError::Backend("field id must not be empty".into()));
            }
            if !field.boost.is_finite() || field.boost < 0.0 {
                return Err(SearchError::Backend(format!(
                    "boost for field '{}' must be a non-negative number",
                    name
                )));
            }
        }
        Ok(())
    }
}
