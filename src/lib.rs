//! An embedded relational fulltext search backend built on SQLite.
//!
//! Items are stored in ordinary relational tables: one shared token table
//! for all fulltext fields, one dedicated table per structured field, and a
//! denormalized one-row-per-item table for sorting and cheap filtering.
//! Boolean/phrase keyword expressions and filter trees compile into plain
//! SQL, relevance scores decay with text length and scale with per-field
//! boosts, and facet counts and autocomplete suggestions are computed over
//! the same compiled queries. There is no native fulltext index underneath;
//! everything is hand-built relational querying.
//!
//! ```no_run
//! use searchlite::{Backend, FieldConfig, FieldType, FieldValue, IndexConfig, Query};
//!
//! # fn main() -> Result<(), searchlite::SearchError> {
//! let backend = Backend::open("search.db")?;
//! backend.add_index(
//!     &IndexConfig::new("articles")
//!         .field("title", FieldConfig::new(FieldType::Fulltext).with_boost(2.0))
//!         .field("body", FieldConfig::new(FieldType::Fulltext)),
//! )?;
//!
//! let mut values = searchlite::FieldValues::new();
//! values.insert("title".into(), vec![FieldValue::Text("Hello world".into())]);
//! backend.index_items("articles", &[("1".to_string(), values)])?;
//!
//! let results = backend.search(&Query::new("articles").keys_str("hello"))?;
//! for item in &results.items {
//!     println!("{} ({:.3})", item.item_id, item.score);
//! }
//! # Ok(())
//! # }
//! ```

mod autocomplete;
mod backend;
mod config;
mod db;
mod error;
mod facets;
mod query;
mod tokenizer;
mod values;

pub use autocomplete::{AutocompleteOptions, Suggestion};
pub use backend::Backend;
pub use config::{FieldConfig, FieldType, IndexConfig, IndexOptions, MatchMode};
pub use db::connection::DbPool;
pub use db::indexer::FieldValues;
pub use error::{SearchError, Warning};
pub use facets::{FacetOperator, FacetRequest, FacetValue};
pub use query::{
    Condition, Conjunction, FilterGroup, FilterNode, FilterValue, Keys, Operator, Query,
    QueryOptions, Range, ResultItem, ResultSet, Sort, SortDirection, SortKey,
};
pub use values::{FieldValue, ValueToken};
