//! Search queries and result sets.

pub mod filter;
pub mod keys;

pub(crate) mod compiler;
pub(crate) mod executor;
pub(crate) mod sql;

use std::collections::HashMap;

pub use filter::{Condition, FilterGroup, FilterNode, FilterValue, Operator};
pub use keys::{Conjunction, Keys};

use crate::error::Warning;
use crate::facets::{FacetRequest, FacetValue};

/// What a result list is ordered by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    /// The computed relevance score.
    Relevance,
    /// The item identifier.
    ItemId,
    /// A configured field, resolved through the denormalized table.
    Field(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub(crate) fn sql(self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }

    /// Parse a direction string. Unknown input defaults to ascending with a
    /// warning rather than failing the query.
    pub fn parse(s: &str) -> (SortDirection, Option<Warning>) {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => (SortDirection::Ascending, None),
            "desc" | "descending" => (SortDirection::Descending, None),
            other => (
                SortDirection::Ascending,
                Some(Warning::new(format!(
                    "unknown sort order '{}', using ascending",
                    other
                ))),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub key: SortKey,
    pub direction: SortDirection,
}

/// Offset and limit of the returned page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub offset: u64,
    pub limit: u64,
}

/// Option bag of one query.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Skip the count query; the result count is then derived from the page.
    pub skip_result_count: bool,
    /// Conjunction applied when parsing a bare keyword string.
    pub conjunction: Conjunction,
    pub facets: Vec<FacetRequest>,
}

/// One search over one index. Immutable once built; compiling it twice
/// produces identical results.
#[derive(Debug, Clone)]
pub struct Query {
    pub index_id: String,
    pub keys: Option<Keys>,
    /// Fulltext fields to search; `None` means all of them.
    pub fulltext_fields: Option<Vec<String>>,
    pub filter: FilterGroup,
    pub sorts: Vec<Sort>,
    pub range: Option<Range>,
    pub options: QueryOptions,
}

impl Query {
    pub fn new(index_id: impl Into<String>) -> Self {
        Query {
            index_id: index_id.into(),
            keys: None,
            fulltext_fields: None,
            filter: FilterGroup::default(),
            sorts: Vec::new(),
            range: None,
            options: QueryOptions::default(),
        }
    }

    pub fn keys(mut self, keys: Keys) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Parse `input` as the keyword string, using the configured default
    /// conjunction.
    pub fn keys_str(mut self, input: &str) -> Self {
        self.keys = Keys::parse(input, self.options.conjunction);
        self
    }

    pub fn fulltext_fields(mut self, fields: Vec<String>) -> Self {
        self.fulltext_fields = Some(fields);
        self
    }

    pub fn filter(mut self, filter: FilterGroup) -> Self {
        self.filter = filter;
        self
    }

    pub fn sort(mut self, key: SortKey, direction: SortDirection) -> Self {
        self.sorts.push(Sort { key, direction });
        self
    }

    pub fn range(mut self, offset: u64, limit: u64) -> Self {
        self.range = Some(Range { offset, limit });
        self
    }

    pub fn facet(mut self, request: FacetRequest) -> Self {
        self.options.facets.push(request);
        self
    }

    pub fn skip_result_count(mut self, skip: bool) -> Self {
        self.options.skip_result_count = skip;
        self
    }
}

/// One matched item.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultItem {
    pub item_id: String,
    pub score: f64,
}

/// Outcome of an executed query.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub items: Vec<ResultItem>,
    pub result_count: u64,
    pub warnings: Vec<Warning>,
    /// Keyword terms dropped for being shorter than the minimum word length.
    pub ignored_keys: Vec<String>,
    pub facets: HashMap<String, Vec<FacetValue>>,
}
