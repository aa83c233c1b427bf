//! Facet computation: grouped counts per field over a query's result set.
//!
//! The compiled query's item IDs are materialized into a temporary table
//! once, then each requested facet joins its field table (or the shared text
//! table, for fulltext fields) against that set. OR facets instead recompute
//! the query with the facet's own filter conditions excluded, so the counts
//! show alternatives unconstrained by the current selection.

use std::collections::{HashMap, HashSet};

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use uuid::Uuid;

use crate::db::schema::IndexLayout;
use crate::error::SearchError;
use crate::query::executor::{self, CompiledQuery};
use crate::query::Query;

/// How a facet relates to the query's own filters on its field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetOperator {
    /// Count within the current result set.
    And,
    /// Recompute the result set without this facet's own conditions
    /// (tagged `facet:<field>`) before counting.
    Or,
}

/// A request for one facet.
#[derive(Debug, Clone, PartialEq)]
pub struct FacetRequest {
    pub field: String,
    /// Maximum number of buckets; `None` means unlimited.
    pub limit: Option<usize>,
    /// Buckets with fewer results are dropped. Zero additionally reports
    /// indexed-but-unmatched values as zero-count buckets.
    pub min_count: u64,
    /// Report a bucket for items with no value for this field.
    pub missing: bool,
    pub operator: FacetOperator,
}

impl FacetRequest {
    pub fn new(field: impl Into<String>) -> Self {
        FacetRequest {
            field: field.into(),
            limit: Some(10),
            min_count: 1,
            missing: false,
            operator: FacetOperator::And,
        }
    }

    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn min_count(mut self, min_count: u64) -> Self {
        self.min_count = min_count;
        self
    }

    pub fn missing(mut self, missing: bool) -> Self {
        self.missing = missing;
        self
    }

    pub fn operator(mut self, operator: FacetOperator) -> Self {
        self.operator = operator;
        self
    }
}

/// One facet bucket. `value` is `None` for the missing bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetValue {
    pub value: Option<String>,
    pub count: u64,
}

/// Compute all requested facets for an executed query.
pub(crate) fn compute_facets(
    conn: &Connection,
    layout: &IndexLayout,
    query: &Query,
    compiled: &CompiledQuery,
    requests: &[FacetRequest],
) -> Result<HashMap<String, Vec<FacetValue>>, SearchError> {
    let ids = compiled.item_ids_select()?.render();
    let temp_table = format!("searchlite_facets_{}", Uuid::new_v4().simple());
    conn.execute(
        &format!(
            "CREATE TEMPORARY TABLE {} AS SELECT DISTINCT item_id FROM ({}) src",
            temp_table, ids.sql
        ),
        params_from_iter(ids.params.iter()),
    )?;

    let result = compute_all(conn, layout, query, requests, &temp_table);

    // temp tables are connection-scoped, but queries can be long-lived on a
    // pooled connection
    let _ = conn.execute_batch(&format!("DROP TABLE IF EXISTS {};", temp_table));
    result
}

fn compute_all(
    conn: &Connection,
    layout: &IndexLayout,
    query: &Query,
    requests: &[FacetRequest],
    temp_table: &str,
) -> Result<HashMap<String, Vec<FacetValue>>, SearchError> {
    let mut facets = HashMap::new();
    for request in requests {
        let buckets = compute_one(conn, layout, query, request, temp_table)?;
        facets.insert(request.field.clone(), buckets);
    }
    Ok(facets)
}

fn compute_one(
    conn: &Connection,
    layout: &IndexLayout,
    query: &Query,
    request: &FacetRequest,
    temp_table: &str,
) -> Result<Vec<FacetValue>, SearchError> {
    let field = layout.field(&request.field)?;
    let (source_table, value_column, field_filter) = if field.field_type.is_fulltext() {
        let text_table = layout.text_table.as_deref().ok_or_else(|| {
            SearchError::Backend("index has no fulltext storage".into())
        })?;
        (text_table, "word", Some(request.field.as_str()))
    } else {
        let table = field.table.as_deref().ok_or_else(|| {
            SearchError::Backend(format!("field '{}' has no value table", request.field))
        })?;
        (table, "value", None)
    };

    let (base_from, base_params) = match request.operator {
        FacetOperator::And => (temp_table.to_string(), Vec::new()),
        FacetOperator::Or => {
            let mut excluded = HashSet::new();
            excluded.insert(format!("facet:{}", request.field));
            let alternative = executor::compile(layout, query, &excluded)?;
            let ids = alternative.item_ids_select()?.render();
            (
                format!("(SELECT DISTINCT item_id FROM ({}) src)", ids.sql),
                ids.params,
            )
        }
    };

    let join = if request.missing {
        "LEFT JOIN"
    } else {
        "INNER JOIN"
    };
    let mut sql = format!(
        "SELECT f.{col} AS value, COUNT(DISTINCT t.item_id) AS num \
         FROM {base} t {join} {src} f ON f.item_id = t.item_id",
        col = value_column,
        base = base_from,
        join = join,
        src = source_table,
    );
    let mut params: Vec<Value> = base_params;
    if let Some(field_name) = field_filter {
        sql.push_str(" AND f.field_name = ?");
        params.push(Value::Text(field_name.to_string()));
    }
    sql.push_str(&format!(" GROUP BY f.{}", value_column));
    if request.min_count > 1 {
        sql.push_str(&format!(
            " HAVING COUNT(DISTINCT t.item_id) >= {}",
            request.min_count
        ));
    }
    sql.push_str(" ORDER BY num DESC, value ASC");
    if let Some(limit) = request.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
        let value: Value = row.get(0)?;
        let count: i64 = row.get(1)?;
        Ok((value, count))
    })?;
    let mut buckets = Vec::new();
    for row in rows {
        let (value, count) = row?;
        buckets.push(FacetValue {
            value: value_to_string(value),
            count: count as u64,
        });
    }

    if request.min_count == 0 {
        add_zero_buckets(
            conn,
            source_table,
            value_column,
            field_filter,
            request.limit,
            &mut buckets,
        )?;
    }

    Ok(buckets)
}

/// Report indexed values that yielded no results as zero-count buckets.
fn add_zero_buckets(
    conn: &Connection,
    source_table: &str,
    value_column: &str,
    field_filter: Option<&str>,
    limit: Option<usize>,
    buckets: &mut Vec<FacetValue>,
) -> Result<(), SearchError> {
    let seen: HashSet<Option<String>> = buckets.iter().map(|b| b.value.clone()).collect();
    let mut sql = format!(
        "SELECT DISTINCT {col} AS value FROM {src}",
        col = value_column,
        src = source_table
    );
    let mut params: Vec<Value> = Vec::new();
    if let Some(field_name) = field_filter {
        sql.push_str(" WHERE field_name = ?");
        params.push(Value::Text(field_name.to_string()));
    }
    sql.push_str(" ORDER BY value ASC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
        row.get::<_, Value>(0)
    })?;
    for row in rows {
        if let Some(limit) = limit {
            if buckets.len() >= limit {
                break;
            }
        }
        let value = value_to_string(row?);
        if seen.contains(&value) {
            continue;
        }
        buckets.push(FacetValue { value, count: 0 });
    }
    Ok(())
}

fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Text(s) => Some(s),
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(r) => Some(r.to_string()),
        Value::Blob(_) => {
            log::warn!("unexpected blob value in facet bucket");
            None
        }
    }
}
