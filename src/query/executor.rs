//! Query orchestration: resolve fields, compile keyword and filter trees
//! into one executable statement, then run count and page queries.

use std::collections::HashSet;

use rusqlite::{params_from_iter, Connection};

use crate::db::schema::{IndexLayout, SCORE_MULTIPLIER};
use crate::error::{SearchError, Warning};
use crate::query::compiler::{CompileDiagnostics, QueryCompiler};
use crate::query::keys;
use crate::query::sql::{Fragment, SqlSelect};
use crate::query::{Query, ResultItem, ResultSet, SortKey};

/// A query compiled against one index's layout. Compilation is a pure
/// function of the query and the stored configuration, so compiling the same
/// query twice yields the same statement.
#[derive(Debug)]
pub(crate) struct CompiledQuery {
    pub select: SqlSelect,
    pub offset: u64,
    pub skip_count: bool,
    pub warnings: Vec<Warning>,
    pub ignored: Vec<String>,
}

impl CompiledQuery {
    /// The query's rowset reduced to distinct item IDs: no ordering, no
    /// range, and the score expression stripped. Facet materialization
    /// requires exactly one remaining column.
    pub fn item_ids_select(&self) -> Result<SqlSelect, SearchError> {
        let mut select = self.select.clone();
        select.order_by.clear();
        select.limit = None;
        select.offset = None;
        select.columns.retain(|c| !c.ends_with("AS score"));
        if select.columns.len() != 1 {
            return Err(SearchError::Backend(
                "facet materialization requires exactly one item_id column".into(),
            ));
        }
        Ok(select)
    }
}

/// Compile `query` against `layout`. Filter groups whose tags intersect
/// `excluded_tags` are left out (used by OR facets).
pub(crate) fn compile(
    layout: &IndexLayout,
    query: &Query,
    excluded_tags: &HashSet<String>,
) -> Result<CompiledQuery, SearchError> {
    let mut diags = CompileDiagnostics::default();

    // Resolve target fulltext fields; unset means all of them.
    let fulltext_fields: Vec<String> = match &query.fulltext_fields {
        Some(fields) => {
            for name in fields {
                let field = layout.field(name)?;
                if !field.field_type.is_fulltext() {
                    return Err(SearchError::InvalidFieldType {
                        field: name.clone(),
                        expected: "fulltext",
                    });
                }
            }
            fields.clone()
        }
        None => layout.fulltext_fields(),
    };

    let normalized_root = match &query.keys {
        Some(keys) => {
            let normalized = keys::normalize(keys, layout.options.min_chars);
            diags.ignore_words(normalized.ignored);
            normalized.root
        }
        None => None,
    };

    let compiler = QueryCompiler {
        layout,
        fulltext_fields: &fulltext_fields,
    };

    // Base rowset: the keyword compilation, or the denormalized table for
    // filter-only searches.
    let mut base_is_denorm = false;
    let mut select = match &normalized_root {
        Some(root) if !fulltext_fields.is_empty() => {
            let keys_query = compiler.compile_keys(root)?;
            SqlSelect::from_subquery(
                vec![
                    "t.item_id AS item_id".to_string(),
                    "t.score AS score".to_string(),
                ],
                &keys_query,
                "t",
            )
        }
        root => {
            if root.is_some() {
                diags.warnings.push(Warning::new(
                    "keywords were given but no fulltext fields are configured for searching",
                ));
            }
            base_is_denorm = true;
            SqlSelect::from_table(
                vec![
                    "t.item_id AS item_id".to_string(),
                    format!("{} AS score", SCORE_MULTIPLIER as i64),
                ],
                &layout.denorm_table,
                "t",
            )
        }
    };
    // Filter joins can multiply rows; grouping keeps one row per item.
    select.group_by.push("t.item_id".to_string());

    if !query.filter.is_empty() {
        if let Some(condition) =
            compiler.compile_filter(&query.filter, &mut select, &mut diags, excluded_tags)?
        {
            select.wheres.push(condition);
        }
    }

    let mut sort_join_added = false;
    for sort in &query.sorts {
        match &sort.key {
            SortKey::Relevance => {
                select
                    .order_by
                    .push(format!("score {}", sort.direction.sql()));
            }
            SortKey::ItemId => {
                select
                    .order_by
                    .push(format!("item_id {}", sort.direction.sql()));
            }
            SortKey::Field(name) => {
                let field = layout.field(name)?;
                let column = if base_is_denorm {
                    format!("t.{}", field.column)
                } else {
                    if !sort_join_added {
                        select.joins.push(Fragment::new(
                            format!(
                                "LEFT JOIN {} srt ON srt.item_id = t.item_id",
                                layout.denorm_table
                            ),
                            vec![],
                        ));
                        sort_join_added = true;
                    }
                    format!("srt.{}", field.column)
                };
                select
                    .order_by
                    .push(format!("{} {}", column, sort.direction.sql()));
            }
        }
    }
    if query.sorts.is_empty() {
        select.order_by.push("score DESC".to_string());
        select.order_by.push("item_id ASC".to_string());
    }

    let mut offset = 0;
    if let Some(range) = &query.range {
        select.limit = Some(range.limit);
        select.offset = Some(range.offset);
        offset = range.offset;
    }

    Ok(CompiledQuery {
        select,
        offset,
        skip_count: query.options.skip_result_count,
        warnings: std::mem::take(&mut diags.warnings),
        ignored: std::mem::take(&mut diags.ignored),
    })
}

/// Run the compiled query: a count pass (unless skipped) followed by the
/// paginated row query.
pub(crate) fn execute(
    conn: &Connection,
    compiled: &CompiledQuery,
) -> Result<ResultSet, SearchError> {
    let mut result_count = 0u64;
    if !compiled.skip_count {
        let count = compiled.select.render_count();
        result_count = conn.query_row(
            &count.sql,
            params_from_iter(count.params.iter()),
            |row| row.get::<_, i64>(0),
        )? as u64;
    }

    let rendered = compiled.select.render();
    let mut stmt = conn.prepare(&rendered.sql)?;
    let rows = stmt.query_map(params_from_iter(rendered.params.iter()), |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
    })?;
    let mut items = Vec::new();
    for row in rows {
        let (item_id, score) = row?;
        items.push(ResultItem {
            item_id,
            score: score / SCORE_MULTIPLIER,
        });
    }

    if compiled.skip_count {
        // Never report a false zero when the page shows results.
        result_count = if items.is_empty() {
            0
        } else {
            compiled.offset + items.len() as u64
        };
    }

    Ok(ResultSet {
        items,
        result_count,
        warnings: compiled.warnings.clone(),
        ignored_keys: compiled.ignored.clone(),
        facets: Default::default(),
    })
}
