//! Autocomplete suggestions for an in-progress search.
//!
//! Two independent passes: completions of the last, unfinished word via a
//! prefix match, and additional words co-occurring in the current result
//! set. Both weight candidates by the number of results they would produce.

use std::collections::HashSet;

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

use crate::db::schema::IndexLayout;
use crate::error::SearchError;
use crate::query::executor;
use crate::query::keys::Keys;
use crate::query::sql::{escape_like, placeholders};
use crate::query::Query;
use crate::tokenizer::{canonicalize_word, split_words};

#[derive(Debug, Clone)]
pub struct AutocompleteOptions {
    /// Suggest completions of the in-progress word.
    pub suggest_suffix: bool,
    /// Suggest additional words from the current result set.
    pub suggest_words: bool,
    /// Additional words matching more than this fraction of the result set
    /// are dropped as uninformative.
    pub max_occurrence_ratio: f64,
    pub limit: usize,
}

impl Default for AutocompleteOptions {
    fn default() -> Self {
        AutocompleteOptions {
            suggest_suffix: true,
            suggest_words: true,
            max_occurrence_ratio: 0.9,
            limit: 10,
        }
    }
}

/// One suggested continuation of the typed input.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    /// The full suggested word.
    pub word: String,
    /// The remainder after the typed prefix, for suffix suggestions.
    pub suffix: Option<String>,
    /// How many results the suggestion would produce.
    pub results: u64,
}

pub(crate) fn suggestions(
    conn: &Connection,
    layout: &IndexLayout,
    query: &Query,
    incomplete: &str,
    user_input: &str,
    options: &AutocompleteOptions,
) -> Result<Vec<Suggestion>, SearchError> {
    let passes = usize::from(options.suggest_suffix) + usize::from(options.suggest_words);
    if passes == 0 || options.limit == 0 {
        return Ok(Vec::new());
    }
    let Some(text_table) = layout.text_table.as_deref() else {
        return Ok(Vec::new());
    };
    let fulltext_fields = match &query.fulltext_fields {
        Some(fields) => fields.clone(),
        None => layout.fulltext_fields(),
    };
    if fulltext_fields.is_empty() {
        return Ok(Vec::new());
    }
    let per_pass = (options.limit / passes).max(1);

    // every word already typed is excluded from suggestions
    let typed: Vec<String> = {
        let mut seen = HashSet::new();
        split_words(user_input)
            .map(canonicalize_word)
            .filter(|w| !w.is_empty() && seen.insert(w.clone()))
            .collect()
    };

    let mut out = Vec::new();

    if options.suggest_suffix {
        let incomplete_word = canonicalize_word(incomplete.trim());
        if !incomplete_word.is_empty() {
            // base the completion on the results of the finished words only
            let complete_input = user_input
                .trim_end()
                .strip_suffix(incomplete.trim())
                .unwrap_or(user_input)
                .trim();
            let mut base_query = query.clone();
            base_query.keys = Keys::parse(complete_input, query.options.conjunction);
            base_query.sorts.clear();
            base_query.range = None;
            let compiled = executor::compile(layout, &base_query, &HashSet::new())?;
            let ids = compiled.item_ids_select()?.render();

            let mut sql = format!(
                "SELECT t.word AS word, COUNT(DISTINCT t.item_id) AS num FROM {} t \
                 WHERE t.item_id IN (SELECT i.item_id FROM ({}) i) \
                 AND t.word LIKE ? ESCAPE '\\' \
                 AND t.field_name IN ({})",
                text_table,
                ids.sql,
                placeholders(fulltext_fields.len()),
            );
            let mut params: Vec<Value> = ids.params;
            params.push(Value::Text(format!("{}%", escape_like(&incomplete_word))));
            params.extend(fulltext_fields.iter().map(|f| Value::Text(f.clone())));
            if !typed.is_empty() {
                sql.push_str(&format!(
                    " AND t.word NOT IN ({})",
                    placeholders(typed.len())
                ));
                params.extend(typed.iter().map(|w| Value::Text(w.clone())));
            }
            sql.push_str(&format!(
                " GROUP BY t.word ORDER BY num DESC, word ASC LIMIT {}",
                per_pass
            ));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (word, num) = row?;
                let suffix = word
                    .strip_prefix(incomplete_word.as_str())
                    .map(str::to_string);
                out.push(Suggestion {
                    word,
                    suffix,
                    results: num as u64,
                });
            }
        }
    }

    if options.suggest_words {
        let mut full_query = query.clone();
        full_query.sorts.clear();
        full_query.range = None;
        let compiled = executor::compile(layout, &full_query, &HashSet::new())?;
        let count = compiled.select.render_count();
        let result_count: i64 = conn.query_row(
            &count.sql,
            params_from_iter(count.params.iter()),
            |row| row.get(0),
        )?;
        if result_count > 0 {
            let max_occurrences =
                ((result_count as f64 * options.max_occurrence_ratio).ceil() as u64).max(1);
            let ids = compiled.item_ids_select()?.render();

            let mut sql = format!(
                "SELECT t.word AS word, COUNT(DISTINCT t.item_id) AS num FROM {} t \
                 WHERE t.item_id IN (SELECT i.item_id FROM ({}) i) \
                 AND t.field_name IN ({})",
                text_table,
                ids.sql,
                placeholders(fulltext_fields.len()),
            );
            let mut params: Vec<Value> = ids.params;
            params.extend(fulltext_fields.iter().map(|f| Value::Text(f.clone())));
            if !typed.is_empty() {
                sql.push_str(&format!(
                    " AND t.word NOT IN ({})",
                    placeholders(typed.len())
                ));
                params.extend(typed.iter().map(|w| Value::Text(w.clone())));
            }
            sql.push_str(&format!(
                " GROUP BY t.word HAVING COUNT(DISTINCT t.item_id) <= {} \
                 ORDER BY num DESC, word ASC LIMIT {}",
                max_occurrences, per_pass
            ));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (word, num) = row?;
                out.push(Suggestion {
                    word,
                    suffix: None,
                    results: num as u64,
                });
            }
        }
    }

    Ok(out)
}
