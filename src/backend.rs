//! The public backend facade.
//!
//! Wraps a connection pool and exposes the index lifecycle, indexing and
//! search entry points. All methods are synchronous; concurrent indexing of
//! different items is safe, concurrent configuration changes are the
//! caller's responsibility to serialize.

use std::collections::HashSet;
use std::path::Path;

use crate::autocomplete::{self, AutocompleteOptions, Suggestion};
use crate::config::IndexConfig;
use crate::db::connection::{self, DbPool};
use crate::db::indexer::{FieldValues, Indexer};
use crate::db::schema::{IndexLayout, SchemaManager};
use crate::error::SearchError;
use crate::facets;
use crate::query::executor;
use crate::query::{Query, ResultSet};

pub struct Backend {
    pool: DbPool,
}

impl Backend {
    /// Open (or create) a file-backed search database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SearchError> {
        Ok(Backend {
            pool: connection::open_pool(path.as_ref())?,
        })
    }

    /// Open a private in-memory search database.
    pub fn open_in_memory() -> Result<Self, SearchError> {
        Ok(Backend {
            pool: connection::open_in_memory_pool()?,
        })
    }

    fn layout(
        &self,
        conn: &rusqlite::Connection,
        index_id: &str,
    ) -> Result<IndexLayout, SearchError> {
        SchemaManager::new(conn)
            .load_layout(index_id)?
            .ok_or_else(|| SearchError::Backend(format!("unknown index '{}'", index_id)))
    }

    /// Create an index's physical storage from its configuration.
    pub fn add_index(&self, config: &IndexConfig) -> Result<(), SearchError> {
        let conn = self.pool.get()?;
        SchemaManager::new(&conn).ensure_index_storage(config)?;
        Ok(())
    }

    /// Apply a changed configuration to an existing index. Returns `true`
    /// when the change requires reindexing all items.
    pub fn update_index(&self, config: &IndexConfig) -> Result<bool, SearchError> {
        config.validate()?;
        let conn = self.pool.get()?;
        let schema = SchemaManager::new(&conn);
        let mut layout = schema
            .load_layout(&config.id)?
            .ok_or_else(|| SearchError::Backend(format!("unknown index '{}'", config.id)))?;
        let mut reindex = false;

        let removed: Vec<String> = layout
            .fields
            .keys()
            .filter(|name| !config.fields.contains_key(*name))
            .cloned()
            .collect();
        for name in removed {
            schema.drop_field(&mut layout, &name)?;
        }
        for (name, field) in &config.fields {
            let change = schema.ensure_field_storage(&mut layout, name, field)?;
            reindex |= change.needs_reindex();
        }
        if layout.options.min_chars != config.options.min_chars {
            // word filtering changed, previously indexed tokens are stale
            reindex = true;
        }
        layout.options = config.options.clone();
        schema.save_layout(&layout)?;
        Ok(reindex)
    }

    /// Drop an index's tables and metadata.
    pub fn remove_index(&self, index_id: &str) -> Result<(), SearchError> {
        let conn = self.pool.get()?;
        SchemaManager::new(&conn).drop_index(index_id)
    }

    /// Index a batch of items. Returns the IDs that were written; failures
    /// are logged per item and do not abort the batch.
    pub fn index_items(
        &self,
        index_id: &str,
        items: &[(String, FieldValues)],
    ) -> Result<Vec<String>, SearchError> {
        let mut conn = self.pool.get()?;
        let layout = self.layout(&conn, index_id)?;
        Indexer::new(&mut conn, layout).index_items(items)
    }

    /// Remove items from the index.
    pub fn delete_items(
        &self,
        index_id: &str,
        item_ids: &[String],
    ) -> Result<(), SearchError> {
        let mut conn = self.pool.get()?;
        let layout = self.layout(&conn, index_id)?;
        Indexer::new(&mut conn, layout).delete_items(item_ids)
    }

    /// Remove every item from the index, keeping the schema.
    pub fn clear_index(&self, index_id: &str) -> Result<(), SearchError> {
        let mut conn = self.pool.get()?;
        let layout = self.layout(&conn, index_id)?;
        Indexer::new(&mut conn, layout).clear()
    }

    /// Execute a search. Facet requests in the query options are honored.
    pub fn search(&self, query: &Query) -> Result<ResultSet, SearchError> {
        let conn = self.pool.get()?;
        let layout = self.layout(&conn, &query.index_id)?;
        let compiled = executor::compile(&layout, query, &HashSet::new())?;
        let mut results = executor::execute(&conn, &compiled)?;
        if !query.options.facets.is_empty() {
            results.facets = facets::compute_facets(
                &conn,
                &layout,
                query,
                &compiled,
                &query.options.facets,
            )?;
        }
        Ok(results)
    }

    /// Suggest completions and additional words for an in-progress search.
    pub fn autocomplete(
        &self,
        query: &Query,
        incomplete: &str,
        user_input: &str,
        options: &AutocompleteOptions,
    ) -> Result<Vec<Suggestion>, SearchError> {
        let conn = self.pool.get()?;
        let layout = self.layout(&conn, &query.index_id)?;
        autocomplete::suggestions(&conn, &layout, query, incomplete, user_input, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldConfig, FieldType, IndexConfig, IndexOptions, MatchMode};
    use crate::facets::{FacetOperator, FacetRequest, FacetValue};
    use crate::query::keys::Keys;
    use crate::query::{
        Conjunction, FilterGroup, FilterValue, Operator, Query, SortDirection, SortKey,
    };
    use crate::values::FieldValue;

    fn base_config() -> IndexConfig {
        IndexConfig::new("idx")
            .field("title", FieldConfig::new(FieldType::Fulltext))
            .field("body", FieldConfig::new(FieldType::Fulltext))
            .field("category", FieldConfig::new(FieldType::String))
            .field("year", FieldConfig::new(FieldType::Integer))
    }

    fn backend_with(config: &IndexConfig) -> Backend {
        let backend = Backend::open_in_memory().unwrap();
        backend.add_index(config).unwrap();
        backend
    }

    fn text(s: &str) -> Vec<FieldValue> {
        vec![FieldValue::Text(s.to_string())]
    }

    fn body_item(id: &str, body: &str) -> (String, FieldValues) {
        let mut values = FieldValues::new();
        values.insert("body".into(), text(body));
        (id.to_string(), values)
    }

    fn ids(results: &ResultSet) -> Vec<&str> {
        results.items.iter().map(|i| i.item_id.as_str()).collect()
    }

    fn sorted_ids(results: &ResultSet) -> Vec<&str> {
        let mut out = ids(results);
        out.sort_unstable();
        out
    }

    #[test]
    fn test_round_trip() {
        let backend = backend_with(&base_config());
        backend
            .index_items("idx", &[body_item("1", "test foo bar")])
            .unwrap();

        let results = backend.search(&Query::new("idx").keys_str("foo")).unwrap();
        assert_eq!(ids(&results), vec!["1"]);
        assert_eq!(results.result_count, 1);

        backend.delete_items("idx", &["1".to_string()]).unwrap();
        let results = backend.search(&Query::new("idx").keys_str("foo")).unwrap();
        assert!(results.items.is_empty());
        assert_eq!(results.result_count, 0);
    }

    #[test]
    fn test_and_requires_all_terms() {
        let backend = backend_with(&base_config());
        backend
            .index_items(
                "idx",
                &[
                    body_item("1", "foo bar baz"),
                    body_item("2", "foo test"),
                    body_item("3", "bar test foobar"),
                ],
            )
            .unwrap();

        let results = backend
            .search(&Query::new("idx").keys_str("test foo"))
            .unwrap();
        assert_eq!(ids(&results), vec!["2"]);
    }

    #[test]
    fn test_negated_group_excludes_conjunction() {
        let backend = backend_with(&base_config());
        backend
            .index_items(
                "idx",
                &[
                    body_item("1", "foo bar baz"),
                    body_item("2", "foo test"),
                    body_item("3", "bar test"),
                    body_item("4", "nothing here"),
                ],
            )
            .unwrap();

        // NOT (foo AND bar): only items containing both are excluded
        let keys = Keys::and(vec![Keys::Term("foo".into()), Keys::Term("bar".into())])
            .negated();
        let results = backend.search(&Query::new("idx").keys(keys)).unwrap();
        assert_eq!(sorted_ids(&results), vec!["2", "3", "4"]);
    }

    #[test]
    fn test_minimum_word_length_reports_ignored_keys() {
        let mut config = base_config();
        config.options.min_chars = 4;
        let backend = backend_with(&config);
        backend
            .index_items(
                "idx",
                &[body_item("1", "word foo"), body_item("2", "other text")],
            )
            .unwrap();

        // "foo" is too short: the search degrades to a filter-only search
        let results = backend.search(&Query::new("idx").keys_str("foo")).unwrap();
        assert_eq!(sorted_ids(&results), vec!["1", "2"]);
        assert_eq!(results.ignored_keys, vec!["foo"]);
    }

    #[test]
    fn test_boost_changes_relative_ranking_not_the_match_set() {
        let backend = backend_with(&base_config());
        let mut title_item = FieldValues::new();
        title_item.insert("title".into(), text("shared"));
        let mut body_item_values = FieldValues::new();
        body_item_values.insert("body".into(), text("shared"));
        backend
            .index_items(
                "idx",
                &[
                    ("a".to_string(), title_item),
                    ("b".to_string(), body_item_values),
                ],
            )
            .unwrap();

        let before = backend
            .search(&Query::new("idx").keys_str("shared"))
            .unwrap();
        let score_of = |results: &ResultSet, id: &str| {
            results
                .items
                .iter()
                .find(|i| i.item_id == id)
                .map(|i| i.score)
                .unwrap()
        };
        let a_before = score_of(&before, "a");
        let b_before = score_of(&before, "b");

        let mut config = base_config();
        config
            .fields
            .insert("title".into(), FieldConfig::new(FieldType::Fulltext).with_boost(2.0));
        let reindex = backend.update_index(&config).unwrap();
        assert!(!reindex);

        let after = backend
            .search(&Query::new("idx").keys_str("shared"))
            .unwrap();
        assert_eq!(sorted_ids(&after), sorted_ids(&before));
        assert!((score_of(&after, "a") - a_before * 2.0).abs() < 1e-6);
        assert!((score_of(&after, "b") - b_before).abs() < 1e-6);
    }

    fn facet_fixture() -> Backend {
        let backend = backend_with(&base_config());
        let with_category = |id: &str, body: &str, category: Option<&str>| {
            let mut values = FieldValues::new();
            values.insert("body".into(), text(body));
            if let Some(category) = category {
                values.insert("category".into(), text(category));
            }
            (id.to_string(), values)
        };
        backend
            .index_items(
                "idx",
                &[
                    with_category("1", "common word", Some("article")),
                    with_category("2", "common word", Some("article")),
                    with_category("3", "common", Some("item")),
                    with_category("4", "common", Some("item")),
                    with_category("5", "common", None),
                    with_category("6", "different", Some("page")),
                ],
            )
            .unwrap();
        backend
    }

    #[test]
    fn test_facet_counts_sum_correctly() {
        let backend = facet_fixture();
        let query = Query::new("idx")
            .keys_str("common")
            .facet(FacetRequest::new("category").missing(true));
        let results = backend.search(&query).unwrap();

        let mut buckets = results.facets.get("category").unwrap().clone();
        buckets.sort_by(|a, b| a.value.cmp(&b.value));
        assert_eq!(
            buckets,
            vec![
                FacetValue { value: None, count: 1 },
                FacetValue {
                    value: Some("article".into()),
                    count: 2
                },
                FacetValue {
                    value: Some("item".into()),
                    count: 2
                },
            ]
        );
    }

    #[test]
    fn test_facet_min_count_zero_adds_empty_buckets() {
        let backend = facet_fixture();
        let query = Query::new("idx")
            .keys_str("common")
            .facet(FacetRequest::new("category").missing(true).min_count(0));
        let results = backend.search(&query).unwrap();

        let buckets = results.facets.get("category").unwrap();
        let page = buckets
            .iter()
            .find(|b| b.value.as_deref() == Some("page"))
            .unwrap();
        assert_eq!(page.count, 0);
    }

    #[test]
    fn test_or_facet_ignores_its_own_filter() {
        let backend = facet_fixture();
        let filter = FilterGroup::new(Conjunction::And).group(
            FilterGroup::new(Conjunction::And)
                .condition("category", Some("article".into()), Operator::Equals)
                .tag("facet:category"),
        );
        let query = Query::new("idx")
            .keys_str("common")
            .filter(filter)
            .facet(FacetRequest::new("category").operator(FacetOperator::Or));
        let results = backend.search(&query).unwrap();

        // results are restricted to articles
        assert_eq!(sorted_ids(&results), vec!["1", "2"]);
        // the facet shows the alternatives as well
        let buckets = results.facets.get("category").unwrap();
        let count_of = |value: &str| {
            buckets
                .iter()
                .find(|b| b.value.as_deref() == Some(value))
                .map(|b| b.count)
        };
        assert_eq!(count_of("article"), Some(2));
        assert_eq!(count_of("item"), Some(2));
    }

    #[test]
    fn test_idempotent_compilation() {
        let backend = backend_with(&base_config());
        backend
            .index_items(
                "idx",
                &[body_item("1", "foo bar"), body_item("2", "foo baz")],
            )
            .unwrap();

        let query = Query::new("idx").keys_str("foo");
        let first = backend.search(&query).unwrap();
        let second = backend.search(&query).unwrap();
        assert_eq!(first.items, second.items);
        assert_eq!(first.result_count, second.result_count);
        // the query itself is not mutated by searching
        assert!(query.fulltext_fields.is_none());
    }

    #[test]
    fn test_or_group_with_negated_child() {
        let backend = backend_with(&base_config());
        backend
            .index_items(
                "idx",
                &[
                    body_item("1", "foo"),
                    body_item("2", "foo bar"),
                    body_item("3", "bar"),
                    body_item("4", "baz"),
                ],
            )
            .unwrap();

        // OR(foo, NOT bar): the negated predicate applies within the
        // positive side's base rowset
        let keys = Keys::or(vec![
            Keys::Term("foo".into()),
            Keys::and(vec![Keys::Term("bar".into())]).negated(),
        ]);
        let results = backend.search(&Query::new("idx").keys(keys)).unwrap();
        assert_eq!(sorted_ids(&results), vec!["1"]);
    }

    #[test]
    fn test_or_group_with_only_negated_children() {
        let backend = backend_with(&base_config());
        backend
            .index_items(
                "idx",
                &[
                    body_item("1", "foo bar"),
                    body_item("2", "foo"),
                    body_item("3", "bar"),
                    body_item("4", "baz"),
                ],
            )
            .unwrap();

        // OR(NOT foo, NOT bar): only items containing both are excluded
        let keys = Keys::or(vec![
            Keys::and(vec![Keys::Term("foo".into())]).negated(),
            Keys::and(vec![Keys::Term("bar".into())]).negated(),
        ]);
        let results = backend.search(&Query::new("idx").keys(keys)).unwrap();
        assert_eq!(sorted_ids(&results), vec!["2", "3", "4"]);
    }

    #[test]
    fn test_keys_without_fulltext_fields_warns_and_matches_all() {
        let backend = backend_with(&base_config());
        backend
            .index_items(
                "idx",
                &[body_item("1", "foo"), body_item("2", "bar")],
            )
            .unwrap();

        let query = Query::new("idx").keys_str("foo").fulltext_fields(vec![]);
        let results = backend.search(&query).unwrap();
        assert_eq!(sorted_ids(&results), vec!["1", "2"]);
        assert!(!results.warnings.is_empty());
    }

    #[test]
    fn test_filter_comparison_operators() {
        let backend = backend_with(&base_config());
        let with_year = |id: &str, year: i64| {
            let mut values = FieldValues::new();
            values.insert("body".into(), text("entry"));
            values.insert("year".into(), vec![FieldValue::Integer(year)]);
            (id.to_string(), values)
        };
        backend
            .index_items(
                "idx",
                &[with_year("1", 1999), with_year("2", 2005), with_year("3", 2010)],
            )
            .unwrap();

        let filter = FilterGroup::new(Conjunction::And).condition(
            "year",
            Some(FilterValue::Integer(2000)),
            Operator::GreaterThan,
        );
        let results = backend.search(&Query::new("idx").filter(filter)).unwrap();
        assert_eq!(sorted_ids(&results), vec!["2", "3"]);
    }

    #[test]
    fn test_null_filter_checks_presence() {
        let backend = facet_fixture();
        // category = NULL: items without a category value
        let filter = FilterGroup::new(Conjunction::And).condition(
            "category",
            None,
            Operator::Equals,
        );
        let results = backend.search(&Query::new("idx").filter(filter)).unwrap();
        assert_eq!(sorted_ids(&results), vec!["5"]);

        // category <> NULL: items with any category value
        let filter = FilterGroup::new(Conjunction::And).condition(
            "category",
            None,
            Operator::NotEquals,
        );
        let results = backend.search(&Query::new("idx").filter(filter)).unwrap();
        assert_eq!(sorted_ids(&results), vec!["1", "2", "3", "4", "6"]);
    }

    #[test]
    fn test_fulltext_filter_condition_delegates_to_keyword_compiler() {
        let backend = backend_with(&base_config());
        backend
            .index_items(
                "idx",
                &[body_item("1", "alpha beta"), body_item("2", "gamma")],
            )
            .unwrap();

        let filter = FilterGroup::new(Conjunction::And).condition(
            "body",
            Some(FilterValue::Keys(Keys::Term("alpha".into()))),
            Operator::Equals,
        );
        let results = backend.search(&Query::new("idx").filter(filter)).unwrap();
        assert_eq!(ids(&results), vec!["1"]);

        let filter = FilterGroup::new(Conjunction::And).condition(
            "body",
            Some(FilterValue::Keys(Keys::Term("alpha".into()))),
            Operator::NotEquals,
        );
        let results = backend.search(&Query::new("idx").filter(filter)).unwrap();
        assert_eq!(ids(&results), vec!["2"]);
    }

    #[test]
    fn test_negated_filter_group() {
        let backend = facet_fixture();
        let filter = FilterGroup::new(Conjunction::And).group(
            FilterGroup::new(Conjunction::And)
                .condition("category", Some("article".into()), Operator::Equals)
                .negate(),
        );
        let results = backend.search(&Query::new("idx").filter(filter)).unwrap();
        assert_eq!(sorted_ids(&results), vec!["3", "4", "5", "6"]);
    }

    #[test]
    fn test_sorting_by_field_and_range() {
        let backend = backend_with(&base_config());
        let with_year = |id: &str, year: i64| {
            let mut values = FieldValues::new();
            values.insert("body".into(), text("entry"));
            values.insert("year".into(), vec![FieldValue::Integer(year)]);
            (id.to_string(), values)
        };
        backend
            .index_items(
                "idx",
                &[with_year("1", 2003), with_year("2", 2001), with_year("3", 2002)],
            )
            .unwrap();

        let query = Query::new("idx")
            .keys_str("entry")
            .sort(SortKey::Field("year".into()), SortDirection::Ascending);
        let results = backend.search(&query).unwrap();
        assert_eq!(ids(&results), vec!["2", "3", "1"]);

        let query = Query::new("idx")
            .keys_str("entry")
            .sort(SortKey::Field("year".into()), SortDirection::Ascending)
            .range(1, 1);
        let results = backend.search(&query).unwrap();
        assert_eq!(ids(&results), vec!["3"]);
        assert_eq!(results.result_count, 3);
    }

    #[test]
    fn test_skip_result_count_never_reports_false_zero() {
        let backend = backend_with(&base_config());
        backend
            .index_items(
                "idx",
                &[body_item("1", "foo"), body_item("2", "foo")],
            )
            .unwrap();

        let query = Query::new("idx")
            .keys_str("foo")
            .range(0, 10)
            .skip_result_count(true);
        let results = backend.search(&query).unwrap();
        assert_eq!(results.items.len(), 2);
        assert!(results.result_count >= 1);
    }

    #[test]
    fn test_unknown_field_errors() {
        let backend = backend_with(&base_config());
        let filter = FilterGroup::new(Conjunction::And).condition(
            "nope",
            Some(FilterValue::Integer(1)),
            Operator::Equals,
        );
        assert!(matches!(
            backend.search(&Query::new("idx").filter(filter)),
            Err(SearchError::InvalidField(f)) if f == "nope"
        ));

        assert!(matches!(
            backend.search(&Query::new("idx").sort(
                SortKey::Field("nope".into()),
                SortDirection::Ascending
            )),
            Err(SearchError::InvalidField(_))
        ));
    }

    #[test]
    fn test_non_fulltext_field_rejected_as_search_target() {
        let backend = backend_with(&base_config());
        let query = Query::new("idx")
            .keys_str("foo")
            .fulltext_fields(vec!["year".into()]);
        assert!(matches!(
            backend.search(&query),
            Err(SearchError::InvalidFieldType { .. })
        ));
    }

    #[test]
    fn test_autocomplete_suffix_and_words() {
        let backend = backend_with(&base_config());
        backend
            .index_items(
                "idx",
                &[
                    body_item("1", "apple application"),
                    body_item("2", "apple banana"),
                    body_item("3", "cherry"),
                ],
            )
            .unwrap();

        let query = Query::new("idx").keys_str("app");
        let options = AutocompleteOptions {
            suggest_words: false,
            ..AutocompleteOptions::default()
        };
        let suggestions = backend
            .autocomplete(&query, "app", "app", &options)
            .unwrap();
        let words: Vec<&str> = suggestions.iter().map(|s| s.word.as_str()).collect();
        assert!(words.contains(&"apple"));
        assert!(words.contains(&"application"));
        let apple = suggestions.iter().find(|s| s.word == "apple").unwrap();
        assert_eq!(apple.suffix.as_deref(), Some("le"));
        assert_eq!(apple.results, 2);

        let query = Query::new("idx").keys_str("apple");
        let options = AutocompleteOptions {
            suggest_suffix: false,
            max_occurrence_ratio: 1.0,
            ..AutocompleteOptions::default()
        };
        let suggestions = backend
            .autocomplete(&query, "", "apple", &options)
            .unwrap();
        let words: Vec<&str> = suggestions.iter().map(|s| s.word.as_str()).collect();
        assert!(words.contains(&"application"));
        assert!(words.contains(&"banana"));
        assert!(!words.contains(&"apple"));
        assert!(!words.contains(&"cherry"));
    }

    #[test]
    fn test_phrase_matches_as_and_of_its_words() {
        let backend = backend_with(&base_config());
        backend
            .index_items(
                "idx",
                &[
                    body_item("1", "hello brave world"),
                    body_item("2", "hello there"),
                    body_item("3", "world news"),
                ],
            )
            .unwrap();

        // word positions are not stored, so a phrase requires all its words
        let results = backend
            .search(&Query::new("idx").keys_str("\"hello world\""))
            .unwrap();
        assert_eq!(ids(&results), vec!["1"]);
    }

    #[test]
    fn test_prefix_matching_mode() {
        let mut config = base_config();
        config.options.matching = MatchMode::Prefix;
        let backend = backend_with(&config);
        backend
            .index_items(
                "idx",
                &[body_item("1", "foobar baz"), body_item("2", "other")],
            )
            .unwrap();

        let results = backend.search(&Query::new("idx").keys_str("foo")).unwrap();
        assert_eq!(ids(&results), vec!["1"]);

        // AND counting stays per-term even when one pattern could match
        // several stored words
        let results = backend
            .search(&Query::new("idx").keys_str("foo ba"))
            .unwrap();
        assert_eq!(ids(&results), vec!["1"]);
    }

    #[test]
    fn test_update_index_drops_removed_fields() {
        let backend = backend_with(&base_config());
        backend
            .index_items("idx", &[body_item("1", "hello")])
            .unwrap();

        let mut config = base_config();
        config.fields.remove("year");
        backend.update_index(&config).unwrap();

        let filter = FilterGroup::new(Conjunction::And).condition(
            "year",
            Some(FilterValue::Integer(2000)),
            Operator::Equals,
        );
        assert!(matches!(
            backend.search(&Query::new("idx").filter(filter)),
            Err(SearchError::InvalidField(_))
        ));
    }

    #[test]
    fn test_min_chars_change_requires_reindex() {
        let backend = backend_with(&base_config());
        let mut config = base_config();
        config.options = IndexOptions {
            min_chars: 4,
            ..IndexOptions::default()
        };
        assert!(backend.update_index(&config).unwrap());
    }

    #[test]
    fn test_remove_index_then_search_fails() {
        let backend = backend_with(&base_config());
        backend.remove_index("idx").unwrap();
        assert!(matches!(
            backend.search(&Query::new("idx")),
            Err(SearchError::Backend(_))
        ));
    }

    #[test]
    fn test_clear_index_empties_results() {
        let backend = backend_with(&base_config());
        backend
            .index_items("idx", &[body_item("1", "foo")])
            .unwrap();
        backend.clear_index("idx").unwrap();
        let results = backend.search(&Query::new("idx").keys_str("foo")).unwrap();
        assert!(results.items.is_empty());
    }
}
