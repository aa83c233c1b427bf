//! Compilation of keyword and filter trees into relational subqueries.
//!
//! Keyword nodes compile to grouped `(item_id, score)` subqueries over the
//! shared text table: AND groups union their children and require every
//! child to have matched, OR groups only sum scores, and negated children
//! become `NOT IN` predicates over the positive side's base rowset. Filter
//! nodes compile to boolean predicates over the outer query's `t` alias,
//! joining field tables as needed.

use std::collections::{HashMap, HashSet};

use rusqlite::types::Value;

use crate::config::MatchMode;
use crate::db::schema::{IndexLayout, SCORE_MULTIPLIER};
use crate::error::{SearchError, Warning};
use crate::query::filter::{Condition, FilterGroup, FilterNode, FilterValue, Operator};
use crate::query::keys::{self, Conjunction, Keys, WordTree};
use crate::query::sql::{escape_like, placeholders, Fragment, SqlSelect};

/// Non-fatal findings accumulated while compiling.
#[derive(Debug, Default)]
pub(crate) struct CompileDiagnostics {
    pub warnings: Vec<Warning>,
    pub ignored: Vec<String>,
}

impl CompileDiagnostics {
    pub fn ignore_words(&mut self, words: Vec<String>) {
        for word in words {
            if !self.ignored.contains(&word) {
                self.ignored.push(word);
            }
        }
    }
}

pub(crate) struct QueryCompiler<'a> {
    pub layout: &'a IndexLayout,
    /// Target fields for fulltext matching, already validated.
    pub fulltext_fields: &'a [String],
}

impl<'a> QueryCompiler<'a> {
    fn text_table(&self) -> Result<&str, SearchError> {
        self.layout
            .text_table
            .as_deref()
            .ok_or_else(|| SearchError::Backend("index has no fulltext storage".into()))
    }

    /// Base rowset covering every tracked item, with a neutral score.
    fn all_items_base(&self) -> SqlSelect {
        SqlSelect::from_table(
            vec![
                "t.item_id AS item_id".to_string(),
                format!("{} AS score", SCORE_MULTIPLIER as i64),
            ],
            &self.layout.denorm_table,
            "t",
        )
    }

    /// Compile a normalized keyword tree into a grouped `(item_id, score)`
    /// subquery over the configured target fields.
    pub fn compile_keys(&self, node: &WordTree) -> Result<SqlSelect, SearchError> {
        self.compile_keys_for(node, self.fulltext_fields)
    }

    fn compile_keys_for(
        &self,
        node: &WordTree,
        fields: &[String],
    ) -> Result<SqlSelect, SearchError> {
        match node {
            WordTree::Word(word) => {
                let scan =
                    self.word_scan(std::slice::from_ref(word), fields, "t.word AS matched")?;
                Ok(group_union(vec![scan], Conjunction::Or, 1))
            }
            WordTree::Group {
                conjunction,
                negated,
                children,
            } => {
                if *negated {
                    // No parent absorbed the negation: every item except the
                    // positive match set.
                    let positive = WordTree::Group {
                        conjunction: *conjunction,
                        negated: false,
                        children: children.clone(),
                    };
                    let sub = self.compile_keys_for(&positive, fields)?.render();
                    let mut base = self.all_items_base();
                    base.wheres.push(Fragment::new(
                        format!(
                            "t.item_id NOT IN (SELECT n.item_id FROM ({}) n)",
                            sub.sql
                        ),
                        sub.params,
                    ));
                    return Ok(base);
                }

                let mut words: Vec<String> = Vec::new();
                let mut subgroups: Vec<&WordTree> = Vec::new();
                let mut negated_children: Vec<WordTree> = Vec::new();
                for child in children {
                    match child {
                        WordTree::Word(w) => words.push(w.clone()),
                        WordTree::Group {
                            negated: true,
                            conjunction: c,
                            children: cc,
                        } => negated_children.push(WordTree::Group {
                            conjunction: *c,
                            negated: false,
                            children: cc.clone(),
                        }),
                        group => subgroups.push(group),
                    }
                }

                let mut members: Vec<SqlSelect> = Vec::new();
                let mut unit_count = 0usize;
                if !words.is_empty() {
                    match self.layout.options.matching {
                        MatchMode::Words => {
                            // One scan covers all direct terms; the word
                            // column discriminates them for AND counting.
                            members.push(self.word_scan(
                                &words,
                                fields,
                                "t.word AS matched",
                            )?);
                            unit_count += words.len();
                        }
                        _ => {
                            // A pattern can match several stored words, so
                            // each term gets its own discriminator.
                            for (i, word) in words.iter().enumerate() {
                                members.push(self.word_scan(
                                    std::slice::from_ref(word),
                                    fields,
                                    &format!("'w{}' AS matched", i),
                                )?);
                                unit_count += 1;
                            }
                        }
                    }
                }
                for (i, group) in subgroups.iter().enumerate() {
                    let sub = self.compile_keys_for(group, fields)?;
                    members.push(SqlSelect::from_subquery(
                        vec![
                            "s.item_id AS item_id".to_string(),
                            "s.score AS score".to_string(),
                            format!("'g{}' AS matched", i),
                        ],
                        &sub,
                        "s",
                    ));
                    unit_count += 1;
                }

                let base = if members.is_empty() {
                    self.all_items_base()
                } else {
                    group_union(members, *conjunction, unit_count)
                };

                if negated_children.is_empty() {
                    return Ok(base);
                }
                let mut outer = SqlSelect::from_subquery(
                    vec![
                        "b.item_id AS item_id".to_string(),
                        "b.score AS score".to_string(),
                    ],
                    &base,
                    "b",
                );
                let mut predicates = Vec::new();
                for child in &negated_children {
                    let sub = self.compile_keys_for(child, fields)?.render();
                    predicates.push(Fragment::new(
                        format!(
                            "b.item_id NOT IN (SELECT n.item_id FROM ({}) n)",
                            sub.sql
                        ),
                        sub.params,
                    ));
                }
                outer
                    .wheres
                    .push(Fragment::combine(predicates, conjunction.sql()));
                Ok(outer)
            }
        }
    }

    /// Ungrouped scan of the text table for the given words, restricted to
    /// the target fields. `matched_expr` is selected as the discriminator
    /// column for AND counting.
    fn word_scan(
        &self,
        words: &[String],
        fields: &[String],
        matched_expr: &str,
    ) -> Result<SqlSelect, SearchError> {
        let text_table = self.text_table()?;
        let mut query = SqlSelect::from_table(
            vec![
                "t.item_id AS item_id".to_string(),
                "t.score AS score".to_string(),
                matched_expr.to_string(),
            ],
            text_table,
            "t",
        );
        let word_condition = match self.layout.options.matching {
            MatchMode::Words => Fragment::new(
                format!("t.word IN ({})", placeholders(words.len())),
                words.iter().map(|w| Value::Text(w.clone())).collect(),
            ),
            MatchMode::Prefix => Fragment::combine(
                words
                    .iter()
                    .map(|w| {
                        Fragment::new(
                            "t.word LIKE ? ESCAPE '\\'",
                            vec![Value::Text(format!("{}%", escape_like(w)))],
                        )
                    })
                    .collect(),
                " OR ",
            ),
            MatchMode::Partial => Fragment::combine(
                words
                    .iter()
                    .map(|w| {
                        Fragment::new(
                            "t.word LIKE ? ESCAPE '\\'",
                            vec![Value::Text(format!("%{}%", escape_like(w)))],
                        )
                    })
                    .collect(),
                " OR ",
            ),
        };
        query.wheres.push(word_condition);
        if !fields.is_empty() {
            query.wheres.push(Fragment::new(
                format!("t.field_name IN ({})", placeholders(fields.len())),
                fields.iter().map(|f| Value::Text(f.clone())).collect(),
            ));
        }
        Ok(query)
    }

    /// Compile a filter group into one boolean predicate over the outer
    /// query's `t` alias. Joins needed by conditions are added to `outer`.
    /// Groups whose tags intersect `excluded_tags` are skipped.
    pub fn compile_filter(
        &self,
        group: &FilterGroup,
        outer: &mut SqlSelect,
        diags: &mut CompileDiagnostics,
        excluded_tags: &HashSet<String>,
    ) -> Result<Option<Fragment>, SearchError> {
        let mut counter = 0usize;
        self.compile_filter_group(group, outer, &mut counter, diags, excluded_tags)
    }

    fn compile_filter_group(
        &self,
        group: &FilterGroup,
        outer: &mut SqlSelect,
        counter: &mut usize,
        diags: &mut CompileDiagnostics,
        excluded_tags: &HashSet<String>,
    ) -> Result<Option<Fragment>, SearchError> {
        if group.tags.iter().any(|t| excluded_tags.contains(t)) {
            return Ok(None);
        }
        if group.negated {
            // Joins negate incorrectly for multi-valued fields; compile the
            // group as a self-contained subquery and exclude its item set.
            let positive = FilterGroup {
                negated: false,
                ..group.clone()
            };
            let mut sub = SqlSelect::from_table(
                vec!["t.item_id AS item_id".to_string()],
                &self.layout.denorm_table,
                "t",
            );
            let mut sub_counter = 0usize;
            let Some(condition) = self.compile_filter_group(
                &positive,
                &mut sub,
                &mut sub_counter,
                diags,
                excluded_tags,
            )?
            else {
                return Ok(None);
            };
            sub.wheres.push(condition);
            let rendered = sub.render();
            return Ok(Some(Fragment::new(
                format!(
                    "t.item_id NOT IN (SELECT n.item_id FROM ({}) n)",
                    rendered.sql
                ),
                rendered.params,
            )));
        }

        // Aliases are reused for the same table only within AND groups.
        let mut aliases: HashMap<String, String> = HashMap::new();
        let reuse = group.conjunction == Conjunction::And;
        let mut parts = Vec::new();
        for child in &group.children {
            let part = match child {
                FilterNode::Condition(condition) => self.compile_condition(
                    condition,
                    outer,
                    counter,
                    &mut aliases,
                    reuse,
                    diags,
                )?,
                FilterNode::Group(sub) => {
                    self.compile_filter_group(sub, outer, counter, diags, excluded_tags)?
                }
            };
            if let Some(part) = part {
                parts.push(part);
            }
        }
        match parts.len() {
            0 => Ok(None),
            1 => Ok(parts.pop()),
            _ => Ok(Some(Fragment::combine(parts, group.conjunction.sql()))),
        }
    }

    fn compile_condition(
        &self,
        condition: &Condition,
        outer: &mut SqlSelect,
        counter: &mut usize,
        aliases: &mut HashMap<String, String>,
        reuse: bool,
        diags: &mut CompileDiagnostics,
    ) -> Result<Option<Fragment>, SearchError> {
        let field = self.layout.field(&condition.field)?;
        if field.field_type.is_fulltext() {
            return self.compile_fulltext_condition(condition, diags);
        }
        let table = field.table.clone().ok_or_else(|| {
            SearchError::Backend(format!(
                "field '{}' has no value table",
                condition.field
            ))
        })?;

        match &condition.value {
            None => {
                // Sparse, separately-tabled values make NULL an existence
                // question, not a column comparison.
                let exists = match condition.operator {
                    Operator::Equals => "NOT EXISTS",
                    Operator::NotEquals => "EXISTS",
                    other => {
                        return Err(SearchError::InvalidOperator {
                            field: condition.field.clone(),
                            operator: other.sql().to_string(),
                        })
                    }
                };
                Ok(Some(Fragment::new(
                    format!(
                        "{} (SELECT 1 FROM {} x WHERE x.item_id = t.item_id)",
                        exists, table
                    ),
                    vec![],
                )))
            }
            Some(value) => {
                let column_value =
                    value.to_column_value(&condition.field, field.field_type)?;
                let alias = if reuse {
                    aliases.get(&table).cloned()
                } else {
                    None
                };
                let alias = match alias {
                    Some(alias) => alias,
                    None => {
                        *counter += 1;
                        let alias = format!("f{}", counter);
                        outer.joins.push(Fragment::new(
                            format!(
                                "LEFT JOIN {} {} ON {}.item_id = t.item_id",
                                table, alias, alias
                            ),
                            vec![],
                        ));
                        if reuse {
                            aliases.insert(table.clone(), alias.clone());
                        }
                        alias
                    }
                };
                Ok(Some(Fragment::new(
                    format!("{}.value {} ?", alias, condition.operator.sql()),
                    vec![column_value],
                )))
            }
        }
    }

    fn compile_fulltext_condition(
        &self,
        condition: &Condition,
        diags: &mut CompileDiagnostics,
    ) -> Result<Option<Fragment>, SearchError> {
        let keys = match &condition.value {
            None => {
                let text_table = self.text_table()?;
                let exists = match condition.operator {
                    Operator::Equals => "NOT EXISTS",
                    Operator::NotEquals => "EXISTS",
                    other => {
                        return Err(SearchError::InvalidOperator {
                            field: condition.field.clone(),
                            operator: other.sql().to_string(),
                        })
                    }
                };
                return Ok(Some(Fragment::new(
                    format!(
                        "{} (SELECT 1 FROM {} x WHERE x.item_id = t.item_id AND x.field_name = ?)",
                        exists, text_table
                    ),
                    vec![Value::Text(condition.field.clone())],
                )));
            }
            Some(FilterValue::Keys(keys)) => keys.clone(),
            Some(FilterValue::String(s)) => match Keys::parse(s, Conjunction::And) {
                Some(keys) => keys,
                None => return Ok(None),
            },
            Some(FilterValue::Integer(i)) => Keys::Term(i.to_string()),
            Some(FilterValue::Decimal(d)) => Keys::Term(d.to_string()),
            Some(FilterValue::Boolean(b)) => Keys::Term((if *b { "1" } else { "0" }).into()),
        };
        let membership = match condition.operator {
            Operator::Equals => "IN",
            Operator::NotEquals => "NOT IN",
            other => {
                return Err(SearchError::InvalidOperator {
                    field: condition.field.clone(),
                    operator: other.sql().to_string(),
                })
            }
        };
        let normalized = keys::normalize(&keys, self.layout.options.min_chars);
        diags.ignore_words(normalized.ignored);
        let Some(root) = normalized.root else {
            diags.warnings.push(Warning::new(format!(
                "all keywords in the filter on '{}' were ignored as too short",
                condition.field
            )));
            return Ok(None);
        };
        let fields = vec![condition.field.clone()];
        let sub = self.compile_keys_for(&root, &fields)?.render();
        Ok(Some(Fragment::new(
            format!(
                "t.item_id {} (SELECT k.item_id FROM ({}) k)",
                membership, sub.sql
            ),
            sub.params,
        )))
    }
}

/// Union the member rowsets, group by item, and for AND groups require
/// every discriminated unit to have matched.
fn group_union(members: Vec<SqlSelect>, conjunction: Conjunction, unit_count: usize) -> SqlSelect {
    let mut union_sql = String::new();
    let mut params = Vec::new();
    for (i, member) in members.iter().enumerate() {
        if i > 0 {
            union_sql.push_str(" UNION ALL ");
        }
        let rendered = member.render();
        union_sql.push_str(&rendered.sql);
        params.extend(rendered.params);
    }
    let mut query = SqlSelect {
        columns: vec![
            "u.item_id AS item_id".to_string(),
            "SUM(u.score) AS score".to_string(),
        ],
        from: format!("({}) u", union_sql),
        from_params: params,
        ..SqlSelect::default()
    };
    query.group_by.push("u.item_id".to_string());
    if conjunction == Conjunction::And && unit_count > 1 {
        query.havings.push(Fragment::new(
            format!("COUNT(DISTINCT u.matched) >= {}", unit_count),
            vec![],
        ));
    }
    query
}
