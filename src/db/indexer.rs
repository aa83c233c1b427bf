//! Writing items into an index's physical tables.
//!
//! Every item is one atomic transaction: delete the item's old rows across
//! the text table, the per-field tables and the denormalized table, then
//! insert the new ones. A failed item rolls back and is logged; the batch
//! continues with the next item.

use std::collections::{HashMap, HashSet};

use rusqlite::types::Value;
use rusqlite::{params, Connection, Transaction};

use crate::config::FieldConfig;
use crate::db::schema::{FieldLayout, IndexLayout, SchemaManager, SCORE_MULTIPLIER};
use crate::error::SearchError;
use crate::query::sql::placeholders;
use crate::tokenizer::WordAccumulator;
use crate::values::{to_column_value, truncate_chars, FieldValue, EXCERPT_CHARS};

/// Field ID to raw values, as supplied by the item source.
pub type FieldValues = HashMap<String, Vec<FieldValue>>;

struct ItemWriteError {
    /// The field whose storage failed, when attributable.
    field: Option<String>,
    source: SearchError,
}

impl From<rusqlite::Error> for ItemWriteError {
    fn from(e: rusqlite::Error) -> Self {
        ItemWriteError {
            field: None,
            source: e.into(),
        }
    }
}

/// Writes items for one index. Repair state (fields whose storage could not
/// be fixed) lasts for the lifetime of the indexer, i.e. one indexing run.
pub struct Indexer<'a> {
    conn: &'a mut Connection,
    layout: IndexLayout,
    repair_attempted: HashSet<String>,
    failed_fields: HashSet<String>,
}

impl<'a> Indexer<'a> {
    pub fn new(conn: &'a mut Connection, layout: IndexLayout) -> Self {
        Indexer {
            conn,
            layout,
            repair_attempted: HashSet::new(),
            failed_fields: HashSet::new(),
        }
    }

    /// Index a batch of items. Failed items are logged and skipped; the IDs
    /// actually written are returned.
    pub fn index_items(
        &mut self,
        items: &[(String, FieldValues)],
    ) -> Result<Vec<String>, SearchError> {
        let mut indexed = Vec::new();
        for (item_id, values) in items {
            match self.index_item(item_id, values) {
                Ok(()) => indexed.push(item_id.clone()),
                Err(e) => log::warn!("{}", e),
            }
        }
        Ok(indexed)
    }

    fn index_item(&mut self, item_id: &str, values: &FieldValues) -> Result<(), SearchError> {
        match self.write_item(item_id, values) {
            Ok(()) => Ok(()),
            Err(error) => {
                let Some(field) = error.field.clone() else {
                    return Err(indexing_error(item_id, error.source));
                };
                if !self.repair_attempted.insert(field.clone()) {
                    // one repair per field per run
                    if self.failed_fields.insert(field.clone()) {
                        log::error!(
                            "storage for field '{}' is still broken; skipping the field for this run",
                            field
                        );
                    }
                } else {
                    log::warn!(
                        "missing storage for field '{}' while indexing '{}'; attempting repair",
                        field,
                        item_id
                    );
                    if let Err(repair_error) = self.repair_field(&field) {
                        log::error!(
                            "repairing storage for field '{}' failed: {}; skipping the field for this run",
                            field,
                            repair_error
                        );
                        self.failed_fields.insert(field);
                    }
                }
                self.write_item(item_id, values)
                    .map_err(|e| indexing_error(item_id, e.source))
            }
        }
    }

    fn repair_field(&mut self, field_name: &str) -> Result<(), SearchError> {
        let field = self
            .layout
            .fields
            .get(field_name)
            .cloned()
            .ok_or_else(|| SearchError::InvalidField(field_name.to_string()))?;
        let config = FieldConfig {
            field_type: field.field_type,
            boost: field.boost,
        };
        let conn: &Connection = self.conn;
        let schema = SchemaManager::new(conn);
        let mut layout = self.layout.clone();
        schema.ensure_field_storage(&mut layout, field_name, &config)?;
        schema.save_layout(&layout)?;
        self.layout = layout;
        Ok(())
    }

    fn write_item(&mut self, item_id: &str, values: &FieldValues) -> Result<(), ItemWriteError> {
        let layout = &self.layout;
        let failed_fields = &self.failed_fields;
        let tx = self.conn.transaction().map_err(ItemWriteError::from)?;

        if let Some(text_table) = &layout.text_table {
            tx.execute(
                &format!("DELETE FROM {} WHERE item_id = ?1", text_table),
                params![item_id],
            )?;
        }
        for (name, field) in &layout.fields {
            if let Some(table) = &field.table {
                tx.execute(
                    &format!("DELETE FROM {} WHERE item_id = ?1", table),
                    params![item_id],
                )
                .map_err(|e| ItemWriteError {
                    field: Some(name.clone()),
                    source: e.into(),
                })?;
            }
        }
        tx.execute(
            &format!("DELETE FROM {} WHERE item_id = ?1", layout.denorm_table),
            params![item_id],
        )?;

        let mut denorm_columns: Vec<&str> = Vec::new();
        let mut denorm_values: Vec<Value> = Vec::new();
        for (name, field) in &layout.fields {
            if failed_fields.contains(name) {
                continue;
            }
            let Some(raw_values) = values.get(name) else {
                continue;
            };
            let written = if field.field_type.is_fulltext() {
                let text_table = layout.text_table.as_deref().ok_or_else(|| ItemWriteError {
                    field: Some(name.clone()),
                    source: SearchError::Backend("index has no fulltext storage".into()),
                })?;
                write_fulltext_field(
                    &tx,
                    text_table,
                    item_id,
                    name,
                    field,
                    layout.options.min_chars,
                    raw_values,
                )
            } else {
                write_value_field(&tx, item_id, name, field, raw_values)
            };
            match written {
                Ok(Some(denorm_value)) => {
                    denorm_columns.push(&field.column);
                    denorm_values.push(denorm_value);
                }
                Ok(None) => {}
                Err(source) => {
                    return Err(ItemWriteError {
                        field: Some(name.clone()),
                        source,
                    })
                }
            }
        }

        let mut columns = vec!["item_id"];
        columns.extend(denorm_columns.iter().copied());
        let mut sql_values: Vec<Value> = vec![Value::Text(item_id.to_string())];
        sql_values.extend(denorm_values);
        tx.execute(
            &format!(
                "INSERT INTO {} ({}) VALUES ({})",
                layout.denorm_table,
                columns.join(", "),
                placeholders(columns.len())
            ),
            rusqlite::params_from_iter(sql_values.iter()),
        )?;

        tx.commit().map_err(ItemWriteError::from)
    }

    /// Remove items from every table of the index.
    pub fn delete_items(&mut self, item_ids: &[String]) -> Result<(), SearchError> {
        if item_ids.is_empty() {
            return Ok(());
        }
        let layout = &self.layout;
        let tx = self.conn.transaction()?;
        let ids = placeholders(item_ids.len());
        if let Some(text_table) = &layout.text_table {
            tx.execute(
                &format!("DELETE FROM {} WHERE item_id IN ({})", text_table, ids),
                rusqlite::params_from_iter(item_ids.iter()),
            )?;
        }
        for field in layout.fields.values() {
            if let Some(table) = &field.table {
                tx.execute(
                    &format!("DELETE FROM {} WHERE item_id IN ({})", table, ids),
                    rusqlite::params_from_iter(item_ids.iter()),
                )?;
            }
        }
        tx.execute(
            &format!(
                "DELETE FROM {} WHERE item_id IN ({})",
                layout.denorm_table, ids
            ),
            rusqlite::params_from_iter(item_ids.iter()),
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Remove every item from the index, keeping the schema.
    pub fn clear(&mut self) -> Result<(), SearchError> {
        let layout = &self.layout;
        let tx = self.conn.transaction()?;
        if let Some(text_table) = &layout.text_table {
            tx.execute(&format!("DELETE FROM {}", text_table), [])?;
        }
        for field in layout.fields.values() {
            if let Some(table) = &field.table {
                tx.execute(&format!("DELETE FROM {}", table), [])?;
            }
        }
        tx.execute(&format!("DELETE FROM {}", layout.denorm_table), [])?;
        tx.commit()?;
        Ok(())
    }
}

fn indexing_error(item_id: &str, source: SearchError) -> SearchError {
    SearchError::Indexing {
        item_id: item_id.to_string(),
        message: source.to_string(),
    }
}

/// Tokenize and store one fulltext field's values. Returns the denormalized
/// excerpt.
fn write_fulltext_field(
    tx: &Transaction<'_>,
    text_table: &str,
    item_id: &str,
    field_name: &str,
    field: &FieldLayout,
    min_chars: usize,
    raw_values: &[FieldValue],
) -> Result<Option<Value>, SearchError> {
    let mut accumulator = WordAccumulator::new(min_chars);
    let mut excerpt: Option<String> = None;
    for value in raw_values {
        match value {
            FieldValue::Tokens(tokens) => {
                for token in tokens {
                    accumulator.add_text(&token.text, token.score);
                }
            }
            other => accumulator.add_text(&other.as_text(), 1.0),
        }
        if excerpt.is_none() {
            let text = value.as_text();
            let text = text.trim();
            if !text.is_empty() {
                excerpt = Some(truncate_chars(text, EXCERPT_CHARS));
            }
        }
    }
    for (word, score) in accumulator.finish() {
        let stored = (score * field.boost * SCORE_MULTIPLIER).round().max(0.0) as i64;
        tx.execute(
            &format!(
                "INSERT INTO {} (item_id, field_name, word, score) VALUES (?1, ?2, ?3, ?4)",
                text_table
            ),
            params![item_id, field_name, word, stored],
        )?;
    }
    Ok(excerpt.map(Value::Text))
}

/// Store one structured field's values, deduplicated. Returns the first
/// value for the denormalized column.
fn write_value_field(
    tx: &Transaction<'_>,
    item_id: &str,
    field_name: &str,
    field: &FieldLayout,
    raw_values: &[FieldValue],
) -> Result<Option<Value>, SearchError> {
    let table = field.table.as_deref().ok_or_else(|| {
        SearchError::Backend(format!("field '{}' has no value table", field_name))
    })?;
    let mut first: Option<Value> = None;
    let mut seen: Vec<Value> = Vec::new();
    for raw in raw_values {
        let Some(value) = to_column_value(field.field_type, raw) else {
            continue;
        };
        if seen.contains(&value) {
            continue;
        }
        tx.execute(
            &format!("INSERT INTO {} (item_id, value) VALUES (?1, ?2)", table),
            params![item_id, &value],
        )?;
        if first.is_none() {
            first = Some(value.clone());
        }
        seen.push(value);
    }
    Ok(first)
}
