//! Physical schema management.
//!
//! Each index owns one shared text table for all fulltext fields, one
//! dedicated table per other field, and one denormalized single-row-per-item
//! table with one column per field. The mapping from logical fields to
//! physical tables and columns is persisted as JSON in a key-value metadata
//! table, so the layout survives restarts and field renames of the generated
//! identifiers stay stable.

use std::collections::{BTreeMap, HashSet};

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::config::{FieldConfig, FieldType, IndexConfig, IndexOptions};
use crate::db::naming;
use crate::error::SearchError;

pub(crate) const META_TABLE: &str = "searchlite_meta";

/// Fixed multiplier turning float relevance scores into stored integers.
pub(crate) const SCORE_MULTIPLIER: f64 = 1000.0;

/// Physical storage of one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldLayout {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub boost: f64,
    /// Dedicated value table; `None` for fulltext fields, which share the
    /// index's text table.
    pub table: Option<String>,
    /// Column in the denormalized table.
    pub column: String,
}

/// Physical layout of one index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexLayout {
    pub index_id: String,
    /// Shared word table; created lazily with the first fulltext field.
    pub text_table: Option<String>,
    pub denorm_table: String,
    pub fields: BTreeMap<String, FieldLayout>,
    pub options: IndexOptions,
}

impl IndexLayout {
    pub(crate) fn field(&self, name: &str) -> Result<&FieldLayout, SearchError> {
        self.fields
            .get(name)
            .ok_or_else(|| SearchError::InvalidField(name.to_string()))
    }

    /// IDs of all fulltext fields, in deterministic order.
    pub(crate) fn fulltext_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(_, f)| f.field_type.is_fulltext())
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn taken_columns(&self) -> HashSet<String> {
        let mut taken: HashSet<String> =
            self.fields.values().map(|f| f.column.clone()).collect();
        taken.insert("item_id".to_string());
        taken
    }
}

/// Outcome of reconciling one field's physical storage with its
/// configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldChange {
    Unchanged,
    Updated { reindex: bool },
}

impl FieldChange {
    pub fn needs_reindex(self) -> bool {
        matches!(self, FieldChange::Updated { reindex: true })
    }
}

/// Creates, alters and drops the physical tables backing an index.
///
/// Every mutation is existence-checked so that re-running it is harmless.
pub struct SchemaManager<'a> {
    conn: &'a Connection,
}

impl<'a> SchemaManager<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        SchemaManager { conn }
    }

    fn ensure_meta_table(&self) -> Result<(), SearchError> {
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
            META_TABLE
        ))?;
        Ok(())
    }

    pub fn load_layout(&self, index_id: &str) -> Result<Option<IndexLayout>, SearchError> {
        self.ensure_meta_table()?;
        let json: Option<String> = self
            .conn
            .query_row(
                &format!("SELECT value FROM {} WHERE key = ?1", META_TABLE),
                params![layout_key(index_id)],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            None => Ok(None),
            Some(json) => serde_json::from_str(&json).map(Some).map_err(|e| {
                SearchError::Backend(format!(
                    "corrupt layout metadata for index '{}': {}",
                    index_id, e
                ))
            }),
        }
    }

    pub fn save_layout(&self, layout: &IndexLayout) -> Result<(), SearchError> {
        self.ensure_meta_table()?;
        let json = serde_json::to_string(layout)
            .map_err(|e| SearchError::Backend(format!("cannot serialize layout: {}", e)))?;
        self.conn.execute(
            &format!(
                "INSERT INTO {} (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                META_TABLE
            ),
            params![layout_key(&layout.index_id), json],
        )?;
        Ok(())
    }

    fn delete_layout(&self, index_id: &str) -> Result<(), SearchError> {
        self.ensure_meta_table()?;
        self.conn.execute(
            &format!("DELETE FROM {} WHERE key = ?1", META_TABLE),
            params![layout_key(index_id)],
        )?;
        Ok(())
    }

    /// Make sure every table and column required by `config` exists,
    /// reconciling against the stored layout. Returns the up-to-date layout.
    pub fn ensure_index_storage(
        &self,
        config: &IndexConfig,
    ) -> Result<IndexLayout, SearchError> {
        config.validate()?;
        let mut layout = match self.load_layout(&config.id)? {
            Some(layout) => layout,
            None => {
                let denorm_table = naming::unique_table_name(
                    self.conn,
                    &format!("search_{}", naming::safe_identifier(&config.id)),
                )?;
                IndexLayout {
                    index_id: config.id.clone(),
                    text_table: None,
                    denorm_table,
                    fields: BTreeMap::new(),
                    options: config.options.clone(),
                }
            }
        };
        self.ensure_denorm_table(&layout)?;
        for (name, field) in &config.fields {
            self.ensure_field_storage(&mut layout, name, field)?;
        }
        layout.options = config.options.clone();
        self.save_layout(&layout)?;
        Ok(layout)
    }

    fn ensure_denorm_table(&self, layout: &IndexLayout) -> Result<(), SearchError> {
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                item_id VARCHAR(50) NOT NULL,
                PRIMARY KEY (item_id)
            );",
            layout.denorm_table
        ))?;
        Ok(())
    }

    fn ensure_text_table(&self, layout: &mut IndexLayout) -> Result<String, SearchError> {
        let table = match &layout.text_table {
            Some(table) => table.clone(),
            None => {
                let table = naming::unique_table_name(
                    self.conn,
                    &format!("search_{}_text", naming::safe_identifier(&layout.index_id)),
                )?;
                layout.text_table = Some(table.clone());
                table
            }
        };
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {t} (
                item_id VARCHAR(50) NOT NULL,
                field_name VARCHAR(255) NOT NULL,
                word VARCHAR(50) NOT NULL,
                score INT UNSIGNED NOT NULL,
                PRIMARY KEY (item_id, field_name, word)
            );
            CREATE INDEX IF NOT EXISTS {t}_word ON {t} (word);",
            t = table
        ))?;
        Ok(table)
    }

    fn create_value_table(&self, table: &str, field_type: FieldType) -> Result<(), SearchError> {
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {t} (
                item_id VARCHAR(50) NOT NULL,
                value {ty} NOT NULL,
                PRIMARY KEY (item_id, value)
            );
            CREATE INDEX IF NOT EXISTS {t}_value ON {t} (value);",
            t = table,
            ty = field_type.sql_type()
        ))?;
        Ok(())
    }

    fn ensure_denorm_column(
        &self,
        layout: &IndexLayout,
        column: &str,
        field_type: FieldType,
    ) -> Result<(), SearchError> {
        if !naming::column_exists(self.conn, &layout.denorm_table, column)? {
            self.conn.execute_batch(&format!(
                "ALTER TABLE {} ADD COLUMN {} {};",
                layout.denorm_table,
                column,
                field_type.sql_type()
            ))?;
        }
        Ok(())
    }

    /// Reconcile one field's physical storage with its configuration.
    pub fn ensure_field_storage(
        &self,
        layout: &mut IndexLayout,
        field_name: &str,
        config: &FieldConfig,
    ) -> Result<FieldChange, SearchError> {
        match layout.fields.get(field_name).cloned() {
            None => {
                let column = naming::unique_column_name(&layout.taken_columns(), field_name);
                let table = self.create_storage(layout, field_name, config.field_type)?;
                self.ensure_denorm_column(layout, &column, config.field_type)?;
                layout.fields.insert(
                    field_name.to_string(),
                    FieldLayout {
                        field_type: config.field_type,
                        boost: config.boost,
                        table,
                        column,
                    },
                );
                Ok(FieldChange::Updated { reindex: true })
            }
            Some(old) => self.update_field_storage(layout, field_name, &old, config),
        }
    }

    fn create_storage(
        &self,
        layout: &mut IndexLayout,
        field_name: &str,
        field_type: FieldType,
    ) -> Result<Option<String>, SearchError> {
        if field_type.is_fulltext() {
            self.ensure_text_table(layout)?;
            Ok(None)
        } else {
            let table = naming::unique_table_name(
                self.conn,
                &format!(
                    "search_{}_{}",
                    naming::safe_identifier(&layout.index_id),
                    naming::safe_identifier(field_name)
                ),
            )?;
            self.create_value_table(&table, field_type)?;
            Ok(Some(table))
        }
    }

    fn update_field_storage(
        &self,
        layout: &mut IndexLayout,
        field_name: &str,
        old: &FieldLayout,
        config: &FieldConfig,
    ) -> Result<FieldChange, SearchError> {
        let new_type = config.field_type;
        if old.field_type == new_type {
            // Repair path: make sure the physical objects still exist.
            if new_type.is_fulltext() {
                self.ensure_text_table(layout)?;
            } else if let Some(table) = &old.table {
                self.create_value_table(table, new_type)?;
            }
            self.ensure_denorm_column(layout, &old.column, new_type)?;

            if (old.boost - config.boost).abs() > f64::EPSILON {
                if new_type.is_fulltext() {
                    self.rescale_scores(layout, field_name, old.boost, config.boost)?;
                }
                if let Some(entry) = layout.fields.get_mut(field_name) {
                    entry.boost = config.boost;
                }
                return Ok(FieldChange::Updated { reindex: false });
            }
            return Ok(FieldChange::Unchanged);
        }

        let was_fulltext = old.field_type.is_fulltext();
        let is_fulltext = new_type.is_fulltext();
        if was_fulltext != is_fulltext {
            // The physical storage differs entirely; purge and rebuild.
            self.purge_field_data(layout, field_name, old)?;
            let table = self.create_storage(layout, field_name, new_type)?;
            self.migrate_denorm_column(layout, &old.column, new_type)?;
            if let Some(entry) = layout.fields.get_mut(field_name) {
                entry.field_type = new_type;
                entry.boost = config.boost;
                entry.table = table;
            }
            return Ok(FieldChange::Updated { reindex: true });
        }

        // Both structured; the dedicated table sticks around.
        let column_change = old.field_type.sql_type() != new_type.sql_type();
        let date_change =
            old.field_type == FieldType::Date || new_type == FieldType::Date;
        if column_change {
            if let Some(table) = &old.table {
                self.conn
                    .execute_batch(&format!("DROP TABLE IF EXISTS {};", table))?;
                self.create_value_table(table, new_type)?;
            }
            self.migrate_denorm_column(layout, &old.column, new_type)?;
        }
        if let Some(entry) = layout.fields.get_mut(field_name) {
            entry.field_type = new_type;
            entry.boost = config.boost;
        }
        Ok(FieldChange::Updated {
            reindex: column_change || date_change,
        })
    }

    /// Boost changes on fulltext fields rescale stored scores in place
    /// instead of forcing a reindex.
    fn rescale_scores(
        &self,
        layout: &IndexLayout,
        field_name: &str,
        old_boost: f64,
        new_boost: f64,
    ) -> Result<(), SearchError> {
        let Some(text_table) = &layout.text_table else {
            return Ok(());
        };
        if old_boost <= 0.0 {
            // Nothing meaningful to rescale from; a reindex is the only way
            // to recover scores.
            log::warn!(
                "boost for field '{}' changed from 0; stored scores cannot be rescaled",
                field_name
            );
            return Ok(());
        }
        self.conn.execute(
            &format!(
                "UPDATE {} SET score = CAST(ROUND(score * ?1) AS INTEGER) WHERE field_name = ?2",
                text_table
            ),
            params![new_boost / old_boost, field_name],
        )?;
        Ok(())
    }

    fn purge_field_data(
        &self,
        layout: &IndexLayout,
        field_name: &str,
        old: &FieldLayout,
    ) -> Result<(), SearchError> {
        if old.field_type.is_fulltext() {
            if let Some(text_table) = &layout.text_table {
                if naming::table_exists(self.conn, text_table)? {
                    self.conn.execute(
                        &format!("DELETE FROM {} WHERE field_name = ?1", text_table),
                        params![field_name],
                    )?;
                }
            }
        } else if let Some(table) = &old.table {
            self.conn
                .execute_batch(&format!("DROP TABLE IF EXISTS {};", table))?;
        }
        Ok(())
    }

    /// Replace the denormalized column with one of the new type. Values are
    /// not carried over; the caller triggers a reindex.
    fn migrate_denorm_column(
        &self,
        layout: &IndexLayout,
        column: &str,
        new_type: FieldType,
    ) -> Result<(), SearchError> {
        if naming::column_exists(self.conn, &layout.denorm_table, column)? {
            self.conn.execute_batch(&format!(
                "ALTER TABLE {d} DROP COLUMN {c};",
                d = layout.denorm_table,
                c = column
            ))?;
        }
        self.conn.execute_batch(&format!(
            "ALTER TABLE {d} ADD COLUMN {c} {ty};",
            d = layout.denorm_table,
            c = column,
            ty = new_type.sql_type()
        ))?;
        Ok(())
    }

    /// Remove a field's storage and its layout entry.
    pub fn drop_field(
        &self,
        layout: &mut IndexLayout,
        field_name: &str,
    ) -> Result<(), SearchError> {
        let Some(old) = layout.fields.get(field_name).cloned() else {
            return Ok(());
        };
        self.purge_field_data(layout, field_name, &old)?;
        if naming::column_exists(self.conn, &layout.denorm_table, &old.column)? {
            self.conn.execute_batch(&format!(
                "ALTER TABLE {} DROP COLUMN {};",
                layout.denorm_table, old.column
            ))?;
        }
        layout.fields.remove(field_name);
        self.save_layout(layout)?;
        Ok(())
    }

    /// Drop every table belonging to an index, and its metadata.
    pub fn drop_index(&self, index_id: &str) -> Result<(), SearchError> {
        if let Some(layout) = self.load_layout(index_id)? {
            for field in layout.fields.values() {
                if let Some(table) = &field.table {
                    self.conn
                        .execute_batch(&format!("DROP TABLE IF EXISTS {};", table))?;
                }
            }
            if let Some(text_table) = &layout.text_table {
                self.conn
                    .execute_batch(&format!("DROP TABLE IF EXISTS {};", text_table))?;
            }
            self.conn
                .execute_batch(&format!("DROP TABLE IF EXISTS {};", layout.denorm_table))?;
        }
        self.delete_layout(index_id)
    }
}

fn layout_key(index_id: &str) -> String {
    format!("index:{}", index_id)
}
