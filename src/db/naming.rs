//! Identifier derivation for generated tables and columns.
//!
//! Table and column names are derived deterministically from index and field
//! ids, normalized to a safe character set and kept under the identifier
//! length ceiling, with numeric suffixes resolving collisions.

use std::collections::HashSet;

use rusqlite::Connection;

use crate::error::SearchError;

/// Hard ceiling on generated identifier length.
pub(crate) const MAX_IDENTIFIER_LEN: usize = 62;

/// Normalize an arbitrary id into a safe SQL identifier fragment:
/// lower-cased, `[a-z0-9_]` only, never starting with a digit.
pub(crate) fn safe_identifier(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else {
            out.push('_');
        }
    }
    if out.is_empty() {
        out.push('_');
    }
    if out.as_bytes()[0].is_ascii_digit() {
        out.insert(0, '_');
    }
    out
}

fn clipped(base: &str, max: usize) -> &str {
    // safe_identifier output is ASCII, so byte indexing is fine
    &base[..base.len().min(max)]
}

pub(crate) fn table_exists(conn: &Connection, name: &str) -> Result<bool, SearchError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub(crate) fn column_exists(
    conn: &Connection,
    table: &str,
    column: &str,
) -> Result<bool, SearchError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Derive a table name from `base` that does not collide with any existing
/// table, truncating and suffixing as needed.
pub(crate) fn unique_table_name(conn: &Connection, base: &str) -> Result<String, SearchError> {
    let base = safe_identifier(base);
    let candidate = clipped(&base, MAX_IDENTIFIER_LEN).to_string();
    if !table_exists(conn, &candidate)? {
        return Ok(candidate);
    }
    for n in 0u32.. {
        let suffix = format!("_{}", n);
        let candidate = format!(
            "{}{}",
            clipped(&base, MAX_IDENTIFIER_LEN - suffix.len()),
            suffix
        );
        if !table_exists(conn, &candidate)? {
            return Ok(candidate);
        }
    }
    unreachable!("suffix space exhausted");
}

/// Derive a column name from `base` that is unique within `taken`.
pub(crate) fn unique_column_name(taken: &HashSet<String>, base: &str) -> String {
    let base = safe_identifier(base);
    let candidate = clipped(&base, MAX_IDENTIFIER_LEN).to_string();
    if !taken.contains(&candidate) {
        return candidate;
    }
    for n in 0u32.. {
        let suffix = format!("_{}", n);
        let candidate = format!(
            "{}{}",
            clipped(&base, MAX_IDENTIFIER_LEN - suffix.len()),
            suffix
        );
        if !taken.contains(&candidate) {
            return candidate;
        }
    }
    unreachable!("suffix space exhausted");
}
