//! Minimal SELECT builder used by the query compilers.
//!
//! Statements are assembled from clause fragments carrying positional
//! parameters. Fragments must be appended in the order their placeholders
//! appear in the rendered statement: FROM subquery, joins, WHERE, HAVING.

use rusqlite::types::Value;

/// A piece of SQL with its positional parameters.
#[derive(Debug, Clone, Default)]
pub(crate) struct Fragment {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Fragment {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Fragment {
            sql: sql.into(),
            params,
        }
    }

    /// Combine fragments with a conjunction, parenthesizing each part.
    pub fn combine(parts: Vec<Fragment>, separator: &str) -> Fragment {
        let mut sql = String::new();
        let mut params = Vec::new();
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                sql.push_str(separator);
            }
            sql.push('(');
            sql.push_str(&part.sql);
            sql.push(')');
            params.extend(part.params);
        }
        Fragment { sql, params }
    }
}

/// One SELECT statement under construction.
#[derive(Debug, Clone, Default)]
pub(crate) struct SqlSelect {
    pub distinct: bool,
    pub columns: Vec<String>,
    /// Rendered FROM source, including its alias.
    pub from: String,
    pub from_params: Vec<Value>,
    /// Full join clauses ("LEFT JOIN t f1 ON ..."), with any parameters.
    pub joins: Vec<Fragment>,
    /// Top-level conditions, combined with AND.
    pub wheres: Vec<Fragment>,
    pub group_by: Vec<String>,
    pub havings: Vec<Fragment>,
    pub order_by: Vec<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl SqlSelect {
    /// Select `columns` from a plain table aliased as `alias`.
    pub fn from_table(columns: Vec<String>, table: &str, alias: &str) -> Self {
        SqlSelect {
            columns,
            from: format!("{} {}", table, alias),
            ..SqlSelect::default()
        }
    }

    /// Select `columns` from a rendered subquery aliased as `alias`.
    pub fn from_subquery(columns: Vec<String>, sub: &SqlSelect, alias: &str) -> Self {
        let rendered = sub.render();
        SqlSelect {
            columns,
            from: format!("({}) {}", rendered.sql, alias),
            from_params: rendered.params,
            ..SqlSelect::default()
        }
    }

    pub fn render(&self) -> Fragment {
        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(&self.columns.join(", "));
        sql.push_str(" FROM ");
        sql.push_str(&self.from);

        let mut params = self.from_params.clone();
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.sql);
            params.extend(join.params.iter().cloned());
        }
        if !self.wheres.is_empty() {
            sql.push_str(" WHERE ");
            for (i, w) in self.wheres.iter().enumerate() {
                if i > 0 {
                    sql.push_str(" AND ");
                }
                sql.push('(');
                sql.push_str(&w.sql);
                sql.push(')');
                params.extend(w.params.iter().cloned());
            }
        }
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }
        if !self.havings.is_empty() {
            sql.push_str(" HAVING ");
            for (i, h) in self.havings.iter().enumerate() {
                if i > 0 {
                    sql.push_str(" AND ");
                }
                sql.push('(');
                sql.push_str(&h.sql);
                sql.push(')');
                params.extend(h.params.iter().cloned());
            }
        }
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
            if let Some(offset) = self.offset {
                sql.push_str(&format!(" OFFSET {}", offset));
            }
        }
        Fragment { sql, params }
    }

    /// Render `SELECT COUNT(*)` over this statement, ignoring ordering and
    /// range.
    pub fn render_count(&self) -> Fragment {
        let mut inner = self.clone();
        inner.order_by.clear();
        inner.limit = None;
        inner.offset = None;
        let rendered = inner.render();
        Fragment {
            sql: format!("SELECT COUNT(*) FROM ({}) count_alias", rendered.sql),
            params: rendered.params,
        }
    }
}

/// Render a `?, ?, ...` placeholder list of the given length.
pub(crate) fn placeholders(n: usize) -> String {
    let mut out = String::with_capacity(n * 3);
    for i in 0..n {
        if i > 0 {
            out.push_str(", ");
        }
        out.push('?');
    }
    out
}

/// Escape LIKE wildcards so user text matches literally under `ESCAPE '\'`.
pub(crate) fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '%' || c == '_' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_simple_select() {
        let mut q = SqlSelect::from_table(
            vec!["t.item_id AS item_id".into(), "t.score AS score".into()],
            "words",
            "t",
        );
        q.wheres.push(Fragment::new(
            "t.word IN (?, ?)",
            vec![Value::Text("foo".into()), Value::Text("bar".into())],
        ));
        q.group_by.push("t.item_id".into());
        let rendered = q.render();
        assert_eq!(
            rendered.sql,
            "SELECT t.item_id AS item_id, t.score AS score FROM words t \
             WHERE (t.word IN (?, ?)) GROUP BY t.item_id"
        );
        assert_eq!(rendered.params.len(), 2);
    }

    #[test]
    fn test_param_order_follows_clause_order() {
        let mut inner = SqlSelect::from_table(vec!["x.item_id AS item_id".into()], "a", "x");
        inner
            .wheres
            .push(Fragment::new("x.v = ?", vec![Value::Integer(1)]));

        let mut outer = SqlSelect::from_subquery(vec!["t.item_id AS item_id".into()], &inner, "t");
        outer.joins.push(Fragment::new(
            "LEFT JOIN b f1 ON f1.item_id = t.item_id AND f1.kind = ?",
            vec![Value::Integer(2)],
        ));
        outer
            .wheres
            .push(Fragment::new("f1.v = ?", vec![Value::Integer(3)]));

        let rendered = outer.render();
        assert_eq!(
            rendered.params,
            vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]
        );
    }

    #[test]
    fn test_count_drops_order_and_range() {
        let mut q = SqlSelect::from_table(vec!["t.item_id AS item_id".into()], "a", "t");
        q.order_by.push("t.item_id ASC".into());
        q.limit = Some(10);
        q.offset = Some(5);
        let count = q.render_count();
        assert!(!count.sql.contains("ORDER BY"));
        assert!(!count.sql.contains("LIMIT"));
        assert!(count.sql.starts_with("SELECT COUNT(*) FROM ("));
    }

    #[test]
    fn test_combine_parenthesizes_parts() {
        let combined = Fragment::combine(
            vec![
                Fragment::new("a = ?", vec![Value::Integer(1)]),
                Fragment::new("b = ?", vec![Value::Integer(2)]),
            ],
            " OR ",
        );
        assert_eq!(combined.sql, "(a = ?) OR (b = ?)");
        assert_eq!(combined.params.len(), 2);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }
}
