//! Filter condition trees.
//!
//! Same shape as the keyword tree, but leaves are field conditions. Fulltext
//! conditions carry a keyword sub-expression as their value and delegate to
//! the keyword compiler.

use rusqlite::types::Value;

use crate::config::FieldType;
use crate::error::SearchError;
use crate::query::keys::{Conjunction, Keys};
use crate::values;

/// Comparison operator of a filter condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl Operator {
    pub(crate) fn sql(self) -> &'static str {
        match self {
            Operator::Equals => "=",
            Operator::NotEquals => "<>",
            Operator::LessThan => "<",
            Operator::LessThanOrEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEqual => ">=",
        }
    }

    pub fn parse(s: &str) -> Result<Operator, SearchError> {
        match s {
            "=" => Ok(Operator::Equals),
            "<>" | "!=" => Ok(Operator::NotEquals),
            "<" => Ok(Operator::LessThan),
            "<=" => Ok(Operator::LessThanOrEqual),
            ">" => Ok(Operator::GreaterThan),
            ">=" => Ok(Operator::GreaterThanOrEqual),
            other => Err(SearchError::InvalidOperator {
                field: String::new(),
                operator: other.to_string(),
            }),
        }
    }
}

/// Value side of a filter condition.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    String(String),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    /// A keyword sub-expression, for fulltext fields.
    Keys(Keys),
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        FilterValue::String(s.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        FilterValue::String(s)
    }
}

impl From<i64> for FilterValue {
    fn from(i: i64) -> Self {
        FilterValue::Integer(i)
    }
}

impl From<f64> for FilterValue {
    fn from(d: f64) -> Self {
        FilterValue::Decimal(d)
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        FilterValue::Boolean(b)
    }
}

impl From<Keys> for FilterValue {
    fn from(keys: Keys) -> Self {
        FilterValue::Keys(keys)
    }
}

impl FilterValue {
    /// Convert to the column value for a field of the given type. Dates in
    /// particular go through the calendar parser.
    pub(crate) fn to_column_value(
        &self,
        field: &str,
        field_type: FieldType,
    ) -> Result<Value, SearchError> {
        let value = match self {
            FilterValue::String(s) => {
                if field_type == FieldType::Date {
                    let t = values::parse_date(s).ok_or_else(|| {
                        SearchError::Backend(format!(
                            "cannot parse '{}' as a date for field '{}'",
                            s, field
                        ))
                    })?;
                    Value::Integer(t)
                } else {
                    Value::Text(s.clone())
                }
            }
            FilterValue::Integer(i) => Value::Integer(*i),
            FilterValue::Decimal(d) => Value::Real(*d),
            FilterValue::Boolean(b) => Value::Integer(i64::from(*b)),
            FilterValue::Keys(_) => {
                return Err(SearchError::InvalidFieldType {
                    field: field.to_string(),
                    expected: "fulltext",
                })
            }
        };
        Ok(value)
    }
}

/// A single field condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    /// `None` compiles to a presence/absence check on the field's table.
    pub value: Option<FilterValue>,
    pub operator: Operator,
}

/// A node of the filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    Condition(Condition),
    Group(FilterGroup),
}

/// A group of conditions and nested subfilters.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGroup {
    pub conjunction: Conjunction,
    pub negated: bool,
    /// Free-form markers; the facet engine excludes groups tagged
    /// `facet:<field>` when recomputing OR facets.
    pub tags: Vec<String>,
    pub children: Vec<FilterNode>,
}

impl FilterGroup {
    pub fn new(conjunction: Conjunction) -> Self {
        FilterGroup {
            conjunction,
            negated: false,
            tags: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn condition(
        mut self,
        field: impl Into<String>,
        value: Option<FilterValue>,
        operator: Operator,
    ) -> Self {
        self.children.push(FilterNode::Condition(Condition {
            field: field.into(),
            value,
            operator,
        }));
        self
    }

    pub fn group(mut self, group: FilterGroup) -> Self {
        self.children.push(FilterNode::Group(group));
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn negate(mut self) -> Self {
        self.negated = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl Default for FilterGroup {
    fn default() -> Self {
        FilterGroup::new(Conjunction::And)
    }
}
