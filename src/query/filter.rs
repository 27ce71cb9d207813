//! Filter DSL
//!
//! A [`TableFilter`] pairs a table with a [`Filter`]. Filters are built either
//! through the typed constructors or parsed from the textual form
//! `name[:like|:list]`, and compile to [`Criterion`]s over qualified columns.
//!
//! Reserved names:
//! - `ID` - the table's key columns (composite keys are matched together)
//! - `localized` - rows whose `width` and `height` are both set

use crate::registry::SchemaRegistry;
use crate::value::Value;
use crate::{Error, Result};

const KEYS: &str = "ID";
const LOCALIZED: &str = "localized";

/// Column(s) a pattern or membership filter applies to
#[derive(Debug, Clone, PartialEq)]
pub enum FieldTarget {
    /// All key columns of the table
    Keys,
    Column(String),
}

/// A single filter on one table
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Equality on every key column, one value per key
    KeyMatch(Vec<Value>),
    /// `width` and `height` both present
    Localized,
    /// Equality; a NULL value matches missing values
    Equals { column: String, value: Value },
    /// Wildcard match, `*` matching any run of characters
    Like { target: FieldTarget, pattern: String },
    /// Membership; every row holds one value per target column
    In { target: FieldTarget, values: Vec<Vec<Value>> },
}

/// Raw value accompanying a textual filter spec
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Empty,
    Scalar(Value),
    List(Vec<Value>),
    Tuples(Vec<Vec<Value>>),
}

impl From<Value> for FilterValue {
    fn from(value: Value) -> Self {
        FilterValue::Scalar(value)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Scalar(value.into())
    }
}

impl From<Vec<Value>> for FilterValue {
    fn from(values: Vec<Value>) -> Self {
        FilterValue::List(values)
    }
}

impl Filter {
    /// Parse a `name[:like|:list]` spec with its value
    pub fn from_spec(spec: &str, value: FilterValue) -> Result<Self> {
        let (name, suffix) = match spec.split_once(':') {
            Some((name, suffix)) => (name, Some(suffix)),
            None => (spec, None),
        };
        if name.is_empty() {
            return Err(Error::InvalidFilter(format!("empty field name in '{}'", spec)));
        }

        let invalid = |reason: &str| Error::InvalidFilter(format!("{}: {}", spec, reason));

        match (name, suffix) {
            (LOCALIZED, None) => Ok(Filter::Localized),
            (LOCALIZED, Some(_)) => Err(invalid("localized takes no operator")),

            (KEYS, None) => match value {
                FilterValue::Scalar(v) => Ok(Filter::KeyMatch(vec![v])),
                FilterValue::List(values) if !values.is_empty() => Ok(Filter::KeyMatch(values)),
                FilterValue::Tuples(rows) => Filter::membership(FieldTarget::Keys, rows),
                _ => Err(invalid("expected a key value, a key tuple or a list of key tuples")),
            },
            (KEYS, Some("like")) => Ok(Filter::Like {
                target: FieldTarget::Keys,
                pattern: pattern_of(value).ok_or_else(|| invalid("expected a text pattern"))?,
            }),
            (KEYS, Some("list")) => {
                let values = match value {
                    FilterValue::List(values) => values.into_iter().map(|v| vec![v]).collect(),
                    FilterValue::Tuples(rows) => rows,
                    _ => return Err(invalid("expected a list of keys")),
                };
                Filter::membership(FieldTarget::Keys, values)
            }

            (column, None) => match value {
                FilterValue::Scalar(value) => Ok(Filter::Equals {
                    column: column.to_string(),
                    value,
                }),
                FilterValue::Empty => Ok(Filter::Equals {
                    column: column.to_string(),
                    value: Value::Null,
                }),
                _ => Err(invalid("expected a single value")),
            },
            (column, Some("like")) => Ok(Filter::Like {
                target: FieldTarget::Column(column.to_string()),
                pattern: pattern_of(value).ok_or_else(|| invalid("expected a text pattern"))?,
            }),
            (column, Some("list")) => match value {
                FilterValue::List(values) => Filter::membership(
                    FieldTarget::Column(column.to_string()),
                    values.into_iter().map(|v| vec![v]).collect(),
                ),
                _ => Err(invalid("expected a list of values")),
            },

            (_, Some(other)) => Err(invalid(&format!("unknown operator '{}'", other))),
        }
    }

    fn membership(target: FieldTarget, values: Vec<Vec<Value>>) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::InvalidFilter("empty value list".to_string()));
        }
        Ok(Filter::In { target, values })
    }
}

fn pattern_of(value: FilterValue) -> Option<String> {
    match value {
        FilterValue::Scalar(Value::Text(pattern)) => Some(pattern),
        FilterValue::Scalar(Value::Integer(i)) => Some(i.to_string()),
        _ => None,
    }
}

/// A filter applied to one table of the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct TableFilter {
    pub table: String,
    pub filter: Filter,
}

impl TableFilter {
    pub fn new(table: impl Into<String>, filter: Filter) -> Self {
        Self {
            table: table.into(),
            filter,
        }
    }

    /// Parse from the `name[:like|:list]` form
    pub fn parse(table: impl Into<String>, spec: &str, value: impl Into<FilterValue>) -> Result<Self> {
        Ok(Self::new(table, Filter::from_spec(spec, value.into())?))
    }

    /// Match a row by its key values, in key order
    pub fn key<V: Into<Value>>(table: impl Into<String>, keys: impl IntoIterator<Item = V>) -> Self {
        Self::new(table, Filter::KeyMatch(keys.into_iter().map(Into::into).collect()))
    }

    pub fn localized(table: impl Into<String>) -> Self {
        Self::new(table, Filter::Localized)
    }

    pub fn eq(table: impl Into<String>, column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(
            table,
            Filter::Equals {
                column: column.into(),
                value: value.into(),
            },
        )
    }

    pub fn like(table: impl Into<String>, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(
            table,
            Filter::Like {
                target: FieldTarget::Column(column.into()),
                pattern: pattern.into(),
            },
        )
    }

    pub fn key_like(table: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(
            table,
            Filter::Like {
                target: FieldTarget::Keys,
                pattern: pattern.into(),
            },
        )
    }

    /// Match rows whose `column` is one of `values`
    pub fn any_of<V: Into<Value>>(
        table: impl Into<String>,
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::new(
            table,
            Filter::In {
                target: FieldTarget::Column(column.into()),
                values: values.into_iter().map(|v| vec![v.into()]).collect(),
            },
        )
    }

    /// Match rows whose key tuple is one of `keys`
    pub fn keys_in(table: impl Into<String>, keys: Vec<Vec<Value>>) -> Self {
        Self::new(
            table,
            Filter::In {
                target: FieldTarget::Keys,
                values: keys,
            },
        )
    }

    /// Parse a command-line filter option.
    ///
    /// Accepted forms: `localized`, `[field==]value`, `[field==]v1,v2,...`
    /// and `[field==]pat*tern`. The field defaults to the table key, and an
    /// empty value (`field==`) matches missing values.
    pub fn from_option(table: impl Into<String>, raw: &str) -> Result<Self> {
        if raw == LOCALIZED {
            return Ok(Self::localized(table));
        }

        let (field, value) = match raw.split_once("==") {
            Some((field, value)) => (field, value),
            None => (KEYS, raw),
        };

        if value.is_empty() {
            Self::parse(table, field, FilterValue::Empty)
        } else if value.contains(',') {
            let values = value.split(',').map(Value::from).collect::<Vec<_>>();
            Self::parse(table, &format!("{}:list", field), FilterValue::List(values))
        } else if value.contains('*') {
            Self::parse(table, &format!("{}:like", field), value)
        } else {
            Self::parse(table, field, value)
        }
    }

    /// Compile into criteria over columns qualified by the filter's table
    pub fn criteria(&self, registry: &SchemaRegistry) -> Result<Vec<Criterion>> {
        let table = registry.table(&self.table)?;

        let column = |name: &str| -> Result<String> {
            registry.check_column(table.name, name)?;
            Ok(table.qualify(name))
        };
        let keys = || -> Result<Vec<String>> {
            if !table.is_keyed() {
                return Err(Error::InvalidFilter(format!("table {} has no key", table.name)));
            }
            Ok(table.keys.iter().map(|k| table.qualify(k)).collect())
        };

        match &self.filter {
            Filter::KeyMatch(values) => {
                let keys = keys()?;
                if keys.len() != values.len() {
                    return Err(Error::InvalidFilter(format!(
                        "table {} has {} key column(s), got {} value(s)",
                        table.name,
                        keys.len(),
                        values.len()
                    )));
                }
                Ok(keys
                    .into_iter()
                    .zip(values.iter().cloned())
                    .map(|(column, value)| Criterion::equals(column, value))
                    .collect())
            }
            Filter::Localized => Ok(vec![
                Criterion::IsNotNull(column("width")?),
                Criterion::IsNotNull(column("height")?),
            ]),
            Filter::Equals { column: name, value } => {
                Ok(vec![Criterion::equals(column(name)?, value.clone())])
            }
            Filter::Like { target, pattern } => {
                let column = match target {
                    FieldTarget::Column(name) => column(name)?,
                    FieldTarget::Keys => {
                        let mut keys = keys()?;
                        if keys.len() != 1 {
                            return Err(Error::InvalidFilter(format!(
                                "pattern match on the composite key of {}",
                                table.name
                            )));
                        }
                        keys.remove(0)
                    }
                };
                Ok(vec![Criterion::Like {
                    column,
                    pattern: pattern.replace('*', "%"),
                }])
            }
            Filter::In { target, values } => {
                let columns = match target {
                    FieldTarget::Column(name) => vec![column(name)?],
                    FieldTarget::Keys => keys()?,
                };
                if values.is_empty() {
                    return Err(Error::InvalidFilter(format!(
                        "empty value list on {}",
                        table.name
                    )));
                }
                if let Some(row) = values.iter().find(|row| row.len() != columns.len()) {
                    return Err(Error::InvalidFilter(format!(
                        "expected {} value(s) per entry on {}, got {}",
                        columns.len(),
                        table.name,
                        row.len()
                    )));
                }
                Ok(vec![Criterion::In {
                    columns,
                    rows: values.clone(),
                }])
            }
        }
    }
}

/// A compiled WHERE predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    Equals { column: String, value: Value },
    Like { column: String, pattern: String },
    IsNull(String),
    IsNotNull(String),
    In { columns: Vec<String>, rows: Vec<Vec<Value>> },
}

impl Criterion {
    /// Equality, turning a NULL value into `IS NULL`
    pub fn equals(column: String, value: Value) -> Self {
        if value.is_null() {
            Criterion::IsNull(column)
        } else {
            Criterion::Equals { column, value }
        }
    }

    /// Append the predicate text to `sql` and its values to `params`
    pub fn write_sql(&self, sql: &mut String, params: &mut Vec<Value>) {
        match self {
            Criterion::Equals { column, value } => {
                sql.push_str(&format!("{} = ?", column));
                params.push(value.clone());
            }
            Criterion::Like { column, pattern } => {
                sql.push_str(&format!("{} LIKE ?", column));
                params.push(Value::Text(pattern.clone()));
            }
            Criterion::IsNull(column) => {
                sql.push_str(&format!("{} IS NULL", column));
            }
            Criterion::IsNotNull(column) => {
                sql.push_str(&format!("{} IS NOT NULL", column));
            }
            Criterion::In { columns, rows } if columns.len() == 1 => {
                sql.push_str(&format!("{} IN ({})", columns[0], placeholders(rows.len())));
                params.extend(rows.iter().flatten().cloned());
            }
            Criterion::In { columns, rows } => {
                let tuple = format!("({})", placeholders(columns.len()));
                let tuples = vec![tuple; rows.len()].join(", ");
                sql.push_str(&format!("({}) IN (VALUES {})", columns.join(", "), tuples));
                params.extend(rows.iter().flatten().cloned());
            }
        }
    }
}

/// `?, ?, ?` with `count` placeholders
pub fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
