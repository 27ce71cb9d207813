//! SQL statement builder
//!
//! Every identifier is checked against the registry before it reaches the
//! statement text. Values never do: they travel as positional `?` parameters.

use std::fmt;

use crate::registry::{registry, SchemaRegistry, TableDescription};
use crate::value::{Record, Value};
use crate::{Error, Result};

use super::filter::{placeholders, Criterion, TableFilter};
use super::join::{build_join, JoinPlan};

/// SQL text plus its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -- {} parameter(s)", self.sql, self.params.len())
    }
}

/// Builds statements for the tables of one registry
#[derive(Debug, Clone, Copy)]
pub struct SqlBuilder<'r> {
    registry: &'r SchemaRegistry,
}

impl SqlBuilder<'static> {
    /// Builder over the catalog registry
    pub fn catalog() -> Self {
        Self::new(registry())
    }
}

impl<'r> SqlBuilder<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r SchemaRegistry {
        self.registry
    }

    /// `SELECT <fields> FROM <join> [WHERE ...] [LIMIT ?]`
    pub fn select(
        &self,
        fields: &[String],
        plan: &JoinPlan,
        criteria: &[Criterion],
        limit: Option<usize>,
    ) -> Statement {
        let mut sql = format!("SELECT {} FROM {}", fields.join(", "), plan);
        let mut params = Vec::new();
        write_where(&mut sql, &mut params, criteria);
        if let Some(limit) = limit {
            sql.push_str(" LIMIT ?");
            params.push(Value::Integer(limit as i64));
        }
        Statement { sql, params }
    }

    /// `INSERT OR REPLACE` text for the given columns
    pub fn insert_sql(&self, table: &str, fields: &[&str]) -> Result<String> {
        let description = self.registry.table(table)?;
        for field in fields {
            self.registry.check_column(table, field)?;
        }
        Ok(format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
            description.name,
            fields.join(", "),
            placeholders(fields.len())
        ))
    }

    /// Full-row replace. Columns absent from `record` are stored as NULL.
    pub fn upsert(&self, table: &str, record: &Record) -> Result<Statement> {
        let description = self.registry.table(table)?;
        self.check_record(description, record)?;

        let fields = description.all_fields();
        let sql = self.insert_sql(table, &fields)?;
        let params = fields.iter().map(|f| record.get_or_null(f)).collect();
        Ok(Statement { sql, params })
    }

    /// Update the non-key columns present in `record`, matching on its keys
    pub fn update(&self, table: &str, record: &Record) -> Result<Statement> {
        let description = self.keyed(table)?;
        self.check_record(description, record)?;

        let changed: Vec<&str> = record.columns().filter(|c| !description.is_key(c)).collect();
        if changed.is_empty() {
            return Err(Error::EmptyUpdate(description.name.to_string()));
        }

        let assignments = changed
            .iter()
            .map(|c| format!("{} = ?", c))
            .collect::<Vec<_>>()
            .join(", ");
        let mut params: Vec<Value> = changed.iter().map(|c| record.get_or_null(c)).collect();

        let mut conditions = Vec::with_capacity(description.keys.len());
        for key in description.keys {
            let value = record.get(key).ok_or_else(|| Error::MissingKey {
                table: description.name.to_string(),
                column: key.to_string(),
            })?;
            conditions.push(format!("{} = ?", key));
            params.push(value.clone());
        }

        Ok(Statement {
            sql: format!(
                "UPDATE {} SET {} WHERE {}",
                description.name,
                assignments,
                conditions.join(" AND ")
            ),
            params,
        })
    }

    /// Delete the rows equal to `record` on each of its columns
    pub fn delete(&self, table: &str, record: &Record) -> Result<Statement> {
        let description = self.registry.table(table)?;
        self.check_record(description, record)?;
        if record.is_empty() {
            return Err(Error::InvalidFilter(format!(
                "refusing to delete every row of {}",
                description.name
            )));
        }

        let criteria: Vec<Criterion> = record
            .iter()
            .map(|(column, value)| Criterion::equals(column.to_string(), value.clone()))
            .collect();
        let mut sql = format!("DELETE FROM {}", description.name);
        let mut params = Vec::new();
        write_where(&mut sql, &mut params, &criteria);
        Ok(Statement { sql, params })
    }

    /// Fetch one row by its key values
    pub fn get(&self, table: &str, keys: &[Value]) -> Result<Statement> {
        let description = self.keyed(table)?;
        let filter = TableFilter::key(description.name, keys.iter().cloned());
        let criteria = self.field_criteria(&filter)?;
        let plan = build_join(self.registry, description.name, &[])?;
        Ok(self.select(&qualified(description, &description.all_fields()), &plan, &criteria, None))
    }

    /// Compile one filter into WHERE criteria
    pub fn field_criteria(&self, filter: &TableFilter) -> Result<Vec<Criterion>> {
        filter.criteria(self.registry)
    }

    /// Select `fields` of `table` (all of them when empty), joining every
    /// table the filters reference
    pub fn filtered_query(
        &self,
        table: &str,
        fields: &[&str],
        filters: &[TableFilter],
        limit: Option<usize>,
    ) -> Result<Statement> {
        let description = self.registry.table(table)?;
        let fields = if fields.is_empty() {
            description.all_fields()
        } else {
            for field in fields {
                self.registry.check_column(table, field)?;
            }
            fields.to_vec()
        };

        let (plan, criteria) = self.plan(description, filters)?;
        let statement = self.select(&qualified(description, &fields), &plan, &criteria, limit);
        tracing::debug!("filtered query: {}", statement);
        Ok(statement)
    }

    /// Number of rows `filtered_query` would return without a limit
    pub fn count_query(&self, table: &str, filters: &[TableFilter]) -> Result<Statement> {
        let description = self.registry.table(table)?;
        let (plan, criteria) = self.plan(description, filters)?;
        Ok(self.select(&["COUNT(*)".to_string()], &plan, &criteria, None))
    }

    fn plan(
        &self,
        description: &TableDescription,
        filters: &[TableFilter],
    ) -> Result<(JoinPlan, Vec<Criterion>)> {
        let mut criteria = Vec::new();
        let mut needed = Vec::with_capacity(filters.len());
        for filter in filters {
            criteria.extend(self.field_criteria(filter)?);
            needed.push(filter.table.as_str());
        }
        let plan = build_join(self.registry, description.name, &needed)?;
        Ok((plan, criteria))
    }

    fn keyed(&self, table: &str) -> Result<&'r TableDescription> {
        let description = self.registry.table(table)?;
        if !description.is_keyed() {
            return Err(Error::InvalidFilter(format!(
                "table {} has no key",
                description.name
            )));
        }
        Ok(description)
    }

    fn check_record(&self, description: &TableDescription, record: &Record) -> Result<()> {
        match record.columns().find(|c| !description.has_column(c)) {
            Some(column) => Err(Error::UnknownColumn {
                table: description.name.to_string(),
                column: column.to_string(),
            }),
            None => Ok(()),
        }
    }
}

fn qualified(description: &TableDescription, fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| description.qualify(f)).collect()
}

fn write_where(sql: &mut String, params: &mut Vec<Value>, criteria: &[Criterion]) {
    for (i, criterion) in criteria.iter().enumerate() {
        sql.push_str(if i == 0 { " WHERE " } else { " AND " });
        criterion.write_sql(sql, params);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> SqlBuilder<'static> {
        SqlBuilder::catalog()
    }

    #[test]
    fn test_insert_sql() {
        let sql = builder().insert_sql("classes", &["classID", "label"]).unwrap();
        assert_eq!(sql, "INSERT OR REPLACE INTO classes (classID, label) VALUES (?, ?)");
        assert!(builder().insert_sql("classes", &["width"]).is_err());
    }

    #[test]
    fn test_upsert_binds_nulls_for_missing_fields() {
        let record = Record::new().with("imageID", "img1").with("width", 640);
        let stmt = builder().upsert("images", &record).unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT OR REPLACE INTO images (imageID, documentURL, width, height) VALUES (?, ?, ?, ?)"
        );
        assert_eq!(
            stmt.params,
            vec![Value::from("img1"), Value::Null, Value::Integer(640), Value::Null]
        );
    }

    #[test]
    fn test_upsert_rejects_unknown_column() {
        let record = Record::new().with("imageID", "img1").with("label", "x");
        assert!(matches!(
            builder().upsert("images", &record),
            Err(Error::UnknownColumn { .. })
        ));
    }

    #[test]
    fn test_update_targets_supplied_columns() {
        let record = Record::new()
            .with("imageID", "img1")
            .with("width", 100)
            .with("height", 200);
        let stmt = builder().update("images", &record).unwrap();
        assert_eq!(stmt.sql, "UPDATE images SET height = ?, width = ? WHERE imageID = ?");
        assert_eq!(
            stmt.params,
            vec![Value::Integer(200), Value::Integer(100), Value::from("img1")]
        );
    }

    #[test]
    fn test_update_errors() {
        let no_key = Record::new().with("width", 100);
        assert!(matches!(
            builder().update("images", &no_key),
            Err(Error::MissingKey { .. })
        ));

        let only_key = Record::new().with("imageID", "img1");
        assert!(matches!(
            builder().update("images", &only_key),
            Err(Error::EmptyUpdate(_))
        ));

        let config = Record::new().with("version", "2.0");
        assert!(builder().update("config", &config).is_err());
    }

    #[test]
    fn test_delete() {
        let record = Record::new().with("mandragoreID", "m1");
        let stmt = builder().delete("scenes", &record).unwrap();
        assert_eq!(stmt.sql, "DELETE FROM scenes WHERE mandragoreID = ?");
        assert_eq!(stmt.params, vec![Value::from("m1")]);

        assert!(builder().delete("scenes", &Record::new()).is_err());
    }

    #[test]
    fn test_get_by_composite_key() {
        let stmt = builder()
            .get("scenes", &[Value::from("m1"), Value::from("img1")])
            .unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT scenes.mandragoreID, scenes.imageID, scenes.x, scenes.y, scenes.width, scenes.height \
             FROM scenes WHERE scenes.mandragoreID = ? AND scenes.imageID = ?"
        );
        assert!(builder().get("config", &[]).is_err());
    }

    #[test]
    fn test_filtered_query_joins_filter_tables() {
        let filters = vec![
            TableFilter::localized("scenes"),
            TableFilter::like("descriptors", "classID", "*animal*"),
        ];
        let stmt = builder()
            .filtered_query("images", &["imageID"], &filters, Some(10))
            .unwrap();
        assert!(stmt.sql.starts_with("SELECT images.imageID FROM images JOIN "));
        assert!(stmt.sql.contains("JOIN scenes ON (scenes.imageID = images.imageID)"));
        assert!(stmt.sql.contains("JOIN descriptors ON "));
        assert!(stmt.sql.contains(
            "WHERE scenes.width IS NOT NULL AND scenes.height IS NOT NULL AND descriptors.classID LIKE ?"
        ));
        assert!(stmt.sql.ends_with(" LIMIT ?"));
        assert_eq!(stmt.params, vec![Value::from("%animal%"), Value::Integer(10)]);
    }

    #[test]
    fn test_values_never_reach_sql_text() {
        let hostile = "x'; DROP TABLE images; --";
        let filters = vec![TableFilter::eq("images", "documentURL", hostile)];
        let stmt = builder().filtered_query("images", &[], &filters, None).unwrap();
        assert!(!stmt.sql.contains(hostile));
        assert_eq!(stmt.params, vec![Value::from(hostile)]);

        let record = Record::new().with("imageID", hostile);
        let stmt = builder().upsert("images", &record).unwrap();
        assert!(!stmt.sql.contains(hostile));
    }

    #[test]
    fn test_count_query() {
        let filters = vec![TableFilter::eq("images", "width", Value::Null)];
        let stmt = builder().count_query("images", &filters).unwrap();
        assert_eq!(stmt.sql, "SELECT COUNT(*) FROM images WHERE images.width IS NULL");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_unreachable_filter_table() {
        let filters = vec![TableFilter::eq("config", "version", "1.0")];
        assert!(matches!(
            builder().filtered_query("images", &[], &filters, None),
            Err(Error::CannotJoin { .. })
        ));
    }

    #[test]
    fn test_filtered_query_rejects_unknown_field() {
        assert!(builder().filtered_query("images", &["label"], &[], None).is_err());
    }
}
