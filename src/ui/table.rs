use tabled::{builder::Builder, settings::Style, Table, Tabled};

use crate::storage::DbStats;
use crate::value::Record;

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Table")]
    pub table: String,
    #[tabled(rename = "Rows")]
    pub rows: String,
}

#[derive(Default)]
pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self, table: &str, rows: &str) {
        self.rows.push(TableRow {
            table: table.to_string(),
            rows: rows.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

pub fn stats_table(stats: &DbStats) -> String {
    let mut builder = TableBuilder::new();
    for (table, count) in &stats.tables {
        builder.add_row(table, &count.to_string());
    }
    builder.build()
}

/// Records as a table, one column per name in `columns`
pub fn records_table(columns: &[String], records: &[Record]) -> String {
    if records.is_empty() {
        return String::new();
    }

    let mut builder = Builder::default();
    builder.push_record(columns.iter().cloned());
    for record in records {
        builder.push_record(columns.iter().map(|c| match record.get(c) {
            Some(value) if !value.is_null() => value.to_string(),
            _ => String::new(),
        }));
    }
    builder.build().with(Style::rounded()).to_string()
}
