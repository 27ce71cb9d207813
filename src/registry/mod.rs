//! Schema Registry - the fixed description of every catalog table
//!
//! The registry maps table names to [`TableDescription`]s and exposes the
//! schema graph used to discover joins. The catalog registry is built once,
//! on first use, and never changes afterwards.

pub mod graph;
pub mod table;

use std::collections::HashSet;
use std::sync::OnceLock;

use crate::{Error, Result};

pub use graph::{JoinEdge, Neighbor, SchemaGraph};
pub use table::{Link, TableDescription};

pub const CONFIG: &str = "config";
pub const CLASSES: &str = "classes";
pub const MANDRAGORES: &str = "mandragores";
pub const IMAGES: &str = "images";
pub const SCENES: &str = "scenes";
pub const DESCRIPTORS: &str = "descriptors";

/// The catalog tables, in creation order
pub const CATALOG_TABLES: &[TableDescription] = &[
    TableDescription::new(CONFIG, &[], &["version"], &[]),
    TableDescription::new(CLASSES, &["classID"], &["superclassID", "label"], &[]),
    TableDescription::new(MANDRAGORES, &["mandragoreID"], &["description"], &[]),
    TableDescription::new(IMAGES, &["imageID"], &["documentURL", "width", "height"], &[]),
    TableDescription::new(
        SCENES,
        &["mandragoreID", "imageID"],
        &["x", "y", "width", "height"],
        &[
            Link::new(MANDRAGORES, "mandragoreID"),
            Link::new(IMAGES, "imageID"),
        ],
    ),
    TableDescription::new(
        DESCRIPTORS,
        &["mandragoreID", "classID"],
        &["x", "y", "width", "height"],
        &[
            Link::new(MANDRAGORES, "mandragoreID"),
            Link::new(CLASSES, "classID"),
        ],
    ),
];

static REGISTRY: OnceLock<SchemaRegistry> = OnceLock::new();

/// The process-wide catalog registry
pub fn registry() -> &'static SchemaRegistry {
    REGISTRY.get_or_init(SchemaRegistry::catalog)
}

/// Immutable set of table descriptions plus their link graph
#[derive(Debug)]
pub struct SchemaRegistry {
    tables: Vec<TableDescription>,
    graph: SchemaGraph,
}

impl SchemaRegistry {
    /// Build a registry, checking every table invariant
    pub fn new(tables: Vec<TableDescription>) -> Result<Self> {
        let registry = Self::build(tables);
        registry.validate()?;
        Ok(registry)
    }

    /// The catalog schema
    pub fn catalog() -> Self {
        Self::build(CATALOG_TABLES.to_vec())
    }

    fn build(tables: Vec<TableDescription>) -> Self {
        let graph = SchemaGraph::build(&tables);
        Self { tables, graph }
    }

    /// Check names, key/field disjointness and link targets
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for table in &self.tables {
            if !names.insert(table.name) {
                return Err(Error::InvalidSchema(format!("duplicate table {}", table.name)));
            }

            let mut columns = HashSet::new();
            for column in table.keys.iter().chain(table.fields.iter()) {
                if !columns.insert(*column) {
                    return Err(Error::InvalidSchema(format!(
                        "column {} appears twice in table {}",
                        column, table.name
                    )));
                }
            }
        }

        for table in &self.tables {
            for link in table.links {
                let target = self.tables.iter().find(|t| t.name == link.target).ok_or_else(|| {
                    Error::InvalidSchema(format!(
                        "table {} links to unknown table {}",
                        table.name, link.target
                    ))
                })?;
                if !table.has_column(link.column) || !target.has_column(link.column) {
                    return Err(Error::InvalidSchema(format!(
                        "link {} -> {} uses column {} missing on one side",
                        table.name, link.target, link.column
                    )));
                }
            }
        }

        Ok(())
    }

    /// Look up a table by name
    pub fn table(&self, name: &str) -> Result<&TableDescription> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| Error::UnknownTable(name.to_string()))
    }

    pub fn tables(&self) -> &[TableDescription] {
        &self.tables
    }

    pub fn graph(&self) -> &SchemaGraph {
        &self.graph
    }

    /// Tables declaring a link to `name`
    pub fn linked_from(&self, name: &str) -> Vec<&TableDescription> {
        self.tables
            .iter()
            .filter(|t| t.links.iter().any(|l| l.target == name))
            .collect()
    }

    /// Check that `column` belongs to `table`
    pub fn check_column(&self, table: &str, column: &str) -> Result<&TableDescription> {
        let description = self.table(table)?;
        if description.has_column(column) {
            Ok(description)
        } else {
            Err(Error::UnknownColumn {
                table: table.to_string(),
                column: column.to_string(),
            })
        }
    }
}
