//! # mdlg - Mandragore illumination catalog
//!
//! Embedded relational persistence for a manuscript-illumination catalog
//! (classes, mandragores, images, scenes, descriptors).
//!
//! mdlg provides:
//! - A static schema registry describing every table and its links
//! - Join path discovery between any two linked tables
//! - A SQL statement builder driven by a typed filter DSL
//! - A SQLite-backed store with full-row upserts and targeted updates
//! - A bulk CSV loader tolerant to malformed rows

pub mod value;
pub mod registry;
pub mod query;
pub mod storage;
pub mod import;
pub mod config;
pub mod ui;

use std::path::PathBuf;

// Re-exports for convenient access
pub use value::{Record, Value};
pub use registry::{registry, SchemaRegistry, TableDescription};
pub use query::{Filter, SqlBuilder, Statement, TableFilter};
pub use storage::CatalogStore;
pub use import::{CsvSource, ImportReport, ImportWarning};

/// Result type alias for mdlg operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for mdlg operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Unknown column {column} in table {table}")]
    UnknownColumn { table: String, column: String },

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Cannot join the tables {from} and {to}")]
    CannotJoin { from: String, to: String },

    #[error("Invalid join order - neither {left} nor {right} is joined yet")]
    JoinOrder { left: String, right: String },

    #[error("Invalid join operation - tables {left} and {right} are already joined")]
    AlreadyJoined { left: String, right: String },

    #[error("Missing tables in join: {}", .0.join(", "))]
    MissingTables(Vec<String>),

    #[error("Missing key column {column} for table {table}")]
    MissingKey { table: String, column: String },

    #[error("Nothing to update in table {0}")]
    EmptyUpdate(String),

    #[error("Schema has not been created yet")]
    SchemaMissing,

    #[error("Store is not connected")]
    Disconnected,

    #[error("Missing source file: {}", .0.display())]
    MissingFile(PathBuf),
}
