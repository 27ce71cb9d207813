//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with tables:
//! - config(version)
//! - classes(classID, superclassID, label)
//! - mandragores(mandragoreID, description)
//! - images(imageID, documentURL, width, height)
//! - scenes(mandragoreID, imageID, x, y, width, height)
//! - descriptors(mandragoreID, classID, x, y, width, height)

pub mod schema;
pub mod sqlite;

pub use sqlite::{CatalogStore, DbStats, ImageCursor};
