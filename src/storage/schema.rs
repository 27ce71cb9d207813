//! Database schema definitions
//!
//! Links between tables are not declared as SQL foreign keys: dumps reference
//! mandragores that are never loaded.

/// Version string written to the config table
pub const SCHEMA_VERSION: &str = "1.0";

/// SQL to drop every catalog table
pub const DROP_TABLES: &[&str] = &[
    "DROP TABLE IF EXISTS config",
    "DROP TABLE IF EXISTS classes",
    "DROP TABLE IF EXISTS mandragores",
    "DROP TABLE IF EXISTS images",
    "DROP TABLE IF EXISTS scenes",
    "DROP TABLE IF EXISTS descriptors",
];

/// SQL to create the config table
pub const CREATE_CONFIG_TABLE: &str = r#"
CREATE TABLE config (
    version TEXT NOT NULL
)
"#;

/// SQL to create the classes table
pub const CREATE_CLASSES_TABLE: &str = r#"
CREATE TABLE classes (
    classID TEXT PRIMARY KEY,
    superclassID TEXT,
    label TEXT
)
"#;

/// SQL to create the mandragores table
pub const CREATE_MANDRAGORES_TABLE: &str = r#"
CREATE TABLE mandragores (
    mandragoreID TEXT PRIMARY KEY,
    description TEXT
)
"#;

/// SQL to create the images table
pub const CREATE_IMAGES_TABLE: &str = r#"
CREATE TABLE images (
    imageID TEXT PRIMARY KEY,
    documentURL TEXT,
    width INTEGER,
    height INTEGER
)
"#;

/// SQL to create the scenes table
/// One row per mandragore notice located in an image
pub const CREATE_SCENES_TABLE: &str = r#"
CREATE TABLE scenes (
    mandragoreID TEXT NOT NULL,
    imageID TEXT NOT NULL,
    x INTEGER,
    y INTEGER,
    width INTEGER,
    height INTEGER,
    PRIMARY KEY (mandragoreID, imageID)
)
"#;

/// SQL to create the descriptors table
pub const CREATE_DESCRIPTORS_TABLE: &str = r#"
CREATE TABLE descriptors (
    mandragoreID TEXT NOT NULL,
    classID TEXT NOT NULL,
    x INTEGER,
    y INTEGER,
    width INTEGER,
    height INTEGER,
    PRIMARY KEY (mandragoreID, classID)
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX idx_scenes_image ON scenes(imageID)",
    "CREATE INDEX idx_descriptors_class ON descriptors(classID)",
];

/// Every statement rebuilding the schema from scratch, version row included
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = DROP_TABLES.to_vec();
    stmts.extend([
        CREATE_CONFIG_TABLE,
        CREATE_CLASSES_TABLE,
        CREATE_MANDRAGORES_TABLE,
        CREATE_IMAGES_TABLE,
        CREATE_SCENES_TABLE,
        CREATE_DESCRIPTORS_TABLE,
    ]);
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
