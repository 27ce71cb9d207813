//! SQLite storage implementation

use std::cell::OnceCell;
use std::path::Path;

use rusqlite::{params_from_iter, CachedStatement, Connection, OptionalExtension, Row};

use crate::import::{import_file, CsvSource, ImportReport};
use crate::query::{SqlBuilder, Statement, TableFilter};
use crate::registry::{registry, SchemaRegistry, DESCRIPTORS, IMAGES, MANDRAGORES, SCENES};
use crate::value::{Record, Value};
use crate::{Error, Result};

use super::schema;

/// SQLite-backed storage for the catalog
///
/// The store owns its connection; once [`close`](Self::close)d every
/// operation fails with [`Error::Disconnected`].
pub struct CatalogStore {
    conn: Option<Connection>,
    registry: &'static SchemaRegistry,
    version: OnceCell<String>,
}

impl CatalogStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        tracing::debug!("opened catalog {}", path.display());
        Ok(Self::with_connection(conn))
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::with_connection(Connection::open_in_memory()?))
    }

    fn with_connection(conn: Connection) -> Self {
        Self {
            conn: Some(conn),
            registry: registry(),
            version: OnceCell::new(),
        }
    }

    /// Release the connection. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        self.version = OnceCell::new();
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| e)?;
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(Error::Disconnected)
    }

    fn conn_mut(&mut self) -> Result<&mut Connection> {
        self.conn.as_mut().ok_or(Error::Disconnected)
    }

    fn builder(&self) -> SqlBuilder<'static> {
        SqlBuilder::new(self.registry)
    }

    // ========== Schema ==========

    /// Create the schema when missing, or drop and recreate it when
    /// `rebuild` is set. Returns the schema version.
    pub fn ensure_schema(&mut self, rebuild: bool) -> Result<String> {
        if rebuild || self.schema_version()?.is_none() {
            self.version = OnceCell::new();
            let conn = self.conn_mut()?;
            conn.flush_prepared_statement_cache();

            let tx = conn.transaction()?;
            for stmt in schema::all_schema_statements() {
                tx.execute(stmt, [])?;
            }
            tx.execute("INSERT INTO config (version) VALUES (?1)", [schema::SCHEMA_VERSION])?;
            tx.commit()?;
            tracing::info!("created catalog schema {}", schema::SCHEMA_VERSION);
        }
        self.schema_version()?.ok_or(Error::SchemaMissing)
    }

    /// Version stored in the config table, `None` before the schema exists
    pub fn schema_version(&self) -> Result<Option<String>> {
        if let Some(version) = self.version.get() {
            return Ok(Some(version.clone()));
        }

        let conn = self.conn()?;
        let tables: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'config'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Ok(None);
        }

        let version: Option<String> = conn
            .query_row("SELECT version FROM config LIMIT 1", [], |row| row.get(0))
            .optional()?;
        if let Some(version) = &version {
            let _ = self.version.set(version.clone());
        }
        Ok(version)
    }

    fn require_schema(&self) -> Result<()> {
        match self.schema_version()? {
            Some(_) => Ok(()),
            None => Err(Error::SchemaMissing),
        }
    }

    // ========== Writes ==========

    /// Delete every scene and descriptor of the given mandragores
    pub fn delete_related(&mut self, mandragore_ids: &[&str]) -> Result<usize> {
        self.require_schema()?;
        let builder = self.builder();
        let mut statements = Vec::new();
        for table in self.registry.linked_from(MANDRAGORES) {
            let column = table.link_to(MANDRAGORES).map(|l| l.column).unwrap_or("mandragoreID");
            for id in mandragore_ids {
                let record = Record::new().with(column, *id);
                statements.push(builder.delete(table.name, &record)?);
            }
        }
        self.execute_batch("delete related", statements)
    }

    /// Full-row upsert of images
    pub fn ensure_images(&mut self, records: &[Record]) -> Result<usize> {
        self.upsert_all(IMAGES, records)
    }

    /// Full-row upsert of scenes
    pub fn add_scenes(&mut self, records: &[Record]) -> Result<usize> {
        self.upsert_all(SCENES, records)
    }

    /// Full-row upsert of descriptors
    pub fn add_descriptors(&mut self, records: &[Record]) -> Result<usize> {
        self.upsert_all(DESCRIPTORS, records)
    }

    /// Update only the columns present in each record
    pub fn update_images(&mut self, records: &[Record]) -> Result<usize> {
        self.require_schema()?;
        let builder = self.builder();
        let statements = records
            .iter()
            .map(|r| builder.update(IMAGES, r))
            .collect::<Result<Vec<_>>>()?;
        self.execute_batch("update images", statements)
    }

    fn upsert_all(&mut self, table: &str, records: &[Record]) -> Result<usize> {
        self.require_schema()?;
        let builder = self.builder();
        let statements = records
            .iter()
            .map(|r| builder.upsert(table, r))
            .collect::<Result<Vec<_>>>()?;
        self.execute_batch(table, statements)
    }

    /// Run statements in one transaction, all or nothing
    fn execute_batch(&mut self, label: &str, statements: Vec<Statement>) -> Result<usize> {
        let tx = self.conn_mut()?.transaction()?;
        let mut changed = 0;
        for statement in &statements {
            let mut stmt = tx.prepare_cached(&statement.sql)?;
            changed += stmt.execute(params_from_iter(statement.params.iter()))?;
        }
        tx.commit()?;
        tracing::info!("{}: {} statement(s), {} row(s) changed", label, statements.len(), changed);
        Ok(changed)
    }

    /// Bulk load a delimited file into `fields` of `table`
    pub fn import_csv(&mut self, table: &str, fields: &[&str], source: &CsvSource) -> Result<ImportReport> {
        self.require_schema()?;
        let sql = self.builder().insert_sql(table, fields)?;
        tracing::debug!("importing {} into {}", source.path().display(), table);
        import_file(self.conn_mut()?, &sql, source)
    }

    // ========== Reads ==========

    /// Get an image by id
    pub fn retrieve_image(&self, image_id: &str) -> Result<Option<Record>> {
        self.require_schema()?;
        let statement = self.builder().get(IMAGES, &[Value::from(image_id)])?;
        let columns = column_names(self.registry.table(IMAGES)?.all_fields());

        self.conn()?
            .query_row(&statement.sql, params_from_iter(statement.params.iter()), |row| {
                row_to_record(row, &columns)
            })
            .optional()
            .map_err(Into::into)
    }

    /// Images matching every filter, with the number of rows the cursor
    /// will yield
    pub fn retrieve_images(
        &self,
        fields: &[&str],
        filters: &[TableFilter],
        limit: Option<usize>,
    ) -> Result<ImageCursor<'_>> {
        self.require_schema()?;
        let builder = self.builder();
        let count = builder.count_query(IMAGES, filters)?;
        let query = builder.filtered_query(IMAGES, fields, filters, limit)?;

        let conn = self.conn()?;
        let total: i64 = conn.query_row(&count.sql, params_from_iter(count.params.iter()), |row| {
            row.get(0)
        })?;
        let total = total.max(0) as usize;
        let total = limit.map_or(total, |limit| total.min(limit));

        let columns = if fields.is_empty() {
            column_names(self.registry.table(IMAGES)?.all_fields())
        } else {
            column_names(fields.to_vec())
        };

        Ok(ImageCursor {
            stmt: conn.prepare_cached(&query.sql)?,
            params: query.params,
            columns,
            total,
        })
    }

    /// Row count of every catalog table
    pub fn stats(&self) -> Result<DbStats> {
        let version = self.schema_version()?.ok_or(Error::SchemaMissing)?;
        let conn = self.conn()?;
        let mut tables = Vec::with_capacity(self.registry.tables().len());
        for table in self.registry.tables() {
            let count: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table.name), [], |row| row.get(0))?;
            tables.push((table.name, count as usize));
        }
        Ok(DbStats { version, tables })
    }
}

/// Lazily-read result of [`CatalogStore::retrieve_images`]
pub struct ImageCursor<'conn> {
    stmt: CachedStatement<'conn>,
    params: Vec<Value>,
    columns: Vec<String>,
    total: usize,
}

impl ImageCursor<'_> {
    /// Matching rows, clamped to the query limit
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Iterate over the matching records
    pub fn records(&mut self) -> Result<impl Iterator<Item = Result<Record>> + '_> {
        let columns = &self.columns;
        let rows = self
            .stmt
            .query_map(params_from_iter(self.params.iter()), move |row| row_to_record(row, columns))?;
        Ok(rows.map(|r| r.map_err(Error::from)))
    }
}

fn column_names(fields: Vec<&str>) -> Vec<String> {
    fields.into_iter().map(str::to_string).collect()
}

fn row_to_record(row: &Row<'_>, columns: &[String]) -> rusqlite::Result<Record> {
    let mut record = Record::new();
    for (i, column) in columns.iter().enumerate() {
        record.insert(column.as_str(), row.get::<_, Value>(i)?);
    }
    Ok(record)
}

/// Row counts per table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbStats {
    pub version: String,
    pub tables: Vec<(&'static str, usize)>,
}

impl DbStats {
    pub fn count(&self, table: &str) -> Option<usize> {
        self.tables.iter().find(|(name, _)| *name == table).map(|(_, n)| *n)
    }
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Catalog Statistics (schema {}):", self.version)?;
        for (table, count) in &self.tables {
            writeln!(f, "  {}: {}", table, count)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CLASSES;
    use std::io::Write;

    fn store() -> CatalogStore {
        let mut store = CatalogStore::open_in_memory().unwrap();
        store.ensure_schema(true).unwrap();
        store
    }

    fn image(id: &str) -> Record {
        Record::new()
            .with("imageID", id)
            .with("documentURL", format!("https://gallica.bnf.fr/iiif/{}/full/native.jpg", id))
            .with("width", 640)
            .with("height", 480)
    }

    fn scene(mandragore: &str, image: &str, localized: bool) -> Record {
        let record = Record::new().with("mandragoreID", mandragore).with("imageID", image);
        if localized {
            record.with("x", 1).with("y", 2).with("width", 30).with("height", 40)
        } else {
            record
        }
    }

    fn collect(cursor: &mut ImageCursor<'_>) -> Vec<Record> {
        cursor.records().unwrap().collect::<Result<Vec<_>>>().unwrap()
    }

    #[test]
    fn test_schema_version() {
        let mut store = CatalogStore::open_in_memory().unwrap();
        assert_eq!(store.schema_version().unwrap(), None);
        assert_eq!(store.ensure_schema(false).unwrap(), "1.0");
        assert_eq!(store.schema_version().unwrap().as_deref(), Some("1.0"));
        // idempotent without rebuild
        assert_eq!(store.ensure_schema(false).unwrap(), "1.0");
    }

    #[test]
    fn test_rebuild_drops_data() {
        let mut store = store();
        store.ensure_images(&[image("img1")]).unwrap();
        store.ensure_schema(true).unwrap();
        assert!(store.retrieve_image("img1").unwrap().is_none());
    }

    #[test]
    fn test_operations_require_schema() {
        let mut store = CatalogStore::open_in_memory().unwrap();
        assert!(matches!(store.ensure_images(&[image("img1")]), Err(Error::SchemaMissing)));
        assert!(matches!(store.retrieve_image("img1"), Err(Error::SchemaMissing)));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut store = store();
        store.close().unwrap();
        store.close().unwrap();
        assert!(!store.is_connected());
        assert!(matches!(store.schema_version(), Err(Error::Disconnected)));
        assert!(matches!(store.retrieve_image("img1"), Err(Error::Disconnected)));
    }

    #[test]
    fn test_image_round_trip() {
        let mut store = store();
        store.ensure_images(&[image("img1")]).unwrap();
        let back = store.retrieve_image("img1").unwrap().unwrap();
        assert_eq!(back, image("img1"));
        assert!(store.retrieve_image("img2").unwrap().is_none());
    }

    #[test]
    fn test_upsert_nulls_omitted_fields() {
        let mut store = store();
        store.ensure_images(&[image("img1")]).unwrap();
        store
            .ensure_images(&[Record::new().with("imageID", "img1").with("width", 800)])
            .unwrap();

        let back = store.retrieve_image("img1").unwrap().unwrap();
        assert_eq!(back.integer("width"), Some(800));
        assert_eq!(back.get("height"), Some(&Value::Null));
        assert_eq!(back.get("documentURL"), Some(&Value::Null));
    }

    #[test]
    fn test_update_changes_only_supplied_fields() {
        let mut store = store();
        store.ensure_images(&[image("img1")]).unwrap();
        let changed = store
            .update_images(&[Record::new().with("imageID", "img1").with("width", 1024)])
            .unwrap();
        assert_eq!(changed, 1);

        let back = store.retrieve_image("img1").unwrap().unwrap();
        assert_eq!(back.integer("width"), Some(1024));
        assert_eq!(back.integer("height"), Some(480));
        assert!(back.text("documentURL").is_some());
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let mut store = store();
        let records = vec![image("img1"), Record::new().with("imageID", "img2").with("label", "x")];
        assert!(store.ensure_images(&records).is_err());
        assert!(store.retrieve_image("img1").unwrap().is_none());
    }

    #[test]
    fn test_delete_related() {
        let mut store = store();
        store
            .add_scenes(&[scene("m1", "img1", false), scene("m2", "img1", false)])
            .unwrap();
        store
            .add_descriptors(&[
                Record::new().with("mandragoreID", "m1").with("classID", "lion"),
                Record::new().with("mandragoreID", "m2").with("classID", "cerf"),
            ])
            .unwrap();

        let deleted = store.delete_related(&["m1"]).unwrap();
        assert_eq!(deleted, 2);

        let stats = store.stats().unwrap();
        assert_eq!(stats.count(SCENES), Some(1));
        assert_eq!(stats.count(DESCRIPTORS), Some(1));
    }

    #[test]
    fn test_retrieve_images_with_joins() {
        let mut store = store();
        store
            .ensure_images(&[image("img1"), image("img2"), image("img3")])
            .unwrap();
        store
            .add_scenes(&[
                scene("m1", "img1", true),
                scene("m2", "img2", false),
                scene("m3", "img3", true),
            ])
            .unwrap();
        store
            .add_descriptors(&[
                Record::new().with("mandragoreID", "m1").with("classID", "lion"),
                Record::new().with("mandragoreID", "m3").with("classID", "cerf"),
            ])
            .unwrap();
        // descriptors are reached through mandragores
        store
            .conn()
            .unwrap()
            .execute_batch("INSERT INTO mandragores (mandragoreID) VALUES ('m1'), ('m2'), ('m3')")
            .unwrap();

        let filters = vec![TableFilter::localized(SCENES)];
        let mut cursor = store.retrieve_images(&["imageID"], &filters, None).unwrap();
        assert_eq!(cursor.total(), 2);
        let mut ids: Vec<String> = collect(&mut cursor)
            .iter()
            .filter_map(|r| r.text("imageID").map(str::to_string))
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["img1", "img3"]);

        let filters = vec![TableFilter::like(DESCRIPTORS, "classID", "li*")];
        let mut cursor = store.retrieve_images(&[], &filters, None).unwrap();
        let records = collect(&mut cursor);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text("imageID"), Some("img1"));
        assert_eq!(records[0].len(), 4);
    }

    #[test]
    fn test_retrieve_images_total_clamped_to_limit() {
        let mut store = store();
        store
            .ensure_images(&[image("img1"), image("img2"), image("img3")])
            .unwrap();
        let mut cursor = store.retrieve_images(&["imageID"], &[], Some(2)).unwrap();
        assert_eq!(cursor.total(), 2);
        assert_eq!(collect(&mut cursor).len(), 2);
    }

    #[test]
    fn test_missing_sizes_then_update() {
        let mut store = store();
        store
            .ensure_images(&[
                image("img1"),
                Record::new().with("imageID", "img2").with("documentURL", "https://example.org/2"),
            ])
            .unwrap();

        let filters = vec![TableFilter::eq(IMAGES, "width", Value::Null)];
        let pending: Vec<Record> = {
            let mut cursor = store.retrieve_images(&["imageID"], &filters, None).unwrap();
            collect(&mut cursor)
        };
        assert_eq!(pending.len(), 1);

        let updates: Vec<Record> = pending
            .iter()
            .map(|r| r.clone().with("width", 100).with("height", 200))
            .collect();
        store.update_images(&updates).unwrap();

        let cursor = store.retrieve_images(&["imageID"], &filters, None).unwrap();
        assert_eq!(cursor.total(), 0);
    }

    #[test]
    fn test_composite_key_filters() {
        let mut store = store();
        store.ensure_images(&[image("img1"), image("img2")]).unwrap();
        store
            .add_scenes(&[scene("m1", "img1", false), scene("m2", "img2", false)])
            .unwrap();

        let filters = vec![TableFilter::key(SCENES, ["m2", "img2"])];
        let mut cursor = store.retrieve_images(&["imageID"], &filters, None).unwrap();
        let records = collect(&mut cursor);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text("imageID"), Some("img2"));

        let filters = vec![TableFilter::keys_in(
            SCENES,
            vec![vec!["m1".into(), "img1".into()], vec!["m2".into(), "img2".into()]],
        )];
        let cursor = store.retrieve_images(&["imageID"], &filters, None).unwrap();
        assert_eq!(cursor.total(), 2);
    }

    #[test]
    fn test_join_failure_raised_before_execution() {
        let store = store();
        let filters = vec![TableFilter::eq("config", "version", "1.0")];
        assert!(matches!(
            store.retrieve_images(&[], &filters, None),
            Err(Error::CannotJoin { .. })
        ));
    }

    #[test]
    fn test_import_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "abeille\t.insectes").unwrap();
        writeln!(file, "lion\t.mammifères").unwrap();

        let mut store = store();
        let source = CsvSource::new(file.path());
        let report = store
            .import_csv(CLASSES, &["classID", "superclassID"], &source)
            .unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(store.stats().unwrap().count(CLASSES), Some(2));

        assert!(store.import_csv(CLASSES, &["width"], &source).is_err());
    }

    #[test]
    fn test_on_disk_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mdlg.db");
        {
            let mut store = CatalogStore::open(&path).unwrap();
            store.ensure_schema(false).unwrap();
            store.ensure_images(&[image("img1")]).unwrap();
        }
        let store = CatalogStore::open(&path).unwrap();
        assert_eq!(store.schema_version().unwrap().as_deref(), Some("1.0"));
        assert!(store.retrieve_image("img1").unwrap().is_some());
    }

    #[test]
    fn test_stats_display() {
        let mut store = store();
        store.ensure_images(&[image("img1")]).unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.count(IMAGES), Some(1));
        assert_eq!(stats.count("config"), Some(1));
        let text = stats.to_string();
        assert!(text.contains("schema 1.0"));
        assert!(text.contains("images: 1"));
    }
}
