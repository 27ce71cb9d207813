//! Bulk import of delimited dump files

pub mod dump;
pub mod loader;

pub use dump::{DumpFile, DumpImporter, DumpLayout, BNF_DUMPS, REORGANIZED_DUMPS};
pub use loader::{import_file, CsvSource, Encoding, ImportReport, ImportWarning, RecordMode, RowAction, RowTransform};
